#![allow(unused)]

use tdfa_forge::compile;
use tdfa_forge::config::*;
use tdfa_forge::dfa::*;
use tdfa_forge::nfa::*;
use tdfa_forge::regex::*;
use tdfa_forge::schema::*;

fn main() {
	// a{0,3}literal[0-9]
	let r: Regex = Regex::Sequence(vec![
		Regex::repeat(Regex::Literal('a'), 0, 3),
		Regex::literal_str("literal"),
		Regex::class(&[('0', '9')]),
	]);
	let nfa: Nfa = Nfa::for_regex(&r, NfaOptions::default());
	let config: CompilerConfig = CompilerConfig::new();
	let mut generator: DfaGenerator = DfaGenerator::new(&nfa, &config, Direction::Forward);
	generator.run().unwrap();
	let accelerated: bool = generator.accelerate_inner_literal().unwrap();
	println!("accelerated: {accelerated}");
	println!("{}", serde_json::to_string_pretty(&generator.to_json()).unwrap());
}

fn main2() {
	let mut schema: Schema = Schema::new();
	schema.add_rule("abc", Regex::literal_str("abc"));
	schema.add_rule("ab", Regex::literal_str("ab"));
	schema.add_rule("xy", Regex::Sequence(vec![Regex::plus(Regex::Literal('x')), Regex::Literal('y')]));
	let nfa: Nfa = Nfa::for_schema(&schema, NfaOptions::default());
	let config: CompilerConfig = CompilerConfig::new().with_search(false).with_trace_finder(true);
	match compile(&nfa, &config) {
		Ok(regex) => println!("{} forward states", regex.forward.states().len()),
		Err(err) => println!("failed: {err}"),
	}
}
