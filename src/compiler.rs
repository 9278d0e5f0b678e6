use crate::config::CompilerConfig;
use crate::debug;
use crate::dfa::DfaGenerator;
use crate::dfa::Direction;
use crate::error::Result;
use crate::executable::CompiledAutomaton;
use crate::nfa::Nfa;

/// Forward automaton for match ends, plus the backward automaton that
/// recovers match starts when it was requested.
#[derive(Debug, Clone)]
pub struct CompiledRegex {
	pub forward: CompiledAutomaton,
	pub backward: Option<CompiledAutomaton>,
}

/// Runs every phase for one NFA: forward construction, the optional
/// optimizations, table building, then the backward automaton.
///
/// Only a size bound stops compilation; optimizations that do not apply are
/// skipped and the unoptimized graph is kept.
pub fn compile(nfa: &Nfa, config: &CompilerConfig) -> Result<CompiledRegex> {
	let mut forward: DfaGenerator = DfaGenerator::new(nfa, config, Direction::Forward);
	forward.run()?;
	// Match starts behind an accelerated literal come from the backward automaton.
	if config.inner_literal && config.backward && !config.trace_finder {
		forward.accelerate_inner_literal()?;
	}
	if config.reduce_control_flow && !forward.reduce_control_flow(config.max_split_states) {
		debug!("keeping the unreduced graph");
	}
	debug::dump(&forward);
	let forward: CompiledAutomaton = CompiledAutomaton::build(&forward);

	let backward: Option<CompiledAutomaton> = if config.backward {
		let mut backward: DfaGenerator = DfaGenerator::new(nfa, config, Direction::Backward);
		backward.run()?;
		debug::dump(&backward);
		Some(CompiledAutomaton::build(&backward))
	} else {
		None
	};

	Ok(CompiledRegex { forward, backward })
}
