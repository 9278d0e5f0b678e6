use crate::regex::Regex;

/// Named alternatives compiled into one automaton; the rule index is the
/// result a trace-finder automaton reports.
#[derive(Debug, Default)]
pub struct Schema {
	rules: Vec<Rule>,
}

#[derive(Debug)]
pub struct Rule {
	pub idx: usize,
	pub name: String,
	pub regex: Regex,
}

impl Schema {
	pub fn new() -> Self {
		Self { rules: Vec::new() }
	}

	pub fn add_rule<LikeString>(&mut self, name: LikeString, regex: Regex) -> usize
	where
		LikeString: Into<String>,
	{
		let idx: usize = self.rules.len();
		self.rules.push(Rule {
			idx,
			name: name.into(),
			regex,
		});
		idx
	}

	pub fn rules(&self) -> &[Rule] {
		&self.rules
	}
}
