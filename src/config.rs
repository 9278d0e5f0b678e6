use serde::Deserialize;
use serde::Serialize;

#[derive(Debug, Clone, Eq, PartialEq, Deserialize, Serialize)]
#[serde(default)]
pub struct CompilerConfig {
	/// Hard ceiling on DFA states per automaton, queued states included.
	pub max_states: usize,
	pub max_transitions: usize,
	/// Ceiling on the NFA states merged into the target of a single DFA transition.
	pub max_nfa_states_per_transition: usize,
	/// Unanchored search; otherwise matches must start at the first input position.
	pub search: bool,
	pub track_captures: bool,
	/// Also build the backward automaton that recovers match starts.
	pub backward: bool,
	/// Prune states whose outcome is already decided to a single result.
	pub trace_finder: bool,
	pub inner_literal: bool,
	pub reduce_control_flow: bool,
	/// Node splits control-flow reduction may perform before it gives up.
	pub max_split_states: usize,
	/// States with at least this many disjoint ranges get a range lookup tree.
	pub fan_out_threshold: usize,
}

impl Default for CompilerConfig {
	fn default() -> Self {
		Self {
			max_states: 10_000,
			max_transitions: 100_000,
			max_nfa_states_per_transition: 255,
			search: true,
			track_captures: false,
			backward: true,
			trace_finder: false,
			inner_literal: true,
			reduce_control_flow: false,
			max_split_states: 64,
			fan_out_threshold: 16,
		}
	}
}

impl CompilerConfig {
	pub fn new() -> Self {
		Self::default()
	}

	pub fn with_max_states(mut self, max_states: usize) -> Self {
		self.max_states = max_states;
		self
	}

	pub fn with_search(mut self, search: bool) -> Self {
		self.search = search;
		self
	}

	pub fn with_captures(mut self, track_captures: bool) -> Self {
		self.track_captures = track_captures;
		self
	}

	pub fn with_backward(mut self, backward: bool) -> Self {
		self.backward = backward;
		self
	}

	pub fn with_trace_finder(mut self, trace_finder: bool) -> Self {
		self.trace_finder = trace_finder;
		self
	}

	pub fn with_inner_literal(mut self, inner_literal: bool) -> Self {
		self.inner_literal = inner_literal;
		self
	}

	pub fn with_control_flow_reduction(mut self, reduce: bool) -> Self {
		self.reduce_control_flow = reduce;
		self
	}
}

#[cfg(test)]
mod test {
	use super::*;

	#[test]
	fn from_json() {
		let config: CompilerConfig =
			serde_json::from_str(r#"{ "max_states": 64, "track_captures": true }"#).unwrap();
		assert_eq!(config.max_states, 64);
		assert!(config.track_captures);
		assert_eq!(config.max_transitions, CompilerConfig::default().max_transitions);
		assert!(config.search);
	}
}
