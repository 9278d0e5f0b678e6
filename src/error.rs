use serde::Serialize;

/// Construction phase that ran into a size bound.
#[derive(Debug, Clone, Copy, Eq, PartialEq, Serialize)]
pub enum Phase {
	Forward,
	ForwardCaptures,
	Backward,
	BackwardPrefix,
	TraceFinder,
}

#[derive(Debug, Clone, Copy, Eq, PartialEq, Serialize)]
pub enum Bound {
	States,
	Transitions,
	NfaStatesPerTransition,
}

#[derive(Debug, Clone, Eq, PartialEq, thiserror::Error)]
pub enum CompileError {
	/// Never retried internally; a caller may retry with a coarser strategy.
	#[error("automaton too large in {phase} phase: {bound} exceeded the limit of {limit}")]
	AutomatonTooLarge {
		phase: Phase,
		bound: Bound,
		limit: usize,
	},
}

pub type Result<T> = std::result::Result<T, CompileError>;

impl std::fmt::Display for Phase {
	fn fmt(&self, fmt: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
		fmt.write_str(match self {
			Self::Forward => "forward",
			Self::ForwardCaptures => "forward capture-tracking",
			Self::Backward => "backward",
			Self::BackwardPrefix => "backward prefix",
			Self::TraceFinder => "trace finder",
		})
	}
}

impl std::fmt::Display for Bound {
	fn fmt(&self, fmt: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
		fmt.write_str(match self {
			Self::States => "state count",
			Self::Transitions => "transition count",
			Self::NfaStatesPerTransition => "NFA states per transition",
		})
	}
}
