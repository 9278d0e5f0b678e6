use std::collections::BTreeSet;

use crate::nfa::NfaIdx;
use crate::nfa::NfaTransitionIdx;

/// NFA states active together, in priority order, without duplicates.
/// Equality and hashing only look at the ordered member list.
#[derive(Debug, Clone, Default)]
pub struct StateSet {
	members: Vec<NfaIdx>,
	lookup: BTreeSet<NfaIdx>,
}

/// Two DFA states are the same state iff their keys are equal.
#[derive(Debug, Clone, Eq, Hash, PartialEq)]
pub struct StateKey {
	pub set: StateSet,
	pub backward_prefix: bool,
}

/// NFA transitions merged into one DFA transition, in priority order,
/// together with the state set they lead to.
#[derive(Debug, Clone, Default, Eq, PartialEq)]
pub struct TransitionSet {
	transitions: Vec<NfaTransitionIdx>,
	reached: Vec<NfaIdx>,
	targets: StateSet,
}

impl StateSet {
	pub fn new() -> Self {
		Self::default()
	}

	/// Returns `false` if `idx` was already a member.
	pub fn insert(&mut self, idx: NfaIdx) -> bool {
		if !self.lookup.insert(idx) {
			return false;
		}
		self.members.push(idx);
		true
	}

	pub fn contains(&self, idx: NfaIdx) -> bool {
		self.lookup.contains(&idx)
	}

	pub fn position(&self, idx: NfaIdx) -> Option<usize> {
		if !self.contains(idx) {
			return None;
		}
		self.members.iter().position(|&member| member == idx)
	}

	/// Drops every member after the first `len`.
	pub fn truncate(&mut self, len: usize) {
		for idx in self.members.drain(len.min(self.members.len())..) {
			self.lookup.remove(&idx);
		}
	}

	pub fn len(&self) -> usize {
		self.members.len()
	}

	pub fn is_empty(&self) -> bool {
		self.members.is_empty()
	}

	pub fn iter(&self) -> impl Iterator<Item = NfaIdx> + '_ {
		self.members.iter().copied()
	}

	pub fn as_slice(&self) -> &[NfaIdx] {
		&self.members
	}
}

impl FromIterator<NfaIdx> for StateSet {
	fn from_iter<I>(iter: I) -> Self
	where
		I: IntoIterator<Item = NfaIdx>,
	{
		let mut set: Self = Self::new();
		for idx in iter {
			set.insert(idx);
		}
		set
	}
}

impl PartialEq for StateSet {
	fn eq(&self, other: &Self) -> bool {
		self.members == other.members
	}
}

impl Eq for StateSet {}

impl std::hash::Hash for StateSet {
	fn hash<H: std::hash::Hasher>(&self, state: &mut H) {
		self.members.hash(state);
	}
}

impl StateKey {
	pub fn new(set: StateSet, backward_prefix: bool) -> Self {
		Self { set, backward_prefix }
	}
}

impl TransitionSet {
	pub fn new() -> Self {
		Self::default()
	}

	/// `target` is the state reached through `transition` in the direction being built.
	pub fn add(&mut self, transition: NfaTransitionIdx, target: NfaIdx) {
		self.transitions.push(transition);
		self.reached.push(target);
		self.targets.insert(target);
	}

	pub fn transitions(&self) -> &[NfaTransitionIdx] {
		&self.transitions
	}

	pub fn targets(&self) -> &StateSet {
		&self.targets
	}

	/// The preferred NFA transition leading to each target, in target order.
	pub fn per_target(&self) -> Vec<NfaTransitionIdx> {
		let mut seen: BTreeSet<NfaIdx> = BTreeSet::new();
		std::iter::zip(self.transitions.iter(), self.reached.iter())
			.filter(|&(_, &target)| seen.insert(target))
			.map(|(&t, _)| t)
			.collect::<Vec<_>>()
	}

	pub fn len(&self) -> usize {
		self.transitions.len()
	}

	pub fn is_empty(&self) -> bool {
		self.transitions.is_empty()
	}
}
