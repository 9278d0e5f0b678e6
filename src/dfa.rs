use std::collections::BTreeSet;
use std::collections::VecDeque;

use indexmap::IndexMap;
use serde::Serialize;

use crate::canonicalize::CanonicalTransition;
use crate::canonicalize::Contribution;
use crate::canonicalize::GroupBy;
use crate::canonicalize::canonicalize;
use crate::canonicalize::covering_transition;
use crate::config::CompilerConfig;
use crate::error::Bound;
use crate::error::CompileError;
use crate::error::Phase;
use crate::error::Result;
use crate::interval_tree::Interval;
use crate::nfa::Nfa;
use crate::nfa::NfaIdx;
use crate::nfa::NfaStateKind;
use crate::nfa::NfaTransition;
use crate::nfa::NfaTransitionIdx;
use crate::nfa::alphabet;
use crate::state_set::StateKey;
use crate::state_set::StateSet;
use crate::state_set::TransitionSet;

/// Builder graph of a DFA under construction.
///
/// States live in a dense vector indexed by [`DfaIdx`]; `state_map` finds the
/// state for a [`StateKey`]. States are created lazily, queued, and expanded
/// once; trace-finder pruning may send an expanded state back to the queue.
#[derive(Debug)]
pub struct DfaGenerator<'a> {
	nfa: &'a Nfa,
	config: &'a CompilerConfig,
	direction: Direction,
	pub(crate) states: Vec<DfaStateBuilder>,
	pub(crate) transitions: Vec<DfaTransitionBuilder>,
	state_map: IndexMap<StateKey, DfaIdx>,
	worklist: VecDeque<DfaIdx>,
	/// Indexed by [`EntryKind`].
	entries: [Option<DfaIdx>; 2],
	pub(crate) literal: Option<LiteralDispatch>,
}

#[derive(Debug, Clone, Copy, Eq, PartialEq, Serialize)]
pub enum Direction {
	/// Finds match ends, reading the input left to right.
	Forward,
	/// Finds the start of a match whose end is known, reading right to left.
	Backward,
}

#[derive(Debug, Clone, Copy, Eq, Hash, Ord, PartialEq, PartialOrd, Serialize)]
pub enum EntryKind {
	Anchored = 0,
	Unanchored = 1,
}

#[derive(Debug, Clone, Copy, Eq, Hash, Ord, PartialEq, PartialOrd, Serialize)]
pub struct DfaIdx(u32);

#[derive(Debug, Clone, Copy, Eq, Hash, Ord, PartialEq, PartialOrd, Serialize)]
pub struct DfaTransitionIdx(u32);

#[derive(Debug, Clone)]
pub struct DfaStateBuilder {
	pub(crate) idx: DfaIdx,
	pub(crate) key: StateKey,
	pub(crate) is_final: bool,
	/// Only a match at the end of the input counts.
	pub(crate) anchored_final: bool,
	pub(crate) result: Option<u32>,
	/// Member row and exit edge of the preferred match.
	pub(crate) final_exit: Option<(usize, NfaTransitionIdx)>,
	/// Filled once, on expansion.
	pub(crate) transitions: Vec<DfaTransitionIdx>,
	/// Only kept while capture groups are tracked.
	pub(crate) predecessors: Vec<DfaTransitionIdx>,
	pub(crate) expanded: bool,
	/// Trace-finder outcome decided without expansion.
	pub(crate) pruned: Option<u32>,
	pub(crate) prune_blocked: bool,
}

#[derive(Debug, Clone)]
pub struct DfaTransitionBuilder {
	pub(crate) idx: DfaTransitionIdx,
	pub(crate) source: DfaIdx,
	pub(crate) target: DfaIdx,
	/// Sorted, disjoint.
	pub(crate) ranges: Vec<Interval<u32>>,
	pub(crate) set: TransitionSet,
	/// Matched last, as "anything not matched by a sibling".
	pub(crate) any_remaining: bool,
	/// Taken by re-entering the unanchored entry instead of `target`.
	pub(crate) restart: bool,
}

/// Installed by inner-literal acceleration in place of the unanchored entry.
#[derive(Debug, Clone, Serialize)]
pub struct LiteralDispatch {
	pub literal: Vec<char>,
	/// State right after the literal has been read.
	pub after_literal: DfaIdx,
	/// Backward automaton for the part of the pattern before the literal.
	pub prefix_matcher: Option<DfaIdx>,
}

impl<'a> DfaGenerator<'a> {
	pub fn new(nfa: &'a Nfa, config: &'a CompilerConfig, direction: Direction) -> Self {
		Self {
			nfa,
			config,
			direction,
			states: Vec::new(),
			transitions: Vec::new(),
			state_map: IndexMap::new(),
			worklist: VecDeque::new(),
			entries: [None, None],
			literal: None,
		}
	}

	/// Seeds the entry states and expands everything reachable from them.
	pub fn run(&mut self) -> Result<()> {
		match self.direction {
			Direction::Forward => {
				let anchored: DfaIdx = self.add_state(StateKey::new(StateSet::from_iter([Nfa::ANCHORED_ENTRY]), false))?;
				self.entries[EntryKind::Anchored as usize] = Some(anchored);
				if self.config.search {
					let unanchored: DfaIdx =
						self.add_state(StateKey::new(StateSet::from_iter([Nfa::UNANCHORED_ENTRY]), false))?;
					self.entries[EntryKind::Unanchored as usize] = Some(unanchored);
				}
			},
			Direction::Backward => {
				let seeds: StateSet = self.nfa.reverse_entry().into_iter().collect::<StateSet>();
				let anchored: DfaIdx = self.add_state(StateKey::new(seeds, false))?;
				self.entries[EntryKind::Anchored as usize] = Some(anchored);
			},
		}
		self.drain()?;
		debug!(
			"{:?} dfa: {} states, {} transitions",
			self.direction,
			self.states.len(),
			self.transitions.len()
		);
		Ok(())
	}

	/// Expands queued states until the worklist is empty.
	pub(crate) fn drain(&mut self) -> Result<()> {
		while let Some(idx) = self.worklist.pop_front() {
			if self.states[idx.idx()].expanded {
				continue;
			}
			self.expand(idx)?;
		}
		Ok(())
	}

	/// Returns the state for `key`, creating and queueing it if it is new.
	pub(crate) fn add_state(&mut self, key: StateKey) -> Result<DfaIdx> {
		let key: StateKey = self.normalize(key);
		if let Some(&idx) = self.state_map.get(&key) {
			return Ok(idx);
		}
		if self.states.len() >= self.config.max_states {
			return Err(CompileError::AutomatonTooLarge {
				phase: self.phase(key.backward_prefix),
				bound: Bound::States,
				limit: self.config.max_states,
			});
		}

		let idx: DfaIdx = DfaIdx(self.states.len() as u32);
		let mut state: DfaStateBuilder = DfaStateBuilder {
			idx,
			key: key.clone(),
			is_final: false,
			anchored_final: false,
			result: None,
			final_exit: None,
			transitions: Vec::new(),
			predecessors: Vec::new(),
			expanded: false,
			pruned: None,
			prune_blocked: false,
		};
		if self.walks_backward(&key) {
			state.is_final = key.set.contains(Nfa::ANCHORED_ENTRY);
		} else {
			self.mark_final(&mut state);
		}
		trace!("new state {idx:?}: {:?} (final: {})", key.set.as_slice(), state.is_final);

		self.states.push(state);
		self.state_map.insert(key, idx);
		self.worklist.push_back(idx);
		Ok(idx)
	}

	/// Forward keys drop every member after the first one that can finish an
	/// unanchored match, since those members could only produce less preferred matches.
	fn normalize(&self, mut key: StateKey) -> StateKey {
		if self.walks_backward(&key) {
			return key;
		}
		let cut: Option<usize> = key.set.iter().position(|member| {
			self.nfa[member]
				.successors()
				.iter()
				.any(|&t| self.finishes(self.nfa.transition(t)))
		});
		if let Some(cut) = cut {
			key.set.truncate(cut + 1);
		}
		key
	}

	/// The first exit in member and edge order picks the result; nothing after
	/// an unanchored exit is looked at.
	fn mark_final(&self, state: &mut DfaStateBuilder) {
		let members: Vec<NfaIdx> = state.key.set.as_slice().to_vec();
		for (row, &member) in members.iter().enumerate() {
			for &t in self.nfa[member].successors().iter() {
				let exit: &NfaTransition = self.nfa.transition(t);
				if !exit.is_exit() {
					continue;
				}
				match self.nfa[exit.target()].kind() {
					NfaStateKind::UnanchoredFinal { .. } => state.is_final = true,
					NfaStateKind::AnchoredFinal { .. } => state.anchored_final = true,
					kind => panic!("exit edge {:?} into non-final state {kind:?}", exit.idx()),
				}
				if state.final_exit.is_none() {
					state.result = self.nfa[exit.target()].kind().result();
					state.final_exit = Some((row, exit.idx()));
				}
				if state.is_final {
					return;
				}
			}
		}
	}

	/// An exit into an unanchored final state: the match it ends is preferred
	/// over everything behind it.
	fn finishes(&self, transition: &NfaTransition) -> bool {
		transition.is_exit() && matches!(self.nfa[transition.target()].kind(), NfaStateKind::UnanchoredFinal { .. })
	}

	fn walks_backward(&self, key: &StateKey) -> bool {
		key.backward_prefix || (self.direction == Direction::Backward)
	}

	pub(crate) fn tracks_captures(&self) -> bool {
		self.config.track_captures && (self.direction == Direction::Forward)
	}

	fn prunes(&self) -> bool {
		self.config.trace_finder && (self.direction == Direction::Forward)
	}

	fn phase(&self, backward_prefix: bool) -> Phase {
		if backward_prefix {
			Phase::BackwardPrefix
		} else if self.direction == Direction::Backward {
			Phase::Backward
		} else if self.prunes() {
			Phase::TraceFinder
		} else if self.tracks_captures() {
			Phase::ForwardCaptures
		} else {
			Phase::Forward
		}
	}

	fn expand(&mut self, idx: DfaIdx) -> Result<()> {
		let key: StateKey = self.states[idx.idx()].key.clone();
		let backward: bool = self.walks_backward(&key);

		if self.prunes() && !backward && !self.states[idx.idx()].prune_blocked {
			if let Some(result) = self.single_result(&key.set) {
				trace!("pruning {idx:?} to result {result}");
				let state: &mut DfaStateBuilder = &mut self.states[idx.idx()];
				state.pruned = Some(result);
				state.expanded = true;
				return Ok(());
			}
		}

		let contributions: Vec<Contribution> = self.contributions(&key.set, backward);
		let group_by: GroupBy = if self.tracks_captures() && !backward {
			GroupBy::Transitions
		} else {
			GroupBy::Targets
		};
		let canonical: Vec<CanonicalTransition> = canonicalize(&contributions, group_by);
		let wildcard: Option<usize> = covering_transition(&canonical, alphabet());

		for (i, CanonicalTransition { ranges, set }) in canonical.into_iter().enumerate() {
			if set.targets().len() > self.config.max_nfa_states_per_transition {
				return Err(CompileError::AutomatonTooLarge {
					phase: self.phase(key.backward_prefix),
					bound: Bound::NfaStatesPerTransition,
					limit: self.config.max_nfa_states_per_transition,
				});
			}
			if self.transitions.len() >= self.config.max_transitions {
				return Err(CompileError::AutomatonTooLarge {
					phase: self.phase(key.backward_prefix),
					bound: Bound::Transitions,
					limit: self.config.max_transitions,
				});
			}
			let target: DfaIdx = self.add_state(StateKey::new(set.targets().clone(), key.backward_prefix))?;

			let t: DfaTransitionIdx = DfaTransitionIdx(self.transitions.len() as u32);
			self.transitions.push(DfaTransitionBuilder {
				idx: t,
				source: idx,
				target,
				ranges,
				set,
				any_remaining: wildcard == Some(i),
				restart: false,
			});
			self.states[idx.idx()].transitions.push(t);
			if self.tracks_captures() && !backward {
				self.states[target.idx()].predecessors.push(t);
			}
			let source: &DfaStateBuilder = &self.states[idx.idx()];
			if self.prunes() && (source.is_final || source.prune_blocked) {
				self.block_pruning(target);
			}
		}

		self.states[idx.idx()].expanded = true;
		Ok(())
	}

	/// `(range, edge)` pairs leaving the members, in member priority order.
	/// Walking forward, the first unanchored exit ends the list: every edge
	/// behind it, the unanchored entry's restart included, can only lead to a
	/// less preferred match.
	fn contributions(&self, set: &StateSet, backward: bool) -> Vec<Contribution> {
		let mut contributions: Vec<Contribution> = Vec::new();
		for member in set.iter() {
			let edges: &[NfaTransitionIdx] = if backward {
				self.nfa[member].predecessors()
			} else {
				self.nfa[member].successors()
			};
			for &t in edges.iter() {
				let transition: &NfaTransition = self.nfa.transition(t);
				if !backward && self.finishes(transition) {
					return contributions;
				}
				// Exits finish a match rather than lead anywhere; the backward
				// automaton never restarts through the unanchored entry.
				if transition.is_exit() || (backward && (transition.source() == Nfa::UNANCHORED_ENTRY)) {
					continue;
				}
				let target: NfaIdx = if backward {
					transition.source()
				} else {
					transition.target()
				};
				for &range in transition.ranges().iter() {
					contributions.push(Contribution {
						range,
						transition: t,
						target,
					});
				}
			}
		}
		contributions
	}

	fn single_result(&self, set: &StateSet) -> Option<u32> {
		let mut single: Option<u32> = None;
		for member in set.iter() {
			let possible: &BTreeSet<u32> = self.nfa[member].possible_results();
			if possible.len() != 1 {
				return None;
			}
			let result: u32 = *possible.first()?;
			match single {
				None => single = Some(result),
				Some(other) if other != result => return None,
				Some(_) => (),
			}
		}
		single
	}

	/// A state reachable from a final state may not be pruned: a run that
	/// dies past it reports the earlier final's result instead.
	fn block_pruning(&mut self, from: DfaIdx) {
		let mut queue: VecDeque<DfaIdx> = VecDeque::from([from]);
		while let Some(idx) = queue.pop_front() {
			let state: &mut DfaStateBuilder = &mut self.states[idx.idx()];
			if state.prune_blocked {
				continue;
			}
			state.prune_blocked = true;
			if state.pruned.take().is_some() {
				trace!("restoring pruned state {idx:?}");
				state.expanded = false;
				self.worklist.push_back(idx);
				continue;
			}
			if state.expanded {
				for &t in state.transitions.iter() {
					queue.push_back(self.transitions[t.idx()].target);
				}
			}
		}
	}
}

impl<'a> DfaGenerator<'a> {
	pub fn nfa(&self) -> &'a Nfa {
		self.nfa
	}

	pub fn config(&self) -> &'a CompilerConfig {
		self.config
	}

	pub fn direction(&self) -> Direction {
		self.direction
	}

	pub fn state_count(&self) -> usize {
		self.states.len()
	}

	pub fn transition_count(&self) -> usize {
		self.transitions.len()
	}

	pub fn states(&self) -> &[DfaStateBuilder] {
		&self.states
	}

	pub fn transitions(&self) -> &[DfaTransitionBuilder] {
		&self.transitions
	}

	pub fn state(&self, idx: DfaIdx) -> &DfaStateBuilder {
		&self.states[idx.idx()]
	}

	pub fn transition(&self, idx: DfaTransitionIdx) -> &DfaTransitionBuilder {
		&self.transitions[idx.idx()]
	}

	pub fn entry(&self, kind: EntryKind) -> Option<DfaIdx> {
		self.entries[kind as usize]
	}

	pub fn state_id_for(&self, key: &StateKey) -> Option<DfaIdx> {
		self.state_map.get(&self.normalize(key.clone())).copied()
	}

	pub fn literal_dispatch(&self) -> Option<&LiteralDispatch> {
		self.literal.as_ref()
	}

	/// Widest member list; capture registers need one row per member.
	pub fn max_members(&self) -> usize {
		self.states.iter().map(|state| state.key.set.len()).max().unwrap_or(0)
	}

	/// Diagnostic dump of the builder graph and the NFA it came from.
	pub fn to_json(&self) -> serde_json::Value {
		let nfa_states: Vec<serde_json::Value> = self
			.nfa
			.states()
			.iter()
			.map(|state| {
				serde_json::json!({
					"id": state.idx().idx(),
					"name": state.name(),
					"kind": format!("{:?}", state.kind()),
					"possible_results": state.possible_results(),
				})
			})
			.collect::<Vec<_>>();
		let states: Vec<serde_json::Value> = self
			.states
			.iter()
			.map(|state| {
				let transitions: Vec<serde_json::Value> = state
					.transitions
					.iter()
					.map(|&t| {
						let transition: &DfaTransitionBuilder = &self.transitions[t.idx()];
						serde_json::json!({
							"id": t.idx(),
							"target": transition.target.idx(),
							"ranges": transition
								.ranges
								.iter()
								.map(|r| [r.start(), r.end()])
								.collect::<Vec<_>>(),
							"nfa_transitions": transition
								.set
								.transitions()
								.iter()
								.map(|t| t.idx())
								.collect::<Vec<_>>(),
							"any_remaining": transition.any_remaining,
							"restart": transition.restart,
						})
					})
					.collect::<Vec<_>>();
				serde_json::json!({
					"id": state.idx.idx(),
					"members": state.key.set.iter().map(|member| member.idx()).collect::<Vec<_>>(),
					"backward_prefix": state.key.backward_prefix,
					"final": state.is_final,
					"anchored_final": state.anchored_final,
					"result": state.result,
					"pruned": state.pruned,
					"transitions": transitions,
				})
			})
			.collect::<Vec<_>>();
		serde_json::json!({
			"direction": self.direction,
			"entries": {
				"anchored": self.entry(EntryKind::Anchored).map(|idx| idx.idx()),
				"unanchored": self.entry(EntryKind::Unanchored).map(|idx| idx.idx()),
			},
			"literal": self.literal,
			"states": states,
			"nfa": {
				"states": nfa_states,
				"results": self.nfa.results(),
			},
		})
	}
}

impl DfaIdx {
	pub(crate) fn new(idx: usize) -> Self {
		Self(idx as u32)
	}

	pub fn idx(&self) -> usize {
		self.0 as usize
	}
}

impl DfaTransitionIdx {
	pub(crate) fn new(idx: usize) -> Self {
		Self(idx as u32)
	}

	pub fn idx(&self) -> usize {
		self.0 as usize
	}
}

impl DfaStateBuilder {
	pub fn idx(&self) -> DfaIdx {
		self.idx
	}

	pub fn key(&self) -> &StateKey {
		&self.key
	}

	pub fn is_final(&self) -> bool {
		self.is_final
	}

	pub fn is_anchored_final(&self) -> bool {
		self.anchored_final
	}

	pub fn result(&self) -> Option<u32> {
		self.result
	}

	pub fn transitions(&self) -> &[DfaTransitionIdx] {
		&self.transitions
	}

	pub fn predecessors(&self) -> &[DfaTransitionIdx] {
		&self.predecessors
	}

	pub fn pruned(&self) -> Option<u32> {
		self.pruned
	}
}

impl DfaTransitionBuilder {
	pub fn idx(&self) -> DfaTransitionIdx {
		self.idx
	}

	pub fn source(&self) -> DfaIdx {
		self.source
	}

	pub fn target(&self) -> DfaIdx {
		self.target
	}

	pub fn ranges(&self) -> &[Interval<u32>] {
		&self.ranges
	}

	pub fn set(&self) -> &TransitionSet {
		&self.set
	}

	pub fn is_any_remaining(&self) -> bool {
		self.any_remaining
	}

	pub fn is_restart(&self) -> bool {
		self.restart
	}
}
