use indexmap::IndexSet;

use crate::captures::PartialTransition;
use crate::dfa::DfaGenerator;
use crate::dfa::DfaStateBuilder;
use crate::dfa::DfaTransitionBuilder;
use crate::dfa::DfaTransitionIdx;
use crate::dfa::Direction;
use crate::dfa::EntryKind;
use crate::dfa::LiteralDispatch;
use crate::interval_tree::Interval;
use crate::interval_tree::IntervalTree;
use crate::nfa::Nfa;

/// Finished automaton, ready to be handed to an executor.
///
/// State `0` is always [`StateKind::InitialDispatch`]; builder state `i`
/// becomes state `i + 1`; a literal search state, if any, comes last.
#[derive(Debug, Clone)]
pub struct CompiledAutomaton {
	direction: Direction,
	states: Vec<ExecutableState>,
	capture_transitions: Vec<PartialTransition>,
	/// Register rows, the result row included.
	register_count: usize,
	result_slot: Option<usize>,
	groups: usize,
}

#[derive(Debug, Clone)]
pub struct ExecutableState {
	id: usize,
	kind: StateKind,
	/// Parallel to `matchers`.
	successors: Vec<usize>,
	matchers: Vec<Matcher>,
	/// Range to index into `successors`, for states with many ranges.
	lookup: Option<IntervalTree<u32, usize>>,
	is_final: bool,
	anchored_final: bool,
	result: Option<u32>,
	captures: Option<CaptureInfo>,
}

#[derive(Debug, Clone, Eq, PartialEq)]
pub enum StateKind {
	/// Holds the entry state ids, indexed by [`EntryKind`].
	InitialDispatch {
		entries: [Option<usize>; 2],
	},
	Plain,
	/// Reads the input right to left.
	Backward,
	CaptureTracking,
	/// The outcome is decided; nothing more needs to be read.
	TraceFinder {
		result: u32,
	},
	/// Scans for `literal`. At a hit, `prefix_matcher` must accept the input
	/// before it, and matching continues in `after_literal` past it.
	LiteralSearch {
		literal: Vec<char>,
		after_literal: usize,
		prefix_matcher: Option<usize>,
	},
}

#[derive(Debug, Clone, Eq, PartialEq)]
pub enum Matcher {
	Ranges(Vec<Interval<u32>>),
	/// Anything no earlier matcher of the state accepts; always the last matcher.
	AnyRemaining,
}

/// Indices into [`CompiledAutomaton::capture_transitions`].
#[derive(Debug, Clone, Default, Eq, PartialEq)]
pub struct CaptureInfo {
	/// Parallel to the state's successors.
	pub outgoing: Vec<usize>,
	/// Recipes of the transitions entering the state.
	pub incoming: Vec<usize>,
	/// Applied when the state is entered as an entry state.
	pub initial: Option<usize>,
	/// Moves the preferred match into the result row.
	pub final_transition: Option<usize>,
}

struct TableBuilder<'g, 'a> {
	generator: &'g DfaGenerator<'a>,
	recipes: IndexSet<PartialTransition>,
	/// Per builder transition, built on first use.
	recipe_for: Vec<Option<usize>>,
	result_slot: Option<usize>,
	literal_id: Option<usize>,
}

impl CompiledAutomaton {
	pub fn build(generator: &DfaGenerator) -> Self {
		let result_slot: Option<usize> = generator.tracks_captures().then(|| generator.max_members());
		let literal_id: Option<usize> = generator.literal_dispatch().map(|_| generator.state_count() + 1);
		let mut builder: TableBuilder = TableBuilder {
			generator,
			recipes: IndexSet::new(),
			recipe_for: vec![None; generator.transition_count()],
			result_slot,
			literal_id,
		};

		let mut entries: [Option<usize>; 2] = [None, None];
		for kind in [EntryKind::Anchored, EntryKind::Unanchored] {
			entries[kind as usize] = generator.entry(kind).map(|idx| idx.idx() + 1);
		}
		if literal_id.is_some() {
			entries[EntryKind::Unanchored as usize] = literal_id;
		}

		let mut states: Vec<ExecutableState> = Vec::with_capacity(generator.state_count() + 2);
		states.push(ExecutableState::new(0, StateKind::InitialDispatch { entries }));
		for state in generator.states().iter() {
			states.push(builder.state(state));
		}
		if let (Some(id), Some(dispatch)) = (literal_id, generator.literal_dispatch()) {
			states.push(builder.literal_search(id, dispatch));
		}

		let automaton: Self = Self {
			direction: generator.direction(),
			states,
			capture_transitions: builder.recipes.into_iter().collect::<Vec<_>>(),
			register_count: result_slot.map_or(0, |slot| slot + 1),
			result_slot,
			groups: generator.nfa().groups(),
		};
		debug!(
			"{:?} table: {} states, {} capture transitions, {} register rows",
			automaton.direction,
			automaton.states.len(),
			automaton.capture_transitions.len(),
			automaton.register_count
		);
		automaton
	}

	pub fn direction(&self) -> Direction {
		self.direction
	}

	pub fn states(&self) -> &[ExecutableState] {
		&self.states
	}

	pub fn state(&self, id: usize) -> &ExecutableState {
		&self.states[id]
	}

	pub fn entry(&self, kind: EntryKind) -> Option<usize> {
		let StateKind::InitialDispatch { entries } = &self.states[0].kind else {
			panic!("state 0 is not the initial dispatch");
		};
		entries[kind as usize]
	}

	pub fn capture_transitions(&self) -> &[PartialTransition] {
		&self.capture_transitions
	}

	pub fn register_count(&self) -> usize {
		self.register_count
	}

	pub fn result_slot(&self) -> Option<usize> {
		self.result_slot
	}

	/// Capture groups, the implicit group `0` included.
	pub fn groups(&self) -> usize {
		self.groups
	}
}

impl TableBuilder<'_, '_> {
	fn state(&mut self, state: &DfaStateBuilder) -> ExecutableState {
		let generator: &DfaGenerator = self.generator;
		let id: usize = state.idx().idx() + 1;
		if let Some(result) = state.pruned() {
			let mut decided: ExecutableState = ExecutableState::new(id, StateKind::TraceFinder { result });
			decided.is_final = true;
			decided.result = Some(result);
			return decided;
		}

		let kind: StateKind = if state.key().backward_prefix || (generator.direction() == Direction::Backward) {
			StateKind::Backward
		} else if generator.tracks_captures() {
			StateKind::CaptureTracking
		} else {
			StateKind::Plain
		};
		let mut executable: ExecutableState = ExecutableState::new(id, kind);
		executable.is_final = state.is_final();
		executable.anchored_final = state.is_anchored_final();
		executable.result = state.result();

		let mut order: Vec<DfaTransitionIdx> = state.transitions().to_vec();
		order.sort_by_key(|&t| generator.transition(t).is_any_remaining());
		for &t in order.iter() {
			let transition: &DfaTransitionBuilder = generator.transition(t);
			let successor: usize = match (transition.is_restart(), self.literal_id) {
				(true, Some(literal_id)) => literal_id,
				_ => transition.target().idx() + 1,
			};
			executable.successors.push(successor);
			executable.matchers.push(if transition.is_any_remaining() {
				Matcher::AnyRemaining
			} else {
				Matcher::Ranges(transition.ranges().to_vec())
			});
		}
		executable.lookup = self.lookup(&executable.matchers);

		if executable.kind == StateKind::CaptureTracking {
			executable.captures = Some(self.captures(state, &order));
		}
		executable
	}

	fn lookup(&self, matchers: &[Matcher]) -> Option<IntervalTree<u32, usize>> {
		let mut intervals: Vec<(Interval<u32>, usize)> = Vec::new();
		for (k, matcher) in matchers.iter().enumerate() {
			if let Matcher::Ranges(ranges) = matcher {
				intervals.extend(ranges.iter().map(|&range| (range, k)));
			}
		}
		if intervals.is_empty() || (intervals.len() < self.generator.config().fan_out_threshold) {
			return None;
		}
		Some(IntervalTree::from_disjoint(intervals))
	}

	fn captures(&mut self, state: &DfaStateBuilder, order: &[DfaTransitionIdx]) -> CaptureInfo {
		let generator: &DfaGenerator = self.generator;
		let nfa: &Nfa = generator.nfa();
		let Some(result_slot) = self.result_slot else {
			panic!("capture info requested without a result slot");
		};

		let outgoing: Vec<usize> = order.iter().map(|&t| self.recipe(t)).collect::<Vec<_>>();
		let incoming: Vec<usize> = state.predecessors().iter().map(|&t| self.recipe(t)).collect::<Vec<_>>();
		let is_entry: bool = [EntryKind::Anchored, EntryKind::Unanchored]
			.into_iter()
			.any(|kind| generator.entry(kind) == Some(state.idx()));
		let initial: Option<usize> = is_entry
			.then(|| self.intern(PartialTransition::initial(state.key().set.len(), nfa.boundaries_per_row())));
		let final_transition: Option<usize> = state.final_exit.map(|(row, exit)| {
			self.intern(PartialTransition::to_result(row, nfa.transition(exit).boundaries(), result_slot))
		});
		CaptureInfo {
			outgoing,
			incoming,
			initial,
			final_transition,
		}
	}

	fn recipe(&mut self, t: DfaTransitionIdx) -> usize {
		if let Some(id) = self.recipe_for[t.idx()] {
			return id;
		}
		let generator: &DfaGenerator = self.generator;
		let transition: &DfaTransitionBuilder = generator.transition(t);
		let source: &DfaStateBuilder = generator.state(transition.source());
		let target: &DfaStateBuilder = generator.state(transition.target());
		let recipe: PartialTransition =
			PartialTransition::between(generator.nfa(), &source.key().set, transition.set(), target.key().set.len());
		let id: usize = self.intern(recipe);
		self.recipe_for[t.idx()] = Some(id);
		id
	}

	fn intern(&mut self, recipe: PartialTransition) -> usize {
		let (id, _): (usize, bool) = self.recipes.insert_full(recipe);
		id
	}

	fn literal_search(&self, id: usize, dispatch: &LiteralDispatch) -> ExecutableState {
		ExecutableState::new(
			id,
			StateKind::LiteralSearch {
				literal: dispatch.literal.clone(),
				after_literal: dispatch.after_literal.idx() + 1,
				prefix_matcher: dispatch.prefix_matcher.map(|idx| idx.idx() + 1),
			},
		)
	}
}

impl ExecutableState {
	fn new(id: usize, kind: StateKind) -> Self {
		Self {
			id,
			kind,
			successors: Vec::new(),
			matchers: Vec::new(),
			lookup: None,
			is_final: false,
			anchored_final: false,
			result: None,
			captures: None,
		}
	}

	/// Index of the outgoing transition taken on `ch`, if any.
	pub fn transition_for(&self, ch: u32) -> Option<usize> {
		let found: Option<usize> = match &self.lookup {
			Some(tree) => tree.lookup(ch).copied(),
			None => self.matchers.iter().position(|matcher| match matcher {
				Matcher::Ranges(ranges) => ranges.iter().any(|range| range.contains_point(ch)),
				Matcher::AnyRemaining => false,
			}),
		};
		found.or_else(|| match self.matchers.last() {
			Some(Matcher::AnyRemaining) => Some(self.matchers.len() - 1),
			_ => None,
		})
	}

	pub fn id(&self) -> usize {
		self.id
	}

	pub fn kind(&self) -> &StateKind {
		&self.kind
	}

	pub fn successors(&self) -> &[usize] {
		&self.successors
	}

	pub fn matchers(&self) -> &[Matcher] {
		&self.matchers
	}

	pub fn has_lookup(&self) -> bool {
		self.lookup.is_some()
	}

	pub fn is_final(&self) -> bool {
		self.is_final
	}

	/// Final only at the end of the input.
	pub fn is_anchored_final(&self) -> bool {
		self.anchored_final
	}

	pub fn result(&self) -> Option<u32> {
		self.result
	}

	pub fn captures(&self) -> Option<&CaptureInfo> {
		self.captures.as_ref()
	}
}

#[cfg(test)]
mod test {
	use super::*;
	use crate::config::CompilerConfig;
	use crate::nfa::NfaOptions;
	use crate::regex::Regex;

	fn table(r: &Regex, config: &CompilerConfig, accelerate: bool) -> CompiledAutomaton {
		let nfa: Nfa = Nfa::for_regex(r, NfaOptions::default());
		let mut generator: DfaGenerator = DfaGenerator::new(&nfa, config, Direction::Forward);
		generator.run().unwrap();
		if accelerate {
			assert!(generator.accelerate_inner_literal().unwrap());
		}
		CompiledAutomaton::build(&generator)
	}

	#[test]
	fn literal_search_entry() {
		let r: Regex = Regex::Sequence(vec![
			Regex::repeat(Regex::Literal('a'), 0, 3),
			Regex::literal_str("literal"),
			Regex::class(&[('0', '9')]),
		]);
		let automaton: CompiledAutomaton = table(&r, &CompilerConfig::new(), true);
		assert!(matches!(automaton.state(0).kind(), StateKind::InitialDispatch { .. }));

		let entry: usize = automaton.entry(EntryKind::Unanchored).unwrap();
		assert_eq!(entry, automaton.states().len() - 1);
		let StateKind::LiteralSearch {
			literal,
			after_literal,
			prefix_matcher,
		} = automaton.state(entry).kind()
		else {
			panic!("unexpected entry {:?}", automaton.state(entry));
		};
		assert_eq!(literal.iter().collect::<String>(), "literal");
		let after: &ExecutableState = automaton.state(*after_literal);
		let k: usize = after.transition_for(u32::from('5')).unwrap();
		assert!(automaton.state(after.successors()[k]).is_final());
		assert_eq!(automaton.state(prefix_matcher.unwrap()).kind(), &StateKind::Backward);

		// Every redirected transition leads back to the literal search.
		let restarts: usize = automaton
			.states()
			.iter()
			.flat_map(|state| state.successors().iter())
			.filter(|&&successor| successor == entry)
			.count();
		assert!(restarts > 0);
	}

	#[test]
	fn fan_out_lookup() {
		let r: Regex = Regex::Alternation(
			('a'..='t')
				.map(|ch| Regex::Sequence(vec![Regex::Literal(ch), Regex::Literal('!')]))
				.collect::<Vec<_>>(),
		);
		let automaton: CompiledAutomaton = table(&r, &CompilerConfig::new().with_search(false), false);
		let entry: &ExecutableState = automaton.state(automaton.entry(EntryKind::Anchored).unwrap());
		assert_eq!(entry.successors().len(), 20);
		assert!(entry.has_lookup());
		for ch in 'a'..='t' {
			let k: usize = entry.transition_for(u32::from(ch)).unwrap();
			let Matcher::Ranges(ranges) = &entry.matchers()[k] else {
				panic!("no any-remaining matcher expected");
			};
			assert!(ranges.iter().any(|range| range.contains_point(u32::from(ch))));
		}
		assert!(entry.transition_for(u32::from('z')).is_none());

		let small: CompiledAutomaton = table(&Regex::literal_str("ab"), &CompilerConfig::new().with_search(false), false);
		assert!(small.states().iter().all(|state| !state.has_lookup()));
	}

	#[test]
	fn any_remaining_is_last() {
		let automaton: CompiledAutomaton = table(&Regex::literal_str("ab"), &CompilerConfig::new(), false);
		let entry: &ExecutableState = automaton.state(automaton.entry(EntryKind::Unanchored).unwrap());
		assert_eq!(entry.matchers().len(), 2);
		assert_eq!(entry.matchers().last(), Some(&Matcher::AnyRemaining));
		assert_eq!(entry.transition_for(u32::from('a')), Some(0));
		assert_eq!(entry.transition_for(u32::from('z')), Some(1));
		assert_eq!(entry.transition_for(0), Some(1));
		assert_eq!(entry.successors()[1], entry.id());
	}

	#[test]
	fn capture_tables() {
		// (a)b, anchored
		let r: Regex = Regex::Sequence(vec![Regex::capture(1, Regex::Literal('a')), Regex::Literal('b')]);
		let automaton: CompiledAutomaton =
			table(&r, &CompilerConfig::new().with_search(false).with_captures(true), false);
		assert_eq!(automaton.groups(), 2);
		assert_eq!(automaton.result_slot(), Some(1));
		assert_eq!(automaton.register_count(), 2);

		let entry: &ExecutableState = automaton.state(automaton.entry(EntryKind::Anchored).unwrap());
		assert_eq!(entry.kind(), &StateKind::CaptureTracking);
		let info: &CaptureInfo = entry.captures().unwrap();
		let initial: &PartialTransition = &automaton.capture_transitions()[info.initial.unwrap()];
		assert_eq!(initial.clears.len(), 4);
		assert_eq!(info.outgoing.len(), 1);
		// Entering `a` opens groups 0 and 1.
		let into_a: &PartialTransition = &automaton.capture_transitions()[info.outgoing[0]];
		assert_eq!(into_a.updates, vec![(0, 0), (0, 2)]);

		let last: &ExecutableState = automaton.states().iter().find(|state| state.is_final()).unwrap();
		let info: &CaptureInfo = last.captures().unwrap();
		assert_eq!(info.incoming.len(), 1);
		let to_result: &PartialTransition = &automaton.capture_transitions()[info.final_transition.unwrap()];
		assert_eq!(to_result.copies, vec![(0, 1)]);
		assert_eq!(to_result.updates, vec![(1, 1)]);
	}
}
