use std::borrow::Cow;
use std::collections::BTreeMap;
use std::collections::BTreeSet;

use crate::interval_tree::Interval;
use crate::regex::Regex;
use crate::schema::Schema;

/// Largest input value; the alphabet is `0..=ALPHABET_MAX`.
pub const ALPHABET_MAX: u32 = char::MAX as u32;

pub fn alphabet() -> Interval<u32> {
	Interval::new(0, ALPHABET_MAX)
}

/// Position automaton: every inner state stands for one character position of
/// the pattern, and every edge consumes the character class of its target.
///
/// Edges into final states are exit edges: they consume nothing and carry an
/// empty range list.
#[derive(Debug)]
pub struct Nfa {
	states: Vec<NfaState>,
	transitions: Vec<NfaTransition>,
	/// Boundary registers per row, i.e. `2 * groups`.
	groups: usize,
	results: Vec<String>,
	literal: Option<InnerLiteral>,
}

#[derive(Debug)]
pub struct NfaState {
	idx: NfaIdx,
	kind: NfaStateKind,
	/// Priority order, preferred first.
	successors: Vec<NfaTransitionIdx>,
	predecessors: Vec<NfaTransitionIdx>,
	possible_results: BTreeSet<u32>,
	/// For debugging only.
	name: Cow<'static, str>,
}

#[derive(Debug, Clone, Copy, Eq, Ord, PartialEq, PartialOrd)]
pub enum NfaStateKind {
	AnchoredEntry,
	UnanchoredEntry,
	Position,
	UnanchoredFinal { result: u32 },
	AnchoredFinal { result: u32 },
}

#[derive(Debug, Clone, Copy, Eq, Hash, Ord, PartialEq, PartialOrd)]
pub struct NfaIdx(u32);

#[derive(Debug, Clone, Copy, Eq, Hash, Ord, PartialEq, PartialOrd)]
pub struct NfaTransitionIdx(u32);

#[derive(Debug)]
pub struct NfaTransition {
	idx: NfaTransitionIdx,
	source: NfaIdx,
	target: NfaIdx,
	ranges: Vec<Interval<u32>>,
	boundaries: GroupBoundaries,
}

/// Boundary registers written when an edge is taken.
/// Group `g` owns boundary `2g` (start) and `2g + 1` (end).
#[derive(Debug, Clone, Default, Eq, Hash, Ord, PartialEq, PartialOrd)]
pub struct GroupBoundaries {
	updates: BTreeSet<usize>,
	clears: BTreeSet<usize>,
}

/// A run of literal characters every match must contain, preceded by a
/// (possibly empty) prefix.
#[derive(Debug, Clone)]
pub struct InnerLiteral {
	text: Vec<char>,
	positions: Vec<NfaIdx>,
	prefix_states: BTreeSet<NfaIdx>,
	prefix_min_len: usize,
	prefix_max_len: Option<usize>,
}

#[derive(Debug, Clone, Copy, Default)]
pub struct NfaOptions {
	/// Matches may only end at the end of the input.
	pub end_anchored: bool,
}

struct NfaBuilder<'a> {
	nfa: &'a mut Nfa,
	classes: BTreeMap<NfaIdx, Vec<Interval<u32>>>,
	/// Successors of every position and entry built so far, in priority order.
	follows: BTreeMap<NfaIdx, Vec<Follow>>,
}

/// One slot of a successor list under construction.
#[derive(Debug, Clone)]
enum Follow {
	Edge(NfaIdx, GroupBoundaries),
	/// Leaves the enclosing fragment; replaced by whatever follows it.
	Hole(GroupBoundaries),
	/// Finishes a match in the given final state.
	Exit(NfaIdx, GroupBoundaries),
}

/// `first`: how the fragment is entered, in priority order, with a hole at
/// the slot of its preferred empty path if it is nullable; `last`: positions
/// whose successor list still holds a hole.
#[derive(Debug, Clone)]
struct Fragment {
	first: Vec<Follow>,
	last: Vec<NfaIdx>,
}

impl Nfa {
	pub const ANCHORED_ENTRY: NfaIdx = NfaIdx(0);
	pub const UNANCHORED_ENTRY: NfaIdx = NfaIdx(1);

	fn empty(groups: usize, results: Vec<String>) -> Self {
		let mut nfa: Self = Self {
			states: Vec::new(),
			transitions: Vec::new(),
			groups,
			results,
			literal: None,
		};
		nfa.new_state("anchored entry", NfaStateKind::AnchoredEntry);
		nfa.new_state("unanchored entry", NfaStateKind::UnanchoredEntry);
		nfa
	}

	pub fn for_regex(regex: &Regex, options: NfaOptions) -> Self {
		let mut nfa: Self = Self::empty(regex.group_count(), vec![String::from("match")]);

		let mut items: Vec<&Regex> = Vec::new();
		flatten_sequence(regex, &mut items);
		let maybe_run: Option<(usize, usize)> = literal_run(&items);

		let mut builder: NfaBuilder = NfaBuilder::new(&mut nfa);
		let mut fragment: Fragment = Fragment::empty();
		let mut literal_positions: Vec<NfaIdx> = Vec::new();
		let mut prefix_states: BTreeSet<NfaIdx> = BTreeSet::from([Nfa::ANCHORED_ENTRY, Nfa::UNANCHORED_ENTRY]);
		for (i, item) in items.iter().enumerate() {
			let before: usize = builder.nfa.states.len();
			let next: Fragment = builder.build(item);
			if let Some((start, end)) = maybe_run {
				if i < start {
					prefix_states.extend((before..builder.nfa.states.len()).map(|n| NfaIdx(n as u32)));
				} else if i < end {
					literal_positions.extend(next.first.iter().filter_map(Follow::target));
				}
			}
			fragment = builder.concat(fragment, next);
		}
		let fragment: Fragment = builder.capture(0, fragment);
		builder.finish(vec![fragment], options);

		if let Some((start, end)) = maybe_run {
			let prefix: &[&Regex] = &items[..start];
			nfa.literal = Some(InnerLiteral {
				text: items[start..end]
					.iter()
					.filter_map(|item| match item {
						Regex::Literal(ch) => Some(*ch),
						_ => None,
					})
					.collect::<Vec<_>>(),
				positions: literal_positions,
				prefix_states,
				prefix_min_len: prefix.iter().map(|item| item.min_len()).sum(),
				prefix_max_len: prefix.iter().map(|item| item.max_len()).sum(),
			});
		}

		debug!(
			"built nfa with {} states, {} transitions, literal {:?}",
			nfa.states.len(),
			nfa.transitions.len(),
			nfa.literal.as_ref().map(|literal| literal.text())
		);
		nfa
	}

	/// One result per rule, in rule order; earlier rules win ties.
	pub fn for_schema(schema: &Schema, options: NfaOptions) -> Self {
		let groups: usize = schema
			.rules()
			.iter()
			.map(|rule| rule.regex.group_count())
			.max()
			.unwrap_or(1);
		let names: Vec<String> = schema.rules().iter().map(|rule| rule.name.clone()).collect::<Vec<_>>();
		let mut nfa: Self = Self::empty(groups, names);

		let mut builder: NfaBuilder = NfaBuilder::new(&mut nfa);
		let fragments: Vec<Fragment> = schema
			.rules()
			.iter()
			.map(|rule| {
				let fragment: Fragment = builder.build(&rule.regex);
				builder.capture(0, fragment)
			})
			.collect::<Vec<_>>();
		builder.finish(fragments, options);

		debug!(
			"built schema nfa with {} rules, {} states",
			nfa.results.len(),
			nfa.states.len()
		);
		nfa
	}

	fn new_state<LikeString>(&mut self, name: LikeString, kind: NfaStateKind) -> NfaIdx
	where
		LikeString: Into<Cow<'static, str>>,
	{
		let idx: NfaIdx = NfaIdx(self.states.len() as u32);
		self.states.push(NfaState {
			idx,
			kind,
			successors: Vec::new(),
			predecessors: Vec::new(),
			possible_results: BTreeSet::new(),
			name: name.into(),
		});
		idx
	}

	fn connect(&mut self, source: NfaIdx, target: NfaIdx, ranges: Vec<Interval<u32>>, boundaries: GroupBoundaries) {
		// The first edge between two states has the higher priority; later duplicates are redundant.
		if self[source]
			.successors
			.iter()
			.any(|&t| self.transitions[t.idx()].target == target)
		{
			return;
		}
		let idx: NfaTransitionIdx = NfaTransitionIdx(self.transitions.len() as u32);
		self.transitions.push(NfaTransition {
			idx,
			source,
			target,
			ranges,
			boundaries,
		});
		self[source].successors.push(idx);
		self[target].predecessors.push(idx);
	}

	fn compute_possible_results(&mut self) {
		let finals: Vec<(NfaIdx, u32)> = self
			.states
			.iter()
			.filter_map(|state| state.kind.result().map(|result| (state.idx, result)))
			.collect::<Vec<_>>();
		for (final_state, result) in finals {
			let mut stack: Vec<NfaIdx> = vec![final_state];
			while let Some(idx) = stack.pop() {
				if !self[idx].possible_results.insert(result) {
					continue;
				}
				for &t in self[idx].predecessors.iter() {
					stack.push(self.transitions[t.idx()].source);
				}
			}
		}
	}
}

impl Nfa {
	pub fn states(&self) -> &[NfaState] {
		&self.states
	}

	pub fn transitions(&self) -> &[NfaTransition] {
		&self.transitions
	}

	pub fn transition(&self, idx: NfaTransitionIdx) -> &NfaTransition {
		&self.transitions[idx.idx()]
	}

	pub fn groups(&self) -> usize {
		self.groups
	}

	/// Boundary registers per register row.
	pub fn boundaries_per_row(&self) -> usize {
		2 * self.groups
	}

	pub fn results(&self) -> &[String] {
		&self.results
	}

	pub fn literal(&self) -> Option<&InnerLiteral> {
		self.literal.as_ref()
	}

	/// Seeds of the backward automaton: states with an exit edge, in state order.
	pub fn reverse_entry(&self) -> Vec<NfaIdx> {
		let mut entry: BTreeSet<NfaIdx> = BTreeSet::new();
		for transition in self.transitions.iter() {
			if self[transition.target].kind.is_final() && (transition.source != Nfa::UNANCHORED_ENTRY) {
				entry.insert(transition.source);
			}
		}
		entry.into_iter().collect::<Vec<_>>()
	}
}

impl std::ops::Index<NfaIdx> for Nfa {
	type Output = NfaState;

	fn index(&self, i: NfaIdx) -> &Self::Output {
		&self.states[i.idx()]
	}
}

impl std::ops::IndexMut<NfaIdx> for Nfa {
	fn index_mut(&mut self, i: NfaIdx) -> &mut Self::Output {
		&mut self.states[i.idx()]
	}
}

impl NfaIdx {
	pub fn new(idx: usize) -> Self {
		Self(idx as u32)
	}

	pub fn idx(&self) -> usize {
		self.0 as usize
	}
}

impl NfaTransitionIdx {
	pub fn new(idx: usize) -> Self {
		Self(idx as u32)
	}

	pub fn idx(&self) -> usize {
		self.0 as usize
	}
}

impl NfaState {
	pub fn idx(&self) -> NfaIdx {
		self.idx
	}

	pub fn kind(&self) -> NfaStateKind {
		self.kind
	}

	pub fn successors(&self) -> &[NfaTransitionIdx] {
		&self.successors
	}

	pub fn predecessors(&self) -> &[NfaTransitionIdx] {
		&self.predecessors
	}

	pub fn possible_results(&self) -> &BTreeSet<u32> {
		&self.possible_results
	}

	pub fn name(&self) -> &str {
		&self.name
	}
}

impl NfaStateKind {
	pub fn is_final(&self) -> bool {
		matches!(self, Self::UnanchoredFinal { .. } | Self::AnchoredFinal { .. })
	}

	pub fn result(&self) -> Option<u32> {
		match self {
			Self::UnanchoredFinal { result } | Self::AnchoredFinal { result } => Some(*result),
			_ => None,
		}
	}
}

impl NfaTransition {
	pub fn idx(&self) -> NfaTransitionIdx {
		self.idx
	}

	pub fn source(&self) -> NfaIdx {
		self.source
	}

	pub fn target(&self) -> NfaIdx {
		self.target
	}

	/// Empty for exit edges.
	pub fn ranges(&self) -> &[Interval<u32>] {
		&self.ranges
	}

	pub fn boundaries(&self) -> &GroupBoundaries {
		&self.boundaries
	}

	pub fn is_exit(&self) -> bool {
		self.ranges.is_empty()
	}
}

impl GroupBoundaries {
	pub fn update(boundary: usize) -> Self {
		Self {
			updates: BTreeSet::from([boundary]),
			clears: BTreeSet::new(),
		}
	}

	pub fn clear<I>(boundaries: I) -> Self
	where
		I: IntoIterator<Item = usize>,
	{
		Self {
			updates: BTreeSet::new(),
			clears: boundaries.into_iter().collect::<BTreeSet<_>>(),
		}
	}

	/// `self` followed by `later`; later writes win.
	pub fn then(&self, later: &GroupBoundaries) -> Self {
		Self {
			updates: &(&self.updates - &later.clears) | &later.updates,
			clears: &(&self.clears - &later.updates) | &later.clears,
		}
	}

	pub fn updates(&self) -> &BTreeSet<usize> {
		&self.updates
	}

	pub fn clears(&self) -> &BTreeSet<usize> {
		&self.clears
	}

	pub fn is_empty(&self) -> bool {
		self.updates.is_empty() && self.clears.is_empty()
	}
}

impl InnerLiteral {
	pub fn text(&self) -> &[char] {
		&self.text
	}

	/// Position of the first literal character.
	pub fn first(&self) -> NfaIdx {
		self.positions[0]
	}

	/// Position of the last literal character.
	pub fn last(&self) -> NfaIdx {
		self.positions[self.positions.len() - 1]
	}

	pub fn positions(&self) -> &[NfaIdx] {
		&self.positions
	}

	/// Entry states and every position before the literal.
	pub fn prefix_states(&self) -> &BTreeSet<NfaIdx> {
		&self.prefix_states
	}

	pub fn is_prefix_state(&self, idx: NfaIdx) -> bool {
		self.prefix_states.contains(&idx)
	}

	pub fn prefix_min_len(&self) -> usize {
		self.prefix_min_len
	}

	/// `None` if unbounded.
	pub fn prefix_max_len(&self) -> Option<usize> {
		self.prefix_max_len
	}

	pub fn has_prefix(&self) -> bool {
		self.prefix_max_len != Some(0)
	}
}

impl Follow {
	fn target(&self) -> Option<NfaIdx> {
		match self {
			Self::Edge(target, _) | Self::Exit(target, _) => Some(*target),
			Self::Hole(_) => None,
		}
	}

	fn is_hole(&self) -> bool {
		matches!(self, Self::Hole(_))
	}

	/// The same slot, taken after `out` has been written.
	fn after(&self, out: &GroupBoundaries) -> Self {
		match self {
			Self::Edge(target, boundaries) => Self::Edge(*target, out.then(boundaries)),
			Self::Hole(boundaries) => Self::Hole(out.then(boundaries)),
			Self::Exit(target, boundaries) => Self::Exit(*target, out.then(boundaries)),
		}
	}
}

/// Appends `follow` unless an earlier slot already leads to the same place.
fn push_follow(list: &mut Vec<Follow>, follow: Follow) {
	let taken: bool = match follow.target() {
		Some(target) => list.iter().any(|other| other.target() == Some(target)),
		None => list.iter().any(Follow::is_hole),
	};
	if !taken {
		list.push(follow);
	}
}

/// Replaces the hole of `list` with the slots of `next`, each taken after the
/// hole's boundaries.
fn splice(list: Vec<Follow>, next: &[Follow]) -> Vec<Follow> {
	let mut spliced: Vec<Follow> = Vec::with_capacity(list.len() + next.len());
	for follow in list.into_iter() {
		match follow {
			Follow::Hole(out) => {
				for slot in next.iter() {
					push_follow(&mut spliced, slot.after(&out));
				}
			},
			follow => push_follow(&mut spliced, follow),
		}
	}
	spliced
}

impl Fragment {
	fn empty() -> Self {
		Self {
			first: vec![Follow::Hole(GroupBoundaries::default())],
			last: Vec::new(),
		}
	}

	fn is_nullable(&self) -> bool {
		self.first.iter().any(Follow::is_hole)
	}

	/// Greedy: the empty path goes last unless the fragment already has one.
	fn optional(mut self) -> Self {
		push_follow(&mut self.first, Follow::Hole(GroupBoundaries::default()));
		self
	}
}

impl<'a> NfaBuilder<'a> {
	fn new(nfa: &'a mut Nfa) -> Self {
		Self {
			nfa,
			classes: BTreeMap::new(),
			follows: BTreeMap::new(),
		}
	}

	fn build(&mut self, regex: &Regex) -> Fragment {
		match regex {
			Regex::AnyChar => self.position("any", vec![alphabet()]),
			&Regex::Literal(ch) => self.position("literal", vec![Interval::point(u32::from(ch))]),
			Regex::Group { negated, items } => {
				let mut intervals: Vec<Interval<u32>> = items
					.iter()
					.map(|&(start, end)| {
						assert!(start <= end, "invalid range {start:?}-{end:?}");
						Interval::new(u32::from(start), u32::from(end))
					})
					.collect::<Vec<_>>();
				if *negated {
					intervals = Interval::complement(&mut intervals, alphabet());
				}
				Interval::normalize(&mut intervals);
				self.position("group", intervals)
			},
			Regex::Capture { group, item } => {
				let fragment: Fragment = self.build(item);
				self.capture(*group as usize, fragment)
			},
			Regex::KleeneClosure(item) => {
				let fragment: Fragment = self.build(item);
				let mut groups: Vec<u32> = Vec::new();
				item.groups(&mut groups);
				// Every iteration starts with the inner groups reset.
				let reset: GroupBoundaries =
					GroupBoundaries::clear(groups.iter().flat_map(|&g| [2 * g as usize, 2 * g as usize + 1]));
				// An iteration has to consume input, so the body's empty path is dropped.
				let body: Vec<Follow> = fragment
					.first
					.into_iter()
					.filter(|follow| !follow.is_hole())
					.collect::<Vec<_>>();
				let mut again: Vec<Follow> = body.iter().map(|follow| follow.after(&reset)).collect::<Vec<_>>();
				again.push(Follow::Hole(GroupBoundaries::default()));
				for &source in fragment.last.iter() {
					self.splice_into(source, &again);
				}
				let mut first: Vec<Follow> = body;
				first.push(Follow::Hole(GroupBoundaries::default()));
				Fragment {
					first,
					last: fragment.last,
				}
			},
			Regex::BoundedRepetition { start, end, item } => {
				assert!(start <= end, "invalid repetition {{{start},{end}}}");
				let mut fragment: Fragment = Fragment::empty();
				for _ in 0..*start {
					let next: Fragment = self.build(item);
					fragment = self.concat(fragment, next);
				}
				// x{0,3} is (x(x(x)?)?)?, greedy at every level.
				let mut optional: Option<Fragment> = None;
				for _ in *start..*end {
					let next: Fragment = self.build(item);
					let inner: Fragment = match optional.take() {
						Some(tail) => self.concat(next, tail),
						None => next,
					};
					optional = Some(inner.optional());
				}
				match optional {
					Some(tail) => self.concat(fragment, tail),
					None => fragment,
				}
			},
			Regex::Sequence(items) => {
				let mut fragment: Fragment = Fragment::empty();
				for item in items.iter() {
					let next: Fragment = self.build(item);
					fragment = self.concat(fragment, next);
				}
				fragment
			},
			Regex::Alternation(items) => {
				let mut alternation: Fragment = Fragment {
					first: Vec::new(),
					last: Vec::new(),
				};
				for item in items.iter() {
					let fragment: Fragment = self.build(item);
					for follow in fragment.first.into_iter() {
						push_follow(&mut alternation.first, follow);
					}
					alternation.last.extend(fragment.last);
				}
				alternation
			},
		}
	}

	fn position(&mut self, name: &'static str, class: Vec<Interval<u32>>) -> Fragment {
		let idx: NfaIdx = self.nfa.new_state(name, NfaStateKind::Position);
		self.classes.insert(idx, class);
		self.follows.insert(idx, vec![Follow::Hole(GroupBoundaries::default())]);
		Fragment {
			first: vec![Follow::Edge(idx, GroupBoundaries::default())],
			last: vec![idx],
		}
	}

	fn capture(&mut self, group: usize, fragment: Fragment) -> Fragment {
		let start: GroupBoundaries = GroupBoundaries::update(2 * group);
		let end: GroupBoundaries = GroupBoundaries::update(2 * group + 1);
		let first: Vec<Follow> = fragment
			.first
			.iter()
			.map(|follow| match follow {
				Follow::Hole(boundaries) => Follow::Hole(start.then(boundaries).then(&end)),
				follow => follow.after(&start),
			})
			.collect::<Vec<_>>();
		for &source in fragment.last.iter() {
			self.splice_into(source, &[Follow::Hole(end.clone())]);
		}
		Fragment {
			first,
			last: fragment.last,
		}
	}

	fn concat(&mut self, lhs: Fragment, rhs: Fragment) -> Fragment {
		for &source in lhs.last.iter() {
			self.splice_into(source, &rhs.first);
		}
		let mut last: Vec<NfaIdx> = if rhs.is_nullable() { lhs.last } else { Vec::new() };
		last.extend(rhs.last.iter().copied());
		Fragment {
			first: splice(lhs.first, &rhs.first),
			last,
		}
	}

	fn splice_into(&mut self, source: NfaIdx, next: &[Follow]) {
		if let Some(list) = self.follows.get_mut(&source) {
			*list = splice(std::mem::take(list), next);
		}
	}

	/// Closes every fragment with the exit of its result, wires the entries
	/// and turns the successor lists into transitions.
	fn finish(&mut self, fragments: Vec<Fragment>, options: NfaOptions) {
		let mut entry: Vec<Follow> = Vec::new();
		for (result, fragment) in fragments.into_iter().enumerate() {
			let result: u32 = result as u32;
			let exit: NfaIdx = if options.end_anchored {
				self.nfa.new_state("anchored final", NfaStateKind::AnchoredFinal { result })
			} else {
				self.nfa.new_state("final", NfaStateKind::UnanchoredFinal { result })
			};
			let closing: [Follow; 1] = [Follow::Exit(exit, GroupBoundaries::default())];
			for &source in fragment.last.iter() {
				self.splice_into(source, &closing);
			}
			for follow in splice(fragment.first, &closing).into_iter() {
				push_follow(&mut entry, follow);
			}
		}
		self.follows.insert(Nfa::ANCHORED_ENTRY, entry.clone());
		// Starting a later match is the least preferred way on.
		entry.push(Follow::Edge(Nfa::UNANCHORED_ENTRY, GroupBoundaries::default()));
		self.follows.insert(Nfa::UNANCHORED_ENTRY, entry);
		self.classes.insert(Nfa::UNANCHORED_ENTRY, vec![alphabet()]);

		for (source, follows) in std::mem::take(&mut self.follows).into_iter() {
			for follow in follows.into_iter() {
				match follow {
					Follow::Edge(target, boundaries) => {
						let class: Vec<Interval<u32>> = self.classes[&target].clone();
						self.nfa.connect(source, target, class, boundaries);
					},
					Follow::Exit(target, boundaries) => self.nfa.connect(source, target, Vec::new(), boundaries),
					Follow::Hole(_) => panic!("unresolved successor of {source:?}"),
				}
			}
		}

		self.nfa.compute_possible_results();
	}
}

fn flatten_sequence<'a>(regex: &'a Regex, into: &mut Vec<&'a Regex>) {
	match regex {
		Regex::Sequence(items) => {
			for item in items.iter() {
				flatten_sequence(item, into);
			}
		},
		_ => into.push(regex),
	}
}

/// First run of at least two consecutive literal characters.
fn literal_run(items: &[&Regex]) -> Option<(usize, usize)> {
	let mut i: usize = 0;
	while i < items.len() {
		if !matches!(items[i], Regex::Literal(_)) {
			i += 1;
			continue;
		}
		let start: usize = i;
		while (i < items.len()) && matches!(items[i], Regex::Literal(_)) {
			i += 1;
		}
		if i - start >= 2 {
			return Some((start, i));
		}
	}
	None
}
