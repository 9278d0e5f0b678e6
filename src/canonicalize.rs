//! Splits overlapping NFA ranges into disjoint maximal ranges and merges
//! the ranges that lead to the same place.

use indexmap::IndexMap;

use crate::interval_tree::Interval;
use crate::nfa::NfaIdx;
use crate::nfa::NfaTransitionIdx;
use crate::state_set::TransitionSet;

/// One `(range, NFA transition)` pair reachable from the DFA state being expanded.
/// `target` is the NFA state the transition reaches in the direction being built.
#[derive(Debug, Clone, Copy)]
pub struct Contribution {
	pub range: Interval<u32>,
	pub transition: NfaTransitionIdx,
	pub target: NfaIdx,
}

#[derive(Debug, Clone)]
pub struct CanonicalTransition {
	/// Sorted and disjoint.
	pub ranges: Vec<Interval<u32>>,
	pub set: TransitionSet,
}

#[derive(Debug, Clone, Copy, Eq, PartialEq)]
pub enum GroupBy {
	/// Ranges leading to the same ordered target set share a transition.
	Targets,
	/// Ranges must also agree on the contributing NFA transitions, since capture
	/// recipes are derived from them.
	Transitions,
}

#[derive(Debug, Clone, Eq, Hash, PartialEq)]
enum GroupKey {
	Targets(Vec<NfaIdx>),
	Transitions(Vec<NfaTransitionIdx>),
}

/// Contributions must be in priority order; the output is sorted by lowest range.
pub fn canonicalize(contributions: &[Contribution], group_by: GroupBy) -> Vec<CanonicalTransition> {
	let mut points: Vec<u32> = Vec::with_capacity(2 * contributions.len());
	for c in contributions.iter() {
		points.push(c.range.start());
		if c.range.end() < u32::MAX {
			points.push(c.range.end() + 1);
		}
	}
	points.sort_unstable();
	points.dedup();

	let mut groups: IndexMap<GroupKey, CanonicalTransition> = IndexMap::new();
	let mut active: Vec<usize> = Vec::new();
	for (k, &start) in points.iter().enumerate() {
		active.clear();
		active.extend((0..contributions.len()).filter(|&i| contributions[i].range.contains_point(start)));
		if active.is_empty() {
			continue;
		}
		// Past the last point, every active range ends at the same place.
		let end: u32 = match points.get(k + 1) {
			Some(&next) => next - 1,
			None => contributions[active[0]].range.end(),
		};

		let key: GroupKey = match group_by {
			GroupBy::Targets => {
				let mut targets: Vec<NfaIdx> = Vec::with_capacity(active.len());
				for &i in active.iter() {
					if !targets.contains(&contributions[i].target) {
						targets.push(contributions[i].target);
					}
				}
				GroupKey::Targets(targets)
			},
			GroupBy::Transitions => {
				GroupKey::Transitions(active.iter().map(|&i| contributions[i].transition).collect::<Vec<_>>())
			},
		};

		let group: &mut CanonicalTransition = groups.entry(key).or_insert_with(|| CanonicalTransition {
			ranges: Vec::new(),
			set: TransitionSet::new(),
		});
		for &i in active.iter() {
			let c: &Contribution = &contributions[i];
			if !group.set.transitions().contains(&c.transition) {
				group.set.add(c.transition, c.target);
			}
		}
		match group.ranges.last_mut() {
			Some(last) if last.end() + 1 == start => *last = Interval::new(last.start(), end),
			_ => group.ranges.push(Interval::new(start, end)),
		}
	}

	trace!("canonicalized {} contributions into {} transitions", contributions.len(), groups.len());
	groups.into_values().collect::<Vec<_>>()
}

/// If the transitions cover `universe`, the index of the one holding the highest
/// range; an executor may test it last as "anything else".
pub fn covering_transition(transitions: &[CanonicalTransition], universe: Interval<u32>) -> Option<usize> {
	let mut ranges: Vec<(Interval<u32>, usize)> = transitions
		.iter()
		.enumerate()
		.flat_map(|(i, t)| t.ranges.iter().map(move |&r| (r, i)))
		.collect::<Vec<_>>();
	ranges.sort_unstable();
	let sorted: Vec<Interval<u32>> = ranges.iter().map(|&(r, _)| r).collect::<Vec<_>>();
	if !Interval::covers(&sorted, universe) {
		return None;
	}
	ranges.last().map(|&(_, i)| i)
}
