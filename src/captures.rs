use serde::Serialize;

use crate::nfa::GroupBoundaries;
use crate::nfa::Nfa;
use crate::nfa::NfaIdx;
use crate::nfa::NfaTransitionIdx;
use crate::state_set::StateSet;
use crate::state_set::TransitionSet;

/// Register recipe for one capture-tracking DFA transition.
///
/// Registers are organized in rows: row `i` belongs to the `i`-th member NFA
/// state of a DFA state and holds `2 * groups` boundaries. An executor applies
/// the recipe in field order: swaps, copies, clears, updates. Updates store
/// the index at which the transition is taken.
#[derive(Debug, Clone, Default, Eq, Hash, PartialEq, Serialize)]
pub struct PartialTransition {
	/// Row swaps; strictly fewer than the rows involved.
	pub swaps: Vec<(usize, usize)>,
	/// `(from, to)` row copies, for target rows sharing a source row.
	pub copies: Vec<(usize, usize)>,
	/// `(row, boundary)` pairs reset to "unset".
	pub clears: Vec<(usize, usize)>,
	/// `(row, boundary)` pairs set to the current index.
	pub updates: Vec<(usize, usize)>,
	/// Set if this recipe fills the reserved result row.
	pub result_slot: Option<usize>,
}

const UNASSIGNED: usize = usize::MAX;

impl PartialTransition {
	/// Entering an entry state: no register state exists yet, so nothing is
	/// reordered and every boundary starts unset.
	pub fn initial(rows: usize, boundaries_per_row: usize) -> Self {
		let mut recipe: Self = Self::default();
		for row in 0..rows {
			recipe.clears.extend((0..boundaries_per_row).map(|boundary| (row, boundary)));
		}
		recipe
	}

	/// Transition from a state with members `source` over `set`, into a state
	/// holding the first `target_len` targets of `set`.
	pub fn between(nfa: &Nfa, source: &StateSet, set: &TransitionSet, target_len: usize) -> Self {
		let per_target: Vec<NfaTransitionIdx> = set.per_target();
		assert!(target_len <= per_target.len());

		let mut sources: Vec<usize> = Vec::with_capacity(target_len);
		for &t in per_target[..target_len].iter() {
			let origin: NfaIdx = nfa.transition(t).source();
			let Some(row) = source.position(origin) else {
				panic!("transition {t:?} leaves {origin:?}, which is not a member of the source state");
			};
			sources.push(row);
		}

		let rows: usize = source.len().max(target_len);
		let (swaps, copies): (Vec<(usize, usize)>, Vec<(usize, usize)>) = reorder(&sources, rows);
		let mut recipe: Self = Self {
			swaps,
			copies,
			..Self::default()
		};
		for (row, &t) in per_target[..target_len].iter().enumerate() {
			recipe.add_boundaries(row, nfa.transition(t).boundaries());
		}
		recipe
	}

	/// Taking the exit edge of the member in `row`: its registers, finished by
	/// the exit's boundaries, land in the reserved `result_slot` row.
	pub fn to_result(row: usize, exit: &GroupBoundaries, result_slot: usize) -> Self {
		let mut recipe: Self = Self {
			copies: vec![(row, result_slot)],
			result_slot: Some(result_slot),
			..Self::default()
		};
		recipe.add_boundaries(result_slot, exit);
		recipe
	}

	fn add_boundaries(&mut self, row: usize, boundaries: &GroupBoundaries) {
		self.clears.extend(boundaries.clears().iter().map(|&boundary| (row, boundary)));
		self.updates.extend(boundaries.updates().iter().map(|&boundary| (row, boundary)));
	}

	pub fn is_empty(&self) -> bool {
		self.swaps.is_empty() && self.copies.is_empty() && self.clears.is_empty() && self.updates.is_empty()
	}
}

/// Swaps and copies that leave source row `sources[j]` in target row `j`.
///
/// The first target row taking a given source row gets it moved there; later
/// ones copy it from that first row. Target rows without a source, and rows
/// past `sources.len()`, absorb the unused source rows in increasing order so
/// the moves form a permutation of `0..rows`, which is then split into cycles.
pub fn reorder(sources: &[usize], rows: usize) -> (Vec<(usize, usize)>, Vec<(usize, usize)>) {
	assert!(sources.len() <= rows);

	let mut from: Vec<usize> = vec![UNASSIGNED; rows];
	let mut taken_by: Vec<usize> = vec![UNASSIGNED; rows];
	let mut copies: Vec<(usize, usize)> = Vec::new();
	for (j, &i) in sources.iter().enumerate() {
		assert!(i < rows, "source row {i} out of range");
		if taken_by[i] == UNASSIGNED {
			taken_by[i] = j;
			from[j] = i;
		} else {
			copies.push((taken_by[i], j));
		}
	}

	let mut unused = (0..rows).filter(|&i| taken_by[i] == UNASSIGNED);
	for slot in from.iter_mut().filter(|slot| **slot == UNASSIGNED) {
		*slot = unused.next().unwrap_or(UNASSIGNED);
	}
	assert!(from.iter().all(|&i| i != UNASSIGNED));

	// A cycle j0 <- j1 <- ... <- jk-1 <- j0 takes the swaps (j0, j1), (j1, j2), ...
	let mut swaps: Vec<(usize, usize)> = Vec::new();
	let mut visited: Vec<bool> = vec![false; rows];
	for start in 0..rows {
		let mut j: usize = start;
		while !visited[j] {
			visited[j] = true;
			let next: usize = from[j];
			if next == start {
				break;
			}
			swaps.push((j, next));
			j = next;
		}
	}

	(swaps, copies)
}
