//! Control-flow reduction: collapses the state graph with the T1/T2
//! transformations, splitting nodes of irreducible regions until a single
//! interval remains.

use std::collections::BTreeSet;
use std::collections::VecDeque;

use crate::dfa::DfaGenerator;
use crate::dfa::DfaIdx;
use crate::dfa::DfaStateBuilder;
use crate::dfa::DfaTransitionBuilder;
use crate::dfa::DfaTransitionIdx;
use crate::dfa::EntryKind;

/// A reducible version of a graph.
#[derive(Debug, Clone, Eq, PartialEq)]
pub struct Reduction {
	/// `successors[n][k]` is the target of edge `k` of node `n`; split copies
	/// are appended after the original nodes and keep their origin's edge order.
	pub successors: Vec<Vec<usize>>,
	/// Original node each node stands for.
	pub origin: Vec<usize>,
}

/// Working graph with a virtual root at index 0 and node `n` at `n + 1`.
#[derive(Debug)]
struct Graph {
	successors: Vec<Vec<usize>>,
	origin: Vec<usize>,
}

const UNREACHABLE: usize = usize::MAX;

/// Returns `None` once more than `max_splits` nodes would have to be copied.
/// Edges leaving the root's interval keep their targets, so entries stay valid.
pub fn reduce(successors: &[Vec<usize>], entries: &[usize], max_splits: usize) -> Option<Reduction> {
	let mut graph: Graph = Graph::new(successors, entries);
	let mut splits: usize = 0;
	loop {
		let owner: Vec<usize> = graph.collapse();
		let Some(node) = graph.split_candidate(&owner) else {
			break;
		};
		splits += graph.split(&owner, node);
		if splits > max_splits {
			debug!("control-flow reduction gave up after {splits} splits");
			return None;
		}
	}
	trace!("control-flow reduction needed {splits} splits");
	Some(graph.into_reduction())
}

pub fn is_reducible(successors: &[Vec<usize>], entries: &[usize]) -> bool {
	let graph: Graph = Graph::new(successors, entries);
	let owner: Vec<usize> = graph.collapse();
	graph.split_candidate(&owner).is_none()
}

impl Graph {
	fn new(successors: &[Vec<usize>], entries: &[usize]) -> Self {
		let mut shifted: Vec<Vec<usize>> = Vec::with_capacity(successors.len() + 1);
		shifted.push(entries.iter().map(|&entry| entry + 1).collect::<Vec<_>>());
		for targets in successors.iter() {
			shifted.push(targets.iter().map(|&target| target + 1).collect::<Vec<_>>());
		}
		Self {
			successors: shifted,
			origin: (0..=successors.len()).collect::<Vec<_>>(),
		}
	}

	/// Applies T1 (drop self loops) and T2 (merge a node into its only
	/// predecessor) until neither applies. Returns the interval head owning each
	/// node; the root's interval has head 0.
	fn collapse(&self) -> Vec<usize> {
		let n: usize = self.successors.len();
		let mut owner: Vec<usize> = vec![UNREACHABLE; n];
		let mut queue: VecDeque<usize> = VecDeque::from([0]);
		owner[0] = 0;
		while let Some(node) = queue.pop_front() {
			for &target in self.successors[node].iter() {
				if owner[target] == UNREACHABLE {
					owner[target] = target;
					queue.push_back(target);
				}
			}
		}

		let mut predecessors: Vec<Vec<usize>> = vec![Vec::new(); n];
		for node in (0..n).filter(|&node| owner[node] != UNREACHABLE) {
			for &target in self.successors[node].iter() {
				predecessors[target].push(node);
			}
		}
		let mut members: Vec<Vec<usize>> = (0..n).map(|node| vec![node]).collect::<Vec<_>>();

		let mut changed: bool = true;
		while changed {
			changed = false;
			for head in 1..n {
				if owner[head] != head {
					continue;
				}
				let heads: BTreeSet<usize> = members[head]
					.iter()
					.flat_map(|&member| predecessors[member].iter().map(|&p| owner[p]))
					.filter(|&p| p != head)
					.collect::<BTreeSet<_>>();
				if heads.len() != 1 {
					continue;
				}
				let Some(&into) = heads.first() else {
					continue;
				};
				let moved: Vec<usize> = std::mem::take(&mut members[head]);
				for &member in moved.iter() {
					owner[member] = into;
				}
				members[into].extend(moved);
				changed = true;
			}
		}
		owner
	}

	/// The smallest remaining non-root interval, or `None` if only the root's is left.
	fn split_candidate(&self, owner: &[usize]) -> Option<usize> {
		let mut sizes: Vec<usize> = vec![0; owner.len()];
		for &head in owner.iter().filter(|&&head| head != UNREACHABLE) {
			sizes[head] += 1;
		}
		(1..owner.len())
			.filter(|&head| owner[head] == head)
			.min_by_key(|&head| (sizes[head], head))
	}

	/// Gives every predecessor interval but the first its own copy of the
	/// interval headed by `head`. Returns the number of nodes copied.
	fn split(&mut self, owner: &[usize], head: usize) -> usize {
		let members: Vec<usize> = (0..owner.len()).filter(|&node| owner[node] == head).collect::<Vec<_>>();
		let mut predecessors: BTreeSet<usize> = BTreeSet::new();
		for node in (0..owner.len()).filter(|&node| (owner[node] != UNREACHABLE) && (owner[node] != head)) {
			if self.successors[node].iter().any(|&target| owner[target] == head) {
				predecessors.insert(owner[node]);
			}
		}
		assert!(predecessors.len() >= 2, "interval {head} has a single predecessor");

		let mut copied: usize = 0;
		for &predecessor in predecessors.iter().skip(1) {
			let base: usize = self.successors.len();
			let copy_of = |node: usize| -> Option<usize> { members.iter().position(|&m| m == node).map(|i| base + i) };
			for &member in members.iter() {
				let targets: Vec<usize> = self.successors[member]
					.iter()
					.map(|&target| copy_of(target).unwrap_or(target))
					.collect::<Vec<_>>();
				self.successors.push(targets);
				self.origin.push(self.origin[member]);
			}
			for node in (0..owner.len()).filter(|&node| owner[node] == predecessor) {
				for target in self.successors[node].iter_mut() {
					if let Some(copy) = copy_of(*target) {
						*target = copy;
					}
				}
			}
			copied += members.len();
		}
		copied
	}

	fn into_reduction(self) -> Reduction {
		Reduction {
			successors: self.successors[1..]
				.iter()
				.map(|targets| targets.iter().map(|&target| target - 1).collect::<Vec<_>>())
				.collect::<Vec<_>>(),
			origin: self.origin[1..].iter().map(|&node| node - 1).collect::<Vec<_>>(),
		}
	}
}

impl DfaGenerator<'_> {
	/// Makes the state graph reducible by splitting states. Returns `false`,
	/// leaving the graph untouched, if that takes more than `max_splits` copies.
	pub fn reduce_control_flow(&mut self, max_splits: usize) -> bool {
		let graph: Vec<Vec<usize>> = self
			.states
			.iter()
			.map(|state| {
				state
					.transitions
					.iter()
					.map(|&t| self.transitions[t.idx()].target.idx())
					.collect::<Vec<_>>()
			})
			.collect::<Vec<_>>();
		let mut entries: Vec<usize> = [EntryKind::Anchored, EntryKind::Unanchored]
			.into_iter()
			.filter_map(|kind| self.entry(kind))
			.map(|idx| idx.idx())
			.collect::<Vec<_>>();
		if let Some(dispatch) = &self.literal {
			entries.push(dispatch.after_literal.idx());
			entries.extend(dispatch.prefix_matcher.map(|idx| idx.idx()));
		}

		let Some(reduction) = reduce(&graph, &entries, max_splits) else {
			return false;
		};

		let originals: usize = self.states.len();
		for node in originals..reduction.origin.len() {
			let origin: usize = reduction.origin[node];
			let mut copy: DfaStateBuilder = self.states[origin].clone();
			copy.idx = DfaIdx::new(node);
			copy.transitions = Vec::new();
			copy.predecessors = Vec::new();
			for k in 0..self.states[origin].transitions.len() {
				let t: DfaTransitionIdx = self.states[origin].transitions[k];
				let mut edge: DfaTransitionBuilder = self.transitions[t.idx()].clone();
				edge.idx = DfaTransitionIdx::new(self.transitions.len());
				edge.source = copy.idx;
				copy.transitions.push(edge.idx);
				self.transitions.push(edge);
			}
			self.states.push(copy);
		}
		for (node, targets) in reduction.successors.iter().enumerate() {
			for (k, &target) in targets.iter().enumerate() {
				let t: DfaTransitionIdx = self.states[node].transitions[k];
				self.transitions[t.idx()].target = DfaIdx::new(target);
			}
		}
		if self.tracks_captures() {
			for state in self.states.iter_mut() {
				state.predecessors.clear();
			}
			for transition in self.transitions.iter() {
				self.states[transition.target.idx()].predecessors.push(transition.idx);
			}
		}

		debug!(
			"control-flow reduction: {} states after splitting {}",
			self.states.len(),
			self.states.len() - originals
		);
		true
	}
}

#[cfg(test)]
mod test {
	use super::*;
	use crate::config::CompilerConfig;
	use crate::dfa::Direction;
	use crate::nfa::Nfa;
	use crate::nfa::NfaOptions;
	use crate::regex::Regex;

	fn irreducible() -> Vec<Vec<usize>> {
		// 0 -> 1, 0 -> 2, 1 -> 2, 2 -> 1
		vec![vec![1, 2], vec![2], vec![1]]
	}

	#[test]
	fn splits_irreducible_loop() {
		let graph: Vec<Vec<usize>> = irreducible();
		assert!(!is_reducible(&graph, &[0]));

		let reduction: Reduction = reduce(&graph, &[0], 4).unwrap();
		assert_eq!(reduction.successors.len(), 4);
		assert_eq!(reduction.origin, vec![0, 1, 2, 1]);
		assert!(is_reducible(&reduction.successors, &[0]));
		// Every node keeps its edge count, and every edge still leads to a copy
		// of its original target.
		for (node, targets) in reduction.successors.iter().enumerate() {
			let original: &Vec<usize> = &graph[reduction.origin[node]];
			assert_eq!(targets.len(), original.len());
			for (k, &target) in targets.iter().enumerate() {
				assert_eq!(reduction.origin[target], original[k]);
			}
		}
	}

	#[test]
	fn bails_out() {
		assert!(reduce(&irreducible(), &[0], 0).is_none());
	}

	#[test]
	fn reducible_is_untouched() {
		// 0 -> 1 -> 2 -> 1, 2 -> 3
		let graph: Vec<Vec<usize>> = vec![vec![1], vec![2], vec![1, 3], vec![]];
		assert!(is_reducible(&graph, &[0]));
		let reduction: Reduction = reduce(&graph, &[0], 0).unwrap();
		assert_eq!(reduction.successors, graph);
	}

	#[test]
	fn generator_graph() {
		let r: Regex = Regex::Sequence(vec![Regex::star(Regex::literal_str("ab")), Regex::Literal('c')]);
		let nfa: Nfa = Nfa::for_regex(&r, NfaOptions::default());
		let config: CompilerConfig = CompilerConfig::new();
		let mut generator: DfaGenerator = DfaGenerator::new(&nfa, &config, Direction::Forward);
		generator.run().unwrap();
		let before: usize = generator.state_count();
		assert!(generator.reduce_control_flow(config.max_split_states));
		assert!(generator.state_count() >= before);
		for (i, state) in generator.states().iter().enumerate() {
			assert_eq!(state.idx().idx(), i);
			for &t in state.transitions().iter() {
				assert_eq!(generator.transition(t).source(), state.idx());
				assert!(generator.transition(t).target().idx() < generator.state_count());
			}
		}
	}
}
