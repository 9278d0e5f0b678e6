//! Inner-literal acceleration of the unanchored forward automaton.
//!
//! The unanchored entry is replaced by a dispatch that scans for the literal.
//! At a hit `p`, the backward prefix matcher (if any) must accept the input
//! ending at `p`; matching then continues from the state right after the
//! literal at `p + literal.len()`. A candidate that fails resumes the scan at
//! `p + 1`. The match start is recovered by the backward automaton as usual.

use std::collections::BTreeSet;
use std::collections::VecDeque;

use crate::dfa::DfaGenerator;
use crate::dfa::DfaIdx;
use crate::dfa::EntryKind;
use crate::dfa::LiteralDispatch;
use crate::error::Result;
use crate::nfa::InnerLiteral;
use crate::nfa::Nfa;
use crate::nfa::NfaIdx;
use crate::nfa::NfaTransition;
use crate::state_set::StateKey;
use crate::state_set::StateSet;

impl<'a> DfaGenerator<'a> {
	/// Installs the literal dispatch. Returns `false` if the literal is
	/// unusable; the graph is then left as it was.
	pub fn accelerate_inner_literal(&mut self) -> Result<bool> {
		let nfa: &'a Nfa = self.nfa();
		let Some(literal) = nfa.literal() else {
			return Ok(false);
		};
		let text: String = literal.text().iter().collect::<String>();
		if self.tracks_captures() {
			debug!("not accelerating {text:?}: capture groups are tracked");
			return Ok(false);
		}
		let Some(unanchored) = self.entry(EntryKind::Unanchored) else {
			return Ok(false);
		};
		if self.find_member(unanchored, literal.last()).is_none() {
			debug!("not accelerating {text:?}: literal is unreachable");
			return Ok(false);
		}
		if !literal_is_unambiguous(nfa, literal) {
			debug!("not accelerating {text:?}: literal may start inside the prefix");
			return Ok(false);
		}

		let after_literal: DfaIdx = self.add_state(StateKey::new(StateSet::from_iter([literal.last()]), false))?;
		self.drain()?;

		let prefix_matcher: Option<DfaIdx> = if literal.has_prefix() {
			let seeds: StateSet = nfa[literal.first()]
				.predecessors()
				.iter()
				.map(|&t| nfa.transition(t).source())
				.filter(|&source| (source != Nfa::UNANCHORED_ENTRY) && literal.is_prefix_state(source))
				.collect::<StateSet>();
			let matcher: DfaIdx = self.add_state(StateKey::new(seeds, true))?;
			self.drain()?;
			Some(matcher)
		} else {
			None
		};

		let mut redirected: usize = 0;
		for transition in self.transitions.iter_mut() {
			let target: &StateKey = &self.states[transition.target.idx()].key;
			if !target.backward_prefix && is_prefix_only(&target.set, literal) {
				transition.restart = true;
				redirected += 1;
			}
		}

		debug!(
			"accelerating {text:?}: after literal {after_literal:?}, prefix matcher {prefix_matcher:?}, {redirected} restarts"
		);
		self.literal = Some(LiteralDispatch {
			literal: literal.text().to_vec(),
			after_literal,
			prefix_matcher,
		});
		Ok(true)
	}

	/// Breadth-first search for a state holding `member`.
	fn find_member(&self, from: DfaIdx, member: NfaIdx) -> Option<DfaIdx> {
		let mut seen: BTreeSet<DfaIdx> = BTreeSet::from([from]);
		let mut queue: VecDeque<DfaIdx> = VecDeque::from([from]);
		while let Some(idx) = queue.pop_front() {
			if self.states[idx.idx()].key.set.contains(member) {
				return Some(idx);
			}
			for &t in self.states[idx.idx()].transitions.iter() {
				let target: DfaIdx = self.transitions[t.idx()].target;
				if seen.insert(target) {
					queue.push_back(target);
				}
			}
		}
		None
	}
}

/// Searching states in which no thread has reached the literal yet.
fn is_prefix_only(set: &StateSet, literal: &InnerLiteral) -> bool {
	set.contains(Nfa::UNANCHORED_ENTRY) && set.iter().all(|member| literal.is_prefix_state(member))
}

/// Reads the literal from every prefix state over every edge. Only the
/// literal's own path may survive; anything else means the literal can start
/// inside the prefix and a literal hit would not pin down the match.
///
/// This is a walk over the NFA, not a proof over the prefix language: its
/// cost grows with the number of prefix states the literal can thread through.
fn literal_is_unambiguous(nfa: &Nfa, literal: &InnerLiteral) -> bool {
	let mut current: BTreeSet<NfaIdx> = literal
		.prefix_states()
		.iter()
		.copied()
		.filter(|&idx| idx != Nfa::UNANCHORED_ENTRY)
		.collect::<BTreeSet<_>>();
	for &ch in literal.text().iter() {
		let point: u32 = u32::from(ch);
		let mut next: BTreeSet<NfaIdx> = BTreeSet::new();
		for &idx in current.iter() {
			for &t in nfa[idx].successors().iter() {
				let transition: &NfaTransition = nfa.transition(t);
				if transition.ranges().iter().any(|range| range.contains_point(point)) {
					next.insert(transition.target());
				}
			}
		}
		current = next;
	}
	current.iter().all(|&idx| idx == literal.last())
}
