//! Reference executor for compiled tables, used to check that optimizations
//! leave match results unchanged, and a backtracking matcher over the syntax
//! tree that pins down what the results should be. Positions are char indices.

use crate::captures::PartialTransition;
use crate::compiler::CompiledRegex;
use crate::dfa::EntryKind;
use crate::executable::CompiledAutomaton;
use crate::executable::ExecutableState;
use crate::executable::StateKind;
use crate::regex::Regex;

#[derive(Debug, Clone, Eq, PartialEq)]
pub struct Match {
	pub start: usize,
	pub end: usize,
	pub result: u32,
	/// Indexed by group; only filled when capture groups are tracked.
	pub groups: Vec<Option<(usize, usize)>>,
}

type Registers = Vec<Vec<Option<usize>>>;

/// Group boundaries of one backtracking thread.
type Boundaries = Vec<Option<usize>>;

#[derive(Debug)]
struct Hit {
	end: usize,
	result: u32,
	groups: Vec<Option<(usize, usize)>>,
	/// Reached a trace-finder state; `end` is where the outcome was decided.
	decided: bool,
}

pub fn init_logging() {
	let _ = tracing_subscriber::fmt()
		.with_test_writer()
		.with_max_level(tracing::Level::TRACE)
		.try_init();
}

/// Leftmost-first match of the compiled pattern in `input`.
pub fn find(regex: &CompiledRegex, input: &str) -> Option<Match> {
	let chars: Vec<char> = input.chars().collect::<Vec<_>>();
	let forward: &CompiledAutomaton = &regex.forward;

	let (hit, searching): (Hit, bool) = match forward.entry(EntryKind::Unanchored) {
		Some(entry) => match forward.state(entry).kind() {
			StateKind::LiteralSearch {
				literal,
				after_literal,
				prefix_matcher,
			} => (search_literal(forward, literal, *after_literal, *prefix_matcher, &chars)?, true),
			_ => (run(forward, entry, &chars, 0)?, true),
		},
		None => (run(forward, forward.entry(EntryKind::Anchored)?, &chars, 0)?, false),
	};

	let start: usize = if hit.decided {
		hit.end
	} else if let Some(Some((start, _))) = hit.groups.first() {
		*start
	} else if !searching {
		0
	} else {
		let backward: &CompiledAutomaton = regex.backward.as_ref().expect("searching needs the backward automaton");
		leftmost_start(backward, backward.entry(EntryKind::Anchored)?, &chars, hit.end)
			.expect("the backward automaton rejected a forward match")
	};
	Some(Match {
		start,
		end: hit.end,
		result: hit.result,
		groups: hit.groups,
	})
}

/// Outcome only, for comparing automata that disagree on match bounds.
pub fn find_result(regex: &CompiledRegex, input: &str) -> Option<u32> {
	find(regex, input).map(|m| m.result)
}

fn search_literal(
	forward: &CompiledAutomaton,
	literal: &[char],
	after_literal: usize,
	prefix_matcher: Option<usize>,
	chars: &[char],
) -> Option<Hit> {
	let mut resume: usize = 0;
	while let Some(hit) = (resume..chars.len()).find(|&q| chars[q..].starts_with(literal)) {
		resume = hit + 1;
		if let Some(matcher) = prefix_matcher {
			if leftmost_start(forward, matcher, chars, hit).is_none() {
				continue;
			}
		}
		if let Some(found) = run(forward, after_literal, chars, hit + literal.len()) {
			return Some(found);
		}
	}
	None
}

/// Runs forward from `id` at `pos` and returns the last final state seen.
fn run(automaton: &CompiledAutomaton, mut id: usize, chars: &[char], mut pos: usize) -> Option<Hit> {
	let mut registers: Registers = vec![vec![None; 2 * automaton.groups()]; automaton.register_count()];
	if let Some(initial) = automaton.state(id).captures().and_then(|info| info.initial) {
		apply(&mut registers, &automaton.capture_transitions()[initial], pos);
	}

	let mut last: Option<Hit> = None;
	loop {
		let state: &ExecutableState = automaton.state(id);
		match state.kind() {
			&StateKind::TraceFinder { result } => {
				return Some(Hit {
					end: pos,
					result,
					groups: Vec::new(),
					decided: true,
				});
			},
			// Every thread of this attempt is dead.
			StateKind::LiteralSearch { .. } => return last,
			_ => (),
		}
		if state.is_final() || (state.is_anchored_final() && (pos == chars.len())) {
			last = Some(finish(automaton, state, &registers, pos));
		}
		let Some(&ch) = chars.get(pos) else {
			break;
		};
		let Some(k) = state.transition_for(u32::from(ch)) else {
			break;
		};
		if let Some(info) = state.captures() {
			apply(&mut registers, &automaton.capture_transitions()[info.outgoing[k]], pos);
		}
		id = state.successors()[k];
		pos += 1;
	}
	last
}

fn finish(automaton: &CompiledAutomaton, state: &ExecutableState, registers: &Registers, pos: usize) -> Hit {
	let result: u32 = state.result().expect("final state without a result");
	let mut groups: Vec<Option<(usize, usize)>> = Vec::new();
	if let (Some(slot), Some(info)) = (automaton.result_slot(), state.captures()) {
		let mut registers: Registers = registers.clone();
		let recipe: usize = info.final_transition.expect("final state without a final transition");
		apply(&mut registers, &automaton.capture_transitions()[recipe], pos);
		for group in 0..automaton.groups() {
			groups.push(match (registers[slot][2 * group], registers[slot][2 * group + 1]) {
				(Some(start), Some(end)) => Some((start, end)),
				_ => None,
			});
		}
	}
	Hit {
		end: pos,
		result,
		groups,
		decided: false,
	}
}

/// Reads right to left from `end`; returns the smallest position at which a
/// final state is reached.
fn leftmost_start(automaton: &CompiledAutomaton, mut id: usize, chars: &[char], end: usize) -> Option<usize> {
	let mut pos: usize = end;
	let mut start: Option<usize> = None;
	loop {
		let state: &ExecutableState = automaton.state(id);
		assert_eq!(state.kind(), &StateKind::Backward);
		if state.is_final() {
			start = Some(pos);
		}
		if pos == 0 {
			break;
		}
		let Some(k) = state.transition_for(u32::from(chars[pos - 1])) else {
			break;
		};
		id = state.successors()[k];
		pos -= 1;
	}
	start
}

fn apply(registers: &mut Registers, recipe: &PartialTransition, pos: usize) {
	for &(i, j) in recipe.swaps.iter() {
		registers.swap(i, j);
	}
	for &(from, to) in recipe.copies.iter() {
		registers[to] = registers[from].clone();
	}
	for &(row, boundary) in recipe.clears.iter() {
		registers[row][boundary] = None;
	}
	for &(row, boundary) in recipe.updates.iter() {
		registers[row][boundary] = Some(pos);
	}
}

/// Leftmost-first match of `regex` by backtracking: alternatives in order,
/// greedy repetition, loop iterations that consume input, and inner groups
/// reset whenever a loop goes round again. Every group is reported.
pub fn backtrack(regex: &Regex, input: &str, search: bool) -> Option<Match> {
	let chars: Vec<char> = input.chars().collect::<Vec<_>>();
	let groups: usize = regex.group_count();
	let last_start: usize = if search { chars.len() } else { 0 };
	let matcher: Backtracker = Backtracker { chars: &chars };
	for start in 0..=last_start {
		let mut boundaries: Boundaries = vec![None; 2 * groups];
		let mut found: Option<(usize, Boundaries)> = None;
		matcher.walk(regex, start, &mut boundaries, &mut |end: usize, boundaries: &mut Boundaries| {
			found = Some((end, boundaries.clone()));
			true
		});
		let Some((end, boundaries)) = found else {
			continue;
		};
		let mut spans: Vec<Option<(usize, usize)>> = vec![Some((start, end))];
		for group in 1..groups {
			spans.push(match (boundaries[2 * group], boundaries[2 * group + 1]) {
				(Some(start), Some(end)) => Some((start, end)),
				_ => None,
			});
		}
		return Some(Match {
			start,
			end,
			result: 0,
			groups: spans,
		});
	}
	None
}

struct Backtracker<'a> {
	chars: &'a [char],
}

impl Backtracker<'_> {
	/// Matches `regex` at `pos` and hands every way through to `k`, most
	/// preferred first, until `k` accepts one.
	fn walk(
		&self,
		regex: &Regex,
		pos: usize,
		boundaries: &mut Boundaries,
		k: &mut dyn FnMut(usize, &mut Boundaries) -> bool,
	) -> bool {
		match regex {
			Regex::AnyChar => (pos < self.chars.len()) && k(pos + 1, boundaries),
			&Regex::Literal(ch) => (self.chars.get(pos) == Some(&ch)) && k(pos + 1, boundaries),
			Regex::Group { negated, items } => {
				let Some(&ch) = self.chars.get(pos) else {
					return false;
				};
				let inside: bool = items.iter().any(|&(start, end)| (start <= ch) && (ch <= end));
				(inside != *negated) && k(pos + 1, boundaries)
			},
			Regex::Capture { group, item } => {
				let (open, close): (usize, usize) = (2 * *group as usize, 2 * *group as usize + 1);
				let saved: (Option<usize>, Option<usize>) = (boundaries[open], boundaries[close]);
				boundaries[open] = Some(pos);
				let matched: bool =
					self.walk(item, pos, boundaries, &mut |end: usize, boundaries: &mut Boundaries| {
						let before: Option<usize> = boundaries[close];
						boundaries[close] = Some(end);
						if k(end, boundaries) {
							return true;
						}
						boundaries[close] = before;
						false
					});
				if !matched {
					(boundaries[open], boundaries[close]) = saved;
				}
				matched
			},
			Regex::KleeneClosure(item) => self.star(item, pos, false, boundaries, k),
			&Regex::BoundedRepetition { start, end, ref item } => {
				self.repeat(item, start as usize, (end - start) as usize, pos, boundaries, k)
			},
			Regex::Sequence(items) => self.sequence(items, pos, boundaries, k),
			Regex::Alternation(items) => items.iter().any(|item| self.walk(item, pos, boundaries, &mut *k)),
		}
	}

	fn sequence(
		&self,
		items: &[Regex],
		pos: usize,
		boundaries: &mut Boundaries,
		k: &mut dyn FnMut(usize, &mut Boundaries) -> bool,
	) -> bool {
		let Some((item, rest)) = items.split_first() else {
			return k(pos, boundaries);
		};
		self.walk(item, pos, boundaries, &mut |next: usize, boundaries: &mut Boundaries| {
			self.sequence(rest, next, boundaries, &mut *k)
		})
	}

	fn star(
		&self,
		item: &Regex,
		pos: usize,
		again: bool,
		boundaries: &mut Boundaries,
		k: &mut dyn FnMut(usize, &mut Boundaries) -> bool,
	) -> bool {
		let saved: Boundaries = boundaries.clone();
		if again {
			let mut groups: Vec<u32> = Vec::new();
			item.groups(&mut groups);
			for group in groups.into_iter() {
				boundaries[2 * group as usize] = None;
				boundaries[2 * group as usize + 1] = None;
			}
		}
		let looped: bool = self.walk(item, pos, boundaries, &mut |next: usize, boundaries: &mut Boundaries| {
			(next != pos) && self.star(item, next, true, boundaries, &mut *k)
		});
		if looped {
			return true;
		}
		*boundaries = saved;
		k(pos, boundaries)
	}

	/// `min` mandatory copies of `item`, then up to `optional` more, nested
	/// like `x(x(x)?)?`.
	fn repeat(
		&self,
		item: &Regex,
		min: usize,
		optional: usize,
		pos: usize,
		boundaries: &mut Boundaries,
		k: &mut dyn FnMut(usize, &mut Boundaries) -> bool,
	) -> bool {
		if min > 0 {
			return self.walk(item, pos, boundaries, &mut |next: usize, boundaries: &mut Boundaries| {
				self.repeat(item, min - 1, optional, next, boundaries, &mut *k)
			});
		}
		if optional > 0 {
			let taken: bool = self.walk(item, pos, boundaries, &mut |next: usize, boundaries: &mut Boundaries| {
				self.repeat(item, 0, optional - 1, next, boundaries, &mut *k)
			});
			if taken {
				return true;
			}
		}
		k(pos, boundaries)
	}
}
