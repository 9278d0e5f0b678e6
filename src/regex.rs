/// Regex abstract syntax tree, as handed over by a front end.
///
/// Group `0` is the implicit whole-match capture and must not appear as a
/// [`Regex::Capture`]; explicit groups are numbered from `1`.
#[derive(Debug, Clone, Eq, PartialEq)]
pub enum Regex {
	AnyChar,
	Literal(char),
	Capture {
		group: u32,
		item: Box<Regex>,
	},
	Group {
		negated: bool,
		items: Vec<(char, char)>,
	},
	KleeneClosure(Box<Regex>),
	BoundedRepetition {
		start: u32,
		end: u32,
		item: Box<Regex>,
	},
	Sequence(Vec<Regex>),
	Alternation(Vec<Regex>),
}

impl Regex {
	pub fn literal_str(text: &str) -> Self {
		let mut items: Vec<Regex> = text.chars().map(Regex::Literal).collect::<Vec<_>>();
		if items.len() == 1 {
			items.pop().unwrap_or(Regex::Sequence(Vec::new()))
		} else {
			Regex::Sequence(items)
		}
	}

	pub fn class(items: &[(char, char)]) -> Self {
		Regex::Group {
			negated: false,
			items: items.to_vec(),
		}
	}

	pub fn capture(group: u32, item: Regex) -> Self {
		assert!(group > 0, "group 0 is the implicit whole-match capture");
		Regex::Capture {
			group,
			item: Box::new(item),
		}
	}

	pub fn star(item: Regex) -> Self {
		Regex::KleeneClosure(Box::new(item))
	}

	pub fn plus(item: Regex) -> Self {
		Regex::Sequence(vec![item.clone(), Regex::star(item)])
	}

	pub fn repeat(item: Regex, start: u32, end: u32) -> Self {
		assert!(start <= end, "invalid repetition {{{start},{end}}}");
		Regex::BoundedRepetition {
			start,
			end,
			item: Box::new(item),
		}
	}

	/// Number of capture groups including the implicit group `0`.
	pub fn group_count(&self) -> usize {
		self.max_group().map_or(0, |max| max as usize) + 1
	}

	fn max_group(&self) -> Option<u32> {
		match self {
			Self::AnyChar | Self::Literal(..) | Self::Group { .. } => None,
			Self::Capture { group, item } => Some(item.max_group().map_or(*group, |inner| inner.max(*group))),
			Self::KleeneClosure(item) | Self::BoundedRepetition { item, .. } => item.max_group(),
			Self::Sequence(items) | Self::Alternation(items) => items.iter().filter_map(Regex::max_group).max(),
		}
	}

	/// Groups nested anywhere inside `self`.
	pub fn groups(&self, into: &mut Vec<u32>) {
		match self {
			Self::AnyChar | Self::Literal(..) | Self::Group { .. } => (),
			Self::Capture { group, item } => {
				into.push(*group);
				item.groups(into);
			},
			Self::KleeneClosure(item) | Self::BoundedRepetition { item, .. } => item.groups(into),
			Self::Sequence(items) | Self::Alternation(items) => {
				for item in items.iter() {
					item.groups(into);
				}
			},
		}
	}

	pub fn min_len(&self) -> usize {
		match self {
			Self::AnyChar | Self::Literal(..) | Self::Group { .. } => 1,
			Self::Capture { item, .. } => item.min_len(),
			Self::KleeneClosure(_) => 0,
			Self::BoundedRepetition { start, item, .. } => (*start as usize) * item.min_len(),
			Self::Sequence(items) => items.iter().map(Regex::min_len).sum(),
			Self::Alternation(items) => items.iter().map(Regex::min_len).min().unwrap_or(0),
		}
	}

	/// `None` if unbounded.
	pub fn max_len(&self) -> Option<usize> {
		match self {
			Self::AnyChar | Self::Literal(..) | Self::Group { .. } => Some(1),
			Self::Capture { item, .. } => item.max_len(),
			Self::KleeneClosure(item) => match item.max_len() {
				Some(0) => Some(0),
				_ => None,
			},
			Self::BoundedRepetition { end, item, .. } => item.max_len().map(|len| len * (*end as usize)),
			Self::Sequence(items) => items.iter().map(Regex::max_len).sum(),
			Self::Alternation(items) => {
				let mut max: usize = 0;
				for item in items.iter() {
					max = max.max(item.max_len()?);
				}
				Some(max)
			},
		}
	}
}

#[cfg(test)]
mod test {
	use super::*;

	#[test]
	fn lengths() {
		let r: Regex = Regex::Sequence(vec![
			Regex::repeat(Regex::Literal('a'), 0, 3),
			Regex::literal_str("literal"),
			Regex::class(&[('0', '9')]),
		]);
		assert_eq!(r.min_len(), 8);
		assert_eq!(r.max_len(), Some(11));
		assert_eq!(Regex::plus(Regex::AnyChar).max_len(), None);
		assert_eq!(Regex::plus(Regex::AnyChar).min_len(), 1);
	}

	#[test]
	fn groups() {
		let r: Regex = Regex::Alternation(vec![
			Regex::capture(1, Regex::Literal('a')),
			Regex::capture(3, Regex::capture(2, Regex::Literal('b'))),
		]);
		assert_eq!(r.group_count(), 4);
		let mut groups: Vec<u32> = Vec::new();
		r.groups(&mut groups);
		assert_eq!(groups, vec![1, 3, 2]);
		assert_eq!(Regex::Literal('x').group_count(), 1);
	}
}
