/// Sorted, pairwise disjoint intervals mapped to values.
///
/// Built once from already-disjoint ranges; used by executable states with a
/// large fan-out, where a binary search beats a linear matcher scan.
#[derive(Debug, Clone)]
pub struct IntervalTree<T: Number, V: Clone> {
	intervals: Vec<(Interval<T>, V)>,
}

#[derive(Debug, Clone, Copy, Eq, Ord, PartialEq, PartialOrd, Hash)]
pub struct Interval<T: Number> {
	start: T,
	end: T,
}

pub trait Number: Ord + std::fmt::Debug {
	fn up(&self) -> Self;
	fn down(&self) -> Self;
}

impl<T: Number, V: Clone> IntervalTree<T, V>
where
	T: Copy,
{
	/// Panics if the intervals overlap.
	pub fn from_disjoint(mut intervals: Vec<(Interval<T>, V)>) -> Self {
		intervals.sort_by(|(lhs, _), (rhs, _)| lhs.cmp(rhs));
		let tree: Self = Self { intervals };
		tree.invariants();
		tree
	}

	pub fn lookup(&self, pos: T) -> Option<&V> {
		let index: usize = self.partition_point(pos);
		let (interval, value) = self.intervals.get(index)?;
		assert!(pos <= interval.end);
		(interval.start <= pos).then_some(value)
	}

	/// Index of the first interval that "goes past" `pos`,
	/// or `self.intervals.len()` if `pos` is past every interval.
	fn partition_point(&self, pos: T) -> usize {
		self.intervals.partition_point(|(interval, _)| interval.end < pos)
	}

	fn invariants(&self) {
		for window in self.intervals.windows(2) {
			assert!(
				window[0].0.end < window[1].0.start,
				"overlapping intervals {:?} and {:?}",
				window[0].0,
				window[1].0
			);
		}
	}
}

impl<T: Number> Interval<T> {
	pub fn new(start: T, end: T) -> Self {
		assert!(start <= end);
		Self { start, end }
	}
}

impl<T: Number> Interval<T>
where
	T: Copy,
{
	pub fn point(value: T) -> Self {
		Self::new(value, value)
	}

	pub fn start(&self) -> T {
		self.start
	}

	pub fn end(&self) -> T {
		self.end
	}

	pub fn contains_point(&self, pos: T) -> bool {
		(self.start <= pos) && (pos <= self.end)
	}

	pub fn overlaps(&self, other: &Interval<T>) -> bool {
		(self.start <= other.end) && (other.start <= self.end)
	}

	/// Everything in `universe` not covered by `intervals`.
	pub fn complement(intervals: &mut [Interval<T>], universe: Interval<T>) -> Vec<Interval<T>> {
		intervals.sort_unstable();

		let mut complement: Vec<Interval<T>> = Vec::new();

		let mut pos: T = universe.start;
		for &Interval { start, end } in intervals.iter() {
			if end < pos {
				continue;
			}
			if universe.end < start {
				break;
			}
			if pos < start {
				complement.push(Interval::new(pos, start.down()));
			}
			if end < universe.end {
				pos = end.up();
			} else {
				return complement;
			}
		}

		complement.push(Interval::new(pos, universe.end));
		complement
	}

	/// Whether the sorted, disjoint `intervals` leave no gap in `universe`.
	pub fn covers(intervals: &[Interval<T>], universe: Interval<T>) -> bool {
		let mut pos: T = universe.start;
		for interval in intervals.iter() {
			if interval.start > pos {
				return false;
			}
			if interval.end >= universe.end {
				return true;
			}
			if interval.end >= pos {
				pos = interval.end.up();
			}
		}
		false
	}

	/// Sorts and fuses adjacent or overlapping intervals.
	pub fn normalize(intervals: &mut Vec<Interval<T>>) {
		intervals.sort_unstable();
		let mut merged: Vec<Interval<T>> = Vec::with_capacity(intervals.len());
		for &interval in intervals.iter() {
			match merged.last_mut() {
				Some(last) if (last.end >= interval.start) || (last.end.up() == interval.start) => {
					if last.end < interval.end {
						last.end = interval.end;
					}
				},
				_ => merged.push(interval),
			}
		}
		*intervals = merged;
	}
}

macro_rules! number_impl {
	($ty:ty, $($tt:tt)*) => {
		number_impl!($ty);
		number_impl!($($tt)*);
	};
	($ty:ty) => {
		impl Number for $ty {
			fn up(&self) -> Self {
				self + 1
			}

			fn down(&self) -> Self {
				self - 1
			}
		}
	};
}

number_impl!(u8, u16, u32, u64, usize);

#[cfg(test)]
mod test {
	use super::*;

	#[test]
	fn lookup() {
		let tree: IntervalTree<u32, u64> = IntervalTree::from_disjoint(vec![
			(Interval::new(11, 14), 2),
			(Interval::new(0, 4), 1),
			(Interval::new(15, 15), 3),
		]);
		assert_eq!(tree.lookup(3), Some(&1));
		assert_eq!(tree.lookup(4), Some(&1));
		assert_eq!(tree.lookup(5), None);
		assert_eq!(tree.lookup(12), Some(&2));
		assert_eq!(tree.lookup(15), Some(&3));
		assert_eq!(tree.lookup(16), None);
	}

	#[test]
	#[should_panic(expected = "overlapping")]
	fn rejects_overlap() {
		let _: IntervalTree<u32, ()> =
			IntervalTree::from_disjoint(vec![(Interval::new(0, 10), ()), (Interval::new(5, 15), ())]);
	}

	#[test]
	fn complement() {
		let intervals: &mut [Interval<u32>] = &mut [
			Interval { start: 10, end: 15 },
			Interval { start: 20, end: 30 },
			Interval { start: 25, end: 40 },
		];
		let complement: Vec<Interval<u32>> = Interval::complement(intervals, Interval::new(0, 100));
		assert_eq!(
			complement,
			vec![Interval::new(0, 9), Interval::new(16, 19), Interval::new(41, 100)]
		);

		let full: Vec<Interval<u32>> = Interval::complement(&mut [Interval::new(0, 100)], Interval::new(0, 100));
		assert!(full.is_empty());
	}

	#[test]
	fn covers() {
		let universe: Interval<u32> = Interval::new(0, 100);
		assert!(Interval::covers(&[Interval::new(0, 49), Interval::new(50, 100)], universe));
		assert!(!Interval::covers(&[Interval::new(0, 48), Interval::new(50, 100)], universe));
		assert!(!Interval::covers(&[Interval::new(1, 100)], universe));
		assert!(!Interval::covers(&[Interval::new(0, 99)], universe));
	}

	#[test]
	fn normalize() {
		let mut intervals: Vec<Interval<u32>> = vec![
			Interval::new(5, 6),
			Interval::new(0, 2),
			Interval::new(3, 4),
			Interval::new(10, 12),
			Interval::new(11, 20),
		];
		Interval::normalize(&mut intervals);
		assert_eq!(intervals, vec![Interval::new(0, 6), Interval::new(10, 20)]);
	}
}
