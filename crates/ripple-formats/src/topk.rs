//! Bounded top-k heap

use serde::{Deserialize, Serialize};
use std::cmp::Ordering;
use std::collections::BinaryHeap;

/// Which end of the score range a [`BoundedHeap`] keeps.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum Ranking {
    /// Keep the k smallest scores (nearest neighbors)
    Lowest,
    /// Keep the k largest scores
    Highest,
}

#[derive(Debug)]
struct Slot<T> {
    /// Score oriented so that larger means worse
    badness: f64,
    seq: u64,
    score: f64,
    item: T,
}

impl<T> PartialEq for Slot<T> {
    fn eq(&self, other: &Self) -> bool {
        self.cmp(other) == Ordering::Equal
    }
}

impl<T> Eq for Slot<T> {}

impl<T> PartialOrd for Slot<T> {
    fn partial_cmp(&self, other: &Self) -> Option<Ordering> {
        Some(self.cmp(other))
    }
}

impl<T> Ord for Slot<T> {
    fn cmp(&self, other: &Self) -> Ordering {
        // Among equal scores the later arrival is worse
        self.badness
            .total_cmp(&other.badness)
            .then(self.seq.cmp(&other.seq))
    }
}

/// Keeps the best `capacity` items seen, with the worst kept item on top.
///
/// A candidate is admitted while the heap has room, or when it strictly beats
/// the current worst, which is then evicted.
#[derive(Debug)]
pub struct BoundedHeap<T> {
    capacity: usize,
    ranking: Ranking,
    heap: BinaryHeap<Slot<T>>,
    seq: u64,
}

impl<T> BoundedHeap<T> {
    pub fn new(capacity: usize, ranking: Ranking) -> Self {
        Self {
            capacity,
            ranking,
            heap: BinaryHeap::with_capacity(capacity.saturating_add(1).min(4096)),
            seq: 0,
        }
    }

    pub fn capacity(&self) -> usize {
        self.capacity
    }

    pub fn len(&self) -> usize {
        self.heap.len()
    }

    pub fn is_empty(&self) -> bool {
        self.heap.is_empty()
    }

    /// Score of the worst kept item.
    pub fn worst(&self) -> Option<f64> {
        self.heap.peek().map(|slot| slot.score)
    }

    /// Offer an item; returns whether it was kept.
    pub fn push(&mut self, score: f64, item: T) -> bool {
        if self.capacity == 0 {
            return false;
        }
        let badness = match self.ranking {
            Ranking::Lowest => score,
            Ranking::Highest => -score,
        };
        if self.heap.len() >= self.capacity {
            match self.heap.peek() {
                Some(worst) if badness < worst.badness => {
                    self.heap.pop();
                }
                _ => return false,
            }
        }
        self.heap.push(Slot {
            badness,
            seq: self.seq,
            score,
            item,
        });
        self.seq += 1;
        true
    }

    /// Kept items ascending by score, ties in arrival order.
    pub fn into_sorted_vec(self) -> Vec<(f64, T)> {
        let mut slots = self.heap.into_vec();
        slots.sort_by(|a, b| a.score.total_cmp(&b.score).then(a.seq.cmp(&b.seq)));
        slots.into_iter().map(|s| (s.score, s.item)).collect()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use proptest::prelude::*;

    #[test]
    fn test_keeps_lowest() {
        let mut heap = BoundedHeap::new(3, Ranking::Lowest);
        for (score, name) in [(5.0, "e"), (1.0, "a"), (4.0, "d"), (2.0, "b"), (9.0, "z")] {
            heap.push(score, name);
        }
        assert_eq!(heap.worst(), Some(4.0));
        assert_eq!(
            heap.into_sorted_vec(),
            vec![(1.0, "a"), (2.0, "b"), (4.0, "d")]
        );
    }

    #[test]
    fn test_keeps_highest_ascending_output() {
        let mut heap = BoundedHeap::new(2, Ranking::Highest);
        for score in [3.0, 7.0, 1.0, 8.0] {
            heap.push(score, ());
        }
        let scores: Vec<f64> = heap.into_sorted_vec().into_iter().map(|(s, ())| s).collect();
        assert_eq!(scores, vec![7.0, 8.0]);
    }

    #[test]
    fn test_ties_keep_earlier_arrivals() {
        let mut heap = BoundedHeap::new(2, Ranking::Lowest);
        assert!(heap.push(1.0, "first"));
        assert!(heap.push(1.0, "second"));
        assert!(!heap.push(1.0, "third"));
        assert_eq!(heap.into_sorted_vec(), vec![(1.0, "first"), (1.0, "second")]);
    }

    #[test]
    fn test_zero_capacity() {
        let mut heap = BoundedHeap::new(0, Ranking::Lowest);
        assert!(!heap.push(1.0, ()));
        assert!(heap.is_empty());
    }

    proptest! {
        #[test]
        fn prop_matches_sort_and_truncate(
            scores in prop::collection::vec(0u32..1000, 0..200),
            k in 0usize..20,
        ) {
            let mut heap = BoundedHeap::new(k, Ranking::Lowest);
            for &s in &scores {
                heap.push(f64::from(s), s);
            }
            let kept: Vec<u32> = heap.into_sorted_vec().into_iter().map(|(_, s)| s).collect();

            let mut expected = scores.clone();
            expected.sort_unstable();
            expected.truncate(k);
            prop_assert_eq!(kept, expected);
        }
    }
}
