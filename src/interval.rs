//! Closed integer intervals and the disjoint-interval set the attack
//! narrows. The set keeps the lower and upper boundaries in two ordered
//! sets; since the intervals are disjoint, pairing them up positionally
//! reconstructs the intervals.

use std::collections::BTreeSet;
use std::ops::Bound::Included;

use num_bigint::BigInt;
use thiserror::Error;

#[derive(Debug, Error, PartialEq, Eq)]
#[error("interval upper boundary must not be below the lower boundary")]
pub struct InvalidInterval;

/// A closed interval `[lower, upper]` of candidate plaintexts.
#[derive(Debug, PartialEq, Eq, Clone)]
pub struct Interval {
    pub lower: BigInt,
    pub upper: BigInt,
}

impl Interval {
    pub fn new(lower: &BigInt, upper: &BigInt) -> Result<Self, InvalidInterval> {
        if upper < lower {
            return Err(InvalidInterval);
        }
        Ok(Self {
            lower: lower.clone(),
            upper: upper.clone(),
        })
    }

    /// True once the interval has collapsed to a single value.
    pub fn is_single(&self) -> bool {
        self.lower == self.upper
    }
}

/// An unordered collection of disjoint closed intervals. Inserting an
/// interval that overlaps or abuts an existing one fuses them, so a
/// duplicate insert leaves the set unchanged and the set stays minimal.
#[derive(Debug, Default, Clone, PartialEq, Eq)]
pub struct IntervalSet {
    lowers: BTreeSet<BigInt>,
    uppers: BTreeSet<BigInt>,
}

impl IntervalSet {
    pub fn len(&self) -> usize {
        self.lowers.len()
    }

    pub fn is_empty(&self) -> bool {
        self.lowers.is_empty()
    }

    /// The member intervals in ascending order.
    pub fn intervals(&self) -> Vec<Interval> {
        // Disjointness means the i-th lower belongs with the i-th upper
        self.lowers
            .iter()
            .zip(self.uppers.iter())
            .map(|(lower, upper)| Interval {
                lower: lower.clone(),
                upper: upper.clone(),
            })
            .collect()
    }

    /// The sole member, when exactly one interval remains.
    pub fn single(&self) -> Option<Interval> {
        match self.len() {
            1 => self.intervals().pop(),
            _ => None,
        }
    }

    pub fn insert(&mut self, interval: &Interval) {
        // Boundaries of existing intervals that the new interval swallows.
        // Comparing the two counts tells the overlap shape: equal counts
        // mean the new interval either is disjoint from everything or
        // fully covers whole intervals; a surplus lower means it starts
        // inside an existing interval, a surplus upper means it ends
        // inside one.
        let range = (
            Included(interval.lower.clone()),
            Included(interval.upper.clone()),
        );
        let covered_lowers = self.lowers.range(range.clone()).count();
        let covered_uppers = self.uppers.range(range).count();

        self.remove_boundaries_within(interval);

        if covered_lowers >= covered_uppers {
            self.lowers.insert(interval.lower.clone());
        }
        if covered_lowers <= covered_uppers {
            self.uppers.insert(interval.upper.clone());
        }

        // Fuse with a neighbor that ends right before us ...
        let before: BigInt = &interval.lower - 1;
        if self.uppers.remove(&before) {
            self.lowers.remove(&interval.lower);
        }
        // ... or starts right after us
        let after: BigInt = &interval.upper + 1;
        if self.lowers.remove(&after) {
            self.uppers.remove(&interval.upper);
        }
    }

    /// Drops every stored boundary inside `interval`, inclusive on both
    /// ends (an existing lower equal to our upper must fuse, not linger).
    fn remove_boundaries_within(&mut self, interval: &Interval) {
        let past_upper: BigInt = &interval.upper + 1;
        for set in [&mut self.lowers, &mut self.uppers] {
            let mut tail = set.split_off(&interval.lower);
            let mut keep = tail.split_off(&past_upper);
            set.append(&mut keep);
        }
    }
}
