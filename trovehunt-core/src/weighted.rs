//! Cumulative-weight random selection.

use rand::Rng;
use std::collections::BTreeMap;
use std::ops::Bound;
use thiserror::Error;

/// Errors raised by weighted selection.
#[derive(Debug, Error, Clone, Copy, PartialEq, Eq)]
pub enum SelectorError {
    /// The selector holds no entries, or its total weight is zero.
    #[error("cannot draw from an empty pool")]
    EmptyPool,
    /// An entry was added with a weight of zero.
    #[error("entry weight must be positive")]
    ZeroWeight,
}

/// Generic cumulative-weight draw structure.
///
/// Entries live in a map keyed by the running weight total, so a uniform
/// roll in `[0, total)` resolves to the owning entry with a single
/// O(log n) range lookup. Ordering of equal-weight entries is not
/// significant; only the weight ratios matter.
#[derive(Debug, Clone, Default)]
pub struct WeightedSelector<T> {
    entries: BTreeMap<u64, T>,
    total: u64,
}

impl<T> WeightedSelector<T> {
    /// Create an empty selector.
    #[must_use]
    pub const fn new() -> Self {
        Self {
            entries: BTreeMap::new(),
            total: 0,
        }
    }

    /// Append an entry with the given weight.
    ///
    /// # Errors
    ///
    /// Returns `SelectorError::ZeroWeight` when `weight` is zero.
    pub fn add(&mut self, item: T, weight: u32) -> Result<(), SelectorError> {
        if weight == 0 {
            return Err(SelectorError::ZeroWeight);
        }
        self.total = self.total.saturating_add(u64::from(weight));
        self.entries.insert(self.total, item);
        Ok(())
    }

    /// Draw one entry with probability proportional to its weight.
    ///
    /// The roll is uniform in `[0, total)`; the winner is the entry at the
    /// smallest cumulative key strictly greater than the roll, so a roll of
    /// `total - 1` always resolves to the last entry.
    ///
    /// # Errors
    ///
    /// Returns `SelectorError::EmptyPool` when no entries exist.
    pub fn draw<R: Rng + ?Sized>(&self, rng: &mut R) -> Result<&T, SelectorError> {
        if self.total == 0 {
            return Err(SelectorError::EmptyPool);
        }
        let roll = rng.gen_range(0..self.total);
        self.resolve(roll).ok_or(SelectorError::EmptyPool)
    }

    /// Resolve a roll in `[0, total)` to its owning entry.
    fn resolve(&self, roll: u64) -> Option<&T> {
        self.entries
            .range((Bound::Excluded(roll), Bound::Unbounded))
            .next()
            .map(|(_, item)| item)
    }

    /// Sum of all entry weights.
    #[must_use]
    pub const fn total_weight(&self) -> u64 {
        self.total
    }

    /// Number of entries.
    #[must_use]
    pub fn len(&self) -> usize {
        self.entries.len()
    }

    /// Returns true when no entries are present.
    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }

    /// Iterate entries in cumulative order.
    pub fn iter(&self) -> impl Iterator<Item = &T> {
        self.entries.values()
    }

    /// Drop all entries and reset the running total.
    pub fn clear(&mut self) {
        self.entries.clear();
        self.total = 0;
    }
}
