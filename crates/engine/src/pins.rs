// TTD - Time-Travel Debugging identity core
// Copyright (C) 2024 Zhuo Zhang and Wuqi Zhang
//
// This program is free software: you can redistribute it and/or modify
// it under the terms of the GNU Affero General Public License as published by
// the Free Software Foundation, either version 3 of the License, or
// (at your option) any later version.
//
// This program is distributed in the hope that it will be useful,
// but WITHOUT ANY WARRANTY; without even the implied warranty of
// MERCHANTABILITY or FITNESS FOR A PARTICULAR PURPOSE. See the
// GNU Affero General Public License for more details.
//
// You should have received a copy of the GNU Affero General Public License
// along with this program. If not, see <https://www.gnu.org/licenses/>.

//! Pin sets: explicit strong references held on behalf of the collector.
//!
//! A handle stays pinned while its count is positive. The collector learns
//! about pins only through the mark callback, so a pin set is plain data.

use std::collections::BTreeMap;

/// Counted set of pinned handles, iterated in handle order
#[derive(Debug, Clone)]
pub struct PinSet<T> {
    counts: BTreeMap<T, usize>,
}

impl<T> Default for PinSet<T> {
    fn default() -> Self {
        Self { counts: BTreeMap::new() }
    }
}

impl<T: Ord + Copy> PinSet<T> {
    /// Create an empty pin set
    pub fn new() -> Self {
        Self::default()
    }

    /// Take one more strong reference on `handle`, returning the new count
    pub fn pin(&mut self, handle: T) -> usize {
        let count = self.counts.entry(handle).or_insert(0);
        *count += 1;
        *count
    }

    /// Release one strong reference on `handle`
    ///
    /// Returns the remaining count, or `None` if `handle` was not pinned.
    pub fn unpin(&mut self, handle: T) -> Option<usize> {
        let count = self.counts.get_mut(&handle)?;
        *count -= 1;
        let remaining = *count;
        if remaining == 0 {
            self.counts.remove(&handle);
        }
        Some(remaining)
    }

    /// Drop every reference on `handle` at once
    pub fn release(&mut self, handle: T) -> bool {
        self.counts.remove(&handle).is_some()
    }

    /// Whether `handle` is pinned
    pub fn contains(&self, handle: T) -> bool {
        self.counts.contains_key(&handle)
    }

    /// Current count of `handle`
    pub fn count(&self, handle: T) -> usize {
        self.counts.get(&handle).copied().unwrap_or(0)
    }

    /// Number of distinct pinned handles
    pub fn len(&self) -> usize {
        self.counts.len()
    }

    /// Whether nothing is pinned
    pub fn is_empty(&self) -> bool {
        self.counts.is_empty()
    }

    /// Pinned handles in ascending order
    pub fn iter(&self) -> impl Iterator<Item = T> + '_ {
        self.counts.keys().copied()
    }

    /// Release everything in one bulk operation
    pub fn clear(&mut self) {
        self.counts.clear();
    }
}
