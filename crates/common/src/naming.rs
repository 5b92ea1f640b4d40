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

//! Name-sorted indices over arbitrary name-keyed collections
//!
//! The sort is a shell sort over a fixed gap sequence, so the resulting order
//! depends only on the names and the input order, never on the platform's
//! standard library sort implementation. Lookups come in two flavours:
//! [`NameIndex::lookup_required`] for names an internal invariant guarantees,
//! and [`NameIndex::lookup_optional`] for names supplied from outside (a log
//! may be stale).

use std::cmp::Ordering;

use crate::{LookupKind, TtdError, TtdResult};

/// Gap sequence of the shell sort
pub const SHELL_SORT_GAPS: [usize; 8] = [701, 301, 132, 57, 23, 10, 4, 1];

/// Sort `items` in place with the fixed-gap shell sort
pub fn shell_sort_by<T, F>(items: &mut [T], mut cmp: F)
where
    F: FnMut(&T, &T) -> Ordering,
{
    let len = items.len();
    for gap in SHELL_SORT_GAPS {
        for i in gap..len {
            let mut j = i;
            while j >= gap && cmp(&items[j - gap], &items[j]) == Ordering::Greater {
                items.swap(j - gap, j);
                j -= gap;
            }
        }
    }
}

/// Lower-bound binary search over a sorted slice, comparing each item against the key
///
/// Returns the first position whose item does not compare less than the key,
/// clamped to the last element. The slice must not be empty.
fn lower_bound_by<T, F>(items: &[T], mut cmp_to_key: F) -> usize
where
    F: FnMut(&T) -> Ordering,
{
    let mut lo = 0;
    let mut hi = items.len() - 1;
    while lo < hi {
        let mid = lo + (hi - lo) / 2;
        if cmp_to_key(&items[mid]) == Ordering::Less {
            lo = mid + 1;
        } else {
            hi = mid;
        }
    }
    lo
}

/// A collection sorted by the names `name_of` assigns to its items
#[derive(Debug, Clone)]
pub struct NameIndex<T> {
    items: Vec<T>,
}

impl<T> Default for NameIndex<T> {
    fn default() -> Self {
        Self { items: Vec::new() }
    }
}

impl<T> NameIndex<T> {
    /// Sort `items` by name
    pub fn build<F>(mut items: Vec<T>, name_of: F) -> Self
    where
        F: Fn(&T) -> &str,
    {
        shell_sort_by(&mut items, |a, b| name_of(a).cmp(name_of(b)));
        Self { items }
    }

    /// Number of indexed items
    pub fn len(&self) -> usize {
        self.items.len()
    }

    /// Whether the index is empty
    pub fn is_empty(&self) -> bool {
        self.items.is_empty()
    }

    /// Items in name order
    pub fn items(&self) -> &[T] {
        &self.items
    }

    /// Item at `position`
    pub fn get(&self, position: usize) -> Option<&T> {
        self.items.get(position)
    }

    /// Position of `key`, which must be present
    ///
    /// An empty index or a missing key is an invariant violation.
    pub fn lookup_required<F>(&self, key: &str, name_of: F) -> TtdResult<usize>
    where
        F: Fn(&T) -> &str,
    {
        if self.items.is_empty() {
            return Err(TtdError::invariant(format!("required lookup of `{key}` in an empty name index")));
        }

        let pos = lower_bound_by(&self.items, |item| name_of(item).cmp(key));
        if name_of(&self.items[pos]) != key {
            return Err(TtdError::invariant(format!("required name `{key}` missing from name index")));
        }

        Ok(pos)
    }

    /// Position of `key`, or `None` if absent
    pub fn lookup_optional<F>(&self, key: &str, name_of: F) -> Option<usize>
    where
        F: Fn(&T) -> &str,
    {
        if self.items.is_empty() {
            return None;
        }

        let pos = lower_bound_by(&self.items, |item| name_of(item).cmp(key));
        (name_of(&self.items[pos]) == key).then_some(pos)
    }

    /// Like [`NameIndex::lookup_optional`] but reported as a [`TtdError::NotFound`]
    pub fn lookup<F>(&self, key: &str, name_of: F) -> TtdResult<usize>
    where
        F: Fn(&T) -> &str,
    {
        self.lookup_optional(key, name_of).ok_or_else(|| TtdError::not_found(LookupKind::Name, key))
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn name(item: &(String, u32)) -> &str {
        &item.0
    }

    fn make(names: &[&str]) -> Vec<(String, u32)> {
        names.iter().enumerate().map(|(i, n)| (n.to_string(), i as u32)).collect()
    }

    #[test]
    fn test_shell_sort_orders_names() {
        let index = NameIndex::build(make(&["delta", "alpha", "charlie", "bravo"]), name);
        let names: Vec<&str> = index.items().iter().map(name).collect();
        assert_eq!(names, vec!["alpha", "bravo", "charlie", "delta"]);
    }

    #[test]
    fn test_shell_sort_uses_large_gaps() {
        // Enough items that every gap in the sequence is exercised
        let mut values: Vec<u32> = (0..2000).map(|i| (i * 7919) % 2003).collect();
        shell_sort_by(&mut values, |a, b| a.cmp(b));
        assert!(values.windows(2).all(|w| w[0] <= w[1]));
    }

    #[test]
    fn test_required_lookup_finds_every_name() {
        let names: Vec<String> = (0..300).map(|i| format!("name{:04}", (i * 37) % 300)).collect();
        let items: Vec<(String, u32)> =
            names.iter().enumerate().map(|(i, n)| (n.clone(), i as u32)).collect();
        let index = NameIndex::build(items, name);

        for key in &names {
            let pos = index.lookup_required(key, name).unwrap();
            assert_eq!(name(index.get(pos).unwrap()), key);
        }
    }

    #[test]
    fn test_optional_lookup_reports_absent() {
        let index = NameIndex::build(make(&["b", "d", "f"]), name);
        assert_eq!(index.lookup_optional("d", name), Some(1));
        for absent in ["a", "c", "e", "g"] {
            assert_eq!(index.lookup_optional(absent, name), None);
        }
        assert!(matches!(index.lookup("c", name), Err(TtdError::NotFound { .. })));
    }

    #[test]
    fn test_required_lookup_rejects_missing_and_empty() {
        let index = NameIndex::build(make(&["b", "d"]), name);
        assert!(matches!(index.lookup_required("c", name), Err(TtdError::InvariantViolation(_))));

        let empty: NameIndex<(String, u32)> = NameIndex::default();
        assert!(matches!(empty.lookup_required("a", name), Err(TtdError::InvariantViolation(_))));
        assert_eq!(empty.lookup_optional("a", name), None);
    }

    #[test]
    fn test_single_item_index() {
        let index = NameIndex::build(make(&["only"]), name);
        assert_eq!(index.lookup_required("only", name).unwrap(), 0);
        assert_eq!(index.lookup_optional("other", name), None);
    }
}
