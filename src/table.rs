//! A sorted associative table keyed by [`Handle`].
//!
//! Keys and values live in two parallel dense vectors, keys strictly increasing.
//! Iteration is cache friendly and lookups are a binary search. Inserting a key
//! greater than every present key is an amortized O(1) append; any other insertion
//! shifts the tail. Since handles are issued monotonically, binding components to
//! freshly created entities almost always takes the append path.

use crate::handle::Handle;
use std::iter::{Copied, Zip};
use std::slice;

/// Ordered `(handle, value)` pairs with unique keys.
#[derive(Clone, Debug)]
pub struct SortedTable<T> {
    keys: Vec<Handle>,
    values: Vec<T>,
}

pub type Iter<'a, T> = Zip<Copied<slice::Iter<'a, Handle>>, slice::Iter<'a, T>>;
pub type IterMut<'a, T> = Zip<Copied<slice::Iter<'a, Handle>>, slice::IterMut<'a, T>>;

impl<T> SortedTable<T> {
    pub const fn new() -> Self {
        SortedTable {
            keys: Vec::new(),
            values: Vec::new(),
        }
    }

    pub fn with_capacity(capacity: usize) -> Self {
        SortedTable {
            keys: Vec::with_capacity(capacity),
            values: Vec::with_capacity(capacity),
        }
    }

    /// Locates `key` for insertion, skipping the binary search when `key` is maximal.
    #[inline]
    fn search_for_insert(&self, key: Handle) -> Result<usize, usize> {
        match self.keys.last() {
            None => Err(0),
            Some(&last) if last < key => Err(self.keys.len()),
            Some(_) => self.keys.binary_search(&key),
        }
    }

    #[inline]
    fn insert_at(&mut self, row: usize, key: Handle, value: T) -> &mut T {
        if row == self.keys.len() {
            self.keys.push(key);
            self.values.push(value);
        } else {
            self.keys.insert(row, key);
            self.values.insert(row, value);
        }
        &mut self.values[row]
    }

    /// Returns the row of `key` if present.
    #[inline]
    pub fn row_of(&self, key: Handle) -> Option<usize> {
        self.keys.binary_search(&key).ok()
    }

    /// Inserts the value produced by `f` if `key` is absent.
    /// Returns a reference to the value at `key` and whether an insertion took place.
    /// `f` is not called if `key` is already present.
    pub fn insert_or_get_with<F: FnOnce() -> T>(&mut self, key: Handle, f: F) -> (&mut T, bool) {
        match self.search_for_insert(key) {
            Ok(row) => (&mut self.values[row], false),
            Err(row) => (self.insert_at(row, key, f()), true),
        }
    }

    /// Inserts `value` if `key` is absent, otherwise leaves the present value untouched.
    /// Returns a reference to the value at `key` and whether an insertion took place.
    pub fn insert_or_get(&mut self, key: Handle, value: T) -> (&mut T, bool) {
        self.insert_or_get_with(key, || value)
    }

    /// Inserts `value` if `key` is absent, otherwise overwrites the present value.
    /// Returns a reference to the value at `key` and whether an insertion took place
    /// (`false` when the value was overwritten).
    pub fn insert_or_assign(&mut self, key: Handle, value: T) -> (&mut T, bool) {
        match self.search_for_insert(key) {
            Ok(row) => {
                let slot = &mut self.values[row];
                *slot = value;
                (slot, false)
            }
            Err(row) => (self.insert_at(row, key, value), true),
        }
    }

    /// Inserts `value` without checking whether `key` is already present.
    ///
    /// The caller must guarantee that `key` is absent. Inserting a present key
    /// leaves the table with duplicate keys, after which lookups and queries
    /// give unspecified results.
    pub fn insert_unchecked(&mut self, key: Handle, value: T) -> &mut T {
        let row = match self.search_for_insert(key) {
            Ok(row) | Err(row) => row,
        };
        self.insert_at(row, key, value)
    }

    /// Removes the value at `key` and returns it.
    pub fn remove(&mut self, key: Handle) -> Option<T> {
        let row = self.row_of(key)?;
        self.keys.remove(row);
        Some(self.values.remove(row))
    }

    /// Removes the value at `key`. Returns `true` if `key` was present.
    pub fn erase(&mut self, key: Handle) -> bool {
        self.remove(key).is_some()
    }

    pub fn find(&self, key: Handle) -> Option<&T> {
        let row = self.row_of(key)?;
        Some(&self.values[row])
    }

    pub fn find_mut(&mut self, key: Handle) -> Option<&mut T> {
        let row = self.row_of(key)?;
        Some(&mut self.values[row])
    }

    pub fn contains(&self, key: Handle) -> bool {
        self.row_of(key).is_some()
    }

    /// Keeps only the pairs for which `f` returns `true`, preserving order.
    pub fn retain<F: FnMut(Handle, &mut T) -> bool>(&mut self, mut f: F) {
        let mut compact = Compact {
            keys: &mut self.keys,
            values: &mut self.values,
            read: 0,
            write: 0,
        };

        while compact.read < compact.keys.len() {
            let row = compact.read;
            if f(compact.keys[row], &mut compact.values[row]) {
                compact.keys.swap(compact.write, row);
                compact.values.swap(compact.write, row);
                compact.write += 1;
            }
            compact.read += 1;
        }
    }

    /// Returns an iterator over `(key, &value)` pairs in increasing key order.
    pub fn iter(&self) -> Iter<'_, T> {
        self.keys.iter().copied().zip(self.values.iter())
    }

    /// Returns an iterator over `(key, &mut value)` pairs in increasing key order.
    pub fn iter_mut(&mut self) -> IterMut<'_, T> {
        self.keys.iter().copied().zip(self.values.iter_mut())
    }

    /// Returns all keys in increasing order.
    pub fn keys(&self) -> &[Handle] {
        &self.keys
    }

    /// Returns all values, ordered by their keys.
    pub fn values(&self) -> &[T] {
        &self.values
    }

    pub fn values_mut(&mut self) -> &mut [T] {
        &mut self.values
    }

    /// Returns the key slice together with a pointer to the first value.
    pub(crate) fn raw_parts_mut(&mut self) -> (&[Handle], *mut T) {
        (&self.keys, self.values.as_mut_ptr())
    }

    pub fn first_key(&self) -> Option<Handle> {
        self.keys.first().copied()
    }

    pub fn last_key(&self) -> Option<Handle> {
        self.keys.last().copied()
    }

    pub fn len(&self) -> usize {
        self.keys.len()
    }

    pub fn is_empty(&self) -> bool {
        self.keys.is_empty()
    }

    pub fn capacity(&self) -> usize {
        self.keys.capacity().min(self.values.capacity())
    }

    /// Reserves capacity for at least `additional` more pairs.
    pub fn reserve(&mut self, additional: usize) {
        self.keys.reserve(additional);
        self.values.reserve(additional);
    }

    pub fn clear(&mut self) {
        self.keys.clear();
        self.values.clear();
    }
}

/// Rows `write..read` hold rejected pairs. Dropping removes them from both vectors,
/// so the table stays consistent even if the predicate of `retain` panics.
struct Compact<'a, T> {
    keys: &'a mut Vec<Handle>,
    values: &'a mut Vec<T>,
    read: usize,
    write: usize,
}

impl<T> Drop for Compact<'_, T> {
    fn drop(&mut self) {
        self.keys.drain(self.write..self.read);
        self.values.drain(self.write..self.read);
    }
}

impl<T> Default for SortedTable<T> {
    fn default() -> Self {
        Self::new()
    }
}

impl<T> FromIterator<(Handle, T)> for SortedTable<T> {
    /// Collects pairs, keeping the first value of every repeated key.
    fn from_iter<I: IntoIterator<Item = (Handle, T)>>(iter: I) -> Self {
        let iter = iter.into_iter();
        let mut table = Self::with_capacity(iter.size_hint().0);
        for (key, value) in iter {
            table.insert_or_get(key, value);
        }
        table
    }
}

impl<'a, T> IntoIterator for &'a SortedTable<T> {
    type Item = (Handle, &'a T);
    type IntoIter = Iter<'a, T>;

    fn into_iter(self) -> Self::IntoIter {
        self.iter()
    }
}

impl<'a, T> IntoIterator for &'a mut SortedTable<T> {
    type Item = (Handle, &'a mut T);
    type IntoIter = IterMut<'a, T>;

    fn into_iter(self) -> Self::IntoIter {
        self.iter_mut()
    }
}

#[cfg(feature = "rayon")]
mod parallel {
    use super::SortedTable;
    use crate::handle::Handle;
    use rayon::prelude::*;

    impl<T: Sync> SortedTable<T> {
        /// Returns a parallel iterator over `(key, &value)` pairs.
        pub fn par_iter(&self) -> impl IndexedParallelIterator<Item = (Handle, &T)> + '_ {
            self.keys.par_iter().copied().zip(self.values.par_iter())
        }
    }

    impl<T: Send> SortedTable<T> {
        /// Returns a parallel iterator that allows modifying each value.
        pub fn par_values_mut(&mut self) -> rayon::slice::IterMut<'_, T> {
            self.values.par_iter_mut()
        }
    }

}

#[cfg(test)]
mod tests {
    use super::*;
    use rand::Rng;
    use std::collections::BTreeMap;

    fn table_with_two() -> SortedTable<String> {
        let mut table = SortedTable::new();
        table.insert_or_get(2, "2".to_string());
        table
    }

    fn assert_strictly_sorted<T>(table: &SortedTable<T>) {
        assert!(table.keys().windows(2).all(|w| w[0] < w[1]));
        assert_eq!(table.keys().len(), table.values().len());
    }

    #[test]
    fn inserts_at_front_end_and_center() {
        for key in [1, 3] {
            let mut table = table_with_two();
            let (value, inserted) = table.insert_or_get(key, key.to_string());
            assert!(inserted);
            assert_eq!(*value, key.to_string());
            assert_strictly_sorted(&table);
        }

        let mut table = table_with_two();
        table.insert_or_assign(1, "1".to_string());
        table.insert_unchecked(4, "4".to_string());
        let (value, inserted) = table.insert_or_get(3, "3".to_string());
        assert!(inserted);
        assert_eq!(value, "3");
        assert_eq!(table.keys(), &[1, 2, 3, 4]);
        assert_strictly_sorted(&table);
    }

    #[test]
    fn insert_or_get_never_overwrites() {
        let mut table = table_with_two();
        let (value, inserted) = table.insert_or_get(2, "0".to_string());

        assert!(!inserted);
        assert_eq!(value, "2");
        assert_eq!(table.len(), 1);
    }

    #[test]
    fn insert_or_get_with_constructs_lazily() {
        let mut table = table_with_two();
        let (_, inserted) = table.insert_or_get_with(2, || unreachable!());
        assert!(!inserted);

        let (value, inserted) = table.insert_or_get_with(5, String::new);
        assert!(inserted);
        assert!(value.is_empty());
    }

    #[test]
    fn insert_or_assign_overwrites() {
        let mut table = table_with_two();
        let (value, inserted) = table.insert_or_assign(2, "0".to_string());

        assert!(!inserted);
        assert_eq!(value, "0");
        assert_eq!(table.find(2).map(String::as_str), Some("0"));
    }

    #[test]
    fn unchecked_insertion_keeps_order() {
        let mut table = SortedTable::new();
        for key in [5, 1, 9, 3, 7] {
            table.insert_unchecked(key, key);
        }
        assert_eq!(table.keys(), &[1, 3, 5, 7, 9]);
        assert_eq!(table.values(), &[1, 3, 5, 7, 9]);
    }

    #[test]
    fn find_and_erase() {
        let mut table = table_with_two();

        *table.find_mut(2).unwrap() = "changed".to_string();
        assert_eq!(table.find(2).unwrap(), "changed");
        assert!(table.contains(2));
        assert!(table.find(0).is_none());

        assert!(!table.erase(0));
        assert_eq!(table.len(), 1);
        assert!(table.erase(2));
        assert!(table.is_empty());
        assert!(!table.erase(2));
    }

    #[test]
    fn iterates_in_key_order() {
        let mut table = table_with_two();
        table.insert_or_get(1, "1".to_string());
        table.insert_or_get(4, "4".to_string());
        table.insert_or_get(3, "3".to_string());

        for (i, (key, value)) in table.iter().enumerate() {
            assert_eq!(key, i as Handle + 1);
            assert_eq!(*value, key.to_string());
        }

        for (key, value) in &mut table {
            value.push_str(&key.to_string());
        }
        assert_eq!(table.find(3).unwrap(), "33");
    }

    #[test]
    fn retain_removes_matching_pairs() {
        let mut table: SortedTable<u32> = (0..10).map(|k| (k, k as u32 * 10)).collect();
        table.retain(|key, value| {
            *value += 1;
            key % 3 != 0
        });

        assert_eq!(table.keys(), &[1, 2, 4, 5, 7, 8]);
        assert_eq!(table.values(), &[11, 21, 41, 51, 71, 81]);
    }

    #[test]
    fn retain_stays_consistent_when_the_predicate_panics() {
        let mut table: SortedTable<u32> = (0..10).map(|k| (k, k as u32)).collect();

        let result = std::panic::catch_unwind(std::panic::AssertUnwindSafe(|| {
            table.retain(|key, _| {
                assert!(key < 5, "stop");
                key % 2 == 1
            })
        }));
        assert!(result.is_err());

        assert_strictly_sorted(&table);
        assert_eq!(table.keys(), &[1, 3, 5, 6, 7, 8, 9]);
        assert_eq!(table.values(), &[1, 3, 5, 6, 7, 8, 9]);
        assert_eq!(table.find(9), Some(&9));
    }

    #[test]
    fn clear_and_reserve() {
        let mut table = table_with_two();
        table.reserve(100);
        assert!(table.capacity() >= 101);

        table.clear();
        assert!(table.is_empty());
        assert_eq!(table.first_key(), None);
    }

    #[test]
    fn random_operations_keep_the_table_sorted() {
        let mut rng = rand::thread_rng();
        let mut table = SortedTable::new();
        let mut reference = BTreeMap::new();

        for _ in 0..5000 {
            let key: Handle = rng.gen_range(0..256);
            let value: u32 = rng.gen();

            match rng.gen_range(0..4) {
                0 => {
                    let (_, inserted) = table.insert_or_get(key, value);
                    assert_eq!(inserted, !reference.contains_key(&key));
                    reference.entry(key).or_insert(value);
                }
                1 => {
                    let (_, inserted) = table.insert_or_assign(key, value);
                    assert_eq!(inserted, reference.insert(key, value).is_none());
                }
                2 => {
                    if !reference.contains_key(&key) {
                        table.insert_unchecked(key, value);
                        reference.insert(key, value);
                    }
                }
                _ => assert_eq!(table.erase(key), reference.remove(&key).is_some()),
            }

            assert_strictly_sorted(&table);
        }

        let expected: Vec<_> = reference.iter().map(|(k, v)| (*k, v)).collect();
        let actual: Vec<_> = table.iter().collect();
        assert_eq!(actual, expected);
        assert_eq!(table.first_key(), reference.keys().next().copied());
        assert_eq!(table.last_key(), reference.keys().last().copied());
    }
}
