//! Sorted k-way intersection of key columns.

use crate::handle::Handle;
use smallvec::{smallvec, SmallVec};

/// The number of columns an intersection keeps its cursors for on the stack.
pub const MAX_INLINE_COLUMNS: usize = 8;

/// Row positions of a matching key, one per column.
pub type Rows = SmallVec<[usize; MAX_INLINE_COLUMNS]>;

/// Calls `visit` for every key present in all `columns`, in strictly increasing
/// key order, passing the key and its row in each column (in column order).
///
/// Every column must be sorted in strictly increasing order. No column is scanned
/// more than once, so the cost is linear in the total number of keys.
/// Does nothing if `columns` is empty.
///
/// # Examples
/// ```
/// use component_store::intersect;
///
/// let a = [1, 3, 4, 5, 8, 9, 10];
/// let b = [2, 3, 4, 7, 8, 9];
///
/// let mut common = vec![];
/// intersect(&[&a, &b], |key, _rows| common.push(key));
/// assert_eq!(common, [3, 4, 8, 9]);
/// ```
pub fn intersect<F>(columns: &[&[Handle]], mut visit: F)
where
    F: FnMut(Handle, &[usize]),
{
    let Some(&candidate) = columns.first().and_then(|keys| keys.first()) else {
        return;
    };
    let mut candidate = candidate;
    let mut cursors: Rows = smallvec![0; columns.len()];

    'pass: loop {
        for (keys, cursor) in columns.iter().zip(cursors.iter_mut()) {
            while *cursor < keys.len() && keys[*cursor] < candidate {
                *cursor += 1;
            }

            match keys.get(*cursor) {
                None => return,
                Some(&key) if key > candidate => {
                    candidate = key;
                    continue 'pass;
                }
                Some(_) => {}
            }
        }

        // Every cursor points at `candidate`.
        visit(candidate, &cursors[..]);

        for cursor in cursors.iter_mut() {
            *cursor += 1;
        }
        match columns[0].get(cursors[0]) {
            Some(&next) => candidate = next,
            None => return,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use rand::Rng;
    use std::collections::BTreeSet;

    fn collect(columns: &[&[Handle]]) -> Vec<Handle> {
        let mut keys = vec![];
        intersect(columns, |key, rows| {
            for (column, &row) in columns.iter().zip(rows) {
                assert_eq!(column[row], key);
            }
            keys.push(key);
        });
        keys
    }

    #[test]
    fn iterates_over_a_lone_column() {
        assert_eq!(collect(&[&[1, 2, 3]]), [1, 2, 3]);
    }

    #[test]
    fn intersects_two_columns() {
        let a = [1, 3, 4, 5, 8, 9, 10];
        let b = [2, 3, 4, 7, 8, 9];
        assert_eq!(collect(&[&a, &b]), [3, 4, 8, 9]);
    }

    #[test]
    fn intersects_three_columns() {
        let a = [1, 2, 3, 4, 6, 7, 8, 9];
        let b = [0, 2, 3, 5, 7, 9];
        let c = [0, 2, 3, 6, 7, 8, 9];
        assert_eq!(collect(&[&a, &b, &c]), [2, 3, 7, 9]);
    }

    #[test]
    fn empty_inputs_yield_nothing() {
        assert!(collect(&[]).is_empty());
        assert!(collect(&[&[1, 2, 3], &[]]).is_empty());
        assert!(collect(&[&[], &[1, 2, 3]]).is_empty());
    }

    #[test]
    fn rows_follow_column_order() {
        let a = [10, 20, 30];
        let b = [5, 20, 25, 30];
        let mut rows = vec![];
        intersect(&[&a, &b], |_, r| rows.push(r.to_vec()));
        assert_eq!(rows, [vec![1, 1], vec![2, 3]]);
    }

    #[test]
    fn matches_set_intersection_on_random_columns() {
        let mut rng = rand::thread_rng();

        for _ in 0..200 {
            let n_columns = rng.gen_range(1..=MAX_INLINE_COLUMNS + 2);
            let sets: Vec<BTreeSet<Handle>> = (0..n_columns)
                .map(|_| {
                    let len = rng.gen_range(0..64);
                    (0..len).map(|_| rng.gen_range(0..96)).collect()
                })
                .collect();

            let columns: Vec<Vec<Handle>> =
                sets.iter().map(|s| s.iter().copied().collect()).collect();
            let slices: Vec<&[Handle]> = columns.iter().map(Vec::as_slice).collect();

            let expected: Vec<Handle> = sets[0]
                .iter()
                .copied()
                .filter(|key| sets.iter().all(|s| s.contains(key)))
                .collect();

            assert_eq!(collect(&slices), expected);
        }
    }
}
