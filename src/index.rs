//! # Row Identity Index
//!
//! A [`RowIndex`] is the ordered collection of row identities owned by a
//! table and mirrored by each of its columns. Identities are allocated
//! monotonically from `max + 1` and never reused, which is what lets a
//! selection be correlated back to its ancestor table after arbitrary
//! slicing and merging.
//!
//! ## Caching
//!
//! `position_of` is the hot lookup (selection by identity is quadratic
//! without it), so the identity→position map is built lazily and kept until
//! the sequence mutates. The cached maximum follows the same discipline.
//! Both caches sit behind a mutex purely so `RowIndex` stays `Send + Sync`;
//! there is no internal parallelism.
//!
//! ## Preconditions
//!
//! `position_of` on an absent identity is a programming error, not a
//! recoverable condition: callers are expected to have guaranteed membership
//! through a prior set operation. It panics. Fallible probing goes through
//! [`RowIndex::try_position_of`].

use hashbrown::HashMap;
use parking_lot::Mutex;

/// A stable integer identity for a logical row, independent of position.
pub type RowId = u64;

#[derive(Default)]
struct IndexCache {
    positions: Option<HashMap<RowId, usize>>,
    max: Option<Option<RowId>>,
}

/// Ordered sequence of unique row identities with cached lookups.
pub struct RowIndex {
    ids: Vec<RowId>,
    cache: Mutex<IndexCache>,
}

impl RowIndex {
    /// An index for `count` fresh rows, identified `0..count`.
    pub fn from_count(count: usize) -> Self {
        Self::from_ids((0..count as RowId).collect())
    }

    /// An index over an explicit identity list.
    pub fn from_ids(ids: Vec<RowId>) -> Self {
        Self {
            ids,
            cache: Mutex::new(IndexCache::default()),
        }
    }

    pub fn len(&self) -> usize {
        self.ids.len()
    }

    pub fn is_empty(&self) -> bool {
        self.ids.is_empty()
    }

    pub fn ids(&self) -> &[RowId] {
        &self.ids
    }

    pub fn iter(&self) -> impl Iterator<Item = RowId> + '_ {
        self.ids.iter().copied()
    }

    fn invalidate(&self) {
        let mut cache = self.cache.lock();
        cache.positions = None;
        cache.max = None;
    }

    /// Appends one identity, invalidating the caches.
    pub fn push(&mut self, id: RowId) {
        self.ids.push(id);
        self.invalidate();
    }

    /// Replaces the whole sequence, invalidating the caches.
    pub fn set_ids(&mut self, ids: Vec<RowId>) {
        self.ids = ids;
        self.invalidate();
    }

    /// Drops every identity past `len`, invalidating the caches.
    pub fn truncate(&mut self, len: usize) {
        self.ids.truncate(len);
        self.invalidate();
    }

    /// Position of `id`, building or reusing the cached map.
    ///
    /// # Panics
    ///
    /// Panics when `id` is not a member; membership is a precondition.
    pub fn position_of(&self, id: RowId) -> usize {
        match self.try_position_of(id) {
            Some(pos) => pos,
            None => panic!("row id {} is not a member of this index", id),
        }
    }

    /// Position of `id`, or `None` when absent.
    pub fn try_position_of(&self, id: RowId) -> Option<usize> {
        let mut cache = self.cache.lock();
        let map = cache.positions.get_or_insert_with(|| {
            self.ids
                .iter()
                .enumerate()
                .map(|(pos, id)| (*id, pos))
                .collect()
        });
        map.get(&id).copied()
    }

    pub fn contains(&self, id: RowId) -> bool {
        self.try_position_of(id).is_some()
    }

    /// Current maximum identity, cached until the next mutation.
    pub fn max_id(&self) -> Option<RowId> {
        let mut cache = self.cache.lock();
        *cache
            .max
            .get_or_insert_with(|| self.ids.iter().copied().max())
    }

    /// Appends `count` fresh identities (allocated from `max + 1`) and
    /// returns them.
    pub fn extend_fresh(&mut self, count: usize) -> Vec<RowId> {
        let start = self.max_id().map_or(0, |m| m + 1);
        let fresh: Vec<RowId> = (start..start + count as RowId).collect();
        self.ids.extend_from_slice(&fresh);
        self.invalidate();
        fresh
    }

    /// A new index over the positions `range`.
    pub fn slice_range(&self, range: std::ops::Range<usize>) -> Self {
        Self::from_ids(self.ids[range].to_vec())
    }

    /// A new index gathering the given positions, in their given order.
    pub fn gather_positions(&self, positions: &[usize]) -> Self {
        Self::from_ids(positions.iter().map(|&p| self.ids[p]).collect())
    }

    /// Identities present in both indices, ascending.
    pub fn intersect(&self, other: &RowIndex) -> Vec<RowId> {
        let mut out: Vec<RowId> = self
            .ids
            .iter()
            .copied()
            .filter(|&id| other.contains(id))
            .collect();
        out.sort_unstable();
        out
    }

    /// Identities present in either index, ascending.
    pub fn union(&self, other: &RowIndex) -> Vec<RowId> {
        let mut out: Vec<RowId> = self.ids.clone();
        out.extend(other.ids.iter().copied().filter(|&id| !self.contains(id)));
        out.sort_unstable();
        out
    }

    /// Identities present in exactly one of the indices, ascending.
    pub fn symdiff(&self, other: &RowIndex) -> Vec<RowId> {
        let mut out: Vec<RowId> = self
            .ids
            .iter()
            .copied()
            .filter(|&id| !other.contains(id))
            .collect();
        out.extend(other.ids.iter().copied().filter(|&id| !self.contains(id)));
        out.sort_unstable();
        out
    }
}

impl Clone for RowIndex {
    fn clone(&self) -> Self {
        Self::from_ids(self.ids.clone())
    }
}

impl PartialEq for RowIndex {
    fn eq(&self, other: &Self) -> bool {
        self.ids == other.ids
    }
}

impl std::fmt::Debug for RowIndex {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_tuple("RowIndex").field(&self.ids).finish()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn from_count_produces_contiguous_ids() {
        let idx = RowIndex::from_count(4);
        assert_eq!(idx.ids(), &[0, 1, 2, 3]);
        assert_eq!(idx.max_id(), Some(3));
    }

    #[test]
    fn position_cache_survives_reads_and_resets_on_mutation() {
        let mut idx = RowIndex::from_ids(vec![5, 3, 9]);
        assert_eq!(idx.position_of(9), 2);
        assert_eq!(idx.position_of(5), 0);
        idx.push(7);
        assert_eq!(idx.position_of(7), 3);
        assert_eq!(idx.max_id(), Some(9));
        idx.truncate(2);
        assert_eq!(idx.max_id(), Some(5));
        assert!(!idx.contains(9));
    }

    #[test]
    #[should_panic(expected = "not a member")]
    fn position_of_absent_id_is_a_precondition_violation() {
        RowIndex::from_count(2).position_of(99);
    }

    #[test]
    fn fresh_ids_allocate_from_current_max() {
        let mut idx = RowIndex::from_count(0);
        idx.extend_fresh(5);
        idx.truncate(2);
        assert_eq!(idx.ids(), &[0, 1]);
        let fresh = idx.extend_fresh(1);
        assert_eq!(fresh, vec![2]);
        assert_eq!(idx.ids(), &[0, 1, 2]);
    }

    #[test]
    fn set_operations_sort_ascending() {
        let a = RowIndex::from_ids(vec![4, 1, 3]);
        let b = RowIndex::from_ids(vec![3, 5, 1]);
        assert_eq!(a.intersect(&b), vec![1, 3]);
        assert_eq!(a.union(&b), vec![1, 3, 4, 5]);
        assert_eq!(a.symdiff(&b), vec![4, 5]);
    }
}
