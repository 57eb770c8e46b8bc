//! Insertion-ordered secondary index of record ids.
//!
//! Ids are stored in slots. Removing an id tombstones its slot instead of
//! shifting later ids, so positions handed out to external callers stay
//! valid and enumeration order is insertion order.

use std::collections::HashMap;
use std::hash::Hash;

use openvest_types::{OpenvestError, Result, constants::MAX_PAGE_SIZE};

/// Validate a `[start, end)` page request and clamp it to the page limit.
///
/// # Errors
/// `InvalidParameter` if `end < start`.
pub fn page_window(start: usize, end: usize) -> Result<(usize, usize)> {
    if end < start {
        return Err(OpenvestError::InvalidParameter {
            reason: format!("page end {end} is before start {start}"),
        });
    }
    Ok((start, end.min(start.saturating_add(MAX_PAGE_SIZE))))
}

/// Secondary index over ids with O(1) push, lookup and removal.
#[derive(Debug, Clone)]
pub struct IdIndex<T> {
    slots: Vec<Option<T>>,
    positions: HashMap<T, usize>,
    live: usize,
}

impl<T: Copy + Eq + Hash> IdIndex<T> {
    #[must_use]
    pub fn new() -> Self {
        Self {
            slots: Vec::new(),
            positions: HashMap::new(),
            live: 0,
        }
    }

    /// Append `id`. Returns `false` if it is already indexed.
    pub fn push(&mut self, id: T) -> bool {
        if self.positions.contains_key(&id) {
            return false;
        }
        self.positions.insert(id, self.slots.len());
        self.slots.push(Some(id));
        self.live += 1;
        true
    }

    /// Tombstone `id`. Returns `false` if it was not indexed.
    ///
    /// Tombstones at the tail are dropped, so positions of live ids never
    /// move and an index that empties from the end stays small.
    pub fn remove(&mut self, id: T) -> bool {
        let Some(pos) = self.positions.remove(&id) else {
            return false;
        };
        self.slots[pos] = None;
        self.live -= 1;
        while matches!(self.slots.last(), Some(None)) {
            self.slots.pop();
        }
        true
    }

    /// Allocated slots, live and tombstoned.
    #[must_use]
    pub fn capacity(&self) -> usize {
        self.slots.len()
    }

    /// Undo the most recent `push(id)`, truncating its slot.
    ///
    /// Falls back to a tombstone if `id` is not the last slot.
    pub fn undo_push(&mut self, id: T) -> bool {
        match self.positions.get(&id) {
            Some(&pos) if pos + 1 == self.slots.len() => {
                self.positions.remove(&id);
                self.slots.pop();
                self.live -= 1;
                true
            }
            Some(_) => self.remove(id),
            None => false,
        }
    }

    #[must_use]
    pub fn contains(&self, id: &T) -> bool {
        self.positions.contains_key(id)
    }

    /// Slot position of `id`, stable for the life of the entry.
    #[must_use]
    pub fn position(&self, id: &T) -> Option<usize> {
        self.positions.get(id).copied()
    }

    /// Number of live ids.
    #[must_use]
    pub fn len(&self) -> usize {
        self.live
    }

    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.live == 0
    }

    /// Live ids in insertion order.
    pub fn iter(&self) -> impl Iterator<Item = T> + '_ {
        self.slots.iter().filter_map(|slot| *slot)
    }

    /// Live ids `[start, end)` counted over live entries only.
    #[must_use]
    pub fn page(&self, start: usize, end: usize) -> Vec<T> {
        if end <= start {
            return Vec::new();
        }
        self.iter().skip(start).take(end - start).collect()
    }
}

impl<T: Copy + Eq + Hash> Default for IdIndex<T> {
    fn default() -> Self {
        Self::new()
    }
}
