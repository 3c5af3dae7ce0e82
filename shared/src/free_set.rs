use alloc::{vec, vec::Vec};

/// Keeps track of a set of fixed-size slots, each either free or allocated.
///
/// Designed for swap-slot bookkeeping, but nothing in it is swap-specific.
/// A set bit means the slot is free; groups of 64 slots with at least one
/// free slot are kept in a queue so allocation never scans the whole bitmap.
///
/// Fast operations are:
///   - Find a free slot, and mark it as allocated
///   - Mark a (previously-allocated) slot as free.
#[derive(Debug, Clone)]
pub struct FreeSet {
    bitmap: Vec<u64>,
    queue: Vec<u32>,
    capacity: u32,
    free: u32,
}

impl FreeSet {
    /// Create a new FreeSet with every slot free.
    pub fn new_all_free(count: u32) -> Self {
        let group_count = count.div_ceil(64);
        let mut bitmap = vec![u64::MAX; group_count as usize];
        // Mask off bits past `count` in the last group so they can never be
        // handed out.
        if count % 64 != 0 {
            if let Some(last) = bitmap.last_mut() {
                *last = (1u64 << (count % 64)) - 1;
            }
        }
        let queue = (0..group_count).rev().collect();
        Self {
            bitmap,
            queue,
            capacity: count,
            free: count,
        }
    }

    /// Allocate a slot.
    ///
    /// Returns `None` if no slots are available.
    ///
    /// This takes *O(1)* time.
    pub fn allocate(&mut self) -> Option<u32> {
        let group_index = self.queue.pop()?;
        let group = &mut self.bitmap[group_index as usize];
        debug_assert_ne!(*group, 0, "FreeSet consistency error");
        let index_in_group = group.trailing_zeros();
        *group &= !(1 << index_in_group);
        if *group != 0 {
            self.queue.push(group_index);
        }
        self.free -= 1;
        Some(group_index * 64 + index_in_group)
    }

    /// Free a previously-allocated slot.
    ///
    /// In debug mode, this panics if the slot was already free.
    ///
    /// This takes *O(1)* time.
    pub fn free(&mut self, index: u32) {
        assert!(index < self.capacity, "slot {index} out of bounds");
        let group_index = index / 64;
        let index_in_group = index % 64;
        let group = &mut self.bitmap[group_index as usize];
        debug_assert!(
            (*group & (1 << index_in_group)) == 0,
            "FreeSet::free called on already free slot"
        );
        let add = *group == 0;
        *group |= 1 << index_in_group;
        if add {
            self.queue.push(group_index);
        }
        self.free += 1;
    }

    /// Total number of slots in the set.
    pub fn capacity(&self) -> u32 {
        self.capacity
    }

    /// Number of slots currently free.
    pub fn free_count(&self) -> u32 {
        self.free
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn allocate_until_exhausted() {
        let mut set = FreeSet::new_all_free(70);
        let mut seen = alloc::collections::BTreeSet::new();
        for _ in 0..70 {
            let slot = set.allocate().expect("set should not be exhausted yet");
            assert!(slot < 70);
            assert!(seen.insert(slot), "slot {slot} handed out twice");
        }
        assert_eq!(set.allocate(), None);
        assert_eq!(set.free_count(), 0);
    }

    #[test]
    fn free_makes_slot_reusable() {
        let mut set = FreeSet::new_all_free(1);
        let slot = set.allocate().unwrap();
        assert_eq!(set.allocate(), None);
        set.free(slot);
        assert_eq!(set.free_count(), 1);
        assert_eq!(set.allocate(), Some(slot));
    }

    #[test]
    fn counts_track_allocations() {
        let mut set = FreeSet::new_all_free(128);
        assert_eq!(set.capacity(), 128);
        assert_eq!(set.free_count(), 128);
        let a = set.allocate().unwrap();
        let b = set.allocate().unwrap();
        assert_eq!(set.free_count(), 126);
        set.free(a);
        set.free(b);
        assert_eq!(set.free_count(), 128);
    }
}
