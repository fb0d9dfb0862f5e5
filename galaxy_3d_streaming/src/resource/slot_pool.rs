/// Fixed-capacity pool of resource slots.
///
/// A bitmap over `slot_count` slots of `slot_size` bytes bounds how much
/// resource state can exist at once. A request takes a contiguous run of
/// `ceil(size / slot_size)` slots, searched first-fit from a cursor that wraps
/// once. Releasing a run rewinds the cursor to it so freed space is reused first.

use std::sync::{Mutex, PoisonError};

/// Run of slots held by one resource
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct SlotRange {
    pub first: usize,
    pub count: usize,
}

struct PoolState {
    bits: Vec<u64>,
    cursor: usize,
    used: usize,
}

impl PoolState {
    fn is_set(&self, slot: usize) -> bool {
        self.bits[slot / 64] & (1 << (slot % 64)) != 0
    }

    fn set(&mut self, slot: usize, value: bool) {
        if value {
            self.bits[slot / 64] |= 1 << (slot % 64);
        } else {
            self.bits[slot / 64] &= !(1 << (slot % 64));
        }
    }
}

pub struct ResourceSlotPool {
    slot_size: usize,
    slot_count: usize,
    state: Mutex<PoolState>,
}

impl ResourceSlotPool {
    pub fn new(slot_size: usize, slot_count: usize) -> Self {
        Self {
            slot_size: slot_size.max(1),
            slot_count,
            state: Mutex::new(PoolState {
                bits: vec![0; slot_count.div_ceil(64)],
                cursor: 0,
                used: 0,
            }),
        }
    }

    /// Slots needed to hold `size` bytes (at least one)
    pub fn slots_for(&self, size: usize) -> usize {
        size.div_ceil(self.slot_size).max(1)
    }

    /// Reserve room for `size` bytes. `None` when no contiguous run is free.
    pub fn acquire(&self, size: usize) -> Option<SlotRange> {
        let count = self.slots_for(size);
        if count > self.slot_count {
            return None;
        }

        let mut state = self.state.lock().unwrap_or_else(PoisonError::into_inner);
        let start = state.cursor;
        for step in 0..self.slot_count {
            let first = (start + step) % self.slot_count;
            if first + count > self.slot_count {
                continue;
            }
            if (first..first + count).all(|slot| !state.is_set(slot)) {
                for slot in first..first + count {
                    state.set(slot, true);
                }
                state.used += count;
                state.cursor = (first + count) % self.slot_count;
                return Some(SlotRange { first, count });
            }
        }
        None
    }

    pub fn release(&self, range: SlotRange) {
        let mut state = self.state.lock().unwrap_or_else(PoisonError::into_inner);
        for slot in range.first..range.first + range.count {
            debug_assert!(state.is_set(slot), "releasing free resource slot {}", slot);
            state.set(slot, false);
        }
        state.used -= range.count;
        state.cursor = range.first;
    }

    pub fn slot_size(&self) -> usize {
        self.slot_size
    }

    pub fn capacity(&self) -> usize {
        self.slot_count
    }

    /// Slots currently held
    pub fn used(&self) -> usize {
        self.state.lock().unwrap_or_else(PoisonError::into_inner).used
    }
}

#[cfg(test)]
#[path = "slot_pool_tests.rs"]
mod tests;
