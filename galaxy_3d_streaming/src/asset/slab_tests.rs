use super::*;

fn no_evict(_: AssetId) {
    panic!("unexpected eviction");
}

/// Four 256-byte slots filling a 1 KiB slab, all loaded and owned by ids 0..4
fn full_slab() -> (SlabAllocator, Vec<SlotId>) {
    let mut slab = SlabAllocator::new(1024);
    let slots: Vec<SlotId> = (0..4)
        .map(|i| {
            let slot = slab.acquire(256, no_evict).unwrap();
            slab.set_owner(slot, Some(AssetId(i)));
            slab.set_state(slot, SlotState::Loaded);
            slot
        })
        .collect();
    slab.validate().unwrap();
    (slab, slots)
}

// ============================================================================
// Allocation
// ============================================================================

#[test]
fn test_new_slab_is_one_empty_slot() {
    let slab = SlabAllocator::new(4096);
    slab.validate().unwrap();
    assert_eq!(slab.ring().len(), 1);
    assert_eq!(slab.usage().empty, 1);
    assert_eq!(slab.usage().bytes_in_use, 0);
}

#[test]
fn test_acquire_splits_and_marks_loading() {
    let mut slab = SlabAllocator::new(4096);
    let slot = slab.acquire(1000, no_evict).unwrap();

    assert_eq!(slab.state(slot), SlotState::Loading);
    assert_eq!(slab.range(slot), (0, 1000));
    assert_eq!(slab.ring().len(), 2);
    // Touched: the allocation sits at the tail, the remainder at the head
    assert_eq!(*slab.ring().last().unwrap(), slot);
    assert_eq!(slab.usage().bytes_in_use, 1000);
    slab.validate().unwrap();
}

#[test]
fn test_acquire_exact_fit_does_not_split() {
    let mut slab = SlabAllocator::new(512);
    let slot = slab.acquire(512, no_evict).unwrap();
    assert_eq!(slab.range(slot), (0, 512));
    assert_eq!(slab.ring().len(), 1);
    slab.validate().unwrap();
}

#[test]
fn test_acquire_larger_than_slab_fails() {
    let mut slab = SlabAllocator::new(512);
    assert!(slab.acquire(513, no_evict).is_none());
    slab.validate().unwrap();
}

#[test]
fn test_zero_size_acquire() {
    let mut slab = SlabAllocator::new(512);
    let slot = slab.acquire(0, no_evict).unwrap();
    assert_eq!(slab.range(slot).1, 0);
    slab.validate().unwrap();
}

#[test]
fn test_loading_slots_are_never_evicted() {
    let mut slab = SlabAllocator::new(1024);
    for _ in 0..4 {
        slab.acquire(256, no_evict).unwrap();
    }
    assert!(slab.acquire(1, no_evict).is_none());
    assert_eq!(slab.usage().loading, 4);
    slab.validate().unwrap();
}

// ============================================================================
// Eviction and coalescing
// ============================================================================

#[test]
fn test_loaded_slots_evicted_in_ring_order() {
    let (mut slab, slots) = full_slab();

    let mut evicted = Vec::new();
    let slot = slab.acquire(256, |owner| evicted.push(owner)).unwrap();

    // The least recently touched slot goes first
    assert_eq!(evicted, vec![AssetId(0)]);
    assert_eq!(slot, slots[0]);
    assert_eq!(slab.owner(slot), None);
    assert_eq!(slab.evictions(), 1);
    slab.validate().unwrap();
}

#[test]
fn test_touch_protects_from_next_eviction() {
    let (mut slab, slots) = full_slab();
    slab.touch(slots[0]);
    assert_eq!(*slab.ring().last().unwrap(), slots[0]);

    let mut evicted = Vec::new();
    slab.acquire(256, |owner| evicted.push(owner)).unwrap();
    assert_eq!(evicted, vec![AssetId(1)]);
    slab.validate().unwrap();
}

#[test]
fn test_pinned_slots_are_skipped() {
    let (mut slab, slots) = full_slab();
    slab.pin(slots[0]);
    slab.pin(slots[1]);

    let mut evicted = Vec::new();
    slab.acquire(256, |owner| evicted.push(owner)).unwrap();
    assert_eq!(evicted, vec![AssetId(2)]);
    assert_eq!(slab.state(slots[0]), SlotState::Loaded);

    slab.unpin(slots[0]);
    slab.unpin(slots[1]);
    assert_eq!(slab.pins(slots[0]), 0);
    slab.validate().unwrap();
}

#[test]
fn test_released_neighbours_coalesce() {
    let (mut slab, slots) = full_slab();
    slab.pin(slots[0]);
    slab.release(slots[1]);
    slab.release(slots[2]);

    // Two adjacent 256-byte holes merge into one 512-byte slot, nothing evicted
    let slot = slab.acquire(512, no_evict).unwrap();
    assert_eq!(slab.range(slot), (256, 512));
    assert_eq!(slab.state(slots[3]), SlotState::Loaded);
    assert_eq!(slab.ring().len(), 3);
    slab.unpin(slots[0]);
    slab.validate().unwrap();
}

#[test]
fn test_full_wrap_without_space_fails() {
    let (mut slab, slots) = full_slab();
    for slot in &slots {
        slab.pin(*slot);
    }
    assert!(slab.acquire(1, no_evict).is_none());
    slab.validate().unwrap();
}

// ============================================================================
// Barriers
// ============================================================================

#[test]
fn test_barrier_halts_scan_without_eviction() {
    let mut slab = SlabAllocator::new(1024);
    let barrier = slab.acquire_barrier();

    let a = slab.acquire(512, no_evict).unwrap();
    let b = slab.acquire(512, no_evict).unwrap();
    slab.set_owner(a, Some(AssetId(0)));
    slab.set_owner(b, Some(AssetId(1)));
    slab.set_state(a, SlotState::Loaded);
    slab.set_state(b, SlotState::Loaded);
    slab.validate().unwrap();

    // Both slots were touched after the barrier; reaching them means crossing it
    assert!(slab.acquire(256, no_evict).is_none());
    assert_eq!(slab.state(a), SlotState::Loaded);
    assert_eq!(slab.state(b), SlotState::Loaded);
    assert_eq!(slab.state(barrier), SlotState::Barrier);

    slab.release_barrier(barrier);
    slab.validate().unwrap();

    let mut evicted = 0;
    let slot = slab.acquire(256, |_| evicted += 1).unwrap();
    assert_eq!(evicted, 1);
    assert_eq!(slab.evictions(), 1);
    assert_eq!(slab.range(slot).1, 256);
    slab.validate().unwrap();
}

#[test]
fn test_slots_before_barrier_remain_evictable() {
    let (mut slab, _) = full_slab();
    let barrier = slab.acquire_barrier();

    let mut evicted = Vec::new();
    assert!(slab.acquire(256, |owner| evicted.push(owner)).is_some());
    assert_eq!(evicted, vec![AssetId(0)]);

    assert_eq!(slab.usage().barriers, 1);
    slab.release_barrier(barrier);
    assert_eq!(slab.usage().barriers, 0);
    slab.validate().unwrap();
}

#[test]
fn test_barrier_at_head_fails_immediately() {
    let mut slab = SlabAllocator::new(1024);
    let barrier = slab.acquire_barrier();
    slab.acquire(1024, no_evict).unwrap();
    assert_eq!(slab.ring()[0], barrier);
    assert!(slab.acquire(1, no_evict).is_none());
    slab.release_barrier(barrier);
    slab.validate().unwrap();
}

#[test]
#[should_panic(expected = "is not a barrier")]
fn test_release_barrier_rejects_regular_slot() {
    let mut slab = SlabAllocator::new(1024);
    let slot = slab.acquire(10, no_evict).unwrap();
    slab.release_barrier(slot);
}

// ============================================================================
// Invariants under mixed operations
// ============================================================================

#[test]
fn test_invariants_hold_for_mixed_sequence() {
    let mut slab = SlabAllocator::new(64 * 1024);
    // Allocations still owned, keyed by owner so recycled slot ids drop out
    let mut live: Vec<(SlotId, AssetId)> = Vec::new();
    let mut barriers: Vec<SlotId> = Vec::new();
    let mut next_owner = 0u32;
    let mut state: u64 = 0x853C_49E6_748F_EA9B;

    for step in 0..5000 {
        state = state.wrapping_mul(6364136223846793005).wrapping_add(1442695040888963407);
        let roll = (state >> 33) as u32;

        match roll % 8 {
            0..=3 => {
                let size = (roll >> 4) as u64 % 8192;
                if let Some(slot) = slab.acquire(size, |_| {}) {
                    let owner = AssetId(next_owner);
                    next_owner += 1;
                    slab.set_owner(slot, Some(owner));
                    live.push((slot, owner));
                }
                live.retain(|(slot, owner)| slab.owner(*slot) == Some(*owner));
            }
            4 => {
                if let Some((slot, _)) = live.iter().find(|(s, _)| slab.state(*s) == SlotState::Loading) {
                    slab.set_state(*slot, SlotState::Loaded);
                }
            }
            5 => {
                if !live.is_empty() {
                    let (slot, _) = live.swap_remove(roll as usize % live.len());
                    slab.release(slot);
                }
            }
            6 => {
                if !live.is_empty() {
                    slab.touch(live[roll as usize % live.len()].0);
                }
            }
            _ => {
                if barriers.len() < 2 && roll % 3 == 0 {
                    barriers.push(slab.acquire_barrier());
                } else if let Some(barrier) = barriers.pop() {
                    slab.release_barrier(barrier);
                }
            }
        }

        if let Err(msg) = slab.validate() {
            panic!("step {}: {}", step, msg);
        }
    }
    assert!(next_owner > 0);
}
