/// Slab allocator for the asset cache.
///
/// A fixed byte range is cut into variable-size slots. Slots form two lists:
///
/// - the **ring**: circular, doubly linked, in least-recently-touched order
///   starting at `head`. Allocation scans it and evicts what it passes.
/// - the **physical chain**: `after` links slots in offset order so free
///   neighbours can be coalesced.
///
/// Barrier slots are zero-sized ring members outside the physical chain. A scan
/// that reaches one gives up, so anything touched after the barrier was placed
/// survives until it is released.
///
/// Slot headers live in `slots`, not inside the byte range, so the bytes of all
/// slots always add up to the slab size exactly.

use crate::asset::AssetId;

/// Index of a slot header
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub struct SlotId(u32);

impl SlotId {
    pub fn index(&self) -> usize {
        self.0 as usize
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum SlotState {
    Empty,
    Loading,
    Loaded,
    Barrier,
}

#[derive(Debug, Clone)]
struct Slot {
    offset: u64,
    size: u64,
    state: SlotState,
    prev: u32,
    next: u32,
    /// Physically following slot
    after: Option<u32>,
    owner: Option<AssetId>,
    pins: u32,
    live: bool,
}

/// Per-state slot counts
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct SlabUsage {
    pub empty: usize,
    pub loading: usize,
    pub loaded: usize,
    pub barriers: usize,
    /// Bytes held by loading and loaded slots
    pub bytes_in_use: u64,
}

pub struct SlabAllocator {
    slots: Vec<Slot>,
    free_nodes: Vec<u32>,
    head: u32,
    /// Slot at offset 0; merging never removes it
    first: u32,
    size: u64,
    evictions: u64,
}

impl SlabAllocator {
    /// Create a slab of `size` bytes held by a single empty slot
    pub fn new(size: u64) -> Self {
        Self {
            slots: vec![Slot {
                offset: 0,
                size,
                state: SlotState::Empty,
                prev: 0,
                next: 0,
                after: None,
                owner: None,
                pins: 0,
                live: true,
            }],
            free_nodes: Vec::new(),
            head: 0,
            first: 0,
            size,
            evictions: 0,
        }
    }

    pub fn size(&self) -> u64 {
        self.size
    }

    /// Slots evicted since creation
    pub fn evictions(&self) -> u64 {
        self.evictions
    }

    // ===== ALLOCATION =====

    /// Find room for `size` bytes, evicting unpinned loaded slots on the way.
    ///
    /// The returned slot is in `Loading` state and has been touched. Each
    /// evicted slot's owner is passed to `on_evict`. Returns `None` when a
    /// barrier is reached or the ring has been walked once without success.
    pub fn acquire(&mut self, size: u64, mut on_evict: impl FnMut(AssetId)) -> Option<SlotId> {
        if size > self.size {
            return None;
        }

        let mut start = self.head;
        let mut cur = start;
        loop {
            let slot = &mut self.slots[cur as usize];
            match slot.state {
                SlotState::Barrier => return None,
                SlotState::Loaded if slot.pins == 0 => {
                    slot.state = SlotState::Empty;
                    self.evictions += 1;
                    if let Some(owner) = slot.owner.take() {
                        on_evict(owner);
                    }
                }
                SlotState::Loaded | SlotState::Loading | SlotState::Empty => {}
            }

            if self.slots[cur as usize].state == SlotState::Empty {
                self.coalesce(cur, &mut start);
                if self.slots[cur as usize].size >= size {
                    self.split(cur, size);
                    self.touch(SlotId(cur));
                    self.slots[cur as usize].state = SlotState::Loading;
                    return Some(SlotId(cur));
                }
            }

            cur = self.slots[cur as usize].next;
            if cur == start {
                return None;
            }
        }
    }

    /// Mark a slot empty. Neighbours are merged by a later `acquire`.
    pub fn release(&mut self, slot: SlotId) {
        let s = &mut self.slots[slot.index()];
        debug_assert!(s.live && s.state != SlotState::Barrier, "releasing slot {:?} in state {:?}", slot, s.state);
        debug_assert_eq!(s.pins, 0, "releasing pinned slot {:?}", slot);
        s.state = SlotState::Empty;
        s.owner = None;
    }

    /// Move a slot to the ring tail (most recently used)
    pub fn touch(&mut self, slot: SlotId) {
        let id = slot.0;
        if id == self.head {
            // In a circular ring the head's predecessor is the tail
            self.head = self.slots[id as usize].next;
            return;
        }
        self.unlink(id);
        self.link_before(id, self.head);
    }

    // ===== BARRIERS =====

    /// Place a zero-size barrier at the ring tail
    pub fn acquire_barrier(&mut self) -> SlotId {
        let id = self.alloc_node(Slot {
            offset: 0,
            size: 0,
            state: SlotState::Barrier,
            prev: 0,
            next: 0,
            after: None,
            owner: None,
            pins: 0,
            live: true,
        });
        self.link_before(id, self.head);
        SlotId(id)
    }

    /// Remove a barrier. Panics if `slot` is not a live barrier.
    pub fn release_barrier(&mut self, slot: SlotId) {
        let id = slot.0;
        let s = self.slots.get(slot.index());
        assert!(
            matches!(s, Some(s) if s.live && s.state == SlotState::Barrier),
            "release_barrier: slot {:?} is not a barrier", slot
        );
        if id == self.head {
            self.head = self.slots[id as usize].next;
        }
        self.unlink(id);
        self.free_node(id);
    }

    // ===== SLOT ACCESS =====

    pub fn state(&self, slot: SlotId) -> SlotState {
        self.slots[slot.index()].state
    }

    pub fn set_state(&mut self, slot: SlotId, state: SlotState) {
        let s = &mut self.slots[slot.index()];
        debug_assert!(s.state != SlotState::Barrier && state != SlotState::Barrier);
        s.state = state;
    }

    pub fn owner(&self, slot: SlotId) -> Option<AssetId> {
        self.slots[slot.index()].owner
    }

    pub fn set_owner(&mut self, slot: SlotId, owner: Option<AssetId>) {
        self.slots[slot.index()].owner = owner;
    }

    /// Byte range `(offset, size)` of a slot
    pub fn range(&self, slot: SlotId) -> (u64, u64) {
        let s = &self.slots[slot.index()];
        (s.offset, s.size)
    }

    /// Prevent eviction while readers hold the slot's bytes
    pub fn pin(&mut self, slot: SlotId) {
        self.slots[slot.index()].pins += 1;
    }

    pub fn unpin(&mut self, slot: SlotId) {
        let s = &mut self.slots[slot.index()];
        debug_assert!(s.pins > 0, "unpin of unpinned slot {:?}", slot);
        s.pins = s.pins.saturating_sub(1);
    }

    pub fn pins(&self, slot: SlotId) -> u32 {
        self.slots[slot.index()].pins
    }

    // ===== INTROSPECTION =====

    /// Slots in ring order starting at the head
    pub fn ring(&self) -> Vec<SlotId> {
        let mut order = vec![SlotId(self.head)];
        let mut cur = self.slots[self.head as usize].next;
        while cur != self.head && order.len() <= self.slots.len() {
            order.push(SlotId(cur));
            cur = self.slots[cur as usize].next;
        }
        order
    }

    pub fn usage(&self) -> SlabUsage {
        let mut usage = SlabUsage::default();
        for slot in self.slots.iter().filter(|s| s.live) {
            match slot.state {
                SlotState::Empty => usage.empty += 1,
                SlotState::Loading => {
                    usage.loading += 1;
                    usage.bytes_in_use += slot.size;
                }
                SlotState::Loaded => {
                    usage.loaded += 1;
                    usage.bytes_in_use += slot.size;
                }
                SlotState::Barrier => usage.barriers += 1,
            }
        }
        usage
    }

    /// Check ring links, physical chain and byte accounting
    pub fn validate(&self) -> std::result::Result<(), String> {
        let live = self.slots.iter().filter(|s| s.live).count();

        let ring = self.ring();
        if ring.len() != live {
            return Err(format!("ring holds {} slots, {} are live", ring.len(), live));
        }
        for id in &ring {
            let slot = &self.slots[id.index()];
            if !slot.live {
                return Err(format!("dead slot {:?} in ring", id));
            }
            if self.slots[slot.next as usize].prev != id.0 {
                return Err(format!("slot {:?}: next.prev does not point back", id));
            }
            if slot.state == SlotState::Barrier && slot.size != 0 {
                return Err(format!("barrier {:?} has size {}", id, slot.size));
            }
        }

        let mut physical = 0;
        let mut expected_offset = 0;
        let mut cur = Some(self.first);
        while let Some(id) = cur {
            let slot = &self.slots[id as usize];
            if !slot.live || slot.state == SlotState::Barrier {
                return Err(format!("slot {} in physical chain is {:?}", id, slot.state));
            }
            if slot.offset != expected_offset {
                return Err(format!("slot {} at offset {}, expected {}", id, slot.offset, expected_offset));
            }
            expected_offset += slot.size;
            physical += 1;
            if physical > live {
                return Err("physical chain has a cycle".to_string());
            }
            cur = slot.after;
        }
        if expected_offset != self.size {
            return Err(format!("slots cover {} bytes, slab is {}", expected_offset, self.size));
        }

        let barriers = self.slots.iter().filter(|s| s.live && s.state == SlotState::Barrier).count();
        if physical + barriers != live {
            return Err(format!("{} live slots, {} in chain, {} barriers", live, physical, barriers));
        }
        Ok(())
    }

    // ===== INTERNALS =====

    /// Absorb physically following empty slots into `cur`
    fn coalesce(&mut self, cur: u32, start: &mut u32) {
        while let Some(next) = self.slots[cur as usize].after {
            if self.slots[next as usize].state != SlotState::Empty {
                break;
            }
            let (size, after) = {
                let n = &self.slots[next as usize];
                (n.size, n.after)
            };
            if next == self.head {
                self.head = self.slots[next as usize].next;
            }
            if next == *start {
                *start = cur;
            }
            self.unlink(next);
            self.free_node(next);

            let slot = &mut self.slots[cur as usize];
            slot.size += size;
            slot.after = after;
        }
    }

    /// Cut `cur` down to `size`; the rest becomes an empty slot just before it in the ring
    fn split(&mut self, cur: u32, size: u64) {
        let (offset, total, after) = {
            let s = &self.slots[cur as usize];
            (s.offset, s.size, s.after)
        };
        if total == size {
            return;
        }

        let rest = self.alloc_node(Slot {
            offset: offset + size,
            size: total - size,
            state: SlotState::Empty,
            prev: 0,
            next: 0,
            after,
            owner: None,
            pins: 0,
            live: true,
        });
        let slot = &mut self.slots[cur as usize];
        slot.size = size;
        slot.after = Some(rest);

        self.link_before(rest, cur);
        if self.head == cur {
            self.head = rest;
        }
    }

    fn alloc_node(&mut self, slot: Slot) -> u32 {
        match self.free_nodes.pop() {
            Some(id) => {
                self.slots[id as usize] = slot;
                id
            }
            None => {
                self.slots.push(slot);
                (self.slots.len() - 1) as u32
            }
        }
    }

    fn free_node(&mut self, id: u32) {
        let slot = &mut self.slots[id as usize];
        slot.live = false;
        slot.owner = None;
        slot.after = None;
        self.free_nodes.push(id);
    }

    fn unlink(&mut self, id: u32) {
        let (prev, next) = {
            let s = &self.slots[id as usize];
            (s.prev, s.next)
        };
        self.slots[prev as usize].next = next;
        self.slots[next as usize].prev = prev;
        let s = &mut self.slots[id as usize];
        s.prev = id;
        s.next = id;
    }

    /// Insert `id` into the ring just before `at`
    fn link_before(&mut self, id: u32, at: u32) {
        let prev = self.slots[at as usize].prev;
        self.slots[id as usize].prev = prev;
        self.slots[id as usize].next = at;
        self.slots[prev as usize].next = id;
        self.slots[at as usize].prev = id;
    }
}

#[cfg(test)]
#[path = "slab_tests.rs"]
mod tests;
