/// Per-resource load state.
///
/// ```text
/// Empty -> Loading -> Waiting -> Testing -> Ready
///            |                      |
///            +------> Empty <-------+   (failure)
/// ```
///
/// Every edge out of a state is taken with a compare-and-swap, so when many
/// threads call `request()` on the same resource exactly one of them does the
/// work for that edge and the others return immediately.

use std::sync::atomic::{AtomicU8, Ordering};

#[repr(u8)]
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ResourceState {
    /// Nothing loaded; the next `request()` starts a load
    Empty = 0,
    /// Source bytes pulled, upload job running
    Loading = 1,
    /// Upload submitted, fence not yet observed
    Waiting = 2,
    /// One caller is testing the fence and dependencies
    Testing = 3,
    /// Fully uploaded, dependencies ready
    Ready = 4,
}

impl ResourceState {
    fn from_u8(value: u8) -> Self {
        match value {
            1 => ResourceState::Loading,
            2 => ResourceState::Waiting,
            3 => ResourceState::Testing,
            4 => ResourceState::Ready,
            _ => ResourceState::Empty,
        }
    }
}

/// `ResourceState` behind an atomic tag
#[derive(Debug)]
pub struct AtomicResourceState(AtomicU8);

impl AtomicResourceState {
    pub fn new(state: ResourceState) -> Self {
        Self(AtomicU8::new(state as u8))
    }

    pub fn load(&self) -> ResourceState {
        ResourceState::from_u8(self.0.load(Ordering::Acquire))
    }

    /// Unconditional store, for the thread that owns the current edge
    pub fn store(&self, state: ResourceState) {
        self.0.store(state as u8, Ordering::Release);
    }

    /// Move from `from` to `to`. Returns false if another thread got there first.
    pub fn transition(&self, from: ResourceState, to: ResourceState) -> bool {
        self.0
            .compare_exchange(from as u8, to as u8, Ordering::AcqRel, Ordering::Acquire)
            .is_ok()
    }
}

#[cfg(test)]
#[path = "state_tests.rs"]
mod tests;
