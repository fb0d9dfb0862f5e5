/// Deferred-destroy ring.
///
/// Released resources cannot be destroyed while the GPU may still be using
/// them. Each release is pushed here and gets a monotonically increasing
/// index; the host records `token()` when it submits a frame and later calls
/// `release_until(token)` once that frame has completed, which pops every
/// entry pushed before the token in FIFO order.

/// Position in the deferred-destroy sequence
pub type DestroyToken = u64;

pub struct DeferredDestroyQueue<T> {
    entries: Vec<Option<T>>,
    /// Index of the oldest queued entry
    head: DestroyToken,
    /// Index the next push receives
    tail: DestroyToken,
}

impl<T> DeferredDestroyQueue<T> {
    pub fn new(capacity: usize) -> Self {
        let capacity = capacity.max(1);
        Self {
            entries: (0..capacity).map(|_| None).collect(),
            head: 0,
            tail: 0,
        }
    }

    fn slot(&self, index: DestroyToken) -> usize {
        (index % self.entries.len() as u64) as usize
    }

    /// Token covering everything pushed so far
    pub fn token(&self) -> DestroyToken {
        self.tail
    }

    /// Queue `entry` and return its index.
    ///
    /// # Panics
    ///
    /// When the ring is full. The capacity must cover every release issued
    /// between two `release_until` calls.
    pub fn push(&mut self, entry: T) -> DestroyToken {
        let len = (self.tail - self.head) as usize;
        if len == self.entries.len() {
            panic!(
                "deferred destroy queue overflow: {} entries pending, raise destroy_queue_capacity",
                len
            );
        }
        let index = self.tail;
        let slot = self.slot(index);
        self.entries[slot] = Some(entry);
        self.tail += 1;
        index
    }

    /// Pop and hand to `destroy` every entry with an index below `token`,
    /// oldest first. Returns the number popped.
    pub fn release_until(&mut self, token: DestroyToken, mut destroy: impl FnMut(T)) -> usize {
        let mut popped = 0;
        while self.head < token && self.head < self.tail {
            let slot = self.slot(self.head);
            self.head += 1;
            if let Some(entry) = self.entries[slot].take() {
                destroy(entry);
                popped += 1;
            }
        }
        popped
    }

    pub fn len(&self) -> usize {
        (self.tail - self.head) as usize
    }

    pub fn is_empty(&self) -> bool {
        self.head == self.tail
    }

    pub fn capacity(&self) -> usize {
        self.entries.len()
    }
}

#[cfg(test)]
#[path = "destroy_queue_tests.rs"]
mod tests;
