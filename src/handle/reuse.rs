use super::{Handle, HandleAllocator, LinearAllocator};
use crate::HashSet;
use tracing::{debug, trace};

/// Allocator that reissues destroyed handles before minting new ones.
///
/// The most recently destroyed handle is issued first. `verify` cannot tell a
/// reissued handle apart from its previous owner.
#[derive(Debug, Clone, Default)]
pub struct ReuseAllocator {
    counter: LinearAllocator,
    free: Vec<Handle>,
    free_set: HashSet<Handle>,
}

impl ReuseAllocator {
    pub fn new() -> Self {
        Self::default()
    }

    /// Returns the number of destroyed handles waiting to be reissued.
    pub fn n_free(&self) -> usize {
        self.free.len()
    }
}

impl HandleAllocator for ReuseAllocator {
    fn create(&mut self) -> Handle {
        if let Some(handle) = self.free.pop() {
            self.free_set.remove(&handle);
            trace!(handle, "reissuing destroyed handle");
            return handle;
        }
        self.counter.create()
    }

    /// Rejects handles that were never issued or that are already waiting for reuse.
    fn destroy(&mut self, handle: Handle) -> bool {
        if !self.counter.verify(handle) || !self.free_set.insert(handle) {
            debug!(handle, "rejected destroy of an unissued or already destroyed handle");
            return false;
        }
        self.free.push(handle);
        true
    }

    fn reset(&mut self) {
        self.counter.reset();
        self.free.clear();
        self.free_set.clear();
    }

    fn verify(&self, handle: Handle) -> bool {
        self.counter.verify(handle) && !self.free_set.contains(&handle)
    }
}
