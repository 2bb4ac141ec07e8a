use super::{Handle, HandleAllocator, LinearAllocator};
use crate::HashSet;
use tracing::warn;

/// The slowest and safest allocator, meant for development builds.
///
/// Destroyed handles are never reissued, so destroying the same handle twice
/// (or destroying a handle this allocator never issued) is detected and reported.
#[derive(Debug, Clone, Default)]
pub struct DebugAllocator {
    counter: LinearAllocator,
    destroyed: HashSet<Handle>,
}

impl DebugAllocator {
    pub fn new() -> Self {
        Self::default()
    }

    /// Returns the number of handles destroyed since the last reset.
    pub fn n_destroyed(&self) -> usize {
        self.destroyed.len()
    }
}

impl HandleAllocator for DebugAllocator {
    #[inline]
    fn create(&mut self) -> Handle {
        self.counter.create()
    }

    fn destroy(&mut self, handle: Handle) -> bool {
        let destroyed = self.counter.verify(handle) && self.destroyed.insert(handle);
        if !destroyed {
            warn!(handle, "attempt to destroy an unissued or already destroyed handle");
        }
        destroyed
    }

    fn reset(&mut self) {
        self.counter.reset();
        self.destroyed.clear();
    }

    /// If this returns `true`, the handle was issued by this allocator and has not been destroyed.
    fn verify(&self, handle: Handle) -> bool {
        self.counter.verify(handle) && !self.destroyed.contains(&handle)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::handle::INVALID_HANDLE;

    #[test]
    fn detects_double_destroy() {
        let mut allocator = DebugAllocator::new();
        let h = allocator.create();

        assert!(allocator.destroy(h));
        assert!(!allocator.destroy(h));
        assert_eq!(allocator.n_destroyed(), 1);
    }

    #[test]
    fn rejects_unissued_handles() {
        let mut allocator = DebugAllocator::new();
        let h = allocator.create();

        assert!(!allocator.destroy(h + 1));
        assert!(!allocator.destroy(INVALID_HANDLE));
        assert!(allocator.verify(h));
    }

    #[test]
    fn never_reissues() {
        let mut allocator = DebugAllocator::new();
        let h = allocator.create();
        allocator.destroy(h);

        let handles: Vec<_> = (0..10).map(|_| allocator.create()).collect();
        assert!(!handles.contains(&h));
    }
}
