//! Opaque integer handles and the strategies that issue them.
//!
//! Every allocator hands out handles from a monotonically increasing counter.
//! They differ in what they remember about destroyed handles:
//!
//! * [`LinearAllocator`] remembers nothing. Fastest, but cannot catch double-destroys.
//! * [`ReuseAllocator`] keeps destroyed handles around and issues them again.
//! * [`DebugAllocator`] keeps every destroyed handle and never reissues it.

mod debug;
mod reuse;

pub use debug::DebugAllocator;
pub use reuse::ReuseAllocator;

/// An opaque identifier issued by a [`HandleAllocator`].
pub type Handle = u64;

/// The reserved handle value. It is never issued and never verifies as valid.
pub const INVALID_HANDLE: Handle = Handle::MAX;

/// The first handle issued by a freshly created (or reset) allocator.
pub const FIRST_HANDLE: Handle = 0;

/// Returns `true` if `handle` is not the reserved invalid value.
#[inline]
pub const fn is_valid(handle: Handle) -> bool {
    handle != INVALID_HANDLE
}

/// The allocator used by [`ComponentStore::new`](crate::ComponentStore::new).
#[cfg(not(feature = "debug-handles"))]
pub type DefaultAllocator = LinearAllocator;

/// The allocator used by [`ComponentStore::new`](crate::ComponentStore::new).
#[cfg(feature = "debug-handles")]
pub type DefaultAllocator = DebugAllocator;

/// Issues and invalidates handles.
///
/// Implementations guarantee that handles are unique among currently live handles
/// and that [`INVALID_HANDLE`] is never issued.
pub trait HandleAllocator {
    /// Issues a new handle.
    fn create(&mut self) -> Handle;

    /// Marks `handle` as no longer used. Returns `true` if the handle was destroyed without error.
    fn destroy(&mut self, handle: Handle) -> bool;

    /// Returns the allocator to its freshly constructed state.
    fn reset(&mut self);

    /// Returns `true` if `handle` is believed to be live.
    fn verify(&self, handle: Handle) -> bool;
}

/// Counter-only allocator.
///
/// `destroy` always succeeds and `verify` only checks that the handle was issued at some point.
#[derive(Debug, Clone)]
pub struct LinearAllocator {
    next: Handle,
}

impl LinearAllocator {
    pub const fn new() -> Self {
        Self { next: FIRST_HANDLE }
    }

    /// Returns the number of handles issued since the last reset.
    pub fn issued(&self) -> u64 {
        self.next - FIRST_HANDLE
    }
}

impl Default for LinearAllocator {
    fn default() -> Self {
        Self::new()
    }
}

impl HandleAllocator for LinearAllocator {
    #[inline]
    fn create(&mut self) -> Handle {
        #[cold]
        #[inline(never)]
        fn out_of_handles() -> ! {
            panic!(
                "Out of handles. A maximum number of handles ({}) is reached.",
                INVALID_HANDLE
            );
        }

        if self.next == INVALID_HANDLE {
            out_of_handles();
        }

        let handle = self.next;
        self.next += 1;
        handle
    }

    #[inline]
    fn destroy(&mut self, _handle: Handle) -> bool {
        true
    }

    fn reset(&mut self) {
        self.next = FIRST_HANDLE;
    }

    #[inline]
    fn verify(&self, handle: Handle) -> bool {
        is_valid(handle) && handle < self.next
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::HashSet;

    fn issue_distinct<A: HandleAllocator>(allocator: &mut A) {
        let handles: Vec<_> = (0..15).map(|_| allocator.create()).collect();
        let distinct: HashSet<_> = handles.iter().copied().collect();

        assert_eq!(distinct.len(), handles.len());
        assert!(handles.iter().all(|h| is_valid(*h)));
        assert!(handles.iter().all(|h| allocator.verify(*h)));
        assert!(!allocator.verify(INVALID_HANDLE));
        assert!(!allocator.verify(handles.iter().max().unwrap() + 1));
    }

    fn reset_restarts<A: HandleAllocator>(allocator: &mut A) {
        let first = allocator.create();
        allocator.create();
        allocator.reset();

        assert!(!allocator.verify(first));
        assert_eq!(allocator.create(), FIRST_HANDLE);
    }

    #[test]
    fn all_allocators_issue_distinct_valid_handles() {
        issue_distinct(&mut LinearAllocator::new());
        issue_distinct(&mut ReuseAllocator::new());
        issue_distinct(&mut DebugAllocator::new());
    }

    #[test]
    fn all_allocators_reset() {
        reset_restarts(&mut LinearAllocator::new());
        reset_restarts(&mut ReuseAllocator::new());
        reset_restarts(&mut DebugAllocator::new());
    }

    #[test]
    fn linear_destroy_is_trivial() {
        let mut allocator = LinearAllocator::new();
        let handle = allocator.create();

        assert!(allocator.destroy(handle));
        assert!(allocator.destroy(handle));
        assert!(allocator.verify(handle));
        assert_eq!(allocator.issued(), 1);
    }

    #[test]
    fn tracking_allocators_do_not_verify_destroyed_handles() {
        let mut reuse = ReuseAllocator::new();
        let h = reuse.create();
        assert!(reuse.destroy(h));
        assert!(!reuse.verify(h));

        let mut debug = DebugAllocator::new();
        let h = debug.create();
        assert!(debug.destroy(h));
        assert!(!debug.verify(h));
    }
}
