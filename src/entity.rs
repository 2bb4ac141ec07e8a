use crate::handle::{self, Handle, INVALID_HANDLE};

/// An entity identifier.
///
/// Entities carry no data; they are keys into every component table of a
/// [`ComponentStore`](crate::ComponentStore).
#[derive(Debug, Copy, Clone, Eq, PartialEq, Hash, Ord, PartialOrd)]
pub struct Entity {
    handle: Handle,
}

impl Entity {
    pub const NULL: Self = Entity {
        handle: INVALID_HANDLE,
    };

    pub(crate) const fn from_handle(handle: Handle) -> Entity {
        Entity { handle }
    }

    /// Returns the underlying handle.
    pub const fn handle(&self) -> Handle {
        self.handle
    }

    /// Returns `true` if this is [`Entity::NULL`].
    pub const fn is_null(&self) -> bool {
        !handle::is_valid(self.handle)
    }
}

impl Default for Entity {
    fn default() -> Self {
        Entity::NULL
    }
}
