//! Logic errors raised by the erased value holder and the query engine.
//!
//! These describe contract violations rather than recoverable conditions:
//! expected outcomes such as "component not present" are reported with
//! `bool`/`Option` returns. The panicking entry points format these errors
//! into their panic message; the `try_*` variants return them.

/// Errors raised by [`ErasedValue`](crate::ErasedValue).
#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
pub enum HolderError {
    /// The payload was stored without a clone operation.
    #[error("invalid operation: a value of type `{type_name}` was not stored as cloneable")]
    InvalidOperation { type_name: &'static str },

    /// The holder was accessed before anything was emplaced into it.
    #[error("illegal state: the erased value holder is empty")]
    IllegalState,
}

/// Errors raised by component queries.
#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
pub enum QueryError {
    /// A query named the same component type more than once.
    #[error("component `{0}` is listed more than once in a query")]
    DuplicateComponent(&'static str),

    /// The store's tables were dropped (or belong to a differently laid out store)
    /// since the query was prepared.
    #[error("prepared query no longer matches the store's tables")]
    Stale,
}

#[cold]
#[inline(never)]
pub(crate) fn fail(err: impl std::fmt::Display) -> ! {
    panic!("{err}");
}
