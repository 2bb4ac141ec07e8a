//! A container for per-entity component data.
//!
//! An entity is an opaque handle. Components of any `Send + Sync + 'static`
//! type can be bound to it; every component type is kept in its own table sorted
//! by entity, so iterating over all entities that have a set of components is a
//! linear merge of those tables.
//!
//! Tables of different types are stored side by side in type-erased holders and
//! are looked up by type identity without a type check on access.
//!
//! # Examples
//!
//! ```
//! use component_store::ComponentStore;
//!
//! struct Barks {
//!     bark_sound: String,
//! }
//!
//! #[derive(Clone)]
//! struct Eats {
//!     eaten_food: Vec<String>,
//! }
//!
//! struct Weight(f32);
//!
//! let mut store = ComponentStore::new();
//!
//! let dog = store.create_entity();
//! store.bind(dog, Barks { bark_sound: "bark.ogg".to_string() });
//! store.bind(dog, Eats { eaten_food: vec![] });
//! store.bind(dog, Weight(20.0));
//!
//! let bird = store.spawn((Eats { eaten_food: vec![] }, Weight(0.5)));
//!
//! store.get_mut::<Eats>(bird).eaten_food.push("seeds".to_string());
//! assert_eq!(store.get::<Barks>(dog).bark_sound, "bark.ogg");
//! assert!(!store.has::<Barks>(bird));
//!
//! let mut total_weight = 0.0;
//! store.for_each_ref::<(Eats, Weight), _>(|_, (_, weight)| total_weight += weight.0);
//! assert_eq!(total_weight, 20.5);
//! ```

extern crate self as component_store;


mod bundle;
mod entity;
mod erased;
mod error;
pub mod handle;
mod intersection;
pub mod query;
mod store;
mod table;
mod type_index;

#[doc(hidden)]
pub mod private;

pub use bundle::Bundle;
pub use entity::Entity;
pub use erased::{ErasedValue, INLINE_CAPACITY};
pub use error::{HolderError, QueryError};
pub use handle::{
    DebugAllocator, DefaultAllocator, Handle, HandleAllocator, LinearAllocator, ReuseAllocator,
    FIRST_HANDLE, INVALID_HANDLE,
};
pub use intersection::{intersect, Rows, MAX_INLINE_COLUMNS};
pub use macros::Bundle;
pub use query::{ComponentSet, PreparedQuery};
pub use store::{ComponentStore, StoreBuilder};
pub use table::SortedTable;
pub use type_index::TypeIndex;

pub(crate) type HashMap<K, V> = std::collections::HashMap<K, V, ahash::RandomState>;
pub(crate) type HashSet<T> = std::collections::HashSet<T, ahash::RandomState>;

/// A piece of data that can be bound to an entity.
pub trait Component: Send + Sync + 'static {}

impl<T> Component for T where T: Send + Sync + 'static {}
