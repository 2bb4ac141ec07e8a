use crate::handle::{DefaultAllocator, HandleAllocator};
use crate::private::TableRegistry;
use crate::{Component, ComponentStore};

type TableInit = Box<dyn FnOnce(&mut TableRegistry)>;

/// Configures the tables of a [`ComponentStore`] before it is created.
///
/// # Examples
/// ```
/// use component_store::{ComponentStore, ReuseAllocator};
///
/// #[derive(Clone)]
/// struct Name(String);
/// struct Health(u32);
///
/// let store = ComponentStore::builder()
///     .allocator(ReuseAllocator::new())
///     .with_capacity::<Health>(1024)
///     .cloneable::<Name>()
///     .build();
///
/// assert_eq!(store.n_tables(), 2);
/// ```
pub struct StoreBuilder<A = DefaultAllocator> {
    allocator: A,
    tables: Vec<TableInit>,
}

impl StoreBuilder {
    pub fn new() -> Self {
        StoreBuilder {
            allocator: DefaultAllocator::new(),
            tables: Vec::new(),
        }
    }
}

impl Default for StoreBuilder {
    fn default() -> Self {
        Self::new()
    }
}

impl<A: HandleAllocator> StoreBuilder<A> {
    /// Replaces the handle allocator of the store.
    pub fn allocator<B: HandleAllocator>(self, allocator: B) -> StoreBuilder<B> {
        StoreBuilder {
            allocator,
            tables: self.tables,
        }
    }

    /// Creates the table of component type `C` up front.
    pub fn with<C: Component>(mut self) -> Self {
        self.tables.push(Box::new(|registry: &mut TableRegistry| {
            registry.index_or_insert::<C>();
        }));
        self
    }

    /// Creates the table of component type `C` with room for `capacity` components.
    pub fn with_capacity<C: Component>(mut self, capacity: usize) -> Self {
        self.tables.push(Box::new(move |registry: &mut TableRegistry| {
            registry.table_or_insert::<C>().reserve(capacity);
        }));
        self
    }

    /// Creates the table of component type `C` and allows cloning it.
    pub fn cloneable<C: Component + Clone>(mut self) -> Self {
        self.tables.push(Box::new(|registry: &mut TableRegistry| {
            registry.make_cloneable::<C>();
        }));
        self
    }

    pub fn build(self) -> ComponentStore<A> {
        let mut store = ComponentStore::with_allocator(self.allocator);
        for init in self.tables {
            init(&mut store.registry);
        }
        store
    }
}
