mod builder;

pub use builder::StoreBuilder;

use crate::bundle::Bundle;
use crate::error::HolderError;
use crate::handle::{DefaultAllocator, HandleAllocator};
use crate::private::TableRegistry;
use crate::query::{self, ComponentSet, PreparedQuery};
use crate::table::SortedTable;
use crate::{Component, Entity};
use std::fmt;

#[cold]
#[inline(never)]
fn missing_component(component: &'static str, entity: Entity) -> ! {
    panic!(
        "Entity {} has no component of type `{}`",
        entity.handle(),
        component
    );
}

/// A container of components keyed by entity.
///
/// Every component type gets its own [`SortedTable`], created lazily on first use
/// and kept until [`clear_all`](Self::clear_all). An entity can have at most one
/// component of each type.
pub struct ComponentStore<A: HandleAllocator = DefaultAllocator> {
    pub(crate) registry: TableRegistry,
    allocator: A,
}

impl ComponentStore {
    /// Creates an empty `ComponentStore` with the default handle allocator.
    pub fn new() -> Self {
        Self::with_allocator(DefaultAllocator::new())
    }

    pub fn builder() -> StoreBuilder {
        StoreBuilder::new()
    }
}

impl Default for ComponentStore {
    fn default() -> Self {
        Self::new()
    }
}

impl<A: HandleAllocator> ComponentStore<A> {
    /// Creates an empty `ComponentStore` that issues entities with `allocator`.
    pub fn with_allocator(allocator: A) -> Self {
        ComponentStore {
            registry: TableRegistry::new(),
            allocator,
        }
    }

    /// Binds `value` to `entity` unless the entity already has a `C`.
    /// Returns the stored component and `true` if `value` was inserted.
    pub fn bind<C: Component>(&mut self, entity: Entity, value: C) -> (&mut C, bool) {
        self.registry
            .table_or_insert::<C>()
            .insert_or_get(entity.handle(), value)
    }

    /// Same as [`bind`](Self::bind), but constructs the value only if `entity` has no `C` yet.
    pub fn bind_with<C, F>(&mut self, entity: Entity, f: F) -> (&mut C, bool)
    where
        C: Component,
        F: FnOnce() -> C,
    {
        self.registry
            .table_or_insert::<C>()
            .insert_or_get_with(entity.handle(), f)
    }

    /// Binds `value` to `entity`, replacing the existing `C` if there is one.
    /// Returns the stored component and `true` if the entity had no `C` before.
    pub fn bind_or_assign<C: Component>(&mut self, entity: Entity, value: C) -> (&mut C, bool) {
        self.registry
            .table_or_insert::<C>()
            .insert_or_assign(entity.handle(), value)
    }

    /// Binds `value` to `entity` without checking whether a `C` is already bound.
    ///
    /// Binding a second `C` to the same entity this way leaves the table with a
    /// duplicate key; lookups then find either of the two.
    pub fn bind_unchecked<C: Component>(&mut self, entity: Entity, value: C) -> &mut C {
        self.registry
            .table_or_insert::<C>()
            .insert_unchecked(entity.handle(), value)
    }

    /// Binds every component of `bundle` that `entity` does not have yet.
    /// Returns the number of components inserted.
    pub fn bind_bundle<B: Bundle>(&mut self, entity: Entity, bundle: B) -> usize {
        bundle.bind_to(self, entity)
    }

    /// Creates a new entity with the components of `bundle`.
    ///
    /// If the allocator reissues a handle whose components were never removed,
    /// the bundle's components replace the old ones of the same types. Components
    /// of other types stay bound.
    pub fn spawn<B: Bundle>(&mut self, bundle: B) -> Entity {
        let entity = self.create_entity();
        bundle.assign_to(self, entity);
        entity
    }

    /// Returns a reference to the component `C` of `entity`.
    /// Panics if the entity has no `C`.
    pub fn get<C: Component>(&self, entity: Entity) -> &C {
        match self.get_checked::<C>(entity) {
            Some(component) => component,
            None => missing_component(std::any::type_name::<C>(), entity),
        }
    }

    /// Returns a mutable reference to the component `C` of `entity`.
    /// Panics if the entity has no `C`.
    pub fn get_mut<C: Component>(&mut self, entity: Entity) -> &mut C {
        match self.get_checked_mut::<C>(entity) {
            Some(component) => component,
            None => missing_component(std::any::type_name::<C>(), entity),
        }
    }

    /// Returns a reference to the component `C` of `entity` without any checks.
    ///
    /// # Safety
    /// The entity must have a component of type `C`.
    pub unsafe fn get_unchecked<C: Component>(&self, entity: Entity) -> &C {
        self.registry
            .table::<C>()
            .and_then(|table| table.find(entity.handle()))
            .unwrap_unchecked()
    }

    /// Returns a mutable reference to the component `C` of `entity` without any checks.
    ///
    /// # Safety
    /// The entity must have a component of type `C`.
    pub unsafe fn get_unchecked_mut<C: Component>(&mut self, entity: Entity) -> &mut C {
        self.registry
            .table_mut::<C>()
            .and_then(|table| table.find_mut(entity.handle()))
            .unwrap_unchecked()
    }

    pub fn get_checked<C: Component>(&self, entity: Entity) -> Option<&C> {
        self.registry.table::<C>()?.find(entity.handle())
    }

    pub fn get_checked_mut<C: Component>(&mut self, entity: Entity) -> Option<&mut C> {
        self.registry.table_mut::<C>()?.find_mut(entity.handle())
    }

    /// Returns references to all components in `Q` of `entity`,
    /// or `None` if the entity lacks any of them.
    pub fn get_components<Q: ComponentSet>(&self, entity: Entity) -> Option<Q::ItemRef<'_>> {
        let indices = Q::lookup(&self.registry)?;
        // Safety: `indices` were just looked up in the same registry.
        unsafe {
            let columns = Q::columns(&self.registry, &indices);
            let rows = query::rows_of(&Q::keys(&columns), entity.handle())?;
            Some(Q::fetch_ref(&columns, &rows))
        }
    }

    /// Returns mutable references to all components in `Q` of `entity`,
    /// or `None` if the entity lacks any of them.
    pub fn get_components_mut<Q: ComponentSet>(&mut self, entity: Entity) -> Option<Q::Item<'_>> {
        let indices = Q::lookup(&self.registry)?;
        // Safety: `indices` were just looked up in the same registry. The row set is fetched once.
        unsafe {
            let columns = Q::columns_mut(&mut self.registry, &indices);
            let rows = query::rows_of(&Q::keys(&columns), entity.handle())?;
            Some(Q::fetch(&columns, &rows))
        }
    }

    /// Returns `true` if `entity` has a component of type `C`.
    pub fn has<C: Component>(&self, entity: Entity) -> bool {
        self.registry
            .table::<C>()
            .map_or(false, |table| table.contains(entity.handle()))
    }

    /// Removes and drops the component `C` of `entity`. Returns `true` if it was present.
    pub fn remove<C: Component>(&mut self, entity: Entity) -> bool {
        self.registry
            .table_mut::<C>()
            .map_or(false, |table| table.erase(entity.handle()))
    }

    /// Removes the component `C` of `entity` and returns it.
    pub fn take<C: Component>(&mut self, entity: Entity) -> Option<C> {
        self.registry.table_mut::<C>()?.remove(entity.handle())
    }

    /// Removes every component of type `C`. The table itself is kept.
    pub fn clear<C: Component>(&mut self) {
        if let Some(table) = self.registry.table_mut::<C>() {
            table.clear();
        }
    }

    /// Removes every component of every type and drops all tables.
    ///
    /// Every [`PreparedQuery`] created before this call becomes stale.
    /// Entities stay alive.
    pub fn clear_all(&mut self) {
        self.registry.clear_all();
    }

    /// Reserves capacity for at least `additional` more components of type `C`,
    /// creating the table if it does not exist.
    pub fn reserve<C: Component>(&mut self, additional: usize) {
        self.registry.table_or_insert::<C>().reserve(additional);
    }

    /// Returns the number of components of type `C`.
    pub fn count<C: Component>(&self) -> usize {
        self.registry.table::<C>().map_or(0, |table| table.len())
    }

    /// Returns the table of component type `C`, if one was created.
    pub fn table<C: Component>(&self) -> Option<&SortedTable<C>> {
        self.registry.table::<C>()
    }

    /// Returns the number of component tables.
    pub fn n_tables(&self) -> usize {
        self.registry.len()
    }

    /// Issues a new entity.
    pub fn create_entity(&mut self) -> Entity {
        Entity::from_handle(self.allocator.create())
    }

    /// Releases `entity` in the allocator. Returns `false` if the allocator rejected it.
    ///
    /// Components bound to the entity are not removed.
    pub fn destroy_entity(&mut self, entity: Entity) -> bool {
        self.allocator.destroy(entity.handle())
    }

    /// Returns `true` if the allocator considers `entity` live.
    pub fn is_alive(&self, entity: Entity) -> bool {
        self.allocator.verify(entity.handle())
    }

    pub fn allocator(&self) -> &A {
        &self.allocator
    }

    /// Calls `f` with mutable references to the components in `Q` of every
    /// entity that has all of them, in increasing entity order.
    ///
    /// Does nothing if any of the component tables does not exist.
    ///
    /// # Examples
    /// ```
    /// use component_store::ComponentStore;
    ///
    /// struct Position(f32);
    /// struct Velocity(f32);
    ///
    /// let mut store = ComponentStore::new();
    /// let e = store.spawn((Position(0.0), Velocity(2.0)));
    /// store.spawn((Position(5.0),));
    ///
    /// store.for_each::<(Position, Velocity), _>(|_, (pos, vel)| pos.0 += vel.0);
    /// assert_eq!(store.get::<Position>(e).0, 2.0);
    /// ```
    pub fn for_each<'s, Q, F>(&'s mut self, f: F)
    where
        Q: ComponentSet,
        F: FnMut(Entity, Q::Item<'s>),
    {
        let Some(indices) = Q::lookup(&self.registry) else {
            return;
        };
        // Safety: `indices` were just looked up in the same registry.
        unsafe { query::run_mut::<Q, F>(&mut self.registry, &indices, f) };
    }

    /// Same as [`for_each`](Self::for_each), but with shared references.
    pub fn for_each_ref<'s, Q, F>(&'s self, f: F)
    where
        Q: ComponentSet,
        F: FnMut(Entity, Q::ItemRef<'s>),
    {
        let Some(indices) = Q::lookup(&self.registry) else {
            return;
        };
        // Safety: `indices` were just looked up in the same registry.
        unsafe { query::run::<Q, F>(&self.registry, &indices, f) };
    }

    /// Looks up the tables of `Q` once for repeated iteration, creating missing tables.
    pub fn prepare<Q: ComponentSet>(&mut self) -> PreparedQuery<Q> {
        PreparedQuery::new(&mut self.registry)
    }

    /// Allows [`try_clone`](Self::try_clone) to copy components of type `C`.
    pub fn register_cloneable<C: Component + Clone>(&mut self) {
        self.registry.make_cloneable::<C>();
    }

    /// Copies the whole store.
    ///
    /// Fails with [`HolderError::InvalidOperation`] if a table was not
    /// registered with [`register_cloneable`](Self::register_cloneable).
    pub fn try_clone(&self) -> Result<Self, HolderError>
    where
        A: Clone,
    {
        Ok(ComponentStore {
            registry: self.registry.try_clone()?,
            allocator: self.allocator.clone(),
        })
    }
}

impl<A: HandleAllocator> fmt::Debug for ComponentStore<A> {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("ComponentStore")
            .field(
                "tables",
                &DebugTables {
                    registry: &self.registry,
                },
            )
            .finish_non_exhaustive()
    }
}

struct DebugTables<'a> {
    registry: &'a TableRegistry,
}

impl fmt::Debug for DebugTables<'_> {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_map().entries(self.registry.iter_counts()).finish()
    }
}
