//! Multi-component iteration over the store.

use crate::error::{self, QueryError};
use crate::handle::Handle;
use crate::intersection::{self, MAX_INLINE_COLUMNS};
use crate::private::{sealed, TableRegistry};
use crate::store::ComponentStore;
use crate::type_index::TypeIndex;
use crate::{Component, Entity, HandleAllocator};
use smallvec::{smallvec, SmallVec};
use std::marker::PhantomData;

/// Slot indices of a query's tables inside the registry, in query order.
pub type TableIndices = SmallVec<[usize; MAX_INLINE_COLUMNS]>;

/// Component types of a query, in query order.
pub type TypeIndices = SmallVec<[TypeIndex; MAX_INLINE_COLUMNS]>;

/// Key columns of a query's tables, in query order.
pub type KeyColumns<'a> = SmallVec<[&'a [Handle]; MAX_INLINE_COLUMNS]>;

/// Keys and values of one table, borrowed for `'a`.
pub struct Column<'a, C> {
    keys: &'a [Handle],
    values: *mut C,
}

impl<'a, C: Component> Column<'a, C> {
    /// Safety: the pointers must come from the same live table, which must outlive `'a`.
    #[inline]
    unsafe fn from_raw((keys, values): (*const [Handle], *mut C)) -> Self {
        Column {
            keys: &*keys,
            values,
        }
    }

    #[inline]
    fn of(table: &'a crate::SortedTable<C>) -> Self {
        Column {
            keys: table.keys(),
            values: table.values().as_ptr() as *mut C,
        }
    }
}

/// A set of distinct component types that can be queried together.
///
/// Implemented for tuples `(A,)` up to eight elements. A tuple that lists the
/// same type twice panics with [`QueryError::DuplicateComponent`] when used.
/// The trait is sealed:
///
/// ```compile_fail
/// struct Marker;
/// impl component_store::private::sealed::Sealed for Marker {}
/// ```
pub trait ComponentSet: sealed::Sealed + 'static {
    /// Mutable references to one entity's components.
    type Item<'a>;
    /// Shared references to one entity's components.
    type ItemRef<'a>;
    #[doc(hidden)]
    type Columns<'a>;

    /// The number of component types in the set.
    const LEN: usize;

    fn type_indices() -> TypeIndices;

    /// Finds the tables of all types, or `None` if any of them does not exist.
    #[doc(hidden)]
    fn lookup(registry: &TableRegistry) -> Option<TableIndices>;

    #[doc(hidden)]
    fn lookup_or_create(registry: &mut TableRegistry) -> TableIndices;

    /// Safety: `indices` must come from `lookup` on the same registry, without
    /// structural modification in between.
    #[doc(hidden)]
    unsafe fn columns_mut<'a>(registry: &'a mut TableRegistry, indices: &[usize]) -> Self::Columns<'a>;

    /// Safety: same as for [`columns_mut`](Self::columns_mut).
    #[doc(hidden)]
    unsafe fn columns<'a>(registry: &'a TableRegistry, indices: &[usize]) -> Self::Columns<'a>;

    #[doc(hidden)]
    fn keys<'a>(columns: &Self::Columns<'a>) -> KeyColumns<'a>;

    /// Safety: `rows` must be in bounds, and the columns must come from `columns_mut`.
    /// Every row set must be fetched at most once.
    #[doc(hidden)]
    unsafe fn fetch<'a>(columns: &Self::Columns<'a>, rows: &[usize]) -> Self::Item<'a>;

    /// Safety: `rows` must be in bounds.
    #[doc(hidden)]
    unsafe fn fetch_ref<'a>(columns: &Self::Columns<'a>, rows: &[usize]) -> Self::ItemRef<'a>;
}

/// Panics if a type occurs in `types` more than once.
pub(crate) fn assert_distinct(types: &[TypeIndex]) {
    for (i, ty) in types.iter().enumerate() {
        if types[i + 1..].contains(ty) {
            error::fail(QueryError::DuplicateComponent(ty.name()));
        }
    }
}

macro_rules! impl_component_set {
    ($($ty:ident $idx:tt),+) => {
        impl<$($ty: Component),+> sealed::Sealed for ($($ty,)+) {}

        impl<$($ty: Component),+> ComponentSet for ($($ty,)+) {
            type Item<'a> = ($(&'a mut $ty,)+);
            type ItemRef<'a> = ($(&'a $ty,)+);
            type Columns<'a> = ($(Column<'a, $ty>,)+);

            const LEN: usize = [$($idx),+].len();

            fn type_indices() -> TypeIndices {
                smallvec![$(TypeIndex::of::<$ty>()),+]
            }

            fn lookup(registry: &TableRegistry) -> Option<TableIndices> {
                assert_distinct(&Self::type_indices());
                Some(smallvec![$(registry.index_of::<$ty>()?),+])
            }

            fn lookup_or_create(registry: &mut TableRegistry) -> TableIndices {
                assert_distinct(&Self::type_indices());
                smallvec![$(registry.index_or_insert::<$ty>()),+]
            }

            unsafe fn columns_mut<'a>(
                registry: &'a mut TableRegistry,
                indices: &[usize],
            ) -> Self::Columns<'a> {
                ($(Column::from_raw(registry.column_at::<$ty>(indices[$idx])),)+)
            }

            unsafe fn columns<'a>(registry: &'a TableRegistry, indices: &[usize]) -> Self::Columns<'a> {
                ($(Column::of(registry.table_at::<$ty>(indices[$idx])),)+)
            }

            fn keys<'a>(columns: &Self::Columns<'a>) -> KeyColumns<'a> {
                smallvec![$(columns.$idx.keys),+]
            }

            #[inline]
            unsafe fn fetch<'a>(columns: &Self::Columns<'a>, rows: &[usize]) -> Self::Item<'a> {
                ($(&mut *columns.$idx.values.add(rows[$idx]),)+)
            }

            #[inline]
            unsafe fn fetch_ref<'a>(columns: &Self::Columns<'a>, rows: &[usize]) -> Self::ItemRef<'a> {
                ($(&*columns.$idx.values.add(rows[$idx]),)+)
            }
        }
    };
}

impl_component_set!(A 0);
impl_component_set!(A 0, B 1);
impl_component_set!(A 0, B 1, C 2);
impl_component_set!(A 0, B 1, C 2, D 3);
impl_component_set!(A 0, B 1, C 2, D 3, E 4);
impl_component_set!(A 0, B 1, C 2, D 3, E 4, F 5);
impl_component_set!(A 0, B 1, C 2, D 3, E 4, F 5, G 6);
impl_component_set!(A 0, B 1, C 2, D 3, E 4, F 5, G 6, H 7);

/// Safety: `indices` must be valid for `registry` (see [`ComponentSet::columns_mut`]).
pub(crate) unsafe fn run_mut<'a, Q, F>(registry: &'a mut TableRegistry, indices: &[usize], mut f: F)
where
    Q: ComponentSet,
    F: FnMut(Entity, Q::Item<'a>),
{
    let columns = Q::columns_mut(registry, indices);
    let keys = Q::keys(&columns);

    // Keys are strictly increasing, so every row set is fetched once.
    intersection::intersect(&keys[..], |key, rows| {
        f(Entity::from_handle(key), Q::fetch(&columns, rows))
    });
}

/// Safety: `indices` must be valid for `registry` (see [`ComponentSet::columns`]).
pub(crate) unsafe fn run<'a, Q, F>(registry: &'a TableRegistry, indices: &[usize], mut f: F)
where
    Q: ComponentSet,
    F: FnMut(Entity, Q::ItemRef<'a>),
{
    let columns = Q::columns(registry, indices);
    let keys = Q::keys(&columns);

    intersection::intersect(&keys[..], |key, rows| {
        f(Entity::from_handle(key), Q::fetch_ref(&columns, rows))
    });
}

/// Finds the rows of `handle` in every column.
pub(crate) fn rows_of(keys: &[&[Handle]], handle: Handle) -> Option<intersection::Rows> {
    keys.iter()
        .map(|column| column.binary_search(&handle).ok())
        .collect()
}

/// A query whose tables were looked up once in advance.
///
/// Created by [`ComponentStore::prepare`]. It stays valid until
/// [`ComponentStore::clear_all`] is called on the store it was prepared for;
/// after that (or when used with a store that holds different tables)
/// running it fails with [`QueryError::Stale`].
pub struct PreparedQuery<Q> {
    indices: TableIndices,
    types: TypeIndices,
    epoch: u64,
    _ty: PhantomData<fn() -> Q>,
}

impl<Q: ComponentSet> PreparedQuery<Q> {
    pub(crate) fn new(registry: &mut TableRegistry) -> Self {
        let indices = Q::lookup_or_create(registry);

        PreparedQuery {
            indices,
            types: Q::type_indices(),
            epoch: registry.epoch(),
            _ty: PhantomData,
        }
    }

    fn check(&self, registry: &TableRegistry) -> Result<(), QueryError> {
        let tables_match = self
            .indices
            .iter()
            .zip(&self.types)
            .all(|(&index, ty)| registry.type_at(index).as_ref() == Some(ty));

        if registry.epoch() == self.epoch && tables_match {
            Ok(())
        } else {
            Err(QueryError::Stale)
        }
    }

    /// Returns `true` if the query can be run against `store`.
    pub fn is_valid_for<A: HandleAllocator>(&self, store: &ComponentStore<A>) -> bool {
        self.check(&store.registry).is_ok()
    }

    /// Calls `f` with mutable references to the components of every entity that has all of them.
    pub fn for_each<'s, A, F>(&self, store: &'s mut ComponentStore<A>, f: F) -> Result<(), QueryError>
    where
        A: HandleAllocator,
        F: FnMut(Entity, Q::Item<'s>),
    {
        self.check(&store.registry)?;
        // Safety: the indices point to tables of the query's types (checked above).
        unsafe { run_mut::<Q, F>(&mut store.registry, &self.indices, f) };
        Ok(())
    }

    /// Calls `f` with shared references to the components of every entity that has all of them.
    pub fn for_each_ref<'s, A, F>(&self, store: &'s ComponentStore<A>, f: F) -> Result<(), QueryError>
    where
        A: HandleAllocator,
        F: FnMut(Entity, Q::ItemRef<'s>),
    {
        self.check(&store.registry)?;
        // Safety: the indices point to tables of the query's types (checked above).
        unsafe { run::<Q, F>(&store.registry, &self.indices, f) };
        Ok(())
    }
}

impl<Q> Clone for PreparedQuery<Q> {
    fn clone(&self) -> Self {
        PreparedQuery {
            indices: self.indices.clone(),
            types: self.types.clone(),
            epoch: self.epoch,
            _ty: PhantomData,
        }
    }
}

impl<Q> std::fmt::Debug for PreparedQuery<Q> {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("PreparedQuery")
            .field("types", &self.types)
            .field("epoch", &self.epoch)
            .finish()
    }
}
