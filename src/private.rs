use crate::erased::ErasedValue;
use crate::error::HolderError;
use crate::handle::Handle;
use crate::table::SortedTable;
use crate::type_index::TypeIndex;
use crate::{Component, HashMap};
use std::collections::hash_map;
use tracing::debug;

/// One erased `SortedTable<C>` together with the identity of `C`.
pub(crate) struct TableSlot {
    type_index: TypeIndex,
    table: ErasedValue,
    len: unsafe fn(&ErasedValue) -> usize,
}

unsafe fn table_len<C: Component>(table: &ErasedValue) -> usize {
    table.get_as::<SortedTable<C>>().len()
}

fn new_cloneable_table<C: Component + Clone>() -> ErasedValue {
    ErasedValue::cloneable(SortedTable::<C>::new())
}

pub(crate) mod sealed {
    /// Restricts [`ComponentSet`](crate::ComponentSet) to the tuple impls of this crate.
    pub trait Sealed {}
}

/// A map from component type to the sorted table holding that type's components.
///
/// Tables are created lazily and never removed individually. [`clear_all`](Self::clear_all)
/// drops all of them and advances the epoch, which invalidates prepared queries.
/// Types made cloneable stay cloneable across `clear_all`.
pub struct TableRegistry {
    slots: Vec<TableSlot>,
    slots_by_types: HashMap<TypeIndex, usize>,
    cloneable_tables: HashMap<TypeIndex, fn() -> ErasedValue>,
    epoch: u64,
}

// Safety: every slot holds a `SortedTable<C>` with `C: Component`, which is `Send + Sync`.
unsafe impl Send for TableRegistry {}
unsafe impl Sync for TableRegistry {}

impl TableRegistry {
    pub(crate) fn new() -> Self {
        TableRegistry {
            slots: Vec::new(),
            slots_by_types: Default::default(),
            cloneable_tables: Default::default(),
            epoch: 0,
        }
    }

    #[inline]
    pub fn index_of<C: Component>(&self) -> Option<usize> {
        self.slots_by_types.get(&TypeIndex::of::<C>()).copied()
    }

    pub fn index_or_insert<C: Component>(&mut self) -> usize {
        match self.slots_by_types.entry(TypeIndex::of::<C>()) {
            hash_map::Entry::Occupied(e) => *e.get(),
            hash_map::Entry::Vacant(e) => {
                let index = self.slots.len();
                let table = match self.cloneable_tables.get(e.key()) {
                    Some(new_table) => new_table(),
                    None => ErasedValue::of(SortedTable::<C>::new()),
                };
                self.slots.push(TableSlot {
                    type_index: *e.key(),
                    table,
                    len: table_len::<C>,
                });
                e.insert(index);

                debug!(component = std::any::type_name::<C>(), index, "created component table");
                index
            }
        }
    }

    /// Returns the type stored in the slot at `index`.
    pub fn type_at(&self, index: usize) -> Option<TypeIndex> {
        self.slots.get(index).map(|slot| slot.type_index)
    }

    /// Safety: the slot at `index` must exist and hold a `SortedTable<C>`.
    #[inline]
    pub unsafe fn table_at<C: Component>(&self, index: usize) -> &SortedTable<C> {
        self.slots.get_unchecked(index).table.get_as::<SortedTable<C>>()
    }

    /// Safety: the slot at `index` must exist and hold a `SortedTable<C>`.
    #[inline]
    pub unsafe fn table_at_mut<C: Component>(&mut self, index: usize) -> &mut SortedTable<C> {
        self.slots
            .get_unchecked_mut(index)
            .table
            .get_as_mut::<SortedTable<C>>()
    }

    pub fn table<C: Component>(&self) -> Option<&SortedTable<C>> {
        let index = self.index_of::<C>()?;
        // Safety: the slot was registered under the type index of `C`.
        Some(unsafe { self.table_at::<C>(index) })
    }

    pub fn table_mut<C: Component>(&mut self) -> Option<&mut SortedTable<C>> {
        let index = self.index_of::<C>()?;
        // Safety: the slot was registered under the type index of `C`.
        Some(unsafe { self.table_at_mut::<C>(index) })
    }

    pub fn table_or_insert<C: Component>(&mut self) -> &mut SortedTable<C> {
        let index = self.index_or_insert::<C>();
        // Safety: the slot was registered under the type index of `C`.
        unsafe { self.table_at_mut::<C>(index) }
    }

    /// Returns the keys and a pointer to the values of the table at `index`.
    /// The pointers stay valid until the registry is structurally modified.
    ///
    /// Safety: the slot at `index` must exist and hold a `SortedTable<C>`.
    pub unsafe fn column_at<C: Component>(&mut self, index: usize) -> (*const [Handle], *mut C) {
        let (keys, values) = self.table_at_mut::<C>(index).raw_parts_mut();
        (keys as *const [Handle], values)
    }

    /// Makes the table of `C` support copying, creating the table if needed.
    pub fn make_cloneable<C: Component + Clone>(&mut self) {
        self.cloneable_tables
            .insert(TypeIndex::of::<C>(), new_cloneable_table::<C>);

        let index = self.index_or_insert::<C>();
        let slot = &mut self.slots[index];

        if !slot.table.is_cloneable() {
            // Safety: the slot was registered under the type index of `C`.
            let table = unsafe { slot.table.take_as::<SortedTable<C>>() };
            slot.table.emplace_cloneable(table);
            debug!(component = std::any::type_name::<C>(), "component table made cloneable");
        }
    }

    /// Copies every table. Fails if any table was not made cloneable.
    pub fn try_clone(&self) -> Result<Self, HolderError> {
        let slots = self
            .slots
            .iter()
            .map(|slot| {
                Ok(TableSlot {
                    type_index: slot.type_index,
                    table: slot.table.try_clone().map_err(|err| match err {
                        HolderError::InvalidOperation { .. } => HolderError::InvalidOperation {
                            type_name: slot.type_index.name(),
                        },
                        err => err,
                    })?,
                    len: slot.len,
                })
            })
            .collect::<Result<Vec<_>, HolderError>>()?;

        Ok(TableRegistry {
            slots,
            slots_by_types: self.slots_by_types.clone(),
            cloneable_tables: self.cloneable_tables.clone(),
            epoch: self.epoch,
        })
    }

    /// Drops every table.
    pub fn clear_all(&mut self) {
        debug!(n_tables = self.slots.len(), "dropping all component tables");
        self.slots.clear();
        self.slots_by_types.clear();
        self.epoch += 1;
    }

    pub fn epoch(&self) -> u64 {
        self.epoch
    }

    /// Returns the number of tables.
    pub fn len(&self) -> usize {
        self.slots.len()
    }

    pub fn is_empty(&self) -> bool {
        self.slots.is_empty()
    }

    /// Returns every table's component type and number of rows.
    pub fn iter_counts(&self) -> impl Iterator<Item = (TypeIndex, usize)> + '_ {
        self.slots
            .iter()
            // Safety: `len` was recorded for the table type stored in the slot.
            .map(|slot| (slot.type_index, unsafe { (slot.len)(&slot.table) }))
    }
}
