use crate::handle::HandleAllocator;
use crate::{Component, ComponentStore, Entity};

/// A group of components that are bound to an entity together.
///
/// Implemented for tuples of up to eight components and derivable for structs
/// whose fields are components:
///
/// ```
/// use component_store::{Bundle, ComponentStore};
///
/// struct Position(f32, f32);
/// struct Speed(f32);
///
/// #[derive(Bundle)]
/// struct Mover {
///     position: Position,
///     speed: Speed,
/// }
///
/// let mut store = ComponentStore::new();
/// let e = store.spawn(Mover {
///     position: Position(0.0, 1.0),
///     speed: Speed(3.0),
/// });
/// assert_eq!(store.get::<Speed>(e).0, 3.0);
/// ```
pub trait Bundle {
    /// Binds every component that `entity` does not have yet.
    /// Returns the number of components inserted.
    fn bind_to<Alloc: HandleAllocator>(self, store: &mut ComponentStore<Alloc>, entity: Entity) -> usize;

    /// Binds every component, replacing the ones `entity` already has.
    /// A type listed more than once keeps the last value.
    fn assign_to<Alloc: HandleAllocator>(self, store: &mut ComponentStore<Alloc>, entity: Entity);

    /// Binds every component without checking for existing ones.
    ///
    /// `entity` must have none of the components and the bundle must not list a type
    /// twice. Otherwise the tables end up with duplicate keys (see
    /// [`ComponentStore::bind_unchecked`]).
    fn bind_to_unchecked<Alloc: HandleAllocator>(self, store: &mut ComponentStore<Alloc>, entity: Entity);
}

macro_rules! impl_bundle {
    ($($ty:ident $idx:tt),+) => {
        impl<$($ty: Component),+> Bundle for ($($ty,)+) {
            fn bind_to<Alloc: HandleAllocator>(self, store: &mut ComponentStore<Alloc>, entity: Entity) -> usize {
                0 $(+ store.bind(entity, self.$idx).1 as usize)+
            }

            fn assign_to<Alloc: HandleAllocator>(self, store: &mut ComponentStore<Alloc>, entity: Entity) {
                $(store.bind_or_assign(entity, self.$idx);)+
            }

            fn bind_to_unchecked<Alloc: HandleAllocator>(self, store: &mut ComponentStore<Alloc>, entity: Entity) {
                $(store.bind_unchecked(entity, self.$idx);)+
            }
        }
    };
}

impl_bundle!(A 0);
impl_bundle!(A 0, B 1);
impl_bundle!(A 0, B 1, C 2);
impl_bundle!(A 0, B 1, C 2, D 3);
impl_bundle!(A 0, B 1, C 2, D 3, E 4);
impl_bundle!(A 0, B 1, C 2, D 3, E 4, F 5);
impl_bundle!(A 0, B 1, C 2, D 3, E 4, F 5, G 6);
impl_bundle!(A 0, B 1, C 2, D 3, E 4, F 5, G 6, H 7);
