//! A holder for exactly one value whose type is erased from the holder's own type.
//!
//! The holder stores small values inline (up to [`INLINE_CAPACITY`] bytes, word aligned)
//! and falls back to a heap allocation otherwise. Alongside the payload it keeps a
//! pointer to a static operation table built for the payload's type, which is all it
//! needs to drop and clone the payload generically.
//!
//! Access does not check the type: the caller is expected to know it, which is why
//! the accessors are `unsafe`.

use crate::error::{self, HolderError};
use std::marker::PhantomData;
use std::mem::{self, MaybeUninit};
use std::{any, fmt, ptr};

const INLINE_WORDS: usize = 3;

type InlineBuf = MaybeUninit<[usize; INLINE_WORDS]>;

/// The number of bytes a payload may occupy to be stored without a heap allocation.
pub const INLINE_CAPACITY: usize = mem::size_of::<InlineBuf>();

#[derive(Copy, Clone)]
union Storage {
    inline: InlineBuf,
    heap: *mut u8,
}

const fn fits_inline<T>() -> bool {
    mem::size_of::<T>() <= mem::size_of::<InlineBuf>()
        && mem::align_of::<T>() <= mem::align_of::<InlineBuf>()
}

impl Storage {
    const EMPTY: Storage = Storage {
        heap: ptr::null_mut(),
    };

    fn new<T>(value: T) -> Self {
        if fits_inline::<T>() {
            let mut storage = Storage {
                inline: MaybeUninit::uninit(),
            };
            // Safety: the buffer is large and aligned enough for `T`.
            unsafe { ptr::write(storage.inline.as_mut_ptr() as *mut T, value) };
            storage
        } else {
            Storage {
                heap: Box::into_raw(Box::new(value)) as *mut u8,
            }
        }
    }

    /// Safety: the storage must hold a `T`.
    unsafe fn ptr<T>(&self) -> *const T {
        if fits_inline::<T>() {
            self.inline.as_ptr() as *const T
        } else {
            self.heap as *const T
        }
    }

    /// Safety: the storage must hold a `T`.
    unsafe fn ptr_mut<T>(&mut self) -> *mut T {
        if fits_inline::<T>() {
            self.inline.as_mut_ptr() as *mut T
        } else {
            self.heap as *mut T
        }
    }
}

unsafe fn drop_value<T>(storage: &mut Storage) {
    if fits_inline::<T>() {
        ptr::drop_in_place(storage.ptr_mut::<T>());
    } else {
        drop(Box::from_raw(storage.heap as *mut T));
    }
}

unsafe fn clone_value<T: Clone>(storage: &Storage) -> Storage {
    Storage::new((*storage.ptr::<T>()).clone())
}

unsafe fn read_value<T>(storage: &Storage) -> T {
    if fits_inline::<T>() {
        ptr::read(storage.ptr::<T>())
    } else {
        *Box::from_raw(storage.heap as *mut T)
    }
}

struct ValueOps {
    drop: unsafe fn(&mut Storage),
    clone: Option<unsafe fn(&Storage) -> Storage>,
    type_name: fn() -> &'static str,
}

struct Ops<T>(PhantomData<T>);

impl<T: 'static> Ops<T> {
    const PLAIN: &'static ValueOps = &ValueOps {
        drop: drop_value::<T>,
        clone: None,
        type_name: any::type_name::<T>,
    };
}

impl<T: Clone + 'static> Ops<T> {
    const CLONEABLE: &'static ValueOps = &ValueOps {
        drop: drop_value::<T>,
        clone: Some(clone_value::<T>),
        type_name: any::type_name::<T>,
    };
}

/// A type-erased holder of a single value.
pub struct ErasedValue {
    storage: Storage,
    ops: Option<&'static ValueOps>,
}

impl ErasedValue {
    /// Creates an empty holder.
    pub const fn new() -> Self {
        ErasedValue {
            storage: Storage::EMPTY,
            ops: None,
        }
    }

    /// Creates a holder of `value` that cannot be copied.
    pub fn of<T: 'static>(value: T) -> Self {
        let mut erased = Self::new();
        erased.emplace(value);
        erased
    }

    /// Creates a holder of `value` that supports [`copy_from`](Self::copy_from).
    pub fn cloneable<T: Clone + 'static>(value: T) -> Self {
        let mut erased = Self::new();
        erased.emplace_cloneable(value);
        erased
    }

    /// Returns `true` if values of type `T` are stored without a heap allocation.
    pub const fn stores_inline<T>() -> bool {
        fits_inline::<T>()
    }

    /// Drops the current payload and stores `value` instead.
    /// Copying the holder afterwards fails with [`HolderError::InvalidOperation`].
    pub fn emplace<T: 'static>(&mut self, value: T) {
        self.reset();
        self.storage = Storage::new(value);
        self.ops = Some(Ops::<T>::PLAIN);
    }

    /// Drops the current payload and stores `value` instead, recording how to clone it.
    pub fn emplace_cloneable<T: Clone + 'static>(&mut self, value: T) {
        self.reset();
        self.storage = Storage::new(value);
        self.ops = Some(Ops::<T>::CLONEABLE);
    }

    #[inline]
    fn ops(&self) -> &'static ValueOps {
        match self.ops {
            Some(ops) => ops,
            None => error::fail(HolderError::IllegalState),
        }
    }

    /// Returns a reference to the payload.
    /// Panics if the holder is empty.
    ///
    /// # Safety
    /// The payload must be of type `T`.
    #[inline]
    pub unsafe fn get_as<T: 'static>(&self) -> &T {
        self.ops();
        &*self.storage.ptr::<T>()
    }

    /// Returns a mutable reference to the payload.
    /// Panics if the holder is empty.
    ///
    /// # Safety
    /// The payload must be of type `T`.
    #[inline]
    pub unsafe fn get_as_mut<T: 'static>(&mut self) -> &mut T {
        self.ops();
        &mut *self.storage.ptr_mut::<T>()
    }

    /// Moves the payload out, leaving the holder empty.
    /// Panics if the holder is empty.
    ///
    /// # Safety
    /// The payload must be of type `T`.
    pub unsafe fn take_as<T: 'static>(&mut self) -> T {
        self.ops();
        self.ops = None;
        read_value::<T>(&self.storage)
    }

    /// Replaces the payload with a clone of `other`'s payload.
    /// Does nothing if `other` is empty.
    pub fn try_copy_from(&mut self, other: &ErasedValue) -> Result<(), HolderError> {
        let Some(ops) = other.ops else {
            return Ok(());
        };
        let clone = ops.clone.ok_or(HolderError::InvalidOperation {
            type_name: (ops.type_name)(),
        })?;

        // Safety: `ops` was recorded for the type currently stored in `other`.
        let storage = unsafe { clone(&other.storage) };

        self.reset();
        self.storage = storage;
        self.ops = Some(ops);
        Ok(())
    }

    /// Same as [`try_copy_from`](Self::try_copy_from), but panics if `other`'s
    /// payload was not stored as cloneable.
    pub fn copy_from(&mut self, other: &ErasedValue) {
        if let Err(err) = self.try_copy_from(other) {
            error::fail(err);
        }
    }

    /// Returns a new holder with a clone of the payload.
    pub fn try_clone(&self) -> Result<ErasedValue, HolderError> {
        let mut erased = Self::new();
        erased.try_copy_from(self)?;
        Ok(erased)
    }

    /// Takes `other`'s payload, leaving `other` empty.
    /// Does nothing if `other` is empty.
    pub fn move_from(&mut self, other: &mut ErasedValue) {
        let Some(ops) = other.ops.take() else {
            return;
        };
        self.reset();
        self.storage = other.storage;
        self.ops = Some(ops);
    }

    /// Drops the payload, leaving the holder empty.
    pub fn reset(&mut self) {
        if let Some(ops) = self.ops.take() {
            // Safety: `ops` was recorded for the type currently stored.
            unsafe { (ops.drop)(&mut self.storage) };
        }
    }

    pub fn is_empty(&self) -> bool {
        self.ops.is_none()
    }

    /// Returns `true` if the payload can be copied.
    pub fn is_cloneable(&self) -> bool {
        self.ops.map_or(false, |ops| ops.clone.is_some())
    }

    /// Returns the name of the payload's type.
    pub fn type_name(&self) -> Option<&'static str> {
        self.ops.map(|ops| (ops.type_name)())
    }
}

impl Default for ErasedValue {
    fn default() -> Self {
        Self::new()
    }
}

impl Drop for ErasedValue {
    fn drop(&mut self) {
        self.reset();
    }
}

impl fmt::Debug for ErasedValue {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("ErasedValue")
            .field("type", &self.type_name())
            .field("cloneable", &self.is_cloneable())
            .finish()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::cell::Cell;
    use std::rc::Rc;

    #[derive(Clone)]
    struct DropCounter<const N: usize> {
        drops: Rc<Cell<usize>>,
        _padding: [u64; N],
    }

    impl<const N: usize> DropCounter<N> {
        fn new(drops: &Rc<Cell<usize>>) -> Self {
            Self {
                drops: Rc::clone(drops),
                _padding: [0; N],
            }
        }
    }

    impl<const N: usize> Drop for DropCounter<N> {
        fn drop(&mut self) {
            self.drops.set(self.drops.get() + 1);
        }
    }

    #[repr(align(64))]
    #[derive(Debug, Clone, PartialEq)]
    struct OverAligned(u8);

    #[test]
    fn round_trip() {
        let value = ErasedValue::of(42_i32);
        assert_eq!(unsafe { *value.get_as::<i32>() }, 42);

        let mut value = ErasedValue::of(String::from("hello"));
        unsafe { value.get_as_mut::<String>().push_str(" world") };
        assert_eq!(unsafe { value.get_as::<String>() }, "hello world");
        assert_eq!(value.type_name(), Some(any::type_name::<String>()));
    }

    #[test]
    fn large_and_over_aligned_values_go_to_the_heap() {
        assert!(ErasedValue::stores_inline::<Vec<u8>>());
        assert!(ErasedValue::stores_inline::<()>());
        assert!(!ErasedValue::stores_inline::<[u64; 16]>());
        assert!(!ErasedValue::stores_inline::<OverAligned>());

        let big = ErasedValue::of([7_u64; 16]);
        assert_eq!(unsafe { big.get_as::<[u64; 16]>() }, &[7; 16]);

        let aligned = ErasedValue::cloneable(OverAligned(3));
        let ptr = unsafe { aligned.get_as::<OverAligned>() } as *const OverAligned;
        assert_eq!(ptr as usize % 64, 0);

        let copy = aligned.try_clone().unwrap();
        assert_eq!(unsafe { copy.get_as::<OverAligned>() }, &OverAligned(3));
    }

    #[test]
    fn drops_exactly_once() {
        let drops = Rc::new(Cell::new(0));

        let mut value = ErasedValue::of(DropCounter::<0>::new(&drops));
        value.emplace(DropCounter::<0>::new(&drops));
        assert_eq!(drops.get(), 1);

        value.reset();
        assert_eq!(drops.get(), 2);
        assert!(value.is_empty());

        value.reset();
        assert_eq!(drops.get(), 2);

        {
            let _heap = ErasedValue::of(DropCounter::<8>::new(&drops));
            assert!(!ErasedValue::stores_inline::<DropCounter<8>>());
        }
        assert_eq!(drops.get(), 3);
    }

    #[test]
    fn move_leaves_source_empty() {
        let drops = Rc::new(Cell::new(0));

        let mut src = ErasedValue::of(DropCounter::<8>::new(&drops));
        let mut dst = ErasedValue::of(5_u8);
        dst.move_from(&mut src);

        assert!(src.is_empty());
        assert!(!dst.is_empty());
        drop(src);
        assert_eq!(drops.get(), 0);
        drop(dst);
        assert_eq!(drops.get(), 1);
    }

    #[test]
    fn move_from_empty_is_a_no_op() {
        let mut dst = ErasedValue::of(9_u32);
        dst.move_from(&mut ErasedValue::new());
        assert_eq!(unsafe { *dst.get_as::<u32>() }, 9);
    }

    #[test]
    fn copy_clones_the_payload() {
        let src = ErasedValue::cloneable(vec![1, 2, 3]);
        let mut dst = ErasedValue::new();
        dst.copy_from(&src);

        unsafe { dst.get_as_mut::<Vec<i32>>().push(4) };
        assert_eq!(unsafe { src.get_as::<Vec<i32>>() }, &[1, 2, 3]);
        assert_eq!(unsafe { dst.get_as::<Vec<i32>>() }, &[1, 2, 3, 4]);
        assert!(dst.is_cloneable());
    }

    #[test]
    fn copy_from_empty_keeps_the_current_value() {
        let mut dst = ErasedValue::of(1.5_f32);
        dst.copy_from(&ErasedValue::new());
        assert_eq!(unsafe { *dst.get_as::<f32>() }, 1.5);
    }

    #[test]
    fn copying_a_non_cloneable_payload_fails() {
        let src = ErasedValue::of(10_u16);
        let mut dst = ErasedValue::of(1_u16);

        assert_eq!(
            dst.try_copy_from(&src),
            Err(HolderError::InvalidOperation { type_name: "u16" })
        );
        // The destination is left untouched.
        assert_eq!(unsafe { *dst.get_as::<u16>() }, 1);
    }

    #[test]
    #[should_panic(expected = "invalid operation")]
    fn copy_from_panics_on_non_cloneable_payload() {
        let src = ErasedValue::of(String::new());
        ErasedValue::new().copy_from(&src);
    }

    #[test]
    #[should_panic(expected = "illegal state")]
    fn access_to_an_empty_holder_panics() {
        let value = ErasedValue::new();
        unsafe { value.get_as::<u32>() };
    }

    #[test]
    fn take_moves_the_payload_out() {
        let mut value = ErasedValue::of(String::from("taken"));
        let taken = unsafe { value.take_as::<String>() };

        assert_eq!(taken, "taken");
        assert!(value.is_empty());
    }
}
