//! Typed handles onto state vector storage.
//!
//! Storage is a single shared byte buffer with interior mutability
//! (`Rc<[Cell<u8>]>`). Handles are cheap clones that keep the buffer
//! alive; none of them are `Send`, matching the single-executor model:
//! one logical writer drives the state machine, external readers copy
//! regions out between steps.

use std::cell::Cell;
use std::marker::PhantomData;
use std::rc::Rc;

use crate::error::{Error, Result};
use crate::scalar::{ElementType, Scalar, Value};

/// Shared backing storage for a state vector.
pub type ByteStore = Rc<[Cell<u8>]>;

/// Allocate a zeroed byte store of the given size.
pub fn new_store(size_bytes: usize) -> ByteStore {
    vec![Cell::new(0u8); size_bytes].into()
}

/// A type-erased handle to one cell of a byte store.
#[derive(Clone)]
pub struct AnyElement {
    ty: ElementType,
    offset: usize,
    store: ByteStore,
}

impl AnyElement {
    /// Create a handle of the given kind at a byte offset into `store`.
    /// The cell `[offset, offset + size)` must lie within the store.
    pub fn new(ty: ElementType, store: ByteStore, offset: usize) -> AnyElement {
        debug_assert!(offset + ty.size_bytes() <= store.len());
        AnyElement { ty, offset, store }
    }

    /// Kind tag of the stored value.
    pub fn ty(&self) -> ElementType {
        self.ty
    }

    /// Size of the stored value in bytes.
    pub fn size(&self) -> usize {
        self.ty.size_bytes()
    }

    /// Raw address of the cell, for advanced integrators.
    pub fn addr(&self) -> *const u8 {
        self.store[self.offset..].as_ptr() as *const u8
    }

    fn cells(&self) -> &[Cell<u8>] {
        &self.store[self.offset..self.offset + self.ty.size_bytes()]
    }

    /// Read the current value widened to f64.
    pub fn read_f64(&self) -> f64 {
        match self.ty {
            ElementType::Int8 => i8::load(self.cells()).into_f64(),
            ElementType::Int16 => i16::load(self.cells()).into_f64(),
            ElementType::Int32 => i32::load(self.cells()).into_f64(),
            ElementType::Int64 => i64::load(self.cells()).into_f64(),
            ElementType::Uint8 => u8::load(self.cells()).into_f64(),
            ElementType::Uint16 => u16::load(self.cells()).into_f64(),
            ElementType::Uint32 => u32::load(self.cells()).into_f64(),
            ElementType::Uint64 => u64::load(self.cells()).into_f64(),
            ElementType::Float32 => f32::load(self.cells()).into_f64(),
            ElementType::Float64 => f64::load(self.cells()).into_f64(),
            ElementType::Bool => bool::load(self.cells()).into_f64(),
        }
    }

    /// Safe-cast `v` to the stored kind and write it.
    pub fn write_f64(&self, v: f64) {
        match self.ty {
            ElementType::Int8 => i8::from_f64(v).store(self.cells()),
            ElementType::Int16 => i16::from_f64(v).store(self.cells()),
            ElementType::Int32 => i32::from_f64(v).store(self.cells()),
            ElementType::Int64 => i64::from_f64(v).store(self.cells()),
            ElementType::Uint8 => u8::from_f64(v).store(self.cells()),
            ElementType::Uint16 => u16::from_f64(v).store(self.cells()),
            ElementType::Uint32 => u32::from_f64(v).store(self.cells()),
            ElementType::Uint64 => u64::from_f64(v).store(self.cells()),
            ElementType::Float32 => f32::from_f64(v).store(self.cells()),
            ElementType::Float64 => f64::from_f64(v).store(self.cells()),
            ElementType::Bool => bool::from_f64(v).store(self.cells()),
        }
    }

    /// Read the current value with its dynamic type.
    pub fn value(&self) -> Value {
        match self.ty {
            ElementType::Int8 => Value::I8(i8::load(self.cells())),
            ElementType::Int16 => Value::I16(i16::load(self.cells())),
            ElementType::Int32 => Value::I32(i32::load(self.cells())),
            ElementType::Int64 => Value::I64(i64::load(self.cells())),
            ElementType::Uint8 => Value::U8(u8::load(self.cells())),
            ElementType::Uint16 => Value::U16(u16::load(self.cells())),
            ElementType::Uint32 => Value::U32(u32::load(self.cells())),
            ElementType::Uint64 => Value::U64(u64::load(self.cells())),
            ElementType::Float32 => Value::F32(f32::load(self.cells())),
            ElementType::Float64 => Value::F64(f64::load(self.cells())),
            ElementType::Bool => Value::Bool(bool::load(self.cells())),
        }
    }

    /// Narrow to a typed handle. Fails with `TypeMismatch` if `T` does
    /// not match the stored kind.
    pub fn typed<T: Scalar>(&self) -> Result<Element<T>> {
        if T::TYPE != self.ty {
            return Err(Error::TypeMismatch);
        }
        Ok(Element {
            any: self.clone(),
            _marker: PhantomData,
        })
    }
}

impl std::fmt::Debug for AnyElement {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("AnyElement")
            .field("ty", &self.ty)
            .field("offset", &self.offset)
            .finish()
    }
}

/// A typed handle to one cell of a byte store.
///
/// `size() == size_of::<T>()` and `ty()` is the tag matching `T` by
/// construction; `typed` enforces it at the only narrowing point.
#[derive(Debug, Clone)]
pub struct Element<T: Scalar> {
    any: AnyElement,
    _marker: PhantomData<T>,
}

impl<T: Scalar> Element<T> {
    /// Read the current value.
    pub fn read(&self) -> T {
        T::load(self.any.cells())
    }

    /// Write a new value.
    pub fn write(&self, v: T) {
        v.store(self.any.cells());
    }

    /// Kind tag of the stored value.
    pub fn ty(&self) -> ElementType {
        T::TYPE
    }

    /// Size of the stored value in bytes.
    pub fn size(&self) -> usize {
        T::TYPE.size_bytes()
    }

    /// Raw address of the cell.
    pub fn addr(&self) -> *const u8 {
        self.any.addr()
    }

    /// The type-erased handle for this cell.
    pub fn as_any(&self) -> &AnyElement {
        &self.any
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_typed_read_write() {
        let store = new_store(12);
        let a = AnyElement::new(ElementType::Int32, store.clone(), 0);
        let b = AnyElement::new(ElementType::Float64, store.clone(), 4);

        let a32 = a.typed::<i32>().unwrap();
        a32.write(-42);
        assert_eq!(a32.read(), -42);
        assert_eq!(a.value(), Value::I32(-42));

        let b64 = b.typed::<f64>().unwrap();
        b64.write(9.81);
        assert_eq!(b64.read(), 9.81);
    }

    #[test]
    fn test_typed_rejects_wrong_type() {
        let store = new_store(4);
        let a = AnyElement::new(ElementType::Uint32, store, 0);
        assert_eq!(a.typed::<i32>().unwrap_err(), Error::TypeMismatch);
        assert!(a.typed::<u32>().is_ok());
    }

    #[test]
    fn test_f64_round_trip_clamps() {
        let store = new_store(1);
        let a = AnyElement::new(ElementType::Uint8, store, 0);
        a.write_f64(300.7);
        assert_eq!(a.read_f64(), 255.0);
        a.write_f64(-3.0);
        assert_eq!(a.read_f64(), 0.0);
    }

    #[test]
    fn test_handles_share_storage() {
        let store = new_store(2);
        let a = AnyElement::new(ElementType::Uint16, store.clone(), 0);
        let b = AnyElement::new(ElementType::Uint16, store, 0);
        a.typed::<u16>().unwrap().write(513);
        assert_eq!(b.typed::<u16>().unwrap().read(), 513);
    }
}
