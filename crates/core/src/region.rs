//! Contiguous byte spans for bulk region I/O.

use crate::element::ByteStore;
use crate::error::{Error, Result};

/// A named-in-the-state-vector byte span suitable for binary copy in and
/// out. Region bytes are the concatenation of the region's elements in
/// declared order, native endian, no padding; the copy API performs no
/// endian conversion.
#[derive(Clone)]
pub struct Region {
    offset: usize,
    size: usize,
    store: ByteStore,
}

impl Region {
    /// Create a region spanning `[offset, offset + size)` of `store`.
    pub fn new(store: ByteStore, offset: usize, size: usize) -> Region {
        debug_assert!(offset + size <= store.len());
        Region {
            offset,
            size,
            store,
        }
    }

    /// Size of the region in bytes.
    pub fn size(&self) -> usize {
        self.size
    }

    /// Raw address of the first byte, for advanced integrators.
    pub fn addr(&self) -> *const u8 {
        self.store[self.offset..].as_ptr() as *const u8
    }

    /// Copy the region's bytes into `dst`. Fails with `SizeMismatch`
    /// unless `dst.len()` equals the region size.
    pub fn read(&self, dst: &mut [u8]) -> Result<()> {
        if dst.len() != self.size {
            return Err(Error::SizeMismatch);
        }
        let cells = &self.store[self.offset..self.offset + self.size];
        for (dst, src) in dst.iter_mut().zip(cells) {
            *dst = src.get();
        }
        Ok(())
    }

    /// Copy `src` into the region. Fails with `SizeMismatch` unless
    /// `src.len()` equals the region size.
    pub fn write(&self, src: &[u8]) -> Result<()> {
        if src.len() != self.size {
            return Err(Error::SizeMismatch);
        }
        let cells = &self.store[self.offset..self.offset + self.size];
        for (dst, src) in cells.iter().zip(src) {
            dst.set(*src);
        }
        Ok(())
    }
}

impl std::fmt::Debug for Region {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("Region")
            .field("offset", &self.offset)
            .field("size", &self.size)
            .finish()
    }
}
