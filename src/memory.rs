// memory.rs — Typed access to the target's address space.
//
// The acquisition layer itself lives outside this crate. It is consumed as
// two capabilities:
//   - `MemoryReader::read`   raw byte ranges, failing on unmapped memory
//   - `Process::module_base` load address of a named module
//
// Call sites never do address arithmetic on raw bytes. They describe a field
// once (`Field<T>`: offset + width + decoder) and go through `Remote::get`.

use std::collections::HashMap;
use std::marker::PhantomData;

use crate::error::ReadError;
use crate::math::{Vec3, ViewMatrix};

pub trait MemoryReader {
    /// Read `len` bytes at `address`.
    fn read(&self, address: u64, len: usize) -> Result<Vec<u8>, ReadError>;
}

pub trait Process: MemoryReader {
    /// Base address of a loaded module, resolved once at start-up.
    fn module_base(&self, name: &str) -> Option<u64>;
}

impl<R: MemoryReader + ?Sized> MemoryReader for &R {
    fn read(&self, address: u64, len: usize) -> Result<Vec<u8>, ReadError> {
        (**self).read(address, len)
    }
}

impl<P: Process + ?Sized> Process for &P {
    fn module_base(&self, name: &str) -> Option<u64> {
        (**self).module_base(name)
    }
}

/// A plain value with a fixed little-endian layout in the remote process.
pub trait Pod: Copy {
    const SIZE: usize;

    /// `bytes` is exactly `SIZE` long.
    fn decode(bytes: &[u8]) -> Self;
    fn encode(&self) -> Vec<u8>;
}

macro_rules! impl_pod_num {
    ($($t:ty),*) => {$(
        impl Pod for $t {
            const SIZE: usize = std::mem::size_of::<$t>();

            fn decode(bytes: &[u8]) -> Self {
                let mut raw = [0u8; std::mem::size_of::<$t>()];
                raw.copy_from_slice(bytes);
                <$t>::from_le_bytes(raw)
            }

            fn encode(&self) -> Vec<u8> {
                self.to_le_bytes().to_vec()
            }
        }
    )*};
}

impl_pod_num!(u8, i32, u32, u64, f32);

impl Pod for bool {
    const SIZE: usize = 1;

    fn decode(bytes: &[u8]) -> Self {
        bytes[0] != 0
    }

    fn encode(&self) -> Vec<u8> {
        vec![u8::from(*self)]
    }
}

impl Pod for Vec3 {
    const SIZE: usize = 12;

    fn decode(bytes: &[u8]) -> Self {
        Vec3 {
            x: f32::decode(&bytes[0..4]),
            y: f32::decode(&bytes[4..8]),
            z: f32::decode(&bytes[8..12]),
        }
    }

    fn encode(&self) -> Vec<u8> {
        [self.x, self.y, self.z].iter().flat_map(|v| v.to_le_bytes()).collect()
    }
}

impl Pod for ViewMatrix {
    const SIZE: usize = 64;

    fn decode(bytes: &[u8]) -> Self {
        let mut raw = [0u8; 64];
        raw.copy_from_slice(bytes);
        ViewMatrix::from_le_bytes(&raw)
    }

    fn encode(&self) -> Vec<u8> {
        self.0.iter().flat_map(|v| v.to_le_bytes()).collect()
    }
}

/// A typed field at a fixed offset from some base address.
pub struct Field<T> {
    offset: u64,
    _ty: PhantomData<fn() -> T>,
}

impl<T> Clone for Field<T> {
    fn clone(&self) -> Self {
        *self
    }
}

impl<T> Copy for Field<T> {}

impl<T> std::fmt::Debug for Field<T> {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "Field<{}>@{:#x}", std::any::type_name::<T>(), self.offset)
    }
}

impl<T: Pod> Field<T> {
    pub const fn at(offset: u64) -> Self {
        Self { offset, _ty: PhantomData }
    }

    pub const fn offset(&self) -> u64 {
        self.offset
    }

    pub const fn width(&self) -> usize {
        T::SIZE
    }
}

/// Typed reads on top of any [`MemoryReader`].
pub trait Remote: MemoryReader {
    /// Read a value at an absolute address.
    fn read_value<T: Pod>(&self, address: u64) -> Result<T, ReadError> {
        let bytes = self.read(address, T::SIZE)?;
        if bytes.len() != T::SIZE {
            return Err(ReadError::Short { address, wanted: T::SIZE, got: bytes.len() });
        }
        Ok(T::decode(&bytes))
    }

    /// Read `field` of the struct at `base`.
    fn get<T: Pod>(&self, base: u64, field: Field<T>) -> Result<T, ReadError> {
        self.read_value(base.wrapping_add(field.offset()))
    }

    /// Read a pointer field, mapping null to `None`.
    fn get_ptr(&self, base: u64, field: Field<u64>) -> Result<Option<u64>, ReadError> {
        self.get(base, field).map(|p| (p != 0).then_some(p))
    }
}

impl<R: MemoryReader + ?Sized> Remote for R {}

/// Sparse in-memory address space with named modules.
///
/// Backs tests and offline replays. Bytes that were never written are
/// unmapped and fail to read, just like a page the target has released.
#[derive(Debug, Default, Clone)]
pub struct SparseMemory {
    bytes: HashMap<u64, u8>,
    modules: HashMap<String, u64>,
}

impl SparseMemory {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn with_module(mut self, name: &str, base: u64) -> Self {
        self.modules.insert(name.to_owned(), base);
        self
    }

    pub fn write_bytes(&mut self, address: u64, data: &[u8]) {
        for (i, b) in data.iter().enumerate() {
            self.bytes.insert(address.wrapping_add(i as u64), *b);
        }
    }

    pub fn write<T: Pod>(&mut self, address: u64, value: T) {
        self.write_bytes(address, &value.encode());
    }

    /// Write `field` of the struct at `base`.
    pub fn put<T: Pod>(&mut self, base: u64, field: Field<T>, value: T) {
        self.write(base.wrapping_add(field.offset()), value);
    }

    /// Unmap a byte range.
    pub fn unmap(&mut self, address: u64, len: usize) {
        for i in 0..len as u64 {
            self.bytes.remove(&address.wrapping_add(i));
        }
    }
}

impl MemoryReader for SparseMemory {
    fn read(&self, address: u64, len: usize) -> Result<Vec<u8>, ReadError> {
        (0..len as u64)
            .map(|i| self.bytes.get(&address.wrapping_add(i)).copied())
            .collect::<Option<Vec<u8>>>()
            .ok_or(ReadError::Unmapped { address, len })
    }
}

impl Process for SparseMemory {
    fn module_base(&self, name: &str) -> Option<u64> {
        self.modules.get(name).copied()
    }
}
