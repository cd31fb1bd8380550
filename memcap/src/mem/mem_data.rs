//! Generic address and buffer association structures.

use crate::types::{umem, Address, CSliceMut, CSliceRef, OpaqueCallback, PhysicalAddress};

/// Pairs an address with a buffer or a length.
#[repr(C)]
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash)]
#[cfg_attr(feature = "serde", derive(::serde::Serialize, ::serde::Deserialize))]
pub struct MemData<A, T>(pub A, pub T);

/// MemData type for virtual memory reads.
pub type ReadData<'a> = MemData<Address, CSliceMut<'a, u8>>;

/// MemData type for virtual memory writes.
pub type WriteData<'a> = MemData<Address, CSliceRef<'a, u8>>;

/// MemData type for physical memory reads.
pub type PhysicalReadData<'a> = MemData<PhysicalAddress, CSliceMut<'a, u8>>;

/// MemData type for physical memory writes.
pub type PhysicalWriteData<'a> = MemData<PhysicalAddress, CSliceRef<'a, u8>>;

/// A range of memory, address and size.
pub type MemoryRange = MemData<Address, umem>;

pub type MemoryRangeCallback<'a> = OpaqueCallback<'a, MemoryRange>;

/// Remaps `size` bytes at `base` onto `real_base` of the underlying backend.
#[repr(C)]
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
#[cfg_attr(feature = "serde", derive(::serde::Serialize, ::serde::Deserialize))]
pub struct PhysicalMemoryMapping {
    pub base: Address,
    pub size: umem,
    pub real_base: Address,
}

impl MemoryRange {
    /// Exclusive end of the range.
    pub fn end(&self) -> Address {
        self.0 + self.1
    }

    pub fn contains(&self, address: Address) -> bool {
        self.0 <= address && address < self.end()
    }
}
