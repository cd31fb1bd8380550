/*!
Physical memory access, the capability every connector provides.
*/

use crate::error::Result;
use crate::types::{umem, Address, PhysicalAddress};

use super::mem_data::*;

use dataview::{Pod, PodMethods};

/// Byte level access to a physical address space.
///
/// Backends implement the two batch functions and [`metadata`](Self::metadata), the single
/// range and typed helpers are layered on top. A batch either succeeds as a whole or fails as a
/// whole: one range that can not be served turns the call into `UnableToReadMemory` or
/// `UnableToWriteMemory`, even though other ranges may already have been transferred.
///
/// # Examples
///
/// A backend over a fixed buffer:
/// ```
/// use memcap::error::{Error, ErrorKind, ErrorOrigin, Result};
/// use memcap::mem::{MemData, PhysicalMemory, PhysicalMemoryMetadata, PhysicalReadData, PhysicalWriteData};
/// use memcap::types::umem;
///
/// struct Flat(Vec<u8>);
///
/// impl Flat {
///     fn range(&mut self, addr: umem, len: usize) -> Option<&mut [u8]> {
///         let start = addr as usize;
///         self.0.get_mut(start..start.checked_add(len)?)
///     }
/// }
///
/// impl PhysicalMemory for Flat {
///     fn phys_read_raw_list(&mut self, data: &mut [PhysicalReadData]) -> Result<()> {
///         let mut res = Ok(());
///         for MemData(addr, out) in data.iter_mut() {
///             match self.range(addr.to_umem(), out.len()) {
///                 Some(src) => out.copy_from_slice(src),
///                 None => res = Err(Error(ErrorOrigin::PhysicalMemory, ErrorKind::UnableToReadMemory)),
///             }
///         }
///         res
///     }
///
///     fn phys_write_raw_list(&mut self, data: &[PhysicalWriteData]) -> Result<()> {
///         let mut res = Ok(());
///         for MemData(addr, src) in data.iter() {
///             match self.range(addr.to_umem(), src.len()) {
///                 Some(dst) => dst.copy_from_slice(src),
///                 None => res = Err(Error(ErrorOrigin::PhysicalMemory, ErrorKind::UnableToWriteMemory)),
///             }
///         }
///         res
///     }
///
///     fn metadata(&self) -> PhysicalMemoryMetadata {
///         PhysicalMemoryMetadata {
///             max_address: (self.0.len() - 1).into(),
///             real_size: self.0.len() as umem,
///             readonly: false,
///         }
///     }
/// }
///
/// let mut mem = Flat(vec![0; 0x1000]);
/// mem.phys_write(0x10_u64.into(), &0xfeed_u16).unwrap();
/// assert_eq!(mem.phys_read::<u16>(0x10_u64.into()).unwrap(), 0xfeed);
/// assert!(mem.phys_read::<u16>(0xfff_u64.into()).is_err());
/// ```
pub trait PhysicalMemory: Send {
    fn phys_read_raw_list(&mut self, data: &mut [PhysicalReadData]) -> Result<()>;
    fn phys_write_raw_list(&mut self, data: &[PhysicalWriteData]) -> Result<()>;

    fn metadata(&self) -> PhysicalMemoryMetadata;

    /// Installs the ranges of the physical address space that are backed by memory.
    ///
    /// For backends that can not discover their layout, an os layer that knows better pushes
    /// it down here. It only applies to this instance, clones keep their own map.
    fn set_mem_map(&mut self, _mem_map: &[PhysicalMemoryMapping]) {}

    fn phys_read_raw_into(&mut self, addr: PhysicalAddress, out: &mut [u8]) -> Result<()> {
        self.phys_read_raw_list(&mut [MemData(addr, out.into())])
    }

    fn phys_read_raw(&mut self, addr: PhysicalAddress, len: usize) -> Result<Vec<u8>> {
        let mut out = vec![0u8; len];
        self.phys_read_raw_into(addr, &mut out).map(|_| out)
    }

    fn phys_read_into<T: Pod + ?Sized>(&mut self, addr: PhysicalAddress, out: &mut T) -> Result<()>
    where
        Self: Sized,
    {
        self.phys_read_raw_into(addr, out.as_bytes_mut())
    }

    fn phys_read<T: Pod + Sized>(&mut self, addr: PhysicalAddress) -> Result<T>
    where
        Self: Sized,
    {
        let mut out = T::zeroed();
        self.phys_read_into(addr, &mut out).map(|_| out)
    }

    fn phys_write_raw(&mut self, addr: PhysicalAddress, data: &[u8]) -> Result<()> {
        self.phys_write_raw_list(&[MemData(addr, data.into())])
    }

    fn phys_write<T: Pod + ?Sized>(&mut self, addr: PhysicalAddress, data: &T) -> Result<()>
    where
        Self: Sized,
    {
        self.phys_write_raw(addr, data.as_bytes())
    }
}

impl<T: PhysicalMemory + ?Sized> PhysicalMemory for &mut T {
    fn phys_read_raw_list(&mut self, data: &mut [PhysicalReadData]) -> Result<()> {
        (**self).phys_read_raw_list(data)
    }

    fn phys_write_raw_list(&mut self, data: &[PhysicalWriteData]) -> Result<()> {
        (**self).phys_write_raw_list(data)
    }

    fn metadata(&self) -> PhysicalMemoryMetadata {
        (**self).metadata()
    }

    fn set_mem_map(&mut self, mem_map: &[PhysicalMemoryMapping]) {
        (**self).set_mem_map(mem_map)
    }
}

/// Size and access mode of a physical address space.
///
/// `real_size` counts the backed bytes, which may be less than `max_address + 1` when the
/// space has holes.
#[repr(C)]
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
#[cfg_attr(feature = "serde", derive(::serde::Serialize, ::serde::Deserialize))]
pub struct PhysicalMemoryMetadata {
    pub max_address: Address,
    pub real_size: umem,
    pub readonly: bool,
}
