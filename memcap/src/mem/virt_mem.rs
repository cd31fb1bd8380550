use crate::architecture::ArchitectureObj;
use crate::error::{Error, ErrorKind, ErrorOrigin, Result};
use crate::types::Address;

use super::mem_data::*;

use dataview::{Pod, PodMethods};

/// The `VirtualMemory` trait implements access to virtual memory for a specific process
/// and provides a generic way to read and write from/to that processes virtual memory.
///
/// Like [`PhysicalMemory`](super::PhysicalMemory) the list functions process every entry in
/// order and return one aggregate status for the batch.
///
/// # Examples
///
/// Reading from `VirtualMemory`:
/// ```
/// use memcap::types::Address;
/// use memcap::mem::VirtualMemory;
///
/// fn read<T: VirtualMemory>(virt_mem: &mut T, read_addr: Address) -> u64 {
///     let mut addr = 0u64;
///     virt_mem.virt_read_into(read_addr, &mut addr).unwrap();
///     addr
/// }
/// # use memcap::dummy::{DummyMemory, DummyOs};
/// # use memcap::os::{OsInner, Process};
/// # use memcap::types::size;
/// # let mut os = DummyOs::new(DummyMemory::new(size::mb(8)));
/// # let pid = os.alloc_process(size::mb(1), &[255, 0, 255, 0, 255, 0, 255, 0]).unwrap();
/// # let mut proc = os.into_process_by_pid(pid).unwrap();
/// # let base = proc.primary_module().unwrap().base;
/// # assert_eq!(read(&mut proc, base), 0x00ff_00ff_00ff_00ff);
/// ```
pub trait VirtualMemory: Send {
    fn virt_read_raw_list(&mut self, data: &mut [ReadData]) -> Result<()>;

    fn virt_write_raw_list(&mut self, data: &[WriteData]) -> Result<()>;

    // read helpers
    fn virt_read_raw_into(&mut self, addr: Address, out: &mut [u8]) -> Result<()> {
        self.virt_read_raw_list(&mut [MemData(addr, out.into())])
    }

    fn virt_read_into<T: Pod + ?Sized>(&mut self, addr: Address, out: &mut T) -> Result<()>
    where
        Self: Sized,
    {
        self.virt_read_raw_into(addr, out.as_bytes_mut())
    }

    fn virt_read_raw(&mut self, addr: Address, len: usize) -> Result<Vec<u8>> {
        let mut buf = vec![0u8; len];
        self.virt_read_raw_into(addr, &mut buf)?;
        Ok(buf)
    }

    fn virt_read<T: Pod + Sized>(&mut self, addr: Address) -> Result<T>
    where
        Self: Sized,
    {
        let mut obj = T::zeroed();
        self.virt_read_into(addr, &mut obj)?;
        Ok(obj)
    }

    // write helpers
    fn virt_write_raw(&mut self, addr: Address, data: &[u8]) -> Result<()> {
        self.virt_write_raw_list(&[MemData(addr, data.into())])
    }

    fn virt_write<T: Pod + ?Sized>(&mut self, addr: Address, data: &T) -> Result<()>
    where
        Self: Sized,
    {
        self.virt_write_raw(addr, data.as_bytes())
    }

    // specific read helpers
    fn virt_read_addr32(&mut self, addr: Address) -> Result<Address>
    where
        Self: Sized,
    {
        self.virt_read::<u32>(addr).map(Address::from)
    }

    fn virt_read_addr64(&mut self, addr: Address) -> Result<Address>
    where
        Self: Sized,
    {
        self.virt_read::<u64>(addr).map(Address::from)
    }

    /// Reads a pointer sized value according to the pointer width of `arch`.
    fn virt_read_addr_arch(&mut self, arch: ArchitectureObj, addr: Address) -> Result<Address>
    where
        Self: Sized,
    {
        match arch.bits() {
            64 => self.virt_read_addr64(addr),
            32 => self.virt_read_addr32(addr),
            _ => Err(Error(ErrorOrigin::VirtualMemory, ErrorKind::InvalidArchitecture)),
        }
    }

    /// Reads a nul terminated string of at most `len` bytes.
    fn virt_read_char_string(&mut self, addr: Address, len: usize) -> Result<String> {
        let mut buf = self.virt_read_raw(addr, len)?;
        if let Some(n) = buf.iter().position(|&c| c == 0) {
            buf.truncate(n);
        }
        String::from_utf8(buf).map_err(|_| Error(ErrorOrigin::VirtualMemory, ErrorKind::Encoding))
    }
}

impl<T: VirtualMemory + ?Sized> VirtualMemory for &mut T {
    fn virt_read_raw_list(&mut self, data: &mut [ReadData]) -> Result<()> {
        (**self).virt_read_raw_list(data)
    }

    fn virt_write_raw_list(&mut self, data: &[WriteData]) -> Result<()> {
        (**self).virt_write_raw_list(data)
    }
}
