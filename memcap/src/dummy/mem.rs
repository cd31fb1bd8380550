use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::{Arc, RwLock};

use crate::connector::{ConnectorCpuStateInner, CpuState};
use crate::error::{Error, ErrorKind, ErrorOrigin, Result};
use crate::mem::mem_data::*;
use crate::mem::{MemoryMap, PhysicalMemory, PhysicalMemoryMetadata};
use crate::plugins::Args;
use crate::types::{clamp_to_usize, size, umem};

use log::warn;

/// Zero initialized physical memory held in process memory.
///
/// Clones share the same buffer, but every clone keeps its own memory map.
#[derive(Clone)]
pub struct DummyMemory {
    buf: Arc<RwLock<Box<[u8]>>>,
    map: MemoryMap,
    paused: Arc<AtomicBool>,
}

impl DummyMemory {
    /// Creates a new DummyMemory object with the given size
    pub fn new(size: umem) -> Self {
        let buf = vec![0_u8; clamp_to_usize(size)].into_boxed_slice();
        let map = MemoryMap::identity(buf.len() as umem);
        Self {
            buf: Arc::new(RwLock::new(buf)),
            map,
            paused: Default::default(),
        }
    }

    /// Size of the backing buffer.
    pub fn buf_len(&self) -> umem {
        self.buf.read().map(|b| b.len() as umem).unwrap_or_default()
    }

    pub fn is_paused(&self) -> bool {
        self.paused.load(Ordering::SeqCst)
    }
}

fn poisoned(origin: ErrorOrigin, kind: ErrorKind) -> Error {
    Error(origin, kind).log_error("dummy memory lock is poisoned")
}

impl PhysicalMemory for DummyMemory {
    fn phys_read_raw_list(&mut self, data: &mut [PhysicalReadData]) -> Result<()> {
        let buf = self
            .buf
            .read()
            .map_err(|_| poisoned(ErrorOrigin::PhysicalMemory, ErrorKind::UnableToReadMemory))?;

        let mut failed = false;
        for MemData(addr, out) in data.iter_mut() {
            for chunk in self.map.map(addr.address(), out.len() as umem) {
                match chunk {
                    Ok(chunk) => {
                        let dst = clamp_to_usize(chunk.offset)
                            ..clamp_to_usize(chunk.offset + chunk.size);
                        let src = clamp_to_usize(chunk.real_base.to_umem());
                        match buf.get(src..src + dst.len()) {
                            Some(src) => out[dst].copy_from_slice(src),
                            None => {
                                out[dst].fill(0);
                                failed = true;
                            }
                        }
                    }
                    Err(MemData(gap, size)) => {
                        let start = clamp_to_usize(gap - addr.address());
                        out[start..start + clamp_to_usize(size)].fill(0);
                        failed = true;
                    }
                }
            }
        }

        if failed {
            Err(Error(
                ErrorOrigin::PhysicalMemory,
                ErrorKind::UnableToReadMemory,
            ))
        } else {
            Ok(())
        }
    }

    fn phys_write_raw_list(&mut self, data: &[PhysicalWriteData]) -> Result<()> {
        let mut buf = self
            .buf
            .write()
            .map_err(|_| poisoned(ErrorOrigin::PhysicalMemory, ErrorKind::UnableToWriteMemory))?;

        let mut failed = false;
        for MemData(addr, src) in data.iter() {
            for chunk in self.map.map(addr.address(), src.len() as umem) {
                match chunk {
                    Ok(chunk) => {
                        let from = clamp_to_usize(chunk.offset)
                            ..clamp_to_usize(chunk.offset + chunk.size);
                        let dst = clamp_to_usize(chunk.real_base.to_umem());
                        match buf.get_mut(dst..dst + from.len()) {
                            Some(dst) => dst.copy_from_slice(&src[from]),
                            None => failed = true,
                        }
                    }
                    Err(_) => failed = true,
                }
            }
        }

        if failed {
            Err(Error(
                ErrorOrigin::PhysicalMemory,
                ErrorKind::UnableToWriteMemory,
            ))
        } else {
            Ok(())
        }
    }

    fn metadata(&self) -> PhysicalMemoryMetadata {
        PhysicalMemoryMetadata {
            max_address: self.map.max_address(),
            real_size: self.map.real_size(),
            readonly: false,
        }
    }

    fn set_mem_map(&mut self, mem_map: &[PhysicalMemoryMapping]) {
        match MemoryMap::from_mappings(mem_map) {
            Ok(map) => self.map = map,
            Err(err) => warn!("ignoring invalid memory map: {}", err),
        }
    }
}

/// Cpu state of the dummy connector.
///
/// Pausing has no effect on memory access, it is only recorded.
#[derive(Clone)]
pub struct DummyCpuState {
    paused: Arc<AtomicBool>,
}

impl CpuState for DummyCpuState {
    fn pause(&mut self) {
        self.paused.store(true, Ordering::SeqCst)
    }

    fn resume(&mut self) {
        self.paused.store(false, Ordering::SeqCst)
    }
}

impl ConnectorCpuStateInner for DummyMemory {
    type CpuStateType<'a> = DummyCpuState;
    type IntoCpuStateType = DummyCpuState;

    fn cpu_state(&mut self) -> Result<Self::CpuStateType<'_>> {
        Ok(DummyCpuState {
            paused: self.paused.clone(),
        })
    }

    fn into_cpu_state(self) -> Result<Self::IntoCpuStateType> {
        Ok(DummyCpuState {
            paused: self.paused,
        })
    }
}

/// Parses a hexadecimal memory size with a `k`, `m` or `g` unit suffix.
///
/// `10m` is 16 megabytes.
pub fn parse_size(size: &str) -> Result<umem> {
    let (size, size_mul) = {
        let mul_arr = &[
            (size::kb(1), ["kb", "k"]),
            (size::mb(1), ["mb", "m"]),
            (size::gb(1), ["gb", "g"]),
        ];

        let lower = size.to_lowercase();
        mul_arr
            .iter()
            .flat_map(|(m, e)| e.iter().map(move |e| (*m, e)))
            .find_map(|(m, e)| lower.strip_suffix(e).map(|s| (s.to_string(), m)))
            .ok_or_else(|| {
                Error(ErrorOrigin::Connector, ErrorKind::InvalidMemorySizeUnit)
                    .log_error(format!("memory size `{}` has no valid unit", size))
            })?
    };

    let size = umem::from_str_radix(&size, 16)
        .map_err(|_| Error(ErrorOrigin::Connector, ErrorKind::InvalidMemorySize))?;

    size.checked_mul(size_mul)
        .ok_or(Error(ErrorOrigin::Connector, ErrorKind::InvalidMemorySize))
}

/// Reads the memory size from the `size` argument, or the default argument.
pub fn size_from_args(args: &Args, default: umem) -> Result<umem> {
    args.get("size")
        .or_else(|| args.get_default())
        .map(parse_size)
        .transpose()
        .map(|size| size.unwrap_or(default))
}
