use super::keyboard::DummyKeyboard;
use super::mem::DummyMemory;
use super::page_table::{PageEntry, PageTable};
use super::process::{DummyModule, DummyProcess, DummyProcessInfo};

use crate::architecture::x86::{x32, x64};
use crate::architecture::ArchitectureIdent;
use crate::error::{Error, ErrorKind, ErrorOrigin, Result};
use crate::mem::mem_data::*;
use crate::mem::{PhysicalMemory, PhysicalMemoryMetadata, VirtualMemory};
use crate::os::{
    AddressCallback, ExportInfo, ImportInfo, ModuleInfo, OsInfo, OsInner, OsKeyboardInner, Pid,
    ProcessInfo, ProcessState, SectionInfo,
};
use crate::types::{clamp_to_usize, size, umem, Address, PageType};

use log::{debug, warn};
use rand::seq::SliceRandom;
use rand::{Rng, SeedableRng};
use rand_xorshift::XorShiftRng;

const PAGE_SIZE: umem = size::kb(4);
const LARGE_PAGE_SIZE: umem = size::mb(2);

pub const KERNEL_BASE: umem = 0xffff_f800_0000_0000;
const KERNEL_MODULE_LIST: umem = KERNEL_BASE + 0x80_0000;
const PROCESS_LIST_BASE: umem = KERNEL_BASE + 0x100_0000;

/// Per process page holding one entry per loaded module.
const MODULE_LIST_BASE: umem = 0x7ffd_f000_0000;
const MODULE_ENTRY_SIZE: umem = 0x40;
const MAX_NAME_LEN: usize = 0xf0;

struct ModuleImage<'a> {
    name: &'a str,
    file: &'a str,
    size: umem,
    exports: &'a [(&'a str, umem)],
    imports: &'a [&'a str],
}

const NTOSKRNL: ModuleImage = ModuleImage {
    name: "ntoskrnl",
    file: "ntoskrnl.exe",
    size: 0x10000,
    exports: &[],
    imports: &[],
};

const HAL: ModuleImage = ModuleImage {
    name: "hal",
    file: "hal.dll",
    size: 0x4000,
    exports: &[],
    imports: &[],
};

const NTDLL: ModuleImage = ModuleImage {
    name: "ntdll",
    file: "ntdll.dll",
    size: 0x4000,
    exports: &[
        ("NtClose", 0x1010),
        ("NtReadVirtualMemory", 0x1040),
        ("RtlAllocateHeap", 0x1080),
    ],
    imports: &[],
};

const KERNEL32: ModuleImage = ModuleImage {
    name: "kernel32",
    file: "kernel32.dll",
    size: 0x4000,
    exports: &[
        ("ExitProcess", 0x1010),
        ("GetProcAddress", 0x1050),
        ("LoadLibraryA", 0x1090),
    ],
    imports: &["NtClose", "NtReadVirtualMemory"],
};

const WOW64: ModuleImage = ModuleImage {
    name: "wow64",
    file: "wow64.dll",
    size: 0x4000,
    exports: &[("Wow64SystemServiceEx", 0x1010)],
    imports: &["NtClose"],
};

const IMAGE_IMPORTS: &[&str] = &["ExitProcess", "LoadLibraryA"];

/// Physical frames not yet handed out.
///
/// Large frames are split into small ones once the small frames run out.
#[derive(Default)]
struct FrameAllocator {
    large: Vec<Address>,
    small: Vec<Address>,
}

impl FrameAllocator {
    fn new(metadata: PhysicalMemoryMetadata, rng: &mut XorShiftRng) -> Self {
        let end = metadata.max_address.to_umem().saturating_add(1);
        let large_end = end - end % LARGE_PAGE_SIZE;

        let mut large = (0..large_end)
            .step_by(clamp_to_usize(LARGE_PAGE_SIZE))
            .map(Address::from)
            .collect::<Vec<_>>();
        let mut small = (large_end..end - end % PAGE_SIZE)
            .step_by(clamp_to_usize(PAGE_SIZE))
            .map(Address::from)
            .collect::<Vec<_>>();

        large.shuffle(rng);
        small.shuffle(rng);

        Self { large, small }
    }

    fn alloc_large(&mut self) -> Option<Address> {
        self.large.pop()
    }

    fn alloc_small(&mut self) -> Result<Address> {
        if self.small.is_empty() {
            let frame = self.large.pop().ok_or_else(|| {
                Error(ErrorOrigin::OsLayer, ErrorKind::OutOfMemoryRange)
                    .log_error("dummy os ran out of physical memory")
            })?;
            self.small.extend(
                (0..LARGE_PAGE_SIZE)
                    .step_by(clamp_to_usize(PAGE_SIZE))
                    .map(|off| frame + off),
            );
        }
        self.small
            .pop()
            .ok_or(Error(ErrorOrigin::OsLayer, ErrorKind::OutOfMemoryRange))
    }

    /// Backs `virt..virt + size` with fresh frames and copies `data` to its start.
    fn map_region(
        &mut self,
        mem: &mut impl PhysicalMemory,
        table: &mut PageTable,
        virt: Address,
        size: umem,
        data: &[u8],
        page_type: PageType,
    ) -> Result<()> {
        let mut off = 0;
        while off < size {
            let large = if size - off >= LARGE_PAGE_SIZE
                && (virt + off).to_umem() % LARGE_PAGE_SIZE == 0
            {
                self.alloc_large()
            } else {
                None
            };
            let (phys, page_size) = match large {
                Some(frame) => (frame, LARGE_PAGE_SIZE),
                None => (self.alloc_small()?, PAGE_SIZE),
            };

            let start = clamp_to_usize(off).min(data.len());
            let end = clamp_to_usize(off + page_size).min(data.len());
            if start < end {
                mem.phys_write_raw(phys.into(), &data[start..end])?;
            }

            table.map_page(
                virt + off,
                PageEntry {
                    phys,
                    size: page_size,
                    page_type,
                },
            );
            off += page_size;
        }
        Ok(())
    }
}

fn align_up(val: umem, align: umem) -> umem {
    (val + align - 1) & !(align - 1)
}

fn sections(base: Address, size: umem) -> Vec<SectionInfo> {
    let header = size.min(PAGE_SIZE);
    let text = align_up((size - header) / 2, PAGE_SIZE).min(size - header);
    vec![
        SectionInfo {
            name: ".text".into(),
            base: base + header,
            size: text,
        },
        SectionInfo {
            name: ".data".into(),
            base: base + header + text,
            size: size - header - text,
        },
    ]
}

/// Simulated operating system on top of any physical memory.
///
/// All randomness (physical frame placement, image bases) comes from a seeded rng, two instances
/// created with the same seed over the same memory lay out their processes identically.
pub struct DummyOs<T = DummyMemory> {
    mem: T,
    frames: FrameAllocator,
    kernel: PageTable,
    kernel_modules: Vec<ModuleInfo>,
    processes: Vec<DummyProcessInfo>,
    pressed_keys: Vec<i32>,
    last_pid: Pid,
    rng: XorShiftRng,
    info: OsInfo,
}

/// Clones share all existing processes, but never allocate from the same frames.
impl<T: Clone> Clone for DummyOs<T> {
    fn clone(&self) -> Self {
        Self {
            mem: self.mem.clone(),
            frames: FrameAllocator::default(),
            kernel: self.kernel.clone(),
            kernel_modules: self.kernel_modules.clone(),
            processes: self.processes.clone(),
            pressed_keys: self.pressed_keys.clone(),
            last_pid: self.last_pid,
            rng: self.rng.clone(),
            info: self.info.clone(),
        }
    }
}

impl DummyOs<DummyMemory> {
    /// Creates a process inside of a fresh os and memory, returning the owned process.
    pub fn quick_process(size: umem, buffer: &[u8]) -> Result<DummyProcess<DummyMemory>> {
        let mem = DummyMemory::new(align_up(size, LARGE_PAGE_SIZE) + size::mb(4));
        let mut os = Self::new(mem);
        let pid = os.alloc_process(size, buffer)?;
        os.into_process_by_pid(pid)
    }
}

impl<T: PhysicalMemory> DummyOs<T> {
    /// Creates a new DummyOs object with a fixed default seed
    ///
    /// Note:
    ///
    /// Using a fixed seed for the rng will provide reproducability throughout test cases.
    pub fn new(mem: T) -> Self {
        Self::with_seed(mem, 1)
    }

    /// Creates a new DummyOs object with the given seed as a starting value for the RNG
    pub fn with_seed(mem: T, seed: u64) -> Self {
        Self::with_rng(mem, SeedableRng::seed_from_u64(seed))
    }

    /// Creates a new DummyOs object with the given RNG.
    ///
    /// Kernel modules are mapped right away. If the memory is too small to hold them the os
    /// comes up without kernel modules.
    pub fn with_rng(mem: T, mut rng: XorShiftRng) -> Self {
        let frames = FrameAllocator::new(mem.metadata(), &mut rng);

        let mut os = Self {
            mem,
            frames,
            kernel: PageTable::default(),
            kernel_modules: vec![],
            processes: vec![],
            pressed_keys: vec![],
            last_pid: 0,
            rng,
            info: OsInfo {
                base: Address::from(KERNEL_BASE),
                size: NTOSKRNL.size,
                arch: x64::ARCH.ident(),
            },
        };

        if let Err(err) = os.map_kernel() {
            warn!("unable to map dummy kernel modules: {}", err);
        }

        os
    }

    pub fn into_inner(self) -> T {
        self.mem
    }

    fn map_kernel(&mut self) -> Result<()> {
        let mut base = Address::from(KERNEL_BASE);
        let mut list = vec![0_u8; clamp_to_usize(PAGE_SIZE)];

        for (i, image) in [NTOSKRNL, HAL].iter().enumerate() {
            self.frames.map_region(
                &mut self.mem,
                &mut self.kernel,
                base,
                image.size,
                b"MZ",
                PageType::default().write(false),
            )?;

            write_module_entry(&mut list, i, base, image.size);
            self.kernel_modules.push(ModuleInfo {
                address: Address::from(KERNEL_MODULE_LIST) + i as umem * MODULE_ENTRY_SIZE,
                parent_process: Address::NULL,
                base,
                size: image.size,
                name: image.name.into(),
                path: format!("\\SystemRoot\\system32\\{}", image.file).into(),
                arch: self.info.arch,
            });
            base += image.size;
        }

        self.frames.map_region(
            &mut self.mem,
            &mut self.kernel,
            Address::from(KERNEL_MODULE_LIST),
            PAGE_SIZE,
            &list,
            PageType::default().write(false).noexec(true),
        )
    }

    /// Allocates a native process named `dummy.exe`.
    ///
    /// `data` is placed at the base of the primary module.
    pub fn alloc_process(&mut self, size: umem, data: &[u8]) -> Result<Pid> {
        self.alloc_process_named("dummy.exe", size, data)
    }

    pub fn alloc_process_named(&mut self, name: &str, size: umem, data: &[u8]) -> Result<Pid> {
        let arch = self.info.arch;
        self.alloc_process_with_arch(name, size, data, arch)
    }

    /// Allocates a process with the given process architecture.
    ///
    /// A 32-bit x86 process on the 64-bit system gets two module lists, one for each
    /// architecture.
    pub fn alloc_process_with_arch(
        &mut self,
        name: &str,
        size: umem,
        data: &[u8],
        proc_arch: ArchitectureIdent,
    ) -> Result<Pid> {
        let sys_arch = self.info.arch;
        let emulated = proc_arch != sys_arch;
        if emulated && proc_arch != x32::ARCH.ident() {
            return Err(Error(ErrorOrigin::OsLayer, ErrorKind::InvalidArchitecture)
                .log_error(format!("dummy os can not host {} processes", proc_arch)));
        }

        let size = align_up(size.max(1), PAGE_SIZE);
        let user_range = if emulated {
            0x40_0000..0x4000_0000
        } else {
            0x1_4000_0000..0x7ff0_0000_0000
        };
        let image_base = Address::from(self.rng.gen_range(user_range) & !(LARGE_PAGE_SIZE - 1));

        let pid = self.last_pid + 1;
        let address = Address::from(PROCESS_LIST_BASE) + umem::from(pid) * PAGE_SIZE;
        let mut pages = PageTable::default();
        let mut modules = vec![];

        let image = ModuleImage {
            name,
            file: name,
            size,
            exports: &[],
            imports: IMAGE_IMPORTS,
        };
        let path = format!("C:\\dummy\\{}", name);
        self.map_module(
            &mut pages,
            &mut modules,
            address,
            image_base,
            &image,
            &path,
            data,
            proc_arch,
        )?;

        let mut lib_base = Address::from(align_up(
            (image_base + size).to_umem() + LARGE_PAGE_SIZE,
            LARGE_PAGE_SIZE,
        ));
        let lib_dir = if emulated { "SysWOW64" } else { "System32" };
        for lib in [NTDLL, KERNEL32].iter() {
            let path = format!("C:\\Windows\\{}\\{}", lib_dir, lib.file);
            self.map_module(
                &mut pages,
                &mut modules,
                address,
                lib_base,
                lib,
                &path,
                b"MZ",
                proc_arch,
            )?;
            lib_base += align_up(lib.size, LARGE_PAGE_SIZE);
        }

        if emulated {
            let mut lib_base = Address::from(0x7ffa_0000_0000_u64);
            for lib in [NTDLL, WOW64].iter() {
                let path = format!("C:\\Windows\\System32\\{}", lib.file);
                self.map_module(
                    &mut pages,
                    &mut modules,
                    address,
                    lib_base,
                    lib,
                    &path,
                    b"MZ",
                    sys_arch,
                )?;
                lib_base += align_up(lib.size, LARGE_PAGE_SIZE);
            }
        }

        let mut list = vec![0_u8; clamp_to_usize(PAGE_SIZE)];
        for (i, m) in modules.iter().enumerate() {
            write_module_entry(&mut list, i, m.info.base, m.info.size);
        }
        self.frames.map_region(
            &mut self.mem,
            &mut pages,
            Address::from(MODULE_LIST_BASE),
            PAGE_SIZE,
            &list,
            PageType::default().write(true).noexec(true),
        )?;

        let mut proc_struct = vec![0_u8; 0x10 + MAX_NAME_LEN];
        proc_struct[..4].copy_from_slice(&pid.to_le_bytes());
        let name_len = name.len().min(MAX_NAME_LEN - 1);
        proc_struct[0x10..0x10 + name_len].copy_from_slice(&name.as_bytes()[..name_len]);
        self.frames.map_region(
            &mut self.mem,
            &mut self.kernel,
            address,
            PAGE_SIZE,
            &proc_struct,
            PageType::default().write(true).noexec(true),
        )?;

        debug!(
            "allocated dummy process {} ({}) with image at {:x}",
            pid, name, image_base
        );

        self.last_pid = pid;
        self.processes.push(DummyProcessInfo {
            info: ProcessInfo {
                address,
                pid,
                state: ProcessState::Alive,
                name: name.into(),
                command_line: format!("\"{}\"", path).into(),
                path: path.into(),
                sys_arch,
                proc_arch,
            },
            modules,
            pages,
        });

        Ok(pid)
    }

    #[allow(clippy::too_many_arguments)]
    fn map_module(
        &mut self,
        pages: &mut PageTable,
        modules: &mut Vec<DummyModule>,
        parent: Address,
        base: Address,
        image: &ModuleImage,
        path: &str,
        data: &[u8],
        arch: ArchitectureIdent,
    ) -> Result<()> {
        self.frames.map_region(
            &mut self.mem,
            pages,
            base,
            image.size,
            data,
            PageType::default().write(true),
        )?;

        let address = Address::from(MODULE_LIST_BASE) + modules.len() as umem * MODULE_ENTRY_SIZE;
        modules.push(DummyModule {
            info: ModuleInfo {
                address,
                parent_process: parent,
                base,
                size: image.size,
                name: image.name.into(),
                path: path.into(),
                arch,
            },
            imports: image
                .imports
                .iter()
                .enumerate()
                .map(|(i, name)| ImportInfo {
                    name: (*name).into(),
                    offset: PAGE_SIZE / 2 + i as umem * 8,
                })
                .collect(),
            exports: image
                .exports
                .iter()
                .map(|(name, offset)| ExportInfo {
                    name: (*name).into(),
                    offset: *offset,
                })
                .collect(),
            sections: sections(base, image.size),
        });

        Ok(())
    }

    /// Marks a process as exited with `exit_code`.
    pub fn kill_process(&mut self, pid: Pid, exit_code: i32) -> Result<()> {
        let proc = self
            .processes
            .iter_mut()
            .find(|p| p.info.pid == pid)
            .ok_or(Error(ErrorOrigin::OsLayer, ErrorKind::ProcessNotFound))?;
        proc.info.state = ProcessState::Dead(exit_code);
        Ok(())
    }

    /// Sets a key that every keyboard created afterwards starts with pressed.
    pub fn press_key(&mut self, vk: i32) {
        self.pressed_keys.push(vk);
    }

    fn find_process(&self, address: Address) -> Result<&DummyProcessInfo> {
        self.processes
            .iter()
            .find(|p| p.info.address == address)
            .ok_or(Error(ErrorOrigin::OsLayer, ErrorKind::InvalidProcessInfo))
    }
}

fn write_module_entry(list: &mut [u8], idx: usize, base: Address, size: umem) {
    let off = idx * clamp_to_usize(MODULE_ENTRY_SIZE);
    list[off..off + 8].copy_from_slice(&base.to_umem().to_le_bytes());
    list[off + 8..off + 16].copy_from_slice(&size.to_le_bytes());
}

impl<T: PhysicalMemory + Clone + 'static> OsInner for DummyOs<T> {
    type ProcessType<'a> = DummyProcess<&'a mut T>;
    type IntoProcessType = DummyProcess<T>;

    fn process_address_list_callback(&mut self, mut callback: AddressCallback) -> Result<()> {
        callback.feed(self.processes.iter().map(|p| p.info.address));
        Ok(())
    }

    fn process_info_by_address(&mut self, address: Address) -> Result<ProcessInfo> {
        self.processes
            .iter()
            .find(|p| p.info.address == address)
            .map(|p| p.info.clone())
            .ok_or(Error(ErrorOrigin::OsLayer, ErrorKind::ProcessNotFound))
    }

    fn process_by_info(&mut self, info: ProcessInfo) -> Result<Self::ProcessType<'_>> {
        let proc = self.find_process(info.address)?.clone();
        Ok(DummyProcess {
            proc,
            mem: &mut self.mem,
        })
    }

    fn into_process_by_info(self, info: ProcessInfo) -> Result<Self::IntoProcessType> {
        let proc = self.find_process(info.address)?.clone();
        Ok(DummyProcess {
            proc,
            mem: self.mem,
        })
    }

    fn module_address_list_callback(&mut self, mut callback: AddressCallback) -> Result<()> {
        callback.feed(self.kernel_modules.iter().map(|m| m.address));
        Ok(())
    }

    fn module_by_address(&mut self, address: Address) -> Result<ModuleInfo> {
        self.kernel_modules
            .iter()
            .find(|m| m.address == address)
            .cloned()
            .ok_or(Error(ErrorOrigin::OsLayer, ErrorKind::ModuleNotFound))
    }

    fn info(&self) -> &OsInfo {
        &self.info
    }
}

impl<T: PhysicalMemory> PhysicalMemory for DummyOs<T> {
    #[inline]
    fn phys_read_raw_list(&mut self, data: &mut [PhysicalReadData]) -> Result<()> {
        self.mem.phys_read_raw_list(data)
    }

    #[inline]
    fn phys_write_raw_list(&mut self, data: &[PhysicalWriteData]) -> Result<()> {
        self.mem.phys_write_raw_list(data)
    }

    #[inline]
    fn metadata(&self) -> PhysicalMemoryMetadata {
        self.mem.metadata()
    }

    #[inline]
    fn set_mem_map(&mut self, mem_map: &[PhysicalMemoryMapping]) {
        self.mem.set_mem_map(mem_map)
    }
}

/// Kernel address space.
impl<T: PhysicalMemory> VirtualMemory for DummyOs<T> {
    fn virt_read_raw_list(&mut self, data: &mut [ReadData]) -> Result<()> {
        self.kernel.virt_read_raw_list(&mut self.mem, data)
    }

    fn virt_write_raw_list(&mut self, data: &[WriteData]) -> Result<()> {
        self.kernel.virt_write_raw_list(&mut self.mem, data)
    }
}

impl<T: PhysicalMemory> OsKeyboardInner for DummyOs<T> {
    type KeyboardType<'a> = DummyKeyboard
    where
        Self: 'a;
    type IntoKeyboardType = DummyKeyboard;

    fn keyboard(&mut self) -> Result<Self::KeyboardType<'_>> {
        Ok(DummyKeyboard::with_keys(&self.pressed_keys))
    }

    fn into_keyboard(self) -> Result<Self::IntoKeyboardType> {
        Ok(DummyKeyboard::with_keys(&self.pressed_keys))
    }
}
