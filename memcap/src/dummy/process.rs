use super::page_table::PageTable;

use crate::architecture::ArchitectureIdent;
use crate::error::{Error, ErrorKind, ErrorOrigin, Result};
use crate::mem::{MemoryRange, ReadData, WriteData};
use crate::mem::{
    PhysicalMemory, VirtualMemory, VirtualTranslate, VirtualTranslationCallback,
    VirtualTranslationFailCallback,
};
use crate::os::{
    ExportCallback, ExportInfo, ImportCallback, ImportInfo, ModuleAddressCallback,
    ModuleAddressInfo, ModuleInfo, Process, ProcessInfo, ProcessState, SectionCallback,
    SectionInfo,
};
use crate::types::Address;

/// A module together with the symbol tables served for it.
#[derive(Clone, Debug)]
pub struct DummyModule {
    pub info: ModuleInfo,
    pub imports: Vec<ImportInfo>,
    pub exports: Vec<ExportInfo>,
    pub sections: Vec<SectionInfo>,
}

/// Everything the dummy os knows about one of its processes.
#[derive(Clone)]
pub struct DummyProcessInfo {
    pub info: ProcessInfo,
    pub modules: Vec<DummyModule>,
    pub(crate) pages: PageTable,
}

fn module_not_found() -> Error {
    Error(ErrorOrigin::OsLayer, ErrorKind::ModuleNotFound)
}

impl DummyProcessInfo {
    fn find_module(&self, pred: impl Fn(&ModuleInfo) -> bool) -> Result<&DummyModule> {
        self.modules
            .iter()
            .find(|m| pred(&m.info))
            .ok_or_else(module_not_found)
    }

    fn module(&self, info: &ModuleInfo) -> Result<&DummyModule> {
        self.find_module(|m| m.address == info.address && m.base == info.base)
    }
}

/// A dummy process on top of the physical memory `T`.
///
/// `T` is a borrow of the os memory for processes opened by reference and an owned clone for
/// processes the os was turned into.
#[derive(Clone)]
pub struct DummyProcess<T> {
    pub proc: DummyProcessInfo,
    pub mem: T,
}

impl<T: PhysicalMemory> Process for DummyProcess<T> {
    fn state(&mut self) -> ProcessState {
        self.proc.info.state
    }

    fn module_address_list_callback(
        &mut self,
        target_arch: Option<&ArchitectureIdent>,
        mut callback: ModuleAddressCallback,
    ) -> Result<()> {
        let arch = target_arch.copied().unwrap_or(self.proc.info.proc_arch);
        if arch != self.proc.info.proc_arch && arch != self.proc.info.sys_arch {
            return Err(Error(ErrorOrigin::OsLayer, ErrorKind::InvalidArchitecture));
        }

        let addrs = self.proc.modules.iter().filter_map(|m| {
            (m.info.arch == arch).then_some(ModuleAddressInfo {
                address: m.info.address,
                arch,
            })
        });
        callback.feed(addrs);
        Ok(())
    }

    fn module_by_address(
        &mut self,
        address: Address,
        architecture: ArchitectureIdent,
    ) -> Result<ModuleInfo> {
        self.proc
            .find_module(|m| m.address == address && m.arch == architecture)
            .map(|m| m.info.clone())
    }

    fn primary_module_address(&mut self) -> Result<Address> {
        // the first module of the process architecture is the executable
        let proc_arch = self.proc.info.proc_arch;
        self.proc
            .find_module(|m| m.arch == proc_arch)
            .map(|m| m.info.address)
    }

    fn module_import_list_callback(
        &mut self,
        info: &ModuleInfo,
        mut callback: ImportCallback,
    ) -> Result<()> {
        callback.feed(self.proc.module(info)?.imports.iter().cloned());
        Ok(())
    }

    fn module_export_list_callback(
        &mut self,
        info: &ModuleInfo,
        mut callback: ExportCallback,
    ) -> Result<()> {
        callback.feed(self.proc.module(info)?.exports.iter().cloned());
        Ok(())
    }

    fn module_section_list_callback(
        &mut self,
        info: &ModuleInfo,
        mut callback: SectionCallback,
    ) -> Result<()> {
        callback.feed(self.proc.module(info)?.sections.iter().cloned());
        Ok(())
    }

    fn info(&self) -> &ProcessInfo {
        &self.proc.info
    }
}

impl<T: PhysicalMemory> VirtualMemory for DummyProcess<T> {
    fn virt_read_raw_list(&mut self, data: &mut [ReadData]) -> Result<()> {
        self.proc.pages.virt_read_raw_list(&mut self.mem, data)
    }

    fn virt_write_raw_list(&mut self, data: &[WriteData]) -> Result<()> {
        self.proc.pages.virt_write_raw_list(&mut self.mem, data)
    }
}

impl<T: PhysicalMemory> VirtualTranslate for DummyProcess<T> {
    fn virt_to_phys_list(
        &mut self,
        addrs: &[MemoryRange],
        out: VirtualTranslationCallback,
        out_fail: VirtualTranslationFailCallback,
    ) {
        self.proc.pages.translate_list(addrs, out, out_fail)
    }
}
