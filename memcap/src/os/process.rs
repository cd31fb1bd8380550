//! Processes, their state and their module lists.

use super::module::Named;
use super::{
    ExportCallback, ExportInfo, ImportCallback, ImportInfo, ModuleAddressCallback,
    ModuleAddressInfo, ModuleInfo, ModuleInfoCallback, SectionCallback, SectionInfo,
};
use crate::architecture::ArchitectureIdent;
use crate::error::{Error, ErrorKind, ErrorOrigin, Result};
use crate::types::{Address, OpaqueCallback, ReprCString};

pub type Pid = u32;

pub type ExitCode = i32;

/// Liveness of a process when it was last looked at.
///
/// Terminated processes whose exit code can not be determined are `Unknown`.
#[repr(C)]
#[derive(Debug, Clone, Copy, Eq, PartialEq, Hash, Default)]
#[cfg_attr(feature = "serde", derive(::serde::Serialize, ::serde::Deserialize))]
pub enum ProcessState {
    #[default]
    Unknown,
    Alive,
    Dead(ExitCode),
}

impl ProcessState {
    pub fn is_alive(&self) -> bool {
        *self == ProcessState::Alive
    }

    pub fn is_dead(&self) -> bool {
        matches!(self, ProcessState::Dead(_))
    }

    pub fn is_unknown(&self) -> bool {
        *self == ProcessState::Unknown
    }
}

/// Walks `list` and returns the first entry named `name`, or `not_found`.
fn find_named<T: Named>(
    name: &str,
    not_found: ErrorKind,
    list: impl FnOnce(OpaqueCallback<T>) -> Result<()>,
) -> Result<T> {
    let mut found = None;
    list((&mut |entry: T| {
        if entry.name() == name {
            found = Some(entry);
        }
        found.is_none()
    })
        .into())?;
    found.ok_or(Error(ErrorOrigin::OsLayer, not_found))
}

/// A single process of an os layer.
///
/// Module walks take an optional architecture. Emulated processes keep one module list per
/// architecture, `None` picks the list matching [`ProcessInfo::proc_arch`].
pub trait Process: Send {
    /// Re-reads the state, the value in [`ProcessInfo`] may be stale.
    fn state(&mut self) -> ProcessState;

    fn module_address_list_callback(
        &mut self,
        target_arch: Option<&ArchitectureIdent>,
        callback: ModuleAddressCallback,
    ) -> Result<()>;

    /// Feeds every module of the selected list into `callback`.
    ///
    /// Addresses are collected up front and resolved one at a time while feeding. The first
    /// module that fails to resolve ends the walk with its error.
    fn module_list_callback(
        &mut self,
        target_arch: Option<&ArchitectureIdent>,
        mut callback: ModuleInfoCallback,
    ) -> Result<()> {
        let mut addrs: Vec<ModuleAddressInfo> = vec![];
        self.module_address_list_callback(target_arch, (&mut addrs).into())?;

        let mut res = Ok(());
        callback.feed(addrs.into_iter().map_while(|ModuleAddressInfo { address, arch }| {
            self.module_by_address(address, arch)
                .map_err(|err| res = Err(err))
                .ok()
        }));
        res
    }

    /// Resolves the module structure at `address`. `architecture` selects the layout to parse it
    /// with and is one of the two process architectures.
    fn module_by_address(
        &mut self,
        address: Address,
        architecture: ArchitectureIdent,
    ) -> Result<ModuleInfo>;

    fn module_by_name_arch(
        &mut self,
        name: &str,
        architecture: Option<&ArchitectureIdent>,
    ) -> Result<ModuleInfo> {
        find_named(name, ErrorKind::ModuleNotFound, |cb| {
            self.module_list_callback(architecture, cb)
        })
    }

    /// Looks `name` up in the module list of the process architecture.
    fn module_by_name(&mut self, name: &str) -> Result<ModuleInfo> {
        self.module_by_name_arch(name, None)
    }

    fn module_list_arch(
        &mut self,
        target_arch: Option<&ArchitectureIdent>,
    ) -> Result<Vec<ModuleInfo>> {
        let mut out = vec![];
        self.module_list_callback(target_arch, (&mut out).into())?;
        Ok(out)
    }

    fn module_list(&mut self) -> Result<Vec<ModuleInfo>> {
        self.module_list_arch(None)
    }

    /// Address of the module structure of the main executable.
    fn primary_module_address(&mut self) -> Result<Address>;

    fn primary_module(&mut self) -> Result<ModuleInfo> {
        let addr = self.primary_module_address()?;
        let arch = self.info().proc_arch;
        self.module_by_address(addr, arch)
    }

    fn module_import_list_callback(
        &mut self,
        info: &ModuleInfo,
        callback: ImportCallback,
    ) -> Result<()>;

    fn module_export_list_callback(
        &mut self,
        info: &ModuleInfo,
        callback: ExportCallback,
    ) -> Result<()>;

    fn module_section_list_callback(
        &mut self,
        info: &ModuleInfo,
        callback: SectionCallback,
    ) -> Result<()>;

    fn module_import_list(&mut self, info: &ModuleInfo) -> Result<Vec<ImportInfo>> {
        let mut out = vec![];
        self.module_import_list_callback(info, (&mut out).into())?;
        Ok(out)
    }

    fn module_export_list(&mut self, info: &ModuleInfo) -> Result<Vec<ExportInfo>> {
        let mut out = vec![];
        self.module_export_list_callback(info, (&mut out).into())?;
        Ok(out)
    }

    fn module_section_list(&mut self, info: &ModuleInfo) -> Result<Vec<SectionInfo>> {
        let mut out = vec![];
        self.module_section_list_callback(info, (&mut out).into())?;
        Ok(out)
    }

    fn module_import_by_name(&mut self, info: &ModuleInfo, name: &str) -> Result<ImportInfo> {
        find_named(name, ErrorKind::ImportNotFound, |cb| {
            self.module_import_list_callback(info, cb)
        })
    }

    fn module_export_by_name(&mut self, info: &ModuleInfo, name: &str) -> Result<ExportInfo> {
        find_named(name, ErrorKind::ExportNotFound, |cb| {
            self.module_export_list_callback(info, cb)
        })
    }

    /// Exact name match, `.text` does not match `text`. See [`SectionInfo::is_section`] for a
    /// prefix insensitive check.
    fn module_section_by_name(&mut self, info: &ModuleInfo, name: &str) -> Result<SectionInfo> {
        find_named(name, ErrorKind::SectionNotFound, |cb| {
            self.module_section_list_callback(info, cb)
        })
    }

    fn info(&self) -> &ProcessInfo;
}

/// Snapshot of a process as seen while walking the process list.
#[repr(C)]
#[derive(Clone, Debug)]
#[cfg_attr(feature = "serde", derive(::serde::Serialize, ::serde::Deserialize))]
pub struct ProcessInfo {
    /// Address of the kernel structure describing the process. Unique while the process exists.
    pub address: Address,
    pub pid: Pid,
    /// State at the time of the walk, see [`Process::state`].
    pub state: ProcessState,
    pub name: ReprCString,
    pub path: ReprCString,
    pub command_line: ReprCString,
    pub sys_arch: ArchitectureIdent,
    /// Differs from `sys_arch` for emulated processes, e.g. 32-bit x86 on a 64-bit system.
    pub proc_arch: ArchitectureIdent,
}

pub type ProcessInfoCallback<'a> = OpaqueCallback<'a, ProcessInfo>;

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn process_state() {
        assert!(ProcessState::Alive.is_alive());
        assert!(ProcessState::Dead(-1).is_dead());
        assert!(ProcessState::default().is_unknown());
        assert_ne!(ProcessState::Dead(0), ProcessState::Dead(1));
    }

    #[test]
    fn find_named_stops_at_the_first_match() {
        let mut fed = 0;
        let found = find_named(".data", ErrorKind::SectionNotFound, |mut cb| {
            for name in [".text", ".data", ".data", ".rdata"] {
                fed += 1;
                let section = SectionInfo {
                    name: name.into(),
                    base: Address::from(0x1000 * fed as u64),
                    size: 0x1000,
                };
                if !cb.call(section) {
                    break;
                }
            }
            Ok(())
        })
        .unwrap();
        assert_eq!(found.base, Address::from(0x2000u64));
        assert_eq!(fed, 2);

        assert_eq!(
            find_named::<SectionInfo>("x", ErrorKind::SectionNotFound, |_| Ok(())).err(),
            Some(Error(ErrorOrigin::OsLayer, ErrorKind::SectionNotFound))
        );
    }
}
