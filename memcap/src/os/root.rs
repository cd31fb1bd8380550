//! Os layer root: process and kernel module enumeration.

use super::process::*;
use super::{AddressCallback, ModuleInfo, ModuleInfoCallback};
use crate::architecture::ArchitectureIdent;
use crate::error::{Error, ErrorKind, ErrorOrigin, Result};
use crate::mem::{VirtualMemory, VirtualTranslate};
use crate::types::{umem, Address};

/// Operations every os layer provides.
///
/// An implementor only has to enumerate process and module addresses and resolve single
/// entries. Everything else (lists, lookups by name or pid, process construction shortcuts) is
/// derived from these in the default methods.
///
/// Lookups that walk a list stop the walk at the first match.
pub trait OsInner: Send {
    /// Process that shares the resources of the os it was created from.
    type ProcessType<'a>: Process + VirtualMemory + VirtualTranslate + 'a
    where
        Self: 'a;
    /// Process that owns the resources of the os it was created from.
    type IntoProcessType: Process + VirtualMemory + VirtualTranslate + Clone + 'static;

    /// Feeds the internal address of every process structure into `callback`.
    ///
    /// Returning `false` from the callback ends the walk early, this is not an error.
    fn process_address_list_callback(&mut self, callback: AddressCallback) -> Result<()>;

    fn process_address_list(&mut self) -> Result<Vec<Address>> {
        let mut out = vec![];
        self.process_address_list_callback((&mut out).into())?;
        Ok(out)
    }

    /// Feeds the info block of every process into `callback`.
    ///
    /// Addresses are collected first and resolved one at a time while feeding. The first process
    /// that fails to resolve ends the walk with the error
    /// [`process_info_by_address`](Self::process_info_by_address) returned for it.
    fn process_info_list_callback(&mut self, mut callback: ProcessInfoCallback) -> Result<()> {
        let addrs = self.process_address_list()?;

        let mut res = Ok(());
        callback.feed(addrs.into_iter().map_while(|addr| {
            self.process_info_by_address(addr)
                .map_err(|err| res = Err(err))
                .ok()
        }));
        res
    }

    fn process_info_list(&mut self) -> Result<Vec<ProcessInfo>> {
        let mut out = vec![];
        self.process_info_list_callback((&mut out).into())?;
        Ok(out)
    }

    /// Resolves the info block of the process structure at `address`.
    fn process_info_by_address(&mut self, address: Address) -> Result<ProcessInfo>;

    /// First process named `name` that is not [`ProcessState::Dead`].
    fn process_info_by_name(&mut self, name: &str) -> Result<ProcessInfo> {
        find_process(self, |info| !info.state.is_dead() && info.name == name)
    }

    /// Process with the given pid, dead or alive.
    fn process_info_by_pid(&mut self, pid: Pid) -> Result<ProcessInfo> {
        find_process(self, |info| info.pid == pid)
    }

    /// Opens a process that borrows this os.
    fn process_by_info(&mut self, info: ProcessInfo) -> Result<Self::ProcessType<'_>>;

    /// Turns the os into a process, moving the physical memory into it.
    fn into_process_by_info(self, info: ProcessInfo) -> Result<Self::IntoProcessType>
    where
        Self: Sized;

    fn process_by_address(&mut self, addr: Address) -> Result<Self::ProcessType<'_>> {
        let info = self.process_info_by_address(addr)?;
        self.process_by_info(info)
    }

    /// Borrowing shortcut over [`process_info_by_name`](Self::process_info_by_name).
    fn process_by_name(&mut self, name: &str) -> Result<Self::ProcessType<'_>> {
        let info = self.process_info_by_name(name)?;
        self.process_by_info(info)
    }

    fn process_by_pid(&mut self, pid: Pid) -> Result<Self::ProcessType<'_>> {
        let info = self.process_info_by_pid(pid)?;
        self.process_by_info(info)
    }

    fn into_process_by_address(mut self, addr: Address) -> Result<Self::IntoProcessType>
    where
        Self: Sized,
    {
        let info = self.process_info_by_address(addr)?;
        self.into_process_by_info(info)
    }

    /// Consuming shortcut over [`process_info_by_name`](Self::process_info_by_name).
    ///
    /// The os is gone afterwards, also when no process matched.
    fn into_process_by_name(mut self, name: &str) -> Result<Self::IntoProcessType>
    where
        Self: Sized,
    {
        let info = self.process_info_by_name(name)?;
        self.into_process_by_info(info)
    }

    fn into_process_by_pid(mut self, pid: Pid) -> Result<Self::IntoProcessType>
    where
        Self: Sized,
    {
        let info = self.process_info_by_pid(pid)?;
        self.into_process_by_info(info)
    }

    /// Feeds the address of every kernel module structure into `callback`.
    fn module_address_list_callback(&mut self, callback: AddressCallback) -> Result<()>;

    /// Feeds every kernel module into `callback`.
    ///
    /// Like the process walk, a module that fails to resolve ends the walk and its error is
    /// returned.
    fn module_list_callback(&mut self, mut callback: ModuleInfoCallback) -> Result<()> {
        let mut addrs: Vec<Address> = vec![];
        self.module_address_list_callback((&mut addrs).into())?;

        let mut res = Ok(());
        callback.feed(addrs.into_iter().map_while(|addr| {
            self.module_by_address(addr)
                .map_err(|err| res = Err(err))
                .ok()
        }));
        res
    }

    fn module_list(&mut self) -> Result<Vec<ModuleInfo>> {
        let mut out = vec![];
        self.module_list_callback((&mut out).into())?;
        Ok(out)
    }

    /// Resolves the kernel module structure at `address`.
    fn module_by_address(&mut self, address: Address) -> Result<ModuleInfo>;

    fn module_by_name(&mut self, name: &str) -> Result<ModuleInfo> {
        let mut found = None;
        self.module_list_callback(
            (&mut |module: ModuleInfo| {
                if module.name == name {
                    found = Some(module);
                }
                found.is_none()
            })
                .into(),
        )?;
        found.ok_or(Error(ErrorOrigin::OsLayer, ErrorKind::ModuleNotFound))
    }

    fn info(&self) -> &OsInfo;
}

fn find_process<T: OsInner + ?Sized>(
    os: &mut T,
    mut matches: impl FnMut(&ProcessInfo) -> bool,
) -> Result<ProcessInfo> {
    let mut found = None;
    os.process_info_list_callback(
        (&mut |info: ProcessInfo| {
            if matches(&info) {
                found = Some(info);
            }
            found.is_none()
        })
            .into(),
    )?;
    found.ok_or(Error(ErrorOrigin::OsLayer, ErrorKind::ProcessNotFound))
}

/// Kernel base, kernel size and system architecture.
///
/// Layers without access to the kernel image report a zero base and size. The architecture is
/// always set.
#[repr(C)]
#[derive(Clone, Debug, PartialEq, Eq)]
#[cfg_attr(feature = "serde", derive(::serde::Serialize, ::serde::Deserialize))]
pub struct OsInfo {
    pub base: Address,
    pub size: umem,
    pub arch: ArchitectureIdent,
}
