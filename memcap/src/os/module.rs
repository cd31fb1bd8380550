//! Modules and the symbols they import, export and contain.

use crate::architecture::ArchitectureIdent;
use crate::types::{umem, Address, OpaqueCallback, ReprCString};

/// Entries that lookups by name walk over.
pub(crate) trait Named {
    fn name(&self) -> &str;
}

macro_rules! impl_named {
    ($($ty:ty),*) => {
        $(
            impl Named for $ty {
                fn name(&self) -> &str {
                    self.name.as_ref()
                }
            }
        )*
    };
}

/// A loaded image in the address space of a process or the kernel.
#[repr(C)]
#[derive(Clone, Debug)]
#[cfg_attr(feature = "serde", derive(::serde::Serialize, ::serde::Deserialize))]
pub struct ModuleInfo {
    /// Address of the os bookkeeping entry for the module, not of the image.
    pub address: Address,
    /// [`ProcessInfo::address`](super::ProcessInfo::address) of the owner, null for kernel
    /// modules.
    pub parent_process: Address,
    /// Start of the image in the owner's virtual address space.
    pub base: Address,
    pub size: umem,
    pub name: ReprCString,
    pub path: ReprCString,
    /// Either the process or the system architecture of the owner, depending on which of its
    /// module lists the entry came from.
    pub arch: ArchitectureIdent,
}

impl ModuleInfo {
    /// Whether `addr` lies inside of the image.
    pub fn contains(&self, addr: Address) -> bool {
        self.base <= addr && addr - self.base < self.size
    }
}

pub type ModuleInfoCallback<'a> = OpaqueCallback<'a, ModuleInfo>;

/// Module entry address together with the architecture to parse it with.
#[repr(C)]
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
#[cfg_attr(feature = "serde", derive(::serde::Serialize, ::serde::Deserialize))]
pub struct ModuleAddressInfo {
    pub address: Address,
    pub arch: ArchitectureIdent,
}

pub type ModuleAddressCallback<'a> = OpaqueCallback<'a, ModuleAddressInfo>;

/// Imported symbol. `offset` is relative to the module base.
#[repr(C)]
#[derive(Clone, Debug)]
#[cfg_attr(feature = "serde", derive(::serde::Serialize, ::serde::Deserialize))]
pub struct ImportInfo {
    pub name: ReprCString,
    pub offset: umem,
}

pub type ImportCallback<'a> = OpaqueCallback<'a, ImportInfo>;

/// Exported symbol. `offset` is relative to the module base.
#[repr(C)]
#[derive(Clone, Debug)]
#[cfg_attr(feature = "serde", derive(::serde::Serialize, ::serde::Deserialize))]
pub struct ExportInfo {
    pub name: ReprCString,
    pub offset: umem,
}

pub type ExportCallback<'a> = OpaqueCallback<'a, ExportInfo>;

/// Section of a module image, `base` is an absolute virtual address.
#[repr(C)]
#[derive(Clone, Debug)]
#[cfg_attr(feature = "serde", derive(::serde::Serialize, ::serde::Deserialize))]
pub struct SectionInfo {
    pub name: ReprCString,
    pub base: Address,
    pub size: umem,
}

impl SectionInfo {
    /// Compares the name without its `.` (PE, ELF) or `__` (Mach-O) prefix.
    pub fn is_section(&self, name: &str) -> bool {
        let full: &str = self.name.as_ref();
        matches!(
            full.strip_prefix('.').or_else(|| full.strip_prefix("__")),
            Some(stem) if stem == name
        )
    }

    pub fn is_text(&self) -> bool {
        self.is_section("text")
    }
}

pub type SectionCallback<'a> = OpaqueCallback<'a, SectionInfo>;

impl_named!(ModuleInfo, ImportInfo, ExportInfo, SectionInfo);
