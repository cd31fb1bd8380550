/*!
Module for handling different architectures in memcap.

Each architecture implements the `Architecture` trait and is exposed as a process wide static
[`ArchitectureObj`]. Across the plugin boundary architectures travel as the plain
[`ArchitectureIdent`] value, which can be turned back into the static object on the other side.
*/

pub mod arm;
pub mod x86;

use crate::error::{Error, ErrorKind, ErrorOrigin, Result};
use crate::types::{size, umem};

/// Identifies the byte order of a architecture
///
/// This enum is used when reading/writing to/from the memory of a target system.
///
/// See the [wikipedia article](https://en.wikipedia.org/wiki/Endianness) for more information on the subject.
#[derive(Debug, Clone, Copy, Eq, PartialEq)]
#[cfg_attr(feature = "serde", derive(::serde::Serialize, ::serde::Deserialize))]
#[repr(u8)]
pub enum Endianess {
    /// Little Endianess
    LittleEndian,
    /// Big Endianess
    BigEndian,
}

pub trait Architecture: Send + Sync + 'static {
    /// Returns the number of bits of a pointers width on a `Architecture`.
    /// Currently this will either return 64 or 32 depending on the pointer width of the target.
    ///
    /// # Examples
    ///
    /// ```
    /// use memcap::architecture::x86::x32_pae;
    ///
    /// let arch = x32_pae::ARCH;
    /// assert_eq!(arch.bits(), 32);
    /// ```
    fn bits(&self) -> u8;

    /// Returns the byte order of an `Architecture`.
    fn endianess(&self) -> Endianess;

    /// Returns the smallest page size of an `Architecture`.
    ///
    /// # Examples
    ///
    /// ```
    /// use memcap::architecture::x86::x64;
    /// use memcap::types::size;
    ///
    /// let arch = x64::ARCH;
    /// assert_eq!(arch.page_size(), size::kb(4));
    /// ```
    fn page_size(&self) -> umem;

    /// Returns the size of a pointer in bytes.
    fn size_addr(&self) -> usize;

    /// Returns the address space range in bits for the `Architecture`.
    ///
    /// # Examples
    ///
    /// ```
    /// use memcap::architecture::x86::x32_pae;
    ///
    /// let arch = x32_pae::ARCH;
    /// assert_eq!(arch.address_space_bits(), 36);
    /// ```
    fn address_space_bits(&self) -> u8;

    /// Returns a FFI-safe identifier
    fn ident(&self) -> ArchitectureIdent;
}

pub type ArchitectureObj = &'static dyn Architecture;

impl std::fmt::Debug for ArchitectureObj {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("ArchitectureObj")
            .field("ident", &self.ident())
            .field("bits", &self.bits())
            .field("endianess", &self.endianess())
            .field("page_size", &self.page_size())
            .field("size_addr", &self.size_addr())
            .field("address_space_bits", &self.address_space_bits())
            .finish()
    }
}

impl std::cmp::PartialEq<ArchitectureObj> for ArchitectureObj {
    fn eq(&self, other: &ArchitectureObj) -> bool {
        self.ident() == other.ident()
    }
}

/// FFI-safe architecture identifier.
///
/// Process and module architectures are reported separately, a 32-bit process on a 64-bit system
/// carries `X86(32, false)` while its system reports `X86(64, false)`.
#[repr(C)]
#[derive(Debug, Copy, Clone, Eq, PartialEq, Hash)]
#[cfg_attr(feature = "serde", derive(::serde::Serialize, ::serde::Deserialize))]
pub enum ArchitectureIdent {
    /// Unknown architecture. Could be third-party implemented.
    Unknown,
    /// X86 with specified bitness and address extensions
    ///
    /// First argument - `bitness` controls whether it's 32, or 64 bit variant.
    /// Second argument - `address_extensions` control whether address extensions are
    /// enabled (PAE on x32, or LA57 on x64).
    X86(u8, bool),
    /// Arm 64-bit architecture with specified page size
    AArch64(usize),
}

impl Default for ArchitectureIdent {
    fn default() -> Self {
        Self::Unknown
    }
}

impl std::fmt::Display for ArchitectureIdent {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            ArchitectureIdent::X86(32, false) => f.pad("x86_32"),
            ArchitectureIdent::X86(32, true) => f.pad("x86_32 PAE"),
            ArchitectureIdent::X86(64, false) => f.pad("x86_64"),
            ArchitectureIdent::X86(64, true) => f.pad("x86_64 LA57"),
            ArchitectureIdent::X86(_, _) => f.pad("x86"),
            ArchitectureIdent::AArch64(_) => f.pad("AArch64"),
            ArchitectureIdent::Unknown => f.pad("Unknown"),
        }
    }
}

impl ArchitectureIdent {
    /// Returns the pointer width in bits, if the architecture is known.
    pub fn bits(&self) -> Option<u8> {
        match self {
            ArchitectureIdent::X86(bits, _) => Some(*bits),
            ArchitectureIdent::AArch64(_) => Some(64),
            ArchitectureIdent::Unknown => None,
        }
    }

    /// Returns the smallest page size of the architecture, if it is known.
    pub fn page_size(&self) -> Option<umem> {
        match self {
            ArchitectureIdent::X86(_, _) => Some(size::kb(4)),
            ArchitectureIdent::AArch64(page_size) => Some(*page_size as umem),
            ArchitectureIdent::Unknown => None,
        }
    }

    pub fn is_x86(&self) -> bool {
        matches!(self, ArchitectureIdent::X86(_, _))
    }

    /// Resolves the identifier into the matching static architecture object.
    pub fn into_obj(self) -> Result<ArchitectureObj> {
        const KB4: usize = size::kb(4) as usize;
        match self {
            ArchitectureIdent::X86(32, false) => Ok(x86::x32::ARCH),
            ArchitectureIdent::X86(32, true) => Ok(x86::x32_pae::ARCH),
            ArchitectureIdent::X86(64, false) => Ok(x86::x64::ARCH),
            ArchitectureIdent::AArch64(KB4) => Ok(arm::aarch64::ARCH),
            _ => Err(Error(ErrorOrigin::Other, ErrorKind::InvalidArchitecture)
                .log_warn(format!("unsupported architecture: {}", self))),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn ident_roundtrip() {
        for arch in [x86::x32::ARCH, x86::x32_pae::ARCH, x86::x64::ARCH, arm::aarch64::ARCH] {
            assert_eq!(arch.ident().into_obj().unwrap(), arch);
        }
    }

    #[test]
    fn ident_display() {
        assert_eq!(ArchitectureIdent::X86(64, false).to_string(), "x86_64");
        assert_eq!(ArchitectureIdent::X86(32, true).to_string(), "x86_32 PAE");
        assert_eq!(ArchitectureIdent::AArch64(0x1000).to_string(), "AArch64");
    }

    #[test]
    fn ident_helpers() {
        assert_eq!(ArchitectureIdent::X86(32, false).bits(), Some(32));
        assert_eq!(ArchitectureIdent::Unknown.page_size(), None);
        assert_eq!(ArchitectureIdent::AArch64(0x4000).page_size(), Some(0x4000));
        assert!(ArchitectureIdent::Unknown.into_obj().is_err());
        assert!(ArchitectureIdent::AArch64(0x10000).into_obj().is_err());
    }

    #[test]
    fn process_arch_differs_from_system() {
        let sys = ArchitectureIdent::X86(64, false);
        let proc = ArchitectureIdent::X86(32, false);
        assert_ne!(sys, proc);
        assert_eq!(proc.into_obj().unwrap().size_addr(), 4);
    }
}
