use super::{Architecture, ArchitectureIdent, ArchitectureObj, Endianess};
use crate::types::{size, umem};

pub struct X86Architecture {
    /// Defines how many bits does the native word size have
    bits: u8,
    /// PAE on 32-bit, LA57 on 64-bit
    address_extensions: bool,
    address_space_bits: u8,
}

impl Architecture for X86Architecture {
    fn bits(&self) -> u8 {
        self.bits
    }

    fn endianess(&self) -> Endianess {
        Endianess::LittleEndian
    }

    fn page_size(&self) -> umem {
        size::kb(4)
    }

    fn size_addr(&self) -> usize {
        self.bits as usize / 8
    }

    fn address_space_bits(&self) -> u8 {
        self.address_space_bits
    }

    fn ident(&self) -> ArchitectureIdent {
        ArchitectureIdent::X86(self.bits, self.address_extensions)
    }
}

pub mod x32 {
    use super::*;

    pub(super) static ARCH_DEF: X86Architecture = X86Architecture {
        bits: 32,
        address_extensions: false,
        address_space_bits: 32,
    };

    pub static ARCH: ArchitectureObj = &ARCH_DEF;
}

pub mod x32_pae {
    use super::*;

    pub(super) static ARCH_DEF: X86Architecture = X86Architecture {
        bits: 32,
        address_extensions: true,
        address_space_bits: 36,
    };

    pub static ARCH: ArchitectureObj = &ARCH_DEF;
}

pub mod x64 {
    use super::*;

    pub(super) static ARCH_DEF: X86Architecture = X86Architecture {
        bits: 64,
        address_extensions: false,
        address_space_bits: 52,
    };

    pub static ARCH: ArchitectureObj = &ARCH_DEF;
}

/// Checks whether `arch` is one of the x86 variants.
pub fn is_x86_arch(arch: ArchitectureObj) -> bool {
    arch.ident().is_x86()
}
