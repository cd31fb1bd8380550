use super::{Architecture, ArchitectureIdent, ArchitectureObj, Endianess};
use crate::types::{size, umem};

pub struct AArch64Architecture {
    page_size: umem,
}

impl Architecture for AArch64Architecture {
    fn bits(&self) -> u8 {
        64
    }

    fn endianess(&self) -> Endianess {
        Endianess::LittleEndian
    }

    fn page_size(&self) -> umem {
        self.page_size
    }

    fn size_addr(&self) -> usize {
        8
    }

    fn address_space_bits(&self) -> u8 {
        48
    }

    fn ident(&self) -> ArchitectureIdent {
        ArchitectureIdent::AArch64(self.page_size as usize)
    }
}

pub mod aarch64 {
    use super::*;

    pub(super) static ARCH_DEF: AArch64Architecture = AArch64Architecture {
        page_size: size::kb(4),
    };

    pub static ARCH: ArchitectureObj = &ARCH_DEF;
}
