use memcap::architecture::{Architecture, ArchitectureIdent, ArchitectureObj, Endianess};
use memcap::types::umem;

use crate::util::*;

pub mod x86;

pub use x86::*;

#[no_mangle]
pub static AARCH64: &ArchitectureObj = &memcap::architecture::arm::aarch64::ARCH;

#[no_mangle]
pub extern "C" fn arch_bits(arch: &ArchitectureObj) -> u8 {
    arch.bits()
}

#[no_mangle]
pub extern "C" fn arch_endianess(arch: &ArchitectureObj) -> Endianess {
    arch.endianess()
}

#[no_mangle]
pub extern "C" fn arch_page_size(arch: &ArchitectureObj) -> umem {
    arch.page_size()
}

#[no_mangle]
pub extern "C" fn arch_size_addr(arch: &ArchitectureObj) -> usize {
    arch.size_addr()
}

#[no_mangle]
pub extern "C" fn arch_address_space_bits(arch: &ArchitectureObj) -> u8 {
    arch.address_space_bits()
}

/// Resolves an identifier into an architecture reference
///
/// Returns null for identifiers without a built-in architecture. The result has to be released
/// with `arch_free`.
#[no_mangle]
pub extern "C" fn arch_from_ident(ident: &ArchitectureIdent) -> Option<&'static mut ArchitectureObj> {
    ident.into_obj().map_err(inspect_err).ok().map(to_heap)
}

/// Free an architecture reference
///
/// # Safety
///
/// `arch` must be a valid heap allocated reference created by one of the API's functions.
#[no_mangle]
pub unsafe extern "C" fn arch_free(arch: &'static mut ArchitectureObj) {
    let _ = Box::from_raw(arch);
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn ident_roundtrip() {
        let arch = arch_from_ident(&ArchitectureIdent::X86(64, false)).unwrap();
        assert_eq!(arch_bits(arch), 64);
        assert_eq!(arch_page_size(arch), 0x1000);
        assert!(is_x86_arch(arch));
        unsafe { arch_free(arch) };

        assert!(arch_from_ident(&ArchitectureIdent::Unknown).is_none());
        assert!(!is_x86_arch(AARCH64));
    }
}
