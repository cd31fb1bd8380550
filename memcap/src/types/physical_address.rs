/*!
Physical addresses tagged with the page they were translated into.
*/

use super::{umem, Address, Page, PageType};

use core::fmt;

/// An [`Address`] in the physical address space.
///
/// Translation results carry the type and size of the page they hit. Page sizes are powers of
/// two and stored as their log2, zero standing for "no page attached".
#[repr(C)]
#[derive(Copy, Clone, PartialEq, Eq, PartialOrd, Ord, Hash)]
#[cfg_attr(feature = "serde", derive(::serde::Serialize, ::serde::Deserialize))]
pub struct PhysicalAddress {
    pub address: Address,
    pub page_type: PageType,
    page_size_log2: u8,
}

impl PhysicalAddress {
    pub const NULL: PhysicalAddress = PhysicalAddress::bare(Address::null());

    pub const INVALID: PhysicalAddress = PhysicalAddress::bare(Address::INVALID);

    const fn bare(address: Address) -> Self {
        Self {
            address,
            page_type: PageType::UNKNOWN,
            page_size_log2: 0,
        }
    }

    #[inline]
    pub const fn null() -> Self {
        Self::NULL
    }

    #[inline]
    pub const fn invalid() -> Self {
        Self::INVALID
    }

    /// Attaches page information to `address`.
    ///
    /// A `page_size` that is not a power of two is rounded down to one, zero attaches nothing.
    #[inline]
    pub fn with_page(address: Address, page_type: PageType, page_size: umem) -> Self {
        let page_size_log2 = page_size.checked_ilog2().map_or(0, |log2| log2 as u8);
        Self {
            address,
            page_type,
            page_size_log2,
        }
    }

    #[inline]
    pub const fn is_null(&self) -> bool {
        self.address.is_null()
    }

    #[inline]
    pub const fn is_valid(&self) -> bool {
        self.address.is_valid()
    }

    #[inline]
    pub const fn has_page(&self) -> bool {
        self.page_size_log2 != 0
    }

    #[inline]
    pub const fn address(&self) -> Address {
        self.address
    }

    #[inline]
    pub const fn page_type(&self) -> PageType {
        self.page_type
    }

    #[inline]
    pub const fn page_size_log2(&self) -> u8 {
        self.page_size_log2
    }

    /// Size of the attached page, zero without one.
    #[inline]
    pub const fn page_size(&self) -> umem {
        match self.page_size_log2 {
            0 => 0,
            log2 => 1 << log2,
        }
    }

    /// Start of the attached page, [`Address::INVALID`] without one.
    pub fn page_base(&self) -> Address {
        match self.page_size() {
            0 => Address::INVALID,
            size => self.address.as_page_aligned(size),
        }
    }

    #[inline]
    pub fn containing_page(&self) -> Page {
        Page {
            page_type: self.page_type,
            page_base: self.page_base(),
            page_size: self.page_size(),
        }
    }

    #[inline]
    pub const fn to_umem(self) -> umem {
        self.address.to_umem()
    }
}

impl Default for PhysicalAddress {
    fn default() -> Self {
        Self::NULL
    }
}

impl From<Address> for PhysicalAddress {
    fn from(address: Address) -> Self {
        Self::bare(address)
    }
}

impl From<u64> for PhysicalAddress {
    fn from(address: u64) -> Self {
        Address::from(address).into()
    }
}

impl From<PhysicalAddress> for Address {
    fn from(address: PhysicalAddress) -> Self {
        address.address
    }
}

impl fmt::Debug for PhysicalAddress {
    fn fmt(&self, f: &mut fmt::Formatter) -> fmt::Result {
        if self.has_page() {
            write!(f, "{:x} ({:?}, {:x})", self.address, self.page_type, self.page_size())
        } else {
            write!(f, "{:x}", self.address)
        }
    }
}

impl fmt::UpperHex for PhysicalAddress {
    fn fmt(&self, f: &mut fmt::Formatter) -> fmt::Result {
        fmt::UpperHex::fmt(&self.address, f)
    }
}

impl fmt::LowerHex for PhysicalAddress {
    fn fmt(&self, f: &mut fmt::Formatter) -> fmt::Result {
        fmt::LowerHex::fmt(&self.address, f)
    }
}

impl fmt::Display for PhysicalAddress {
    fn fmt(&self, f: &mut fmt::Formatter) -> fmt::Result {
        write!(f, "{:x}", self.address)
    }
}

#[cfg(test)]
mod tests {
    use super::super::size;
    use super::*;

    #[test]
    fn fits_two_words() {
        assert_eq!(core::mem::size_of::<PhysicalAddress>(), 16);
    }

    #[test]
    fn pages_of_every_size() {
        let addr = Address::from(0x1234_5678_u64);
        for (page_size, base) in [
            (size::kb(4), 0x1234_5000_u64),
            (size::mb(2), 0x1220_0000),
            (size::gb(1), 0),
        ] {
            let pa = PhysicalAddress::with_page(addr, PageType::UNKNOWN, page_size);
            assert_eq!(pa.page_size(), page_size);
            assert_eq!(pa.page_base(), Address::from(base));
            assert!(pa.containing_page().contains(addr));
        }

        let odd = PhysicalAddress::with_page(addr, PageType::UNKNOWN, 0x1800);
        assert_eq!(odd.page_size_log2(), 12);
    }

    #[test]
    fn without_page() {
        let pa = PhysicalAddress::from(0x1234_u64);
        assert!(!pa.has_page());
        assert_eq!(pa.page_size(), 0);
        assert_eq!(pa.page_base(), Address::INVALID);
        assert_eq!(PhysicalAddress::with_page(pa.address, PageType::UNKNOWN, 0), pa.address.into());
    }
}
