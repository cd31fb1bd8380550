/*!
Addresses in the address space of a target.
*/

use core::fmt;
use core::ops;

/// Unsigned integer wide enough for addresses of every supported target.
#[allow(non_camel_case_types)]
pub type umem = u64;

#[allow(non_camel_case_types)]
pub type imem = i64;

/// Converts a target size to a host size, saturating on 32-bit hosts.
pub const fn clamp_to_usize(val: umem) -> usize {
    if val > usize::MAX as umem {
        usize::MAX
    } else {
        val as usize
    }
}

/// Virtual or physical address of a target.
///
/// 32-bit targets use the lower half. Arithmetic wraps around instead of overflowing, staying
/// inside the address space is up to the caller.
///
/// ```
/// use memcap::types::Address;
///
/// let base = Address::from(0x7ff0_0000_u64);
/// assert_eq!(base + 0x10_u64 - base, 0x10);
/// assert_eq!(format!("{}", base), "7ff00000");
/// ```
#[repr(transparent)]
#[derive(Copy, Clone, Eq, PartialEq, Ord, PartialOrd, Hash, Default)]
#[cfg_attr(feature = "serde", derive(::serde::Serialize, ::serde::Deserialize))]
pub struct Address(umem);

impl Address {
    pub const NULL: Address = Address(0);

    /// All bits set, returned where no address could be determined.
    pub const INVALID: Address = Address(!0);

    #[inline]
    pub const fn null() -> Self {
        Self::NULL
    }

    #[inline]
    pub const fn invalid() -> Self {
        Self::INVALID
    }

    #[inline]
    pub const fn is_null(self) -> bool {
        self.0 == 0
    }

    #[inline]
    pub const fn is_valid(self) -> bool {
        self.0 != Self::INVALID.0
    }

    #[inline]
    pub const fn to_umem(self) -> umem {
        self.0
    }

    /// Rounds down to a multiple of `page_size`.
    pub const fn as_page_aligned(self, page_size: umem) -> Self {
        Self(self.0 - self.0 % page_size)
    }
}

macro_rules! impl_address_from {
    ($($type_name:ty),*) => {
        $(
            impl From<$type_name> for Address {
                #[inline]
                fn from(item: $type_name) -> Self {
                    Self(item as umem)
                }
            }
        )*
    };
}

impl_address_from!(u8, u16, u32, u64, usize, i32, i64);

macro_rules! impl_address_arithmetic {
    ($($type_name:ty),*) => {
        $(
            impl ops::Add<$type_name> for Address {
                type Output = Self;

                #[inline]
                fn add(self, other: $type_name) -> Self {
                    Self(self.0.wrapping_add(other as umem))
                }
            }

            impl ops::AddAssign<$type_name> for Address {
                #[inline]
                fn add_assign(&mut self, other: $type_name) {
                    self.0 = self.0.wrapping_add(other as umem);
                }
            }

            impl ops::Sub<$type_name> for Address {
                type Output = Self;

                #[inline]
                fn sub(self, other: $type_name) -> Self {
                    Self(self.0.wrapping_sub(other as umem))
                }
            }

            impl ops::SubAssign<$type_name> for Address {
                #[inline]
                fn sub_assign(&mut self, other: $type_name) {
                    self.0 = self.0.wrapping_sub(other as umem);
                }
            }
        )*
    };
}

impl_address_arithmetic!(u8, u16, u32, u64, usize);

/// Distance between two addresses.
impl ops::Sub for Address {
    type Output = umem;

    #[inline]
    fn sub(self, other: Self) -> umem {
        self.0.wrapping_sub(other.0)
    }
}

impl fmt::Debug for Address {
    fn fmt(&self, f: &mut fmt::Formatter) -> fmt::Result {
        write!(f, "{:x}", self.0)
    }
}

impl fmt::UpperHex for Address {
    fn fmt(&self, f: &mut fmt::Formatter) -> fmt::Result {
        fmt::UpperHex::fmt(&self.0, f)
    }
}

impl fmt::LowerHex for Address {
    fn fmt(&self, f: &mut fmt::Formatter) -> fmt::Result {
        fmt::LowerHex::fmt(&self.0, f)
    }
}

impl fmt::Display for Address {
    fn fmt(&self, f: &mut fmt::Formatter) -> fmt::Result {
        write!(f, "{:x}", self.0)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn null_and_invalid() {
        assert!(Address::null().is_null());
        assert!(Address::null().is_valid());
        assert!(!Address::invalid().is_valid());
        assert_eq!(core::mem::size_of::<Address>(), 8);
    }

    #[test]
    fn arithmetic_wraps() {
        assert_eq!(Address::INVALID + 1u64, Address::NULL);
        assert_eq!(Address::NULL - 1u64, Address::INVALID);
        assert_eq!(Address::from(0x1000u64) - Address::from(0x2000u64), !0xfff);

        let mut a = Address::from(0x10u32);
        a += 0x20usize;
        a -= 0x8u8;
        assert_eq!(a, Address::from(0x28u64));
    }

    #[test]
    fn page_alignment() {
        let a = Address::from(0xdead_beefu64);
        assert_eq!(a.as_page_aligned(0x1000), Address::from(0xdead_b000u64));
        assert_eq!(a.as_page_aligned(0x20_0000), Address::from(0xdea0_0000u64));
    }

    #[test]
    fn formatting() {
        let a = Address::from(0xabcu64);
        assert_eq!(format!("{:?} {:X} {:#x}", a, a, a), "abc ABC 0xabc");
    }
}
