/*!
Page descriptors returned by address translation.
*/

use super::{umem, Address};

bitflags! {
    /// Access flags of a mapped page.
    ///
    /// `UNKNOWN` is set until a translation fills in real flags.
    #[cfg_attr(feature = "serde", derive(::serde::Serialize, ::serde::Deserialize))]
    #[repr(transparent)]
    pub struct PageType: u8 {
        const NONE = 0b0000_0000;
        const UNKNOWN = 0b0000_0001;
        /// Holds entries of the page table itself.
        const PAGE_TABLE = 0b0000_0010;
        const WRITEABLE = 0b0000_0100;
        const READ_ONLY = 0b0000_1000;
        const NOEXEC = 0b0001_0000;
    }
}

impl PageType {
    fn with(self, clear: PageType, set: PageType, flag: bool) -> Self {
        let cleared = self - clear - PageType::UNKNOWN;
        if flag {
            cleared | set
        } else {
            cleared
        }
    }

    /// Sets either `WRITEABLE` or `READ_ONLY`.
    pub fn write(self, flag: bool) -> Self {
        let access = PageType::WRITEABLE | PageType::READ_ONLY;
        if flag {
            self.with(access, PageType::WRITEABLE, true)
        } else {
            self.with(access, PageType::READ_ONLY, true)
        }
    }

    pub fn noexec(self, flag: bool) -> Self {
        self.with(PageType::NOEXEC, PageType::NOEXEC, flag)
    }

    pub fn page_table(self, flag: bool) -> Self {
        self.with(PageType::PAGE_TABLE, PageType::PAGE_TABLE, flag)
    }
}

impl Default for PageType {
    fn default() -> Self {
        PageType::UNKNOWN
    }
}

/// Base, size and flags of the page an address was found in.
#[repr(C)]
#[derive(Copy, Clone, PartialEq, Eq, PartialOrd, Ord, Debug)]
#[cfg_attr(feature = "serde", derive(::serde::Serialize, ::serde::Deserialize))]
pub struct Page {
    pub page_type: PageType,
    pub page_base: Address,
    pub page_size: umem,
}

impl Page {
    pub const INVALID: Page = Page {
        page_type: PageType::UNKNOWN,
        page_base: Address::INVALID,
        page_size: 0,
    };

    pub const fn invalid() -> Self {
        Self::INVALID
    }

    pub fn is_valid(&self) -> bool {
        self.page_base.is_valid() && self.page_size != 0
    }

    /// Whether `address` lies in `[page_base, page_base + page_size)`.
    pub fn contains(&self, address: Address) -> bool {
        self.is_valid() && address >= self.page_base && address - self.page_base < self.page_size
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn flags_replace_each_other() {
        let t = PageType::UNKNOWN.write(true).noexec(true);
        assert_eq!(t, PageType::WRITEABLE | PageType::NOEXEC);

        let t = t.write(false).noexec(false);
        assert_eq!(t, PageType::READ_ONLY);

        assert_eq!(
            PageType::default().page_table(true),
            PageType::PAGE_TABLE
        );
    }

    #[test]
    fn page_bounds() {
        let page = Page {
            page_type: PageType::NONE,
            page_base: Address::from(0x1000u64),
            page_size: 0x1000,
        };
        assert!(page.contains(Address::from(0x1000u64)));
        assert!(page.contains(Address::from(0x1fffu64)));
        assert!(!page.contains(Address::from(0x2000u64)));
        assert!(!page.contains(Address::from(0xfffu64)));
        assert!(!Page::INVALID.contains(Address::NULL));
    }
}
