/*!
Virtual to physical address translation.

Implementors only provide [`VirtualTranslate::virt_to_phys_list`], every other query is derived
from it. All enumerations are delivered through callbacks and stop as soon as the callback
returns `false`.
*/

use std::cmp::Ordering;
use std::collections::BTreeSet;

use itertools::Itertools;

use super::{MemData, MemoryRange, MemoryRangeCallback};
use crate::error::{Error, ErrorKind, ErrorOrigin, Result};
use crate::types::{imem, umem, Address, OpaqueCallback, Page, PhysicalAddress};

pub type VirtualTranslationCallback<'a> = OpaqueCallback<'a, VirtualTranslation>;
pub type VirtualTranslationFailCallback<'a> = OpaqueCallback<'a, VirtualTranslationFail>;

/// Merges `b` into `a` if it continues `a` in both address spaces with the same page type.
fn join_translations(
    a: VirtualTranslation,
    b: VirtualTranslation,
) -> core::result::Result<VirtualTranslation, (VirtualTranslation, VirtualTranslation)> {
    let virt_next = a.in_virtual + a.size == b.in_virtual;
    let phys_next = a.out_physical.address() + a.size == b.out_physical.address();
    if virt_next && phys_next && a.out_physical.page_type() == b.out_physical.page_type() {
        Ok(VirtualTranslation {
            size: a.size + b.size,
            ..a
        })
    } else {
        Err((a, b))
    }
}

/// Merges `b` into `a` if the gap between them is zero or, with a non-negative `gap_size`, below
/// `gap_size`. Ranges arrive sorted and non-overlapping.
fn join_ranges(
    gap_size: imem,
    a: MemoryRange,
    b: MemoryRange,
) -> core::result::Result<MemoryRange, (MemoryRange, MemoryRange)> {
    let MemData(a_start, a_size) = a;
    let MemData(b_start, b_size) = b;
    let a_end = a_start + a_size;
    if b_start < a_end {
        return Err((a, b));
    }
    let gap = b_start - a_end;
    let close = gap == 0 || (gap_size >= 0 && gap < gap_size as umem);
    if close {
        Ok(MemData(a_start, b_start + b_size - a_start))
    } else {
        Err((a, b))
    }
}

pub trait VirtualTranslate: Send {
    /// Resolves the virtual ranges in `addrs`.
    ///
    /// Translated pieces go to `out`, pieces without a mapping to `out_fail`. The order within
    /// each callback is not specified and either callback may end the walk by returning `false`.
    fn virt_to_phys_list(
        &mut self,
        addrs: &[MemoryRange],
        out: VirtualTranslationCallback,
        out_fail: VirtualTranslationFailCallback,
    );

    /// Resolves `start..end`, dropping the unmapped pieces. An empty or inverted range reports
    /// nothing.
    fn virt_to_phys_range(
        &mut self,
        start: Address,
        end: Address,
        out: VirtualTranslationCallback,
    ) {
        if start < end {
            self.virt_to_phys_list(&[MemData(start, end - start)], out, (&mut |_| true).into())
        }
    }

    /// Feeds the mappings of `start..end` sorted by virtual address.
    ///
    /// Neighbours that continue each other virtually and physically with the same page type are
    /// reported as one entry. [`virt_to_phys_list`](Self::virt_to_phys_list) does not order its
    /// output, so the whole range is translated and sorted before the first entry is fed.
    /// Returning `false` stops the delivery, not the translation.
    fn virt_translation_map_range(
        &mut self,
        start: Address,
        end: Address,
        mut out: VirtualTranslationCallback,
    ) {
        let mut sorted = BTreeSet::new();
        self.virt_to_phys_range(
            start,
            end,
            (&mut |t: VirtualTranslation| {
                sorted.insert(t);
                true
            })
                .into(),
        );
        out.feed(sorted.into_iter().coalesce(join_translations));
    }

    /// Feeds the mapped virtual ranges of `start..end` sorted by address. Like
    /// [`virt_translation_map_range`](Self::virt_translation_map_range) the range is translated
    /// in full before feeding.
    ///
    /// Touching ranges are always joined. Ranges less than `gap_size` bytes apart are joined as
    /// well, a negative `gap_size` disables that.
    fn virt_page_map_range(
        &mut self,
        gap_size: imem,
        start: Address,
        end: Address,
        mut out: MemoryRangeCallback,
    ) {
        let mut sorted = BTreeSet::new();
        self.virt_to_phys_range(
            start,
            end,
            (&mut |t: VirtualTranslation| {
                sorted.insert(MemData(t.in_virtual, t.size));
                true
            })
                .into(),
        );
        out.feed(
            sorted
                .into_iter()
                .coalesce(|a, b| join_ranges(gap_size, a, b)),
        );
    }

    /// Physical address backing `address`, `OutOfBounds` if it is not mapped.
    fn virt_to_phys(&mut self, address: Address) -> Result<PhysicalAddress> {
        let mut phys = None;
        self.virt_to_phys_list(
            &[MemData(address, 1)],
            (&mut |t: VirtualTranslation| {
                phys = Some(t.out_physical);
                false
            })
                .into(),
            (&mut |_| true).into(),
        );
        phys.ok_or(Error(ErrorOrigin::VirtualTranslate, ErrorKind::OutOfBounds))
    }

    /// The page `addr` lies in. Translators that do not track pages fail with `NotSupported`.
    fn virt_page_info(&mut self, addr: Address) -> Result<Page> {
        let phys = self.virt_to_phys(addr)?;
        if !phys.has_page() {
            return Err(Error(ErrorOrigin::VirtualTranslate, ErrorKind::NotSupported));
        }
        let page_size = phys.page_size();
        Ok(Page {
            page_type: phys.page_type(),
            page_base: addr.as_page_aligned(page_size),
            page_size,
        })
    }

    fn virt_translation_map(&mut self, out: VirtualTranslationCallback) {
        self.virt_translation_map_range(Address::null(), Address::invalid(), out)
    }

    fn virt_page_map(&mut self, gap_size: imem, out: MemoryRangeCallback) {
        self.virt_page_map_range(gap_size, Address::null(), Address::invalid(), out)
    }

    /// Lowest virtual address mapping to `phys`, if any.
    fn phys_to_virt(&mut self, phys: Address) -> Option<Address> {
        let mut virt = None;
        self.virt_translation_map(
            (&mut |t: VirtualTranslation| {
                virt = t.translate_back(phys);
                virt.is_none()
            })
                .into(),
        );
        virt
    }

    /// Every virtual address mapping to `phys`, in ascending order.
    fn phys_to_virt_vec(&mut self, phys: Address) -> Vec<Address> {
        let mut virt = vec![];
        self.virt_translation_map(
            (&mut |t: VirtualTranslation| {
                virt.extend(t.translate_back(phys));
                true
            })
                .into(),
        );
        virt
    }

    fn virt_translation_map_vec(&mut self) -> Vec<VirtualTranslation> {
        let mut out = vec![];
        self.virt_translation_map((&mut out).into());
        out
    }

    fn virt_page_map_vec(&mut self, gap_size: imem) -> Vec<MemoryRange> {
        let mut out = vec![];
        self.virt_page_map(gap_size, (&mut out).into());
        out
    }

    fn virt_page_map_range_vec(
        &mut self,
        gap_size: imem,
        start: Address,
        end: Address,
    ) -> Vec<MemoryRange> {
        let mut out = vec![];
        self.virt_page_map_range(gap_size, start, end, (&mut out).into());
        out
    }
}

impl<T: VirtualTranslate + ?Sized> VirtualTranslate for &mut T {
    fn virt_to_phys_list(
        &mut self,
        addrs: &[MemoryRange],
        out: VirtualTranslationCallback,
        out_fail: VirtualTranslationFailCallback,
    ) {
        (**self).virt_to_phys_list(addrs, out, out_fail)
    }
}

/// `size` bytes at `in_virtual` backed by physical memory starting at `out_physical`.
///
/// Ordering and equality only look at `in_virtual`.
#[repr(C)]
#[derive(Clone, Debug, Eq, Copy)]
#[cfg_attr(feature = "serde", derive(::serde::Serialize, ::serde::Deserialize))]
pub struct VirtualTranslation {
    pub in_virtual: Address,
    pub size: umem,
    pub out_physical: PhysicalAddress,
}

impl VirtualTranslation {
    /// Virtual address of `phys` if this translation covers it.
    pub fn translate_back(&self, phys: Address) -> Option<Address> {
        let base = self.out_physical.address();
        if base <= phys && phys - base < self.size {
            Some(self.in_virtual + (phys - base))
        } else {
            None
        }
    }
}

impl Ord for VirtualTranslation {
    fn cmp(&self, other: &Self) -> Ordering {
        self.in_virtual.cmp(&other.in_virtual)
    }
}

impl PartialOrd for VirtualTranslation {
    fn partial_cmp(&self, other: &Self) -> Option<Ordering> {
        Some(self.cmp(other))
    }
}

impl PartialEq for VirtualTranslation {
    fn eq(&self, other: &Self) -> bool {
        self.in_virtual == other.in_virtual
    }
}

/// A virtual range that could not be translated.
#[repr(C)]
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
#[cfg_attr(feature = "serde", derive(::serde::Serialize, ::serde::Deserialize))]
pub struct VirtualTranslationFail {
    pub from: Address,
    pub size: umem,
}
