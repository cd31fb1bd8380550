/*!
Software page table used by the dummy os and its processes.
*/

use std::collections::BTreeMap;
use std::sync::Arc;

use crate::error::{Error, ErrorKind, ErrorOrigin, Result};
use crate::mem::mem_data::*;
use crate::mem::{
    PhysicalMemory, VirtualTranslation, VirtualTranslationCallback, VirtualTranslationFail,
    VirtualTranslationFailCallback,
};
use crate::types::{clamp_to_usize, umem, Address, PageType, PhysicalAddress};

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub(crate) struct PageEntry {
    pub phys: Address,
    pub size: umem,
    pub page_type: PageType,
}

/// Sparse mapping from virtual page bases to physical frames.
///
/// Clones share the table, mappings are only added while the table is exclusively owned.
#[derive(Debug, Clone, Default)]
pub(crate) struct PageTable {
    pages: Arc<BTreeMap<umem, PageEntry>>,
}

/// Piece of a virtual range, backed by a single page or by nothing.
#[derive(Debug, Clone, Copy)]
pub(crate) struct Chunk {
    pub virt: Address,
    pub size: umem,
    pub phys: Option<PhysicalAddress>,
}

impl PageTable {
    pub fn map_page(&mut self, virt: Address, entry: PageEntry) {
        Arc::make_mut(&mut self.pages).insert(virt.to_umem(), entry);
    }

    pub fn is_mapped(&self, virt: Address) -> bool {
        self.entry(virt.to_umem()).is_some()
    }

    fn entry(&self, addr: umem) -> Option<(umem, &PageEntry)> {
        self.pages
            .range(..=addr)
            .next_back()
            .filter(|(base, e)| addr - **base < e.size)
            .map(|(base, e)| (*base, e))
    }

    /// Splits `addr..addr + len` at page boundaries.
    pub fn walk(&self, addr: Address, len: umem) -> PageWalk<'_> {
        let start = addr.to_umem();
        PageWalk {
            table: self,
            cur: start,
            end: start.saturating_add(len),
        }
    }

    pub fn translate_list(
        &self,
        addrs: &[MemoryRange],
        mut out: VirtualTranslationCallback,
        mut out_fail: VirtualTranslationFailCallback,
    ) {
        for MemData(addr, size) in addrs.iter() {
            for chunk in self.walk(*addr, *size) {
                let cont = match chunk.phys {
                    Some(phys) => out.call(VirtualTranslation {
                        in_virtual: chunk.virt,
                        size: chunk.size,
                        out_physical: phys,
                    }),
                    None => out_fail.call(VirtualTranslationFail {
                        from: chunk.virt,
                        size: chunk.size,
                    }),
                };
                if !cont {
                    return;
                }
            }
        }
    }

    /// Reads through the table, failing the whole batch if any byte is unmapped.
    pub fn virt_read_raw_list(
        &self,
        mem: &mut impl PhysicalMemory,
        data: &mut [ReadData],
    ) -> Result<()> {
        let mut failed = false;
        let mut ops = vec![];

        for MemData(addr, out) in data.iter_mut() {
            let mut rest: &mut [u8] = &mut out[..];
            for chunk in self.walk(*addr, rest.len() as umem) {
                let (head, tail) =
                    core::mem::take(&mut rest).split_at_mut(clamp_to_usize(chunk.size));
                rest = tail;
                match chunk.phys {
                    Some(phys) => ops.push(MemData(phys, head.into())),
                    None => {
                        head.fill(0);
                        failed = true;
                    }
                }
            }
        }

        mem.phys_read_raw_list(&mut ops)
            .map_err(|_| Error(ErrorOrigin::VirtualMemory, ErrorKind::UnableToReadMemory))?;

        if failed {
            Err(Error(ErrorOrigin::VirtualMemory, ErrorKind::UnableToReadMemory))
        } else {
            Ok(())
        }
    }

    /// Writes through the table, failing the whole batch if any byte is unmapped.
    pub fn virt_write_raw_list(
        &self,
        mem: &mut impl PhysicalMemory,
        data: &[WriteData],
    ) -> Result<()> {
        let mut failed = false;
        let mut ops = vec![];

        for MemData(addr, src) in data.iter() {
            let mut rest: &[u8] = src;
            for chunk in self.walk(*addr, rest.len() as umem) {
                let (head, tail) = rest.split_at(clamp_to_usize(chunk.size));
                rest = tail;
                match chunk.phys {
                    Some(phys) => ops.push(MemData(phys, head.into())),
                    None => failed = true,
                }
            }
        }

        mem.phys_write_raw_list(&ops)
            .map_err(|_| Error(ErrorOrigin::VirtualMemory, ErrorKind::UnableToWriteMemory))?;

        if failed {
            Err(Error(ErrorOrigin::VirtualMemory, ErrorKind::UnableToWriteMemory))
        } else {
            Ok(())
        }
    }
}

pub(crate) struct PageWalk<'a> {
    table: &'a PageTable,
    cur: umem,
    end: umem,
}

impl<'a> Iterator for PageWalk<'a> {
    type Item = Chunk;

    fn next(&mut self) -> Option<Chunk> {
        if self.cur >= self.end {
            return None;
        }

        let cur = self.cur;
        let chunk = match self.table.entry(cur) {
            Some((base, entry)) => {
                let size = core::cmp::min(self.end, base + entry.size) - cur;
                Chunk {
                    virt: cur.into(),
                    size,
                    phys: Some(PhysicalAddress::with_page(
                        entry.phys + (cur - base),
                        entry.page_type,
                        entry.size,
                    )),
                }
            }
            None => {
                let next = self
                    .table
                    .pages
                    .range(cur..)
                    .next()
                    .map(|(base, _)| *base)
                    .unwrap_or(self.end);
                Chunk {
                    virt: cur.into(),
                    size: core::cmp::min(self.end, next) - cur,
                    phys: None,
                }
            }
        };

        self.cur += chunk.size;
        Some(chunk)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::types::size;

    fn table() -> PageTable {
        let mut pt = PageTable::default();
        pt.map_page(
            Address::from(0x10000_u64),
            PageEntry {
                phys: Address::from(0x3000_u64),
                size: size::kb(4),
                page_type: PageType::default().write(true),
            },
        );
        pt.map_page(
            Address::from(0x11000_u64),
            PageEntry {
                phys: Address::from(0x1000_u64),
                size: size::kb(4),
                page_type: PageType::default().write(false),
            },
        );
        pt
    }

    #[test]
    fn walk_splits_at_pages() {
        let pt = table();
        let chunks = pt
            .walk(Address::from(0xff00_u64), 0x1200)
            .map(|c| (c.virt.to_umem(), c.size, c.phys.map(|p| p.address().to_umem())))
            .collect::<Vec<_>>();
        assert_eq!(
            chunks,
            vec![
                (0xff00, 0x100, None),
                (0x10000, 0x1000, Some(0x3000)),
                (0x11000, 0x100, Some(0x1000)),
            ]
        );
    }

    #[test]
    fn chunks_carry_page_info() {
        let pt = table();
        let chunk = pt.walk(Address::from(0x11008_u64), 4).next().unwrap();
        let phys = chunk.phys.unwrap();
        assert_eq!(phys.page_size(), size::kb(4));
        assert!(phys.page_type().contains(PageType::READ_ONLY));
        assert!(pt.is_mapped(Address::from(0x11fff_u64)));
        assert!(!pt.is_mapped(Address::from(0x12000_u64)));
    }

    #[test]
    fn clones_share_until_modified() {
        let pt = table();
        let mut other = pt.clone();
        other.map_page(
            Address::from(0x20000_u64),
            PageEntry {
                phys: Address::from(0x5000_u64),
                size: size::kb(4),
                page_type: PageType::default(),
            },
        );
        assert!(other.is_mapped(Address::from(0x20000_u64)));
        assert!(!pt.is_mapped(Address::from(0x20000_u64)));
    }
}
