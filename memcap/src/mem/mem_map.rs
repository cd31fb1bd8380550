use crate::error::{Error, ErrorKind, ErrorOrigin, Result};
use crate::types::{umem, Address};

use super::{MemData, MemoryRange, PhysicalMemoryMapping};

use std::fmt;

/// The `MemoryMap` struct provides a mechanism to map addresses from the linear address space
/// that memcap uses internally to hardware specific memory regions.
///
/// All memory addresses will be bounds checked.
///
/// # Examples
///
/// ```
/// use memcap::mem::MemoryMap;
///
/// let mut map = MemoryMap::new();
/// map.push_remap(0x1000.into(), 0x1000, 0.into()).unwrap();      // push region from 0x1000 - 0x1FFF
/// map.push_remap(0x3000.into(), 0x1000, 0x2000.into()).unwrap(); // push region from 0x3000 - 0x3FFF
///
/// println!("{:?}", map);
///
/// let chunks = map.map(0x10ff.into(), 8).collect::<Vec<_>>();
/// assert_eq!(chunks.len(), 1);
/// ```
#[derive(Clone, Default, PartialEq, Eq)]
pub struct MemoryMap {
    mappings: Vec<PhysicalMemoryMapping>,
}

/// A part of a request that is backed by a mapping.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct MappedChunk {
    /// Address in the backing storage.
    pub real_base: Address,
    /// Offset of the chunk inside of the requested range.
    pub offset: umem,
    pub size: umem,
}

impl MemoryMap {
    /// Constructs a new memory map.
    ///
    /// This function is identical to `MemoryMap::default()`.
    pub fn new() -> Self {
        MemoryMap::default()
    }

    /// Constructs an identity mapping for `0..size`.
    pub fn identity(size: umem) -> Self {
        let mut map = Self::new();
        if size > 0 {
            map.mappings.push(PhysicalMemoryMapping {
                base: Address::null(),
                size,
                real_base: Address::null(),
            });
        }
        map
    }

    /// Builds a memory map from a list of mappings.
    ///
    /// Fails if any two mappings overlap.
    pub fn from_mappings(mappings: &[PhysicalMemoryMapping]) -> Result<Self> {
        let mut map = Self::new();
        for m in mappings {
            map.push_remap(m.base, m.size, m.real_base)?;
        }
        Ok(map)
    }

    /// Iterator over memory mappings
    pub fn iter(&self) -> impl Iterator<Item = &PhysicalMemoryMapping> {
        self.mappings.iter()
    }

    pub fn mappings(&self) -> &[PhysicalMemoryMapping] {
        &self.mappings
    }

    pub fn is_empty(&self) -> bool {
        self.mappings.is_empty()
    }

    /// Highest address covered by the map.
    pub fn max_address(&self) -> Address {
        self.mappings
            .last()
            .map(|m| m.base + (m.size - 1))
            .unwrap_or_default()
    }

    /// Total number of bytes covered by the map.
    pub fn real_size(&self) -> umem {
        self.mappings.iter().map(|m| m.size).sum()
    }

    /// Adds a new memory mapping to this memory map by specifying base address and size of the mapping.
    ///
    /// Overlapping memory regions are rejected.
    pub fn push_remap(&mut self, base: Address, size: umem, real_base: Address) -> Result<&mut Self> {
        if size == 0 {
            return Ok(self);
        }

        let end = base.to_umem().checked_add(size).ok_or_else(|| {
            Error(ErrorOrigin::MemoryMap, ErrorKind::OutOfBounds)
                .log_error(format!("mapping {:x}+{:x} wraps the address space", base, size))
        })?;

        // mappings are kept sorted by base
        let idx = self.mappings.partition_point(|m| m.base < base);

        let overlaps_prev = idx > 0 && {
            let prev = &self.mappings[idx - 1];
            prev.base.to_umem() + prev.size > base.to_umem()
        };
        let overlaps_next = self
            .mappings
            .get(idx)
            .map(|next| next.base.to_umem() < end)
            .unwrap_or(false);

        if overlaps_prev || overlaps_next {
            return Err(Error(ErrorOrigin::MemoryMap, ErrorKind::AlreadyExists)
                .log_error(format!(
                    "overlapping memory region {:x}-{:x}",
                    base,
                    Address::from(end)
                )));
        }

        self.mappings.insert(
            idx,
            PhysicalMemoryMapping {
                base,
                size,
                real_base,
            },
        );

        Ok(self)
    }

    /// Adds a new memory mapping to this memory map by specifying a range (base address and end addresses) of the mapping.
    ///
    /// If end <= base, the function will do nothing
    pub fn push_range(&mut self, base: Address, end: Address, real_base: Address) -> Result<&mut Self> {
        if end > base {
            self.push_remap(base, end - base, real_base)
        } else {
            Ok(self)
        }
    }

    /// Splits the range `addr..addr + len` into mapped chunks.
    ///
    /// Parts of the range not covered by any mapping are yielded as `Err` with the unmapped range.
    pub fn map(&self, addr: Address, len: umem) -> MemoryMapIterator<'_> {
        MemoryMapIterator {
            mappings: &self.mappings,
            cur: addr,
            offset: 0,
            remaining: len,
        }
    }
}

impl fmt::Debug for MemoryMap {
    fn fmt(&self, f: &mut fmt::Formatter) -> fmt::Result {
        for (i, m) in self.mappings.iter().enumerate() {
            if i > 0 {
                writeln!(f)?;
            }
            write!(
                f,
                "{:x}-{:x} => {:x}",
                m.base,
                m.base + m.size,
                m.real_base
            )?;
        }
        Ok(())
    }
}

pub struct MemoryMapIterator<'a> {
    mappings: &'a [PhysicalMemoryMapping],
    cur: Address,
    offset: umem,
    remaining: umem,
}

impl<'a> Iterator for MemoryMapIterator<'a> {
    type Item = std::result::Result<MappedChunk, MemoryRange>;

    fn next(&mut self) -> Option<Self::Item> {
        if self.remaining == 0 {
            return None;
        }

        let cur = self.cur.to_umem();
        let idx = self.mappings.partition_point(|m| m.base.to_umem() <= cur);

        let containing = idx
            .checked_sub(1)
            .map(|i| &self.mappings[i])
            .filter(|m| cur - m.base.to_umem() < m.size);

        let (item, size) = match containing {
            Some(m) => {
                let inside = cur - m.base.to_umem();
                let size = core::cmp::min(self.remaining, m.size - inside);
                (
                    Ok(MappedChunk {
                        real_base: m.real_base + inside,
                        offset: self.offset,
                        size,
                    }),
                    size,
                )
            }
            None => {
                let size = self
                    .mappings
                    .get(idx)
                    .map(|next| core::cmp::min(self.remaining, next.base.to_umem() - cur))
                    .unwrap_or(self.remaining);
                (Err(MemData(self.cur, size)), size)
            }
        };

        self.cur += size;
        self.offset += size;
        self.remaining -= size;

        Some(item)
    }
}

#[cfg(feature = "memmapfiles")]
#[derive(::serde::Deserialize)]
struct MemoryMapFile {
    #[serde(rename = "range")]
    ranges: Vec<MemoryMapFileRange>,
}

#[cfg(feature = "memmapfiles")]
#[derive(::serde::Deserialize)]
struct MemoryMapFileRange {
    base: u64,
    length: u64,
    real_base: Option<u64>,
}

#[cfg(feature = "memmapfiles")]
impl MemoryMap {
    /// Constructs a new memory map by parsing the mapping table from a [TOML](https://toml.io/) file.
    ///
    /// The file must contain a mapping table in the following format:
    ///
    /// ```toml
    /// [[range]]
    /// base=0x1000
    /// length=0x1000
    ///
    /// [[range]]
    /// base=0x2000
    /// length=0x1000
    /// real_base=0x3000
    /// ```
    ///
    /// The `real_base` parameter is optional. If it is not set there will be no re-mapping.
    pub fn open<P: AsRef<::std::path::Path>>(path: P) -> Result<Self> {
        let contents = ::std::fs::read_to_string(path).map_err(|err| {
            Error(ErrorOrigin::MemoryMap, ErrorKind::UnableToReadFile)
                .log_error(format!("unable to open the memory mapping file: {}", err))
        })?;
        Self::from_toml_str(&contents)
    }

    /// Parses a memory map from the contents of a TOML mapping table.
    pub fn from_toml_str(contents: &str) -> Result<Self> {
        let mappings: MemoryMapFile = ::toml::from_str(contents).map_err(|err| {
            Error(ErrorOrigin::MemoryMap, ErrorKind::Configuration)
                .log_error(format!("unable to parse the memory mapping toml file: {}", err))
        })?;

        let mut result = MemoryMap::new();
        for range in mappings.ranges.iter() {
            let real_base = range.real_base.unwrap_or(range.base);
            result.push_remap(range.base.into(), range.length, real_base.into())?;
        }

        Ok(result)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_mapping() {
        let mut map = MemoryMap::new();
        map.push_remap(0x1000.into(), 0x1000, 0.into()).unwrap();
        map.push_remap(0x3000.into(), 0x1000, 0x2000.into()).unwrap();

        let chunks = map.map(0x10ff.into(), 8).collect::<Vec<_>>();
        assert_eq!(
            chunks,
            vec![Ok(MappedChunk {
                real_base: 0xff.into(),
                offset: 0,
                size: 8
            })]
        );

        let chunks = map.map(0x3010.into(), 8).collect::<Vec<_>>();
        assert_eq!(chunks[0].unwrap().real_base, Address::from(0x2010));
    }

    #[test]
    fn test_mapping_split_gap() {
        let mut map = MemoryMap::new();
        map.push_remap(0x1000.into(), 0x1000, 0.into()).unwrap();
        map.push_remap(0x3000.into(), 0x1000, 0x2000.into()).unwrap();

        let chunks = map.map(0x1ff0.into(), 0x1020).collect::<Vec<_>>();
        assert_eq!(chunks.len(), 3);
        assert_eq!(chunks[0].unwrap().size, 0x10);
        assert_eq!(chunks[1], Err(MemData(Address::from(0x2000), 0x1000)));
        let last = chunks[2].unwrap();
        assert_eq!(last.offset, 0x1010);
        assert_eq!(last.size, 0x10);
        assert_eq!(last.real_base, Address::from(0x2000));
    }

    #[test]
    fn test_unmapped_tail() {
        let map = MemoryMap::identity(0x1000);
        let chunks = map.map(0xff8.into(), 0x10).collect::<Vec<_>>();
        assert_eq!(chunks.len(), 2);
        assert!(chunks[0].is_ok());
        assert_eq!(chunks[1], Err(MemData(Address::from(0x1000), 8)));
    }

    #[test]
    fn test_overlapping_rejected() {
        let mut map = MemoryMap::new();
        map.push_remap(0x1000.into(), 0x2000, 0.into()).unwrap();
        assert_eq!(
            map.push_remap(0x2000.into(), 0x1000, 0.into()).err(),
            Some(Error(ErrorOrigin::MemoryMap, ErrorKind::AlreadyExists))
        );
        assert!(map.push_remap(0x0.into(), 0x1001, 0.into()).is_err());
        assert!(map.push_remap(0x0.into(), 0x1000, 0.into()).is_ok());
        assert_eq!(map.mappings().len(), 2);
        assert_eq!(map.mappings()[0].base, Address::null());
    }

    #[test]
    fn test_metadata() {
        let mut map = MemoryMap::new();
        map.push_range(0x1000.into(), 0x2000.into(), 0.into()).unwrap();
        map.push_range(0x4000.into(), 0x5000.into(), 0x1000.into()).unwrap();
        assert_eq!(map.max_address(), Address::from(0x4fff));
        assert_eq!(map.real_size(), 0x2000);
    }

    #[cfg(feature = "memmapfiles")]
    #[test]
    fn test_toml() {
        let map = MemoryMap::from_toml_str(
            r#"
            [[range]]
            base=0x1000
            length=0x1000

            [[range]]
            base=0x2000
            length=0x1000
            real_base=0x3000
            "#,
        )
        .unwrap();

        assert_eq!(
            map.mappings(),
            &[
                PhysicalMemoryMapping {
                    base: 0x1000.into(),
                    size: 0x1000,
                    real_base: 0x1000.into()
                },
                PhysicalMemoryMapping {
                    base: 0x2000.into(),
                    size: 0x1000,
                    real_base: 0x3000.into()
                }
            ]
        );
    }
}
