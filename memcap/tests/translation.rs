use memcap::dummy::{DummyMemory, DummyOs};
use memcap::prelude::v1::*;

const IMAGE_SIZE: umem = size::kb(96);

fn os_with_process() -> (OsInstance, Pid) {
    let mut os = DummyOs::with_seed(DummyMemory::new(size::mb(16)), 7);
    let pid = os
        .alloc_process(IMAGE_SIZE, &[0x11, 0x22, 0x33, 0x44])
        .unwrap();
    (OsInstance::builder(os).build(), pid)
}

#[test]
fn page_info_agrees_with_translation() {
    let (os, pid) = os_with_process();
    let mut proc = os.into_process_by_pid(pid).unwrap();
    let base = proc.primary_module().unwrap().base;

    let addrs = [
        Address::from(0x1000_u64),
        base,
        base + 0x123_u64,
        base + (IMAGE_SIZE - 1),
        Address::from(0x7fff_ffff_0000_u64),
    ];

    for addr in addrs.iter().copied() {
        let phys = proc.virt_to_phys(addr);
        let page = proc.virt_page_info(addr);
        assert_eq!(phys.is_ok(), page.is_ok(), "{:x}", addr);

        if let (Ok(phys), Ok(page)) = (phys, page) {
            assert_eq!(page.page_size, phys.page_size());
            assert_eq!(page.page_type, phys.page_type());
            assert_eq!(page.page_base, addr.as_page_aligned(page.page_size));
            assert!(page.page_base <= addr && addr - page.page_base < page.page_size);
        }
    }

    assert_eq!(
        proc.virt_to_phys(Address::from(0x1000_u64)).err(),
        Some(Error(ErrorOrigin::VirtualTranslate, ErrorKind::OutOfBounds))
    );
}

#[test]
fn batch_read_fails_as_a_whole() {
    let (os, pid) = os_with_process();
    let mut proc = os.into_process_by_pid(pid).unwrap();
    let mapped = proc.primary_module().unwrap().base;
    let unmapped = Address::from(0x1000_u64);

    let mut a = [0xff_u8; 4];
    let mut b = [0xff_u8; 4];
    assert!(proc
        .virt_read_raw_list(&mut [
            MemData(mapped, (&mut a[..]).into()),
            MemData(unmapped, (&mut b[..]).into()),
        ])
        .is_err());
    assert_eq!(a, [0x11, 0x22, 0x33, 0x44]);
    assert_eq!(b, [0; 4]);

    assert_eq!(proc.virt_read::<[u8; 4]>(mapped).unwrap(), [0x11, 0x22, 0x33, 0x44]);
    assert!(proc.virt_read::<[u8; 4]>(unmapped).is_err());
}

#[test]
fn writes_are_visible_through_the_translation() {
    let (os, pid) = os_with_process();
    let mut proc = os.into_process_by_pid(pid).unwrap();
    let addr = proc.primary_module().unwrap().base + 0x800_u64;

    proc.virt_write(addr, &0xdead_beef_u32).unwrap();
    let phys = proc.virt_to_phys(addr).unwrap();
    assert_eq!(proc.phys_to_virt(phys.address()), Some(addr));

    assert!(proc
        .virt_write(Address::from(0x1000_u64), &0_u32)
        .is_err());
    assert_eq!(proc.virt_read::<u32>(addr).unwrap(), 0xdead_beef);
}

#[test]
fn unmapped_physical_address_has_no_virtual_one() {
    let (os, pid) = os_with_process();
    let mut proc = os.into_process_by_pid(pid).unwrap();

    assert_eq!(proc.phys_to_virt(Address::from(size::gb(1))), None);
    assert!(proc.phys_to_virt_vec(Address::from(size::gb(1))).is_empty());
}

#[test]
fn page_map_covers_the_image() {
    let (os, pid) = os_with_process();
    let mut proc = os.into_process_by_pid(pid).unwrap();
    let base = proc.primary_module().unwrap().base;

    let ranges = proc.virt_page_map_vec(0);
    assert!(!ranges.is_empty());
    assert!(ranges
        .iter()
        .any(|MemData(start, size)| *start <= base && base + IMAGE_SIZE <= *start + *size));

    // sorted and disjoint
    for pair in ranges.windows(2) {
        assert!(pair[0].0 + pair[0].1 <= pair[1].0);
    }

    let merged = proc.virt_page_map_vec(size::gb(1) as imem);
    assert!(merged.len() <= ranges.len());

    let within = proc.virt_page_map_range_vec(0, base, base + IMAGE_SIZE);
    assert_eq!(within.len(), 1);
    assert_eq!(within[0], MemData(base, IMAGE_SIZE));
}

#[test]
fn translation_map_is_sorted() {
    let (os, pid) = os_with_process();
    let mut proc = os.into_process_by_pid(pid).unwrap();

    let map = proc.virt_translation_map_vec();
    assert!(!map.is_empty());
    for pair in map.windows(2) {
        assert!(pair[0].in_virtual + pair[0].size <= pair[1].in_virtual);
    }

    let first = map[0];
    assert_eq!(
        proc.phys_to_virt(first.out_physical.address()),
        Some(first.in_virtual)
    );
}
