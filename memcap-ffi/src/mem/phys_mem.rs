use std::slice::{from_raw_parts, from_raw_parts_mut};

use memcap::error::AsIntResult;
use memcap::mem::{PhysicalMemory, PhysicalMemoryMetadata};
use memcap::plugins::ConnectorInstance;
use memcap::types::PhysicalAddress;

use crate::util::*;

/// Read a single range of physical memory into `out`
///
/// # Safety
///
/// `conn` has to point to a valid or zeroed `ConnectorInstance`, `out` must be valid for `len`
/// bytes.
#[no_mangle]
pub unsafe extern "C" fn phys_read_raw_into(
    conn: *mut ConnectorInstance,
    addr: PhysicalAddress,
    out: *mut u8,
    len: usize,
) -> i32 {
    handle_mut(conn)
        .and_then(|conn| conn.phys_read_raw_into(addr, from_raw_parts_mut(out, len)))
        .into_int_result()
}

/// Write `len` bytes from `input` into physical memory
///
/// # Safety
///
/// `conn` has to point to a valid or zeroed `ConnectorInstance`, `input` must be valid for `len`
/// bytes.
#[no_mangle]
pub unsafe extern "C" fn phys_write_raw(
    conn: *mut ConnectorInstance,
    addr: PhysicalAddress,
    input: *const u8,
    len: usize,
) -> i32 {
    handle_mut(conn)
        .and_then(|conn| conn.phys_write_raw(addr, from_raw_parts(input, len)))
        .into_int_result()
}

/// Retrieve the metadata of a connector
///
/// # Safety
///
/// `conn` has to point to a valid or zeroed `ConnectorInstance`.
#[no_mangle]
pub unsafe extern "C" fn phys_metadata(
    conn: *const ConnectorInstance,
    out: &mut std::mem::MaybeUninit<PhysicalMemoryMetadata>,
) -> i32 {
    handle_ref(conn)
        .map(|conn| conn.metadata())
        .into_int_out_result(out)
}

#[cfg(test)]
mod tests {
    use super::*;

    use memcap::dummy::DummyMemory;
    use memcap::types::size;

    #[test]
    fn read_back_written_bytes() {
        let mut conn = ConnectorInstance::builder(DummyMemory::new(size::kb(64))).build();
        let addr = PhysicalAddress::from(0x200_u64);

        let data = [1_u8, 2, 3, 4];
        assert_eq!(unsafe { phys_write_raw(&mut conn, addr, data.as_ptr(), data.len()) }, 0);

        let mut out = [0_u8; 4];
        assert_eq!(
            unsafe { phys_read_raw_into(&mut conn, addr, out.as_mut_ptr(), out.len()) },
            0
        );
        assert_eq!(out, data);

        let mut metadata = std::mem::MaybeUninit::uninit();
        assert_eq!(unsafe { phys_metadata(&conn, &mut metadata) }, 0);
        assert_eq!(unsafe { metadata.assume_init() }.real_size, size::kb(64));
    }
}
