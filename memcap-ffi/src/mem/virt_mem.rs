use std::slice::{from_raw_parts, from_raw_parts_mut};

use memcap::error::AsIntResult;
use memcap::mem::VirtualMemory;
use memcap::plugins::IntoProcessInstance;
use memcap::types::Address;

use crate::util::*;

/// Read a single range of process memory into `out`
///
/// # Safety
///
/// `proc` has to point to a valid or zeroed `IntoProcessInstance`, `out` must be valid for `len`
/// bytes.
#[no_mangle]
pub unsafe extern "C" fn virt_read_raw_into(
    proc: *mut IntoProcessInstance,
    addr: Address,
    out: *mut u8,
    len: usize,
) -> i32 {
    handle_mut(proc)
        .and_then(|proc| proc.virt_read_raw_into(addr, from_raw_parts_mut(out, len)))
        .into_int_result()
}

/// Write `len` bytes from `input` into process memory
///
/// # Safety
///
/// `proc` has to point to a valid or zeroed `IntoProcessInstance`, `input` must be valid for
/// `len` bytes.
#[no_mangle]
pub unsafe extern "C" fn virt_write_raw(
    proc: *mut IntoProcessInstance,
    addr: Address,
    input: *const u8,
    len: usize,
) -> i32 {
    handle_mut(proc)
        .and_then(|proc| proc.virt_write_raw(addr, from_raw_parts(input, len)))
        .into_int_result()
}
