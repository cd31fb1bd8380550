use std::os::raw::c_char;
use std::slice::{from_raw_parts, from_raw_parts_mut};

use log::error;

use memcap::error::{Error, ErrorKind, ErrorOrigin, Result};

pub fn inspect_err<E: std::fmt::Display>(e: E) -> E {
    error!("{}", e);
    e
}

pub fn to_heap<T>(a: T) -> &'static mut T {
    Box::leak(Box::new(a))
}

unsafe fn is_zeroed<T>(ptr: *const T) -> bool {
    from_raw_parts(ptr as *const u8, std::mem::size_of::<T>())
        .iter()
        .all(|b| *b == 0)
}

fn uninitialized() -> Error {
    Error(ErrorOrigin::Ffi, ErrorKind::Uninitialized)
        .log_debug("the handle was consumed or never initialized")
}

/// Borrows the object behind a handle.
///
/// Null and zeroed handles are refused with `Uninitialized`.
///
/// # Safety
///
/// `ptr` must be null or point to `size_of::<T>()` readable bytes that are either zeroed or a
/// valid `T`.
pub unsafe fn handle_ref<'a, T>(ptr: *const T) -> Result<&'a T> {
    if ptr.is_null() || is_zeroed(ptr) {
        Err(uninitialized())
    } else {
        Ok(&*ptr)
    }
}

/// Mutable version of [`handle_ref`].
///
/// # Safety
///
/// Same as [`handle_ref`], the handle must not be aliased for the lifetime of the borrow.
pub unsafe fn handle_mut<'a, T>(ptr: *mut T) -> Result<&'a mut T> {
    if ptr.is_null() || is_zeroed(ptr) {
        Err(uninitialized())
    } else {
        Ok(&mut *ptr)
    }
}

/// Moves the object out of a handle and zeroes the handle memory.
///
/// Any later call with the same handle reports `Uninitialized`.
///
/// # Safety
///
/// Same as [`handle_mut`].
pub unsafe fn take_handle<T>(ptr: *mut T) -> Result<T> {
    if ptr.is_null() || is_zeroed(ptr) {
        return Err(uninitialized());
    }
    let obj = ptr.read();
    std::ptr::write_bytes(ptr, 0, 1);
    Ok(obj)
}

/// Copies `s` into `out`, truncated to `max_len - 1` bytes and zero terminated.
///
/// Returns the number of bytes written, including the terminator.
///
/// # Safety
///
/// `out` must be a buffer with at least `max_len` size
pub unsafe fn copy_str(s: &str, out: *mut c_char, max_len: usize) -> usize {
    if out.is_null() || max_len == 0 {
        return 0;
    }
    let out_bytes = from_raw_parts_mut(out as *mut u8, std::cmp::min(max_len, s.len() + 1));
    let len = out_bytes.len();
    out_bytes[..(len - 1)].copy_from_slice(&s.as_bytes()[..(len - 1)]);
    out_bytes[len - 1] = 0;
    len
}
