use std::os::raw::c_char;

use memcap::error::Error;

use crate::util::copy_str;

/// Writes the name of the error kind encoded in `code` into `out`.
///
/// Returns the number of bytes written, including the null terminator.
///
/// # Safety
///
/// `out` must be a buffer with at least `max_len` size
#[no_mangle]
pub unsafe extern "C" fn error_kind_str(code: i32, out: *mut c_char, max_len: usize) -> usize {
    copy_str(Error::from_i32(code).1.to_str(), out, max_len)
}

/// Writes the name of the error origin encoded in `code` into `out`.
///
/// # Safety
///
/// `out` must be a buffer with at least `max_len` size
#[no_mangle]
pub unsafe extern "C" fn error_origin_str(code: i32, out: *mut c_char, max_len: usize) -> usize {
    copy_str(Error::from_i32(code).0.to_str(), out, max_len)
}

#[cfg(test)]
mod tests {
    use super::*;
    use memcap::error::{ErrorKind, ErrorOrigin};

    #[test]
    fn kind_of_status_code() {
        let code = Error(ErrorOrigin::Inventory, ErrorKind::PluginNotFound).into_i32();
        let mut buf = [0 as c_char; 64];
        let len = unsafe { error_kind_str(code, buf.as_mut_ptr(), buf.len()) };
        let name = buf[..len - 1].iter().map(|c| *c as u8 as char).collect::<String>();
        assert_eq!(name, ErrorKind::PluginNotFound.to_str());
    }
}
