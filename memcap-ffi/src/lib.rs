/*!
C bindings for memcap.

Bundles are handed to C by value. Functions consuming a bundle zero the handle they were given,
calls with a zeroed handle fail with `Uninitialized` instead of touching freed memory. Status
codes follow the encoding of [`memcap::error::Error::into_i32`].
*/

pub mod log;

pub mod types;

pub mod error;

pub mod architecture;

pub mod plugins;

pub mod mem;

pub mod os;

pub mod util;
