/*!
Module with basic types used in memcap.

This module contains types for handling virtual and physical addresses and pages,
the fixed layout building blocks every plugin vtable is made of and different size helpers.
*/

pub mod address;
#[doc(hidden)]
pub use address::{clamp_to_usize, imem, umem, Address};

pub mod size;

pub mod page;
#[doc(hidden)]
pub use page::{Page, PageType};

pub mod physical_address;
#[doc(hidden)]
pub use physical_address::PhysicalAddress;

pub mod abi;
#[doc(hidden)]
pub use abi::{CBox, COption, CSliceMut, CSliceRef, CtxBox};

pub mod arc;
#[doc(hidden)]
pub use arc::{CArc, COptArc};

pub mod callback;
#[doc(hidden)]
pub use callback::OpaqueCallback;

pub mod repr_cstring;
#[doc(hidden)]
pub use repr_cstring::ReprCString;
