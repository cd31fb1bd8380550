/*!
This module covers all implementations and traits related to
reading/writing [physical](phys_mem/index.html) and [virtual](virt_mem/index.html) memory.

The [`VirtualTranslate`](virt_translate/index.html) trait describes how virtual addresses are
resolved into physical ones. All traits in here are used as capabilities of plugin instances
and are dispatched through the tables in [`plugins`](../plugins/index.html).
*/

pub mod mem_data;
pub mod mem_map;
pub mod phys_mem;
pub mod virt_mem;
pub mod virt_translate;

#[doc(hidden)]
pub use mem_data::*;
#[doc(hidden)]
pub use mem_map::{MappedChunk, MemoryMap};
#[doc(hidden)]
pub use phys_mem::{PhysicalMemory, PhysicalMemoryMetadata};
#[doc(hidden)]
pub use virt_mem::VirtualMemory;
#[doc(hidden)]
pub use virt_translate::{
    VirtualTranslate, VirtualTranslation, VirtualTranslationCallback, VirtualTranslationFail,
    VirtualTranslationFailCallback,
};
