//!
//! # memcap
//!
//! Capability based plugins for memory introspection
//!
//! ## Introduction
//!
//! memcap lets programs inspect the memory of a target machine through dynamically loaded
//! plugins. There are 2 kinds of plugins - _Connectors_ and _OS layers_. A connector provides raw
//! access to physical memory. An OS layer builds on top of a connector and exposes processes,
//! modules and optionally keyboard input. Both can be chained, an OS layer may itself be exposed
//! as a connector to another OS layer.
//!
//! ```text
//! +-----------+        +----------+        +-----------+
//! | connector |  --->  | OS layer |  --->  | process   |
//! +-----------+        +----------+        +-----------+
//! ```
//!
//! Plugins are plain shared libraries exporting a descriptor symbol. Every object crossing the
//! library boundary is a _capability bundle_: an opaque instance, a set of `#[repr(C)]` function
//! tables and the reference counted library context that keeps the producing library loaded.
//! Optional capabilities are discovered at runtime, a missing one is reported as
//! [`ErrorKind::UnsupportedOptionalFeature`](crate::error::ErrorKind::UnsupportedOptionalFeature).
//!
//! # Structure
//!
//! [mem](crate::mem) covers physical and virtual memory access as well as address translation,
//! [os](crate::os) the OS abstractions, [architecture](crate::architecture) the built-in
//! architectures and [types](crate::types) the address types and fixed layout building blocks.
//! [plugins](crate::plugins) defines the bundles, the descriptors and the inventory that
//! discovers and loads plugin libraries.
//!
//! ## Getting started
//!
//! ```
//! use memcap::prelude::v1::*;
//!
//! fn read_first(mem: &mut impl VirtualMemory, addr: Address) -> Result<u64> {
//!     mem.virt_read(addr)
//! }
//!
//! let mut os = DummyOs::new(DummyMemory::new(size::mb(16)));
//! let pid = os.alloc_process(size::kb(64), &[1, 0, 0, 0, 0, 0, 0, 0]).unwrap();
//! let mut os = OsInstance::builder(os).build();
//!
//! let mut proc = os.process_by_pid(pid).unwrap();
//! let base = proc.primary_module().unwrap().base;
//! assert_eq!(read_first(&mut proc, base).unwrap(), 1);
//! ```
//!
//! With the `plugins` feature, objects are usually created through the inventory:
//!
//! ```no_run
//! use memcap::prelude::v1::*;
//!
//! let inventory = Inventory::scan();
//! let os = inventory
//!     .builder()
//!     .connector("dummy")
//!     .os("dummy")
//!     .build()
//!     .unwrap();
//! ```

// umem equals u64 on every supported target, clippy flags the conversions regardless.
#![allow(clippy::unnecessary_cast)]

#[macro_use]
extern crate bitflags;

pub mod error;

#[macro_use]
pub mod types;

pub mod architecture;

pub mod mem;

pub mod connector;

pub mod os;

pub mod plugins;

#[doc(hidden)]
pub mod dataview {
    pub use ::dataview::*;
}

#[cfg(feature = "dummy_mem")]
pub mod dummy;

#[doc(hidden)]
#[allow(ambiguous_glob_reexports)]
pub mod prelude {
    pub mod v1 {
        pub use crate::architecture::*;
        pub use crate::connector::*;
        pub use crate::dataview::*;
        #[cfg(feature = "dummy_mem")]
        pub use crate::dummy::{DummyMemory, DummyOs};
        pub use crate::error::*;
        pub use crate::mem::*;
        pub use crate::os::*;
        pub use crate::plugins::*;
        pub use crate::types::*;
    }
    pub use v1::*;
}
