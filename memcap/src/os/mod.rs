//! Os layer abstractions.
//!
//! [`OsInner`] is the entry point and enumerates processes and kernel modules. A [`Process`]
//! opened from it lists the modules of one address space, [`ModuleInfo`] and the symbol info
//! types are plain data. Optional capabilities such as [`Keyboard`] live next to them.

pub mod keyboard;
pub mod module;
pub mod process;
pub mod root;

pub use keyboard::{Keyboard, KeyboardState, OsKeyboardInner};

pub use module::{
    ExportCallback, ExportInfo, ImportCallback, ImportInfo, ModuleAddressCallback,
    ModuleAddressInfo, ModuleInfo, ModuleInfoCallback, SectionCallback, SectionInfo,
};

pub use process::{ExitCode, Pid, Process, ProcessInfo, ProcessInfoCallback, ProcessState};

pub use root::{OsInfo, OsInner};

use crate::types::{Address, OpaqueCallback};

pub type AddressCallback<'a> = OpaqueCallback<'a, Address>;
