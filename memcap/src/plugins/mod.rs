/*!
Capability bundles, plugin descriptors and the plugin inventory.

Bundles and descriptors are plain `repr(C)` data and always compiled in, plugin libraries only
need those. Finding and loading libraries at runtime requires the `plugins` feature.
*/

use core::ffi::c_void;
use core::mem::MaybeUninit;
use std::fmt;

pub mod args;
pub use args::{ArgDescriptor, Args, ArgsValidator};

pub mod logger;
pub use logger::PluginLogger;

pub mod mem;
pub use mem::{CloneVtbl, PhysicalMemoryVtbl, VirtualMemoryVtbl, VirtualTranslateVtbl};

pub mod process;
pub use process::{IntoProcessInstance, ProcessInstance, ProcessVtbl};

pub mod connector;
pub use connector::{
    ConnectorCpuStateVtbl, ConnectorDescriptor, ConnectorInstance, ConnectorInstanceBuilder,
    CpuStateInstance, CpuStateVtbl, IntoCpuStateInstance, LoadableConnector,
};

pub mod os;
pub use os::{
    IntoKeyboardInstance, KeyboardInstance, KeyboardStateInstance, KeyboardStateVtbl,
    KeyboardVtbl, LoadableOs, OsDescriptor, OsInstance, OsInstanceBuilder, OsKeyboardVtbl, OsVtbl,
};

pub mod util;
pub use util::create_bundle;

#[macro_use]
mod macros;

#[cfg(feature = "plugins")]
pub mod inventory;
#[cfg(feature = "plugins")]
pub use inventory::{Inventory, LibContext, LibInstance};

#[cfg(feature = "plugins")]
pub mod builder;
#[cfg(feature = "plugins")]
pub use builder::{BuildStep, BuilderEmpty, ConnectorBuilder, ConnectorChain, OsBuilder, OsChain};

use crate::error::{result_from_int, result_from_int_void, Error, ErrorKind, Result};
use crate::types::{COptArc, COption, CSliceRef, OpaqueCallback, ReprCString};

/// Layout version of [`PluginDescriptor`] and the bundles. Bumped on every incompatible change.
pub const MEMCAP_PLUGIN_VERSION: i32 = 1;

/// Subdirectory of every search root that holds plugins.
pub const PLUGIN_FOLDER: &str = "memcap";

/// Receives the help text of a plugin.
pub type HelpCallback<'a> = OpaqueCallback<'a, ReprCString>;

/// Receives the error message of a failed plugin construction.
pub type ErrorCallback<'a> = OpaqueCallback<'a, ReprCString>;

/// Something a connector can attach to, e.g. a vm or a device.
#[repr(C)]
#[derive(Clone, Debug)]
#[cfg_attr(feature = "serde", derive(::serde::Serialize, ::serde::Deserialize))]
pub struct TargetInfo {
    pub name: ReprCString,
}

pub type TargetCallback<'a> = OpaqueCallback<'a, TargetInfo>;

/// Size and alignment of a type crossing the plugin boundary.
#[repr(C)]
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub struct TypeLayout {
    pub size: usize,
    pub align: usize,
}

impl TypeLayout {
    pub const fn of<T>() -> Self {
        Self {
            size: core::mem::size_of::<T>(),
            align: core::mem::align_of::<T>(),
        }
    }
}

/// What a plugin library exports for each of its plugins, usually through
/// [`connector_plugin!`](crate::connector_plugin) or [`os_plugin!`](crate::os_plugin).
///
/// Libraries built against a different [`MEMCAP_PLUGIN_VERSION`] or with differently sized
/// bundles are rejected before `create` is ever called.
#[repr(C)]
pub struct PluginDescriptor<T: Loadable> {
    pub plugin_version: i32,
    pub input_layout: TypeLayout,
    pub output_layout: TypeLayout,
    /// Name the plugin is looked up by.
    pub name: CSliceRef<'static, u8>,
    pub version: CSliceRef<'static, u8>,
    pub description: CSliceRef<'static, u8>,
    pub help_callback: Option<extern "C" fn(callback: HelpCallback)>,
    /// Feeds the attachable targets, returns an error code.
    pub target_list_callback: Option<extern "C" fn(callback: TargetCallback) -> i32>,
    pub create: CreateFn<T>,
}

impl<T: Loadable> Clone for PluginDescriptor<T> {
    fn clone(&self) -> Self {
        *self
    }
}

impl<T: Loadable> Copy for PluginDescriptor<T> {}

/// Plugin constructor.
///
/// On failure the plugin may hand a message to `err` before returning. The message is copied
/// by the caller inside the callback.
pub type CreateFn<T> = extern "C" fn(
    args: Option<&ReprCString>,
    input: COption<<T as Loadable>::Input>,
    lib: COptArc<c_void>,
    logger: Option<&'static PluginLogger>,
    out: &mut MaybeUninit<<T as Loadable>::Instance>,
    err: ErrorCallback,
) -> i32;

/// Error of a plugin construction, with the message the plugin reported.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct PluginError {
    pub error: Error,
    pub message: Option<String>,
}

impl PluginError {
    pub fn with_message(error: Error, message: impl Into<String>) -> Self {
        Self {
            error,
            message: Some(message.into()),
        }
    }
}

impl From<Error> for PluginError {
    fn from(error: Error) -> Self {
        Self {
            error,
            message: None,
        }
    }
}

impl From<PluginError> for Error {
    fn from(err: PluginError) -> Self {
        err.error
    }
}

impl fmt::Display for PluginError {
    fn fmt(&self, f: &mut fmt::Formatter) -> fmt::Result {
        match &self.message {
            Some(message) => write!(f, "{}: {}", self.error, message),
            None => write!(f, "{}", self.error),
        }
    }
}

impl std::error::Error for PluginError {}

/// Defines a common interface for loadable plugins
pub trait Loadable: Sized {
    type Instance;
    type Input;

    fn plugin_type() -> &'static str;

    /// Constant prefix for the plugin type
    fn export_prefix() -> &'static str;

    fn origin() -> crate::error::ErrorOrigin;

    fn new(descriptor: PluginDescriptor<Self>) -> Self;

    fn descriptor(&self) -> &PluginDescriptor<Self>;

    /// Identifier string of the plugin
    fn ident(&self) -> &str {
        self.descriptor().name.as_str()
    }

    /// Checks the descriptor against the version and layouts of this build.
    fn verify(&self) -> Result<()> {
        let descriptor = self.descriptor();
        if descriptor.plugin_version != MEMCAP_PLUGIN_VERSION {
            return Err(
                Error(Self::origin(), ErrorKind::VersionMismatch).log_warn(format!(
                    "{} was built for plugin version {}, this is version {}",
                    self.ident(),
                    descriptor.plugin_version,
                    MEMCAP_PLUGIN_VERSION
                )),
            );
        }
        if descriptor.input_layout != TypeLayout::of::<COption<Self::Input>>()
            || descriptor.output_layout != TypeLayout::of::<Self::Instance>()
        {
            return Err(Error(Self::origin(), ErrorKind::VersionMismatch)
                .log_warn(format!("{} disagrees on the bundle layout", self.ident())));
        }
        Ok(())
    }

    /// `NotSupported`, logged with what the plugin is missing.
    fn unsupported(&self, what: &str) -> Error {
        Error(Self::origin(), ErrorKind::NotSupported).log_error(format!(
            "{} plugin {} {}",
            Self::plugin_type(),
            self.ident(),
            what
        ))
    }

    fn help(&self) -> Result<String> {
        let help_callback = self
            .descriptor()
            .help_callback
            .ok_or_else(|| self.unsupported("has no help text"))?;
        let mut texts: Vec<ReprCString> = vec![];
        help_callback((&mut texts).into());
        texts
            .into_iter()
            .next()
            .map(|text| text.to_string())
            .ok_or_else(|| self.unsupported("returned an empty help text"))
    }

    fn target_list(&self) -> Result<Vec<TargetInfo>> {
        let target_list_callback = self
            .descriptor()
            .target_list_callback
            .ok_or_else(|| self.unsupported("can not list targets"))?;
        let mut targets = vec![];
        result_from_int_void(target_list_callback((&mut targets).into()))?;
        Ok(targets)
    }

    /// Creates an `Instance` of the plugin.
    ///
    /// `library` is attached to the new instance and keeps the producing library loaded.
    fn instantiate(
        &self,
        library: COptArc<c_void>,
        logger: Option<&'static PluginLogger>,
        input: Option<Self::Input>,
        args: Option<&Args>,
    ) -> core::result::Result<Self::Instance, PluginError> {
        let args = args.map(|a| ReprCString::from(a.to_string()));
        let mut message = None;
        let mut on_error = |msg: ReprCString| {
            message = Some(msg.to_string());
            false
        };
        let mut out = MaybeUninit::uninit();
        let res = (self.descriptor().create)(
            args.as_ref(),
            input.into(),
            library,
            logger,
            &mut out,
            (&mut on_error).into(),
        );
        result_from_int(res, out).map_err(|error| PluginError { error, message })
    }
}
