//! Log forwarding from plugin libraries into the host.
//!
//! A plugin has its own copy of the `log` crate and with it its own global logger. The host
//! hands every library a [`PluginLogger`] whose function pointers point back into the host
//! binary, the plugin installs it and all of its records end up in the host's logger.
use crate::types::{COption, CSliceRef};

use log::{Level, LevelFilter, SetLoggerError};

use core::ffi::c_void;

use std::sync::atomic::{AtomicPtr, Ordering};

#[repr(C)]
pub struct Metadata<'a> {
    level: Level,
    target: CSliceRef<'a, u8>,
}

impl<'a> From<&log::Metadata<'a>> for Metadata<'a> {
    fn from(metadata: &log::Metadata<'a>) -> Self {
        Self {
            level: metadata.level(),
            target: metadata.target().into(),
        }
    }
}

impl Metadata<'_> {
    fn to_log(&self) -> log::Metadata<'_> {
        log::Metadata::builder()
            .level(self.level)
            .target(self.target.as_str())
            .build()
    }
}

/// A log record with its message already formatted by the plugin.
#[repr(C)]
pub struct Record<'a> {
    metadata: Metadata<'a>,
    message: CSliceRef<'a, u8>,
    module_path: COption<CSliceRef<'a, u8>>,
    file: COption<CSliceRef<'a, u8>>,
    line: COption<u32>,
}

type SetMaxLevelFn = extern "C" fn(LevelFilter);

#[repr(C)]
pub struct PluginLogger {
    max_level: LevelFilter,
    enabled: extern "C" fn(metadata: &Metadata) -> bool,
    log: extern "C" fn(record: &Record),
    flush: extern "C" fn(),
    // filled in by the plugin, points into the plugin library
    set_plugin_level: AtomicPtr<c_void>,
}

impl PluginLogger {
    /// Creates a logger forwarding into the current process.
    ///
    /// Only the host creates these, starting at its current max level.
    pub fn new() -> Self {
        Self {
            max_level: log::max_level(),
            enabled: host_enabled,
            log: host_log,
            flush: host_flush,
            set_plugin_level: AtomicPtr::new(std::ptr::null_mut()),
        }
    }

    /// Installs this logger as the `log` backend of the calling library.
    ///
    /// Called by the plugin, once. Fails if the library already has a logger.
    pub fn init(&'static self) -> Result<(), SetLoggerError> {
        let set_level: SetMaxLevelFn = plugin_set_max_level;
        self.set_plugin_level
            .store(set_level as *mut c_void, Ordering::SeqCst);
        log::set_max_level(self.max_level);
        log::set_logger(self)
    }

    /// Pushes a new max level into the plugin. Does nothing before [`init`](Self::init).
    pub fn on_level_change(&self, new_level: LevelFilter) {
        let ptr = self.set_plugin_level.load(Ordering::SeqCst);
        if !ptr.is_null() {
            // only ever stored from a `SetMaxLevelFn` in `init`
            let set_level = unsafe { std::mem::transmute::<*mut c_void, SetMaxLevelFn>(ptr) };
            set_level(new_level);
        }
    }
}

impl Default for PluginLogger {
    fn default() -> Self {
        Self::new()
    }
}

impl log::Log for PluginLogger {
    fn enabled(&self, metadata: &log::Metadata) -> bool {
        (self.enabled)(&metadata.into())
    }

    fn log(&self, record: &log::Record) {
        let message = record.args().to_string();
        (self.log)(&Record {
            metadata: record.metadata().into(),
            message: message.as_str().into(),
            module_path: record.module_path().map(CSliceRef::from).into(),
            file: record.file().map(CSliceRef::from).into(),
            line: record.line().into(),
        })
    }

    fn flush(&self) {
        (self.flush)()
    }
}

extern "C" fn plugin_set_max_level(level: LevelFilter) {
    log::set_max_level(level);
}

extern "C" fn host_enabled(metadata: &Metadata) -> bool {
    log::logger().enabled(&metadata.to_log())
}

extern "C" fn host_log(record: &Record) {
    log::logger().log(
        &log::Record::builder()
            .metadata(record.metadata.to_log())
            .args(format_args!("{}", record.message.as_str()))
            .module_path(record.module_path.as_ref().map(|s| s.as_str()))
            .file(record.file.as_ref().map(|s| s.as_str()))
            .line(record.line.as_ref().copied())
            .build(),
    )
}

extern "C" fn host_flush() {
    log::logger().flush()
}
