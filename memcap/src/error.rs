/*!
Specialized `Error` and `Result` types for memcap.

Every fallible call crossing a plugin boundary is reduced to a signed 32-bit status code.
Zero means success, any negative value encodes an [`ErrorOrigin`] and an [`ErrorKind`].
*/

use core::mem::MaybeUninit;
use core::{fmt, result};

use log::{debug, error, info, trace, warn};

#[derive(Copy, Clone, Debug, Eq, PartialEq, Hash)]
pub struct Error(pub ErrorOrigin, pub ErrorKind);

impl Error {
    /// Name of the error kind.
    pub fn as_str(&self) -> &'static str {
        self.1.to_str()
    }

    pub fn into_str(self) -> &'static str {
        self.as_str()
    }

    /// Encodes the error as a negative status code.
    ///
    /// ```
    /// use memcap::error::{Error, ErrorKind, ErrorOrigin};
    ///
    /// let err = Error(ErrorOrigin::Inventory, ErrorKind::PluginNotFound);
    /// assert!(err.into_i32() < 0);
    /// assert_eq!(Error::from_i32(err.into_i32()), err);
    /// ```
    pub const fn into_i32(self) -> i32 {
        let origin = ((self.0 as i32 + 1) & 0xFFFi32) << 4;
        let kind = ((self.1 as i32 + 1) & 0xFFFi32) << 16;
        -(1 + origin + kind)
    }

    /// Decodes a status code previously produced by [`Error::into_i32`].
    ///
    /// Values that do not map to a known origin or kind decode to `Other` and `Unknown`.
    pub fn from_i32(error: i32) -> Self {
        if error >= 0 {
            return Self(ErrorOrigin::Other, ErrorKind::Unknown);
        }

        // `!error` equals `-error - 1` without overflowing on `i32::MIN`
        let origin = (!error >> 4i32) & 0xFFFi32;
        let kind = (!error >> 16i32) & 0xFFFi32;

        let error_origin = (origin as usize)
            .checked_sub(1)
            .and_then(|i| ErrorOrigin::ALL.get(i).copied())
            .unwrap_or(ErrorOrigin::Other);

        let error_kind = (kind as usize)
            .checked_sub(1)
            .and_then(|i| ErrorKind::ALL.get(i).copied())
            .unwrap_or(ErrorKind::Unknown);

        Self(error_origin, error_kind)
    }

    /// Logs `err` with the error attached and hands the error back, for use in `map_err`.
    pub fn log_error(self, err: impl fmt::Display) -> Self {
        error!("{}: {} ({})", self.0.to_str(), self.1.to_str(), err);
        self
    }

    pub fn log_warn(self, err: impl fmt::Display) -> Self {
        warn!("{}: {} ({})", self.0.to_str(), self.1.to_str(), err);
        self
    }

    pub fn log_info(self, err: impl fmt::Display) -> Self {
        info!("{}: {} ({})", self.0.to_str(), self.1.to_str(), err);
        self
    }

    pub fn log_debug(self, err: impl fmt::Display) -> Self {
        debug!("{}: {} ({})", self.0.to_str(), self.1.to_str(), err);
        self
    }

    pub fn log_trace(self, err: impl fmt::Display) -> Self {
        trace!("{}: {} ({})", self.0.to_str(), self.1.to_str(), err);
        self
    }
}

impl fmt::Display for Error {
    fn fmt(&self, f: &mut fmt::Formatter) -> fmt::Result {
        write!(f, "{}: {}", self.0.to_str(), self.1.to_str())
    }
}

impl std::error::Error for Error {}

/// Declares a fieldless enum together with its discriminant ordered table and names.
macro_rules! error_enum {
    (
        $(#[$meta:meta])*
        pub enum $name:ident { $($variant:ident => $text:literal,)* }
    ) => {
        $(#[$meta])*
        #[repr(u16)]
        #[derive(Copy, Clone, Debug, Eq, PartialEq, Hash)]
        pub enum $name {
            $($variant,)*
        }

        impl $name {
            const ALL: &'static [$name] = &[$($name::$variant,)*];

            /// Human readable name, stable across versions.
            pub fn to_str(self) -> &'static str {
                match self {
                    $($name::$variant => $text,)*
                }
            }
        }
    };
}

error_enum! {
    /// Component an error was raised in.
    pub enum ErrorOrigin {
        Pointer => "pointer",
        Args => "args",
        ArgsValidator => "args validator",
        Memory => "memory",
        MemoryMap => "memory map",
        PhysicalMemory => "physical memory",
        VirtualTranslate => "virtual translate",
        VirtualMemory => "virtual memory",
        Inventory => "inventory",
        Connector => "connector",
        OsLayer => "oslayer",
        Ffi => "ffi",
        Other => "other",
    }
}

error_enum! {
    /// What went wrong.
    ///
    /// New kinds are only ever appended before `Unknown`, status codes of existing kinds stay
    /// valid between plugin builds.
    pub enum ErrorKind {
        Uninitialized => "uninitialized",
        NotSupported => "not supported",
        NotImplemented => "not implemented",
        Configuration => "configuration error",

        ArgNotExists => "the given argument does not exist",
        ArgValidation => "the argument could not be validated",
        RequiredArgNotFound => "required argument is not set",

        NotFound => "not found",
        OutOfBounds => "out of bounds",
        OutOfMemoryRange => "out of memory range",
        Encoding => "encoding error",

        InvalidPath => "invalid path",
        ReadOnly => "write to a read only resource",
        UnableToReadDir => "unable to read directory",
        UnableToReadDirEntry => "unable to read directory entry",
        UnableToReadFile => "unable to read file",

        UnableToReadMemory => "unable to read memory",
        UnableToWriteMemory => "unable to write memory",

        InvalidArchitecture => "invalid architecture",
        InvalidMemorySize => "invalid memory size",
        InvalidMemorySizeUnit => "invalid or missing memory size unit",

        UnableToLoadLibrary => "unable to load library",
        InvalidExeFile => "not a valid executable file",
        ExportsNotFound => "no memcap plugin exports",
        VersionMismatch => "plugin version mismatch",
        AlreadyExists => "already exists",
        PluginNotFound => "plugin not found",
        UnsupportedOptionalFeature => "unsupported optional feature",

        ProcessNotFound => "process not found",
        InvalidProcessInfo => "invalid process info",
        ModuleNotFound => "module not found",
        ExportNotFound => "export not found",
        ImportNotFound => "import not found",
        SectionNotFound => "section not found",

        Unknown => "unknown error",
    }
}

/// Specialized `Result` type for memcap results.
pub type Result<T> = result::Result<T, Error>;

/// Converts a `Result` into a status code, optionally writing the value into an out parameter.
pub trait AsIntResult<T> {
    fn into_int_result(self) -> i32;
    fn into_int_out_result(self, out: &mut MaybeUninit<T>) -> i32;
}

impl<T> AsIntResult<T> for Result<T> {
    fn into_int_result(self) -> i32 {
        match self {
            Ok(_) => 0,
            Err(err) => err.into_i32(),
        }
    }

    fn into_int_out_result(self, out: &mut MaybeUninit<T>) -> i32 {
        match self {
            Ok(ret) => {
                out.write(ret);
                0
            }
            Err(err) => err.into_i32(),
        }
    }
}

pub fn result_from_int_void(res: i32) -> Result<()> {
    if res == 0 {
        Ok(())
    } else {
        Err(Error::from_i32(res))
    }
}

/// Converts a status code and out parameter back into a `Result`.
///
/// A zero status promises that the callee initialized `out`.
pub fn result_from_int<T>(res: i32, out: MaybeUninit<T>) -> Result<T> {
    if res == 0 {
        Ok(unsafe { out.assume_init() })
    } else {
        Err(Error::from_i32(res))
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    pub fn error_from_i32_invalid() {
        let mut err = Error::from_i32(i32::MIN);
        assert_eq!(err.1, ErrorKind::Unknown);
        err = Error::from_i32(-1);
        assert_eq!(err.0, ErrorOrigin::Other);
        assert_eq!(err.1, ErrorKind::Unknown);
        err = Error::from_i32(1);
        assert_eq!(err, Error(ErrorOrigin::Other, ErrorKind::Unknown));
    }

    #[test]
    pub fn error_roundtrip_all_kinds() {
        for origin in ErrorOrigin::ALL.iter() {
            for kind in ErrorKind::ALL.iter() {
                let err = Error(*origin, *kind);
                let code = err.into_i32();
                assert!(code < 0);
                assert_eq!(Error::from_i32(code), err);
            }
        }
    }

    #[test]
    pub fn tables_match_discriminants() {
        for (i, origin) in ErrorOrigin::ALL.iter().enumerate() {
            assert_eq!(*origin as usize, i);
        }
        for (i, kind) in ErrorKind::ALL.iter().enumerate() {
            assert_eq!(*kind as usize, i);
        }
    }

    #[test]
    pub fn int_results() {
        let ok: Result<u32> = Ok(5);
        let mut out = MaybeUninit::uninit();
        assert_eq!(ok.into_int_out_result(&mut out), 0);
        assert_eq!(result_from_int(0, out), Ok(5));

        let err: Result<u32> = Err(Error(ErrorOrigin::OsLayer, ErrorKind::ProcessNotFound));
        let code = err.into_int_result();
        assert_eq!(
            result_from_int_void(code),
            Err(Error(ErrorOrigin::OsLayer, ErrorKind::ProcessNotFound))
        );
    }
}
