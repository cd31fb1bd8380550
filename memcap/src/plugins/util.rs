use core::mem::MaybeUninit;

use super::{Args, ErrorCallback, PluginError, PluginLogger};
use crate::error::{Error, ErrorKind, ErrorOrigin};
use crate::types::ReprCString;

#[cfg(feature = "plugins")]
use std::path::Path;

/// Plugin side implementation of a create function.
///
/// Installs the host logger, parses the arguments and runs `create`. On failure the error
/// message, if any, is handed to `err` before the status code is returned.
pub fn create_bundle<T, E: Into<PluginError>>(
    args: Option<&ReprCString>,
    logger: Option<&'static PluginLogger>,
    out: &mut MaybeUninit<T>,
    mut err: ErrorCallback,
    create: impl FnOnce(&Args) -> core::result::Result<T, E>,
) -> i32 {
    if let Some(logger) = logger {
        // a logger is already set when the plugin is instantiated more than once
        logger.init().ok();
    }

    let args = match args.map(|a| a.parse::<Args>()).transpose() {
        Ok(args) => args.unwrap_or_default(),
        Err(e) => {
            err.call(ReprCString::from("unable to parse plugin arguments"));
            return e.into_i32();
        }
    };

    match create(&args).map_err(Into::into) {
        Ok(instance) => {
            out.write(instance);
            0
        }
        Err(PluginError { error, message }) => {
            if let Some(message) = message {
                err.call(message.into());
            }
            error.into_i32()
        }
    }
}

/// Maps a missing required input onto a configuration error.
pub fn require_input<T>(input: Option<T>, origin: ErrorOrigin) -> Result<T, PluginError> {
    input.ok_or_else(|| {
        PluginError::with_message(
            Error(origin, ErrorKind::Configuration),
            "this plugin requires an input",
        )
    })
}

type Result<T, E = Error> = core::result::Result<T, E>;

/// Statically scans a binary for exported symbols beginning with `prefix`.
///
/// The library is never mapped for this, so foreign or broken files can be skipped cheaply.
#[cfg(feature = "plugins")]
pub fn find_export_by_prefix(path: impl AsRef<Path>, prefix: &str) -> Result<Vec<String>> {
    use goblin::{mach::Mach, Object};

    let buffer = std::fs::read(path.as_ref())
        .map_err(|err| Error(ErrorOrigin::Inventory, ErrorKind::UnableToReadFile).log_trace(err))?;

    let object = Object::parse(&buffer).map_err(|err| {
        Error(ErrorOrigin::Inventory, ErrorKind::InvalidExeFile).log_trace(format!(
            "unable to parse {:?}: {}",
            path.as_ref(),
            err
        ))
    })?;

    let names: Vec<String> = match object {
        Object::Elf(elf) => elf
            .dynsyms
            .iter()
            .filter(|sym| sym.st_value != 0)
            .filter_map(|sym| elf.dynstrtab.get_at(sym.st_name))
            .map(str::to_string)
            .collect(),
        Object::PE(pe) => pe
            .exports
            .iter()
            .filter_map(|export| export.name)
            .map(str::to_string)
            .collect(),
        Object::Mach(Mach::Binary(macho)) => macho
            .exports()
            .map_err(|_| Error(ErrorOrigin::Inventory, ErrorKind::InvalidExeFile))?
            .into_iter()
            .map(|export| export.name)
            .collect(),
        _ => return Err(Error(ErrorOrigin::Inventory, ErrorKind::NotSupported)),
    };

    Ok(names
        .into_iter()
        // mach-o prefixes every symbol with an underscore
        .map(|name| name.strip_prefix('_').map(str::to_string).unwrap_or(name))
        .filter(|name| name.starts_with(prefix))
        .collect())
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::types::OpaqueCallback;

    #[test]
    fn create_reports_message() {
        let mut message = None;
        let mut cb = |msg: ReprCString| {
            message = Some(msg.to_string());
            true
        };
        let mut out = MaybeUninit::<u32>::uninit();
        let args = ReprCString::from("size=1m");
        let res = create_bundle(
            Some(&args),
            None,
            &mut out,
            OpaqueCallback::from(&mut cb),
            |args| {
                assert_eq!(args.get("size"), Some("1m"));
                Err::<u32, _>(PluginError::with_message(
                    Error(ErrorOrigin::Connector, ErrorKind::NotFound),
                    "no such device",
                ))
            },
        );
        assert_eq!(
            Error::from_i32(res),
            Error(ErrorOrigin::Connector, ErrorKind::NotFound)
        );
        assert_eq!(message.as_deref(), Some("no such device"));
    }

    #[test]
    fn create_writes_instance() {
        let mut cb = |_: ReprCString| true;
        let mut out = MaybeUninit::<u32>::uninit();
        let res = create_bundle(None, None, &mut out, (&mut cb).into(), |args| {
            assert!(args.is_empty());
            Ok::<_, Error>(7u32)
        });
        assert_eq!(res, 0);
        assert_eq!(unsafe { out.assume_init() }, 7);
    }

    #[test]
    fn bad_args_fail() {
        let mut cb = |_: ReprCString| true;
        let mut out = MaybeUninit::<u32>::uninit();
        let args = ReprCString::from("a=1,b");
        let res = create_bundle(Some(&args), None, &mut out, (&mut cb).into(), |_| {
            Ok::<_, Error>(0u32)
        });
        assert_eq!(Error::from_i32(res).1, ErrorKind::ArgValidation);
    }

    #[cfg(feature = "plugins")]
    #[test]
    fn export_lookup_rejects_non_binaries() {
        let dir = std::env::temp_dir().join("memcap-export-lookup");
        std::fs::create_dir_all(&dir).unwrap();
        let file = dir.join("not_a_library.so");
        std::fs::write(&file, b"definitely not an object file").unwrap();
        assert!(find_export_by_prefix(&file, "MEMCAP_CONNECTOR_").is_err());
        std::fs::remove_file(&file).ok();
    }
}
