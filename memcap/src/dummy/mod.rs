/*!
In-memory fixtures: a physical memory buffer, a simulated os on top of it and plugin create
functions exposing both through the regular bundle types.
*/

pub mod keyboard;
pub mod mem;
pub mod os;
pub mod process;

pub(crate) mod page_table;

pub use keyboard::{DummyKeyboard, DummyKeyboardState};
pub use mem::{parse_size, size_from_args, DummyCpuState, DummyMemory};
pub use os::DummyOs;
pub use process::{DummyModule, DummyProcess, DummyProcessInfo};

use core::ffi::c_void;

use crate::error::{Error, ErrorKind, ErrorOrigin, Result};
use crate::plugins::{
    ArgDescriptor, Args, ArgsValidator, ConnectorInstance, OsInstance, TargetInfo,
};
use crate::types::{size, umem, COptArc};

const DEFAULT_MEM_SIZE: umem = size::mb(16);
const DEFAULT_PROCESS_COUNT: usize = 3;
const PROCESS_NAMES: &[&str] = &["explorer.exe", "svchost.exe", "notepad.exe", "cmd.exe"];

fn validate_number(v: &str) -> ::std::result::Result<(), &'static str> {
    v.parse::<u64>()
        .map(|_| ())
        .map_err(|_| "the value has to be a decimal number")
}

fn validate_size(v: &str) -> ::std::result::Result<(), &'static str> {
    parse_size(v)
        .map(|_| ())
        .map_err(|_| "the value has to be a hex size with a k, m or g suffix")
}

fn size_arg(name: &str) -> ArgDescriptor {
    ArgDescriptor::new(name)
        .description("size of the physical memory, in hex with a unit suffix (default: 10m)")
        .validator(Box::new(validate_size))
}

fn connector_validator() -> ArgsValidator {
    ArgsValidator::new()
        .arg(size_arg("default"))
        .arg(size_arg("size"))
}

fn os_validator() -> ArgsValidator {
    ArgsValidator::new()
        .arg(size_arg("default"))
        .arg(size_arg("size"))
        .arg(
            ArgDescriptor::new("seed")
                .description("seed of the layout randomization (default: 1)")
                .validator(Box::new(validate_number)),
        )
        .arg(
            ArgDescriptor::new("procs")
                .description("number of processes to spawn (default: 3)")
                .validator(Box::new(validate_number)),
        )
}

fn parse_number<T: core::str::FromStr>(args: &Args, name: &str, default: T) -> Result<T> {
    args.get(name)
        .map(|v| {
            v.parse::<T>().map_err(|_| {
                Error(ErrorOrigin::ArgsValidator, ErrorKind::ArgValidation)
                    .log_error(format!("invalid value for `{}`: {}", name, v))
            })
        })
        .transpose()
        .map(|v| v.unwrap_or(default))
}

/// Creates the dummy connector.
///
/// With an os as input its physical memory is re-exposed, otherwise a fresh [`DummyMemory`] of
/// the requested size is created.
pub fn create_connector(
    args: &Args,
    os: Option<OsInstance>,
    lib: COptArc<c_void>,
) -> Result<ConnectorInstance> {
    connector_validator().validate(args)?;

    match os {
        Some(os) => Ok(ConnectorInstance::builder(os).with_context(lib).build()),
        None => {
            let mem = DummyMemory::new(size_from_args(args, DEFAULT_MEM_SIZE)?);
            Ok(ConnectorInstance::builder(mem)
                .with_context(lib)
                .enable_cpu_state()
                .build())
        }
    }
}

/// Creates the dummy os and fills it with processes.
///
/// Without a connector input the os runs on its own [`DummyMemory`].
pub fn create_os(
    args: &Args,
    connector: Option<ConnectorInstance>,
    lib: COptArc<c_void>,
) -> Result<OsInstance> {
    os_validator().validate(args)?;

    let seed = parse_number(args, "seed", 1_u64)?;
    let procs = parse_number(args, "procs", DEFAULT_PROCESS_COUNT)?;

    match connector {
        Some(conn) => build_os(DummyOs::with_seed(conn, seed), procs, lib),
        None => {
            let mem = DummyMemory::new(size_from_args(args, DEFAULT_MEM_SIZE)?);
            build_os(DummyOs::with_seed(mem, seed), procs, lib)
        }
    }
}

fn build_os<T>(mut os: DummyOs<T>, procs: usize, lib: COptArc<c_void>) -> Result<OsInstance>
where
    T: crate::mem::PhysicalMemory + Clone + 'static,
{
    for name in PROCESS_NAMES.iter().cycle().take(procs) {
        os.alloc_process_named(name, size::kb(256), &[])?;
    }

    Ok(OsInstance::builder(os)
        .with_context(lib)
        .enable_keyboard()
        .build())
}

pub fn connector_help() -> String {
    format!("dummy connector, backed by process memory\n\n{}", connector_validator())
}

pub fn os_help() -> String {
    format!("dummy os, simulated processes and modules\n\n{}", os_validator())
}

pub fn target_list() -> Result<Vec<TargetInfo>> {
    Ok(vec![TargetInfo {
        name: "dummy".into(),
    }])
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::mem::PhysicalMemory;
    use crate::os::{OsInner, Process};

    #[test]
    fn connector_from_args() {
        let args: Args = "size=1m".parse().unwrap();
        let conn = create_connector(&args, None, COptArc::none()).unwrap();
        assert_eq!(conn.metadata().real_size, size::mb(1));
        assert!(conn.has_cpu_state());
    }

    #[test]
    fn os_from_args() {
        let args: Args = "procs=5,seed=3".parse().unwrap();
        let mut os = create_os(&args, None, COptArc::none()).unwrap();
        assert_eq!(os.process_info_list().unwrap().len(), 5);
        assert!(os.has_keyboard());

        let mut proc = os.process_by_name("notepad.exe").unwrap();
        assert!(proc.module_by_name("kernel32").is_ok());
    }

    #[test]
    fn os_on_connector() {
        let conn = create_connector(&"4m".parse().unwrap(), None, COptArc::none()).unwrap();
        let mut os = create_os(&"procs=1".parse().unwrap(), Some(conn), COptArc::none()).unwrap();
        assert_eq!(os.metadata().real_size, size::mb(4));
        assert_eq!(os.process_info_list().unwrap().len(), 1);

        let conn = create_connector(&Args::new(), Some(os), COptArc::none()).unwrap();
        assert!(!conn.has_cpu_state());
        assert_eq!(conn.metadata().real_size, size::mb(4));
    }

    #[test]
    fn invalid_args() {
        let args: Args = "procs=many".parse().unwrap();
        assert_eq!(
            create_os(&args, None, COptArc::none()).err(),
            Some(Error(ErrorOrigin::ArgsValidator, ErrorKind::ArgValidation))
        );
        let args: Args = "speed=9".parse().unwrap();
        assert_eq!(
            create_connector(&args, None, COptArc::none()).err(),
            Some(Error(ErrorOrigin::ArgsValidator, ErrorKind::ArgNotExists))
        );
    }

    #[test]
    fn help_lists_arguments() {
        assert!(os_help().contains("procs"));
        assert!(connector_help().contains("size"));
    }
}
