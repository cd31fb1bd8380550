use std::borrow::Cow;
use std::ffi::CStr;
use std::mem::MaybeUninit;
use std::os::raw::c_char;
use std::path::PathBuf;

use memcap::error::{AsIntResult, Result};
use memcap::plugins::{Args, ConnectorInstance, Inventory, OsInstance};

use crate::util::*;

use log::trace;

unsafe fn lossy<'a>(s: *const c_char) -> Cow<'a, str> {
    CStr::from_ptr(s).to_string_lossy()
}

/// Null means no arguments.
unsafe fn parse_args(args: *const c_char) -> Result<Option<Args>> {
    if args.is_null() {
        return Ok(None);
    }
    lossy(args).parse().map(Some).map_err(inspect_err)
}

/// Inventory of the plugins installed on the system, see `Inventory::scan`.
///
/// Release it with `inventory_free`.
///
/// # Safety
///
/// Scanning maps every library with plugin exports into the process.
#[no_mangle]
pub unsafe extern "C" fn inventory_scan() -> &'static mut Inventory {
    to_heap(Inventory::scan())
}

/// Inventory of the plugins in the directory `path`. Null if it is not a directory.
///
/// # Safety
///
/// `path` is a null terminated string.
#[no_mangle]
pub unsafe extern "C" fn inventory_scan_path(path: *const c_char) -> Option<&'static mut Inventory> {
    Inventory::scan_path(&*lossy(path))
        .map_err(inspect_err)
        .ok()
        .map(to_heap)
}

/// Scans one more directory.
///
/// # Safety
///
/// `dir` is a null terminated string.
#[no_mangle]
pub unsafe extern "C" fn inventory_add_dir(inv: &mut Inventory, dir: *const c_char) -> i32 {
    inv.add_dir(PathBuf::from(lossy(dir).into_owned()))
        .into_int_result()
}

/// Instantiates the connector `name` with the optional `args` string.
///
/// `out` is only written on success and then owns a connector for `connector_drop`.
///
/// # Safety
///
/// `name` is a null terminated string, `args` is one or null.
#[no_mangle]
pub unsafe extern "C" fn inventory_create_connector(
    inv: &mut Inventory,
    name: *const c_char,
    args: *const c_char,
    out: &mut MaybeUninit<ConnectorInstance>,
) -> i32 {
    let name = lossy(name);
    parse_args(args)
        .and_then(|args| inv.create_connector(&name, None, args.as_ref()))
        .map_err(inspect_err)
        .into_int_out_result(out)
}

/// Instantiates the os `name` on top of `mem`, which may be null.
///
/// `mem` is consumed: its handle is zeroed before the os is created, so a failed creation
/// drops the connector too. `out` is only written on success and then owns an os for `os_drop`.
///
/// # Safety
///
/// `name` is a null terminated string, `args` is one or null. `mem` is null, zeroed or a live
/// connector.
#[no_mangle]
pub unsafe extern "C" fn inventory_create_os(
    inv: &mut Inventory,
    name: *const c_char,
    args: *const c_char,
    mem: *mut ConnectorInstance,
    out: &mut MaybeUninit<OsInstance>,
) -> i32 {
    let name = lossy(name);
    let input = match mem.is_null() {
        true => None,
        false => match take_handle(mem) {
            Ok(conn) => Some(conn),
            Err(err) => return err.into_i32(),
        },
    };

    parse_args(args)
        .and_then(|args| inv.create_os(&name, input, args.as_ref()))
        .map_err(inspect_err)
        .into_int_out_result(out)
}

/// Releases an inventory. Connectors and oses created from it keep working.
///
/// # Safety
///
/// `inv` came from `inventory_scan` or `inventory_scan_path` and is not used afterwards.
#[no_mangle]
pub unsafe extern "C" fn inventory_free(inv: &'static mut Inventory) {
    trace!("inventory_free: {:p}", inv);
    drop(Box::from_raw(inv));
}

/// Clones a connector into `out`, e.g. to hand one to another thread.
///
/// # Safety
///
/// `conn` is zeroed or a live connector.
#[no_mangle]
pub unsafe extern "C" fn connector_clone(
    conn: *const ConnectorInstance,
    out: &mut MaybeUninit<ConnectorInstance>,
) -> i32 {
    trace!("connector_clone: {:?}", conn);
    handle_ref(conn).map(Clone::clone).into_int_out_result(out)
}

/// Drops a connector and zeroes its handle. Zeroed handles are ignored.
///
/// # Safety
///
/// `conn` is zeroed or a live connector.
#[no_mangle]
pub unsafe extern "C" fn connector_drop(conn: *mut ConnectorInstance) {
    trace!("connector_drop: {:?}", conn);
    take_handle(conn).ok();
}

/// # Safety
///
/// `os` is zeroed or a live os.
#[no_mangle]
pub unsafe extern "C" fn os_clone(os: *const OsInstance, out: &mut MaybeUninit<OsInstance>) -> i32 {
    trace!("os_clone: {:?}", os);
    handle_ref(os).map(Clone::clone).into_int_out_result(out)
}

/// Drops an os and zeroes its handle. Zeroed handles are ignored.
///
/// # Safety
///
/// `os` is zeroed or a live os.
#[no_mangle]
pub unsafe extern "C" fn os_drop(os: *mut OsInstance) {
    trace!("os_drop: {:?}", os);
    take_handle(os).ok();
}

#[cfg(test)]
mod tests {
    use super::*;

    use std::ffi::CString;

    use memcap::dummy;
    use memcap::error::{Error, ErrorKind, ErrorOrigin};
    use memcap::mem::PhysicalMemory;

    memcap::connector_plugin! {
        export: FFI_TEST_CONNECTOR,
        name: "dummy",
        description: "dummy connector",
        create: dummy::create_connector,
    }

    memcap::os_plugin! {
        export: FFI_TEST_OS,
        name: "dummy",
        description: "dummy os",
        create: dummy::create_os,
    }

    fn inventory() -> &'static mut Inventory {
        let mut inv = Inventory::empty();
        inv.add_connector_descriptor(FFI_TEST_CONNECTOR)
            .unwrap()
            .add_os_descriptor(FFI_TEST_OS)
            .unwrap();
        to_heap(inv)
    }

    fn uninitialized() -> i32 {
        Error(ErrorOrigin::Ffi, ErrorKind::Uninitialized).into_i32()
    }

    #[test]
    fn consumed_connector_is_zeroed() {
        let inv = inventory();
        let name = CString::new("dummy").unwrap();
        let args = CString::new("size=4m").unwrap();

        let mut conn = MaybeUninit::uninit();
        let res = unsafe {
            inventory_create_connector(inv, name.as_ptr(), args.as_ptr(), &mut conn)
        };
        assert_eq!(res, 0);

        let mut os = MaybeUninit::uninit();
        let res = unsafe {
            inventory_create_os(inv, name.as_ptr(), std::ptr::null(), conn.as_mut_ptr(), &mut os)
        };
        assert_eq!(res, 0);

        // the connector now lives inside the os
        let mut clone = MaybeUninit::uninit();
        assert_eq!(
            unsafe { connector_clone(conn.as_ptr(), &mut clone) },
            uninitialized()
        );
        unsafe { connector_drop(conn.as_mut_ptr()) };

        let mut os = unsafe { os.assume_init() };
        assert_eq!(os.metadata().real_size, 0x40_0000);
        unsafe { os_drop(&mut os) };
        unsafe { os_drop(&mut os) };
        std::mem::forget(os);

        unsafe { inventory_free(inv) };
    }

    #[test]
    fn clones_are_independent() {
        let inv = inventory();
        let name = CString::new("dummy").unwrap();

        let mut conn = MaybeUninit::uninit();
        let res = unsafe {
            inventory_create_connector(inv, name.as_ptr(), std::ptr::null(), &mut conn)
        };
        assert_eq!(res, 0);

        let mut clone = MaybeUninit::uninit();
        assert_eq!(unsafe { connector_clone(conn.as_ptr(), &mut clone) }, 0);
        unsafe { connector_drop(conn.as_mut_ptr()) };

        let mut clone = unsafe { clone.assume_init() };
        assert!(clone.phys_read::<u32>(0x100_u64.into()).is_ok());
        unsafe { connector_drop(&mut clone) };
        std::mem::forget(clone);

        unsafe { inventory_free(inv) };
    }

    fn still_zeroed<T>(out: &MaybeUninit<T>) -> bool {
        let bytes = unsafe {
            std::slice::from_raw_parts(out.as_ptr() as *const u8, std::mem::size_of::<T>())
        };
        bytes.iter().all(|b| *b == 0)
    }

    #[test]
    fn failed_create_leaves_out_alone() {
        let inv = inventory();
        let name = CString::new("dummy").unwrap();
        let bad = CString::new("size=lots").unwrap();

        let mut conn = MaybeUninit::<ConnectorInstance>::zeroed();
        let res = unsafe { inventory_create_connector(inv, name.as_ptr(), bad.as_ptr(), &mut conn) };
        assert_ne!(res, 0);
        assert!(still_zeroed(&conn));

        let mut os = MaybeUninit::<OsInstance>::zeroed();
        let res = unsafe {
            inventory_create_os(inv, name.as_ptr(), bad.as_ptr(), std::ptr::null_mut(), &mut os)
        };
        assert_ne!(res, 0);
        assert!(still_zeroed(&os));

        unsafe { inventory_free(inv) };
    }

    #[test]
    fn failed_create_os_consumes_the_connector() {
        let inv = inventory();
        let name = CString::new("dummy").unwrap();
        let unknown = CString::new("qemu").unwrap();

        let mut conn = MaybeUninit::uninit();
        let res = unsafe {
            inventory_create_connector(inv, name.as_ptr(), std::ptr::null(), &mut conn)
        };
        assert_eq!(res, 0);
        let mut spare = MaybeUninit::uninit();
        assert_eq!(unsafe { connector_clone(conn.as_ptr(), &mut spare) }, 0);

        let mut os = MaybeUninit::<OsInstance>::zeroed();
        let res = unsafe {
            inventory_create_os(inv, unknown.as_ptr(), std::ptr::null(), conn.as_mut_ptr(), &mut os)
        };
        assert_eq!(
            res,
            Error(ErrorOrigin::Inventory, ErrorKind::PluginNotFound).into_i32()
        );
        assert!(still_zeroed(&os));
        assert!(still_zeroed(&conn));

        let mut clone = MaybeUninit::uninit();
        assert_eq!(
            unsafe { connector_clone(conn.as_ptr(), &mut clone) },
            uninitialized()
        );
        unsafe { connector_drop(conn.as_mut_ptr()) };

        // the clone taken before survives the consumed original
        let mut spare = unsafe { spare.assume_init() };
        assert!(spare.phys_read::<u32>(0x100_u64.into()).is_ok());
        unsafe { connector_drop(&mut spare) };
        std::mem::forget(spare);

        unsafe { inventory_free(inv) };
    }

    #[test]
    fn unknown_plugin() {
        let inv = inventory();
        let name = CString::new("qemu").unwrap();
        let mut conn = MaybeUninit::uninit();
        let res = unsafe {
            inventory_create_connector(inv, name.as_ptr(), std::ptr::null(), &mut conn)
        };
        assert_eq!(
            res,
            Error(ErrorOrigin::Inventory, ErrorKind::PluginNotFound).into_i32()
        );
        unsafe { inventory_free(inv) };
    }
}
