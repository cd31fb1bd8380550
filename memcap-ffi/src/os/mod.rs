use std::ffi::CStr;
use std::mem::MaybeUninit;
use std::os::raw::c_char;

use memcap::error::AsIntResult;
use memcap::os::{OsInner, Pid};
use memcap::plugins::{IntoProcessInstance, OsInstance};

use crate::util::*;

use log::trace;

/// Find a process by its name and move the os into it
///
/// # Remarks
///
/// The `os` handle is zeroed, even if no process was found. It must not be passed to `os_drop`
/// afterwards.
///
/// # Safety
///
/// `os` has to point to a valid or zeroed `OsInstance`, `name` must be a valid null terminated
/// string.
#[no_mangle]
pub unsafe extern "C" fn os_into_process_by_name(
    os: *mut OsInstance,
    name: *const c_char,
    out: &mut MaybeUninit<IntoProcessInstance>,
) -> i32 {
    let rname = CStr::from_ptr(name).to_string_lossy();

    take_handle(os)
        .and_then(|os| os.into_process_by_name(&rname))
        .map_err(inspect_err)
        .into_int_out_result(out)
}

/// Find a process by its pid and move the os into it
///
/// # Safety
///
/// `os` has to point to a valid or zeroed `OsInstance`. It is zeroed afterwards.
#[no_mangle]
pub unsafe extern "C" fn os_into_process_by_pid(
    os: *mut OsInstance,
    pid: Pid,
    out: &mut MaybeUninit<IntoProcessInstance>,
) -> i32 {
    take_handle(os)
        .and_then(|os| os.into_process_by_pid(pid))
        .map_err(inspect_err)
        .into_int_out_result(out)
}

/// Clone a process instance
///
/// # Safety
///
/// `proc` has to point to a valid or zeroed `IntoProcessInstance`.
#[no_mangle]
pub unsafe extern "C" fn process_clone(
    proc: *const IntoProcessInstance,
    out: &mut MaybeUninit<IntoProcessInstance>,
) -> i32 {
    trace!("process_clone: {:?}", proc);
    handle_ref(proc).map(Clone::clone).into_int_out_result(out)
}

/// Free a process instance
///
/// # Safety
///
/// `proc` has to point to a valid or zeroed `IntoProcessInstance`.
#[no_mangle]
pub unsafe extern "C" fn process_drop(proc: *mut IntoProcessInstance) {
    trace!("process_drop: {:?}", proc);
    take_handle(proc).ok();
}

#[cfg(test)]
mod tests {
    use super::*;

    use std::ffi::CString;

    use memcap::dummy::{DummyMemory, DummyOs};
    use memcap::error::{Error, ErrorKind, ErrorOrigin};
    use memcap::mem::VirtualMemory;
    use memcap::os::Process;
    use memcap::types::{size, Address};

    use crate::mem::virt_mem::{virt_read_raw_into, virt_write_raw};

    fn os_with(name: &str) -> (OsInstance, Pid) {
        let mut os = DummyOs::new(DummyMemory::new(size::mb(8)));
        let pid = os
            .alloc_process_named(name, size::kb(64), &[0xaa, 0xbb])
            .unwrap();
        (OsInstance::builder(os).build(), pid)
    }

    #[test]
    fn os_moves_into_the_process() {
        let (mut os, _) = os_with("svchost.exe");
        let name = CString::new("svchost.exe").unwrap();

        let mut proc = MaybeUninit::uninit();
        let res = unsafe { os_into_process_by_name(&mut os, name.as_ptr(), &mut proc) };
        assert_eq!(res, 0);
        let mut proc = unsafe { proc.assume_init() };
        assert_eq!(proc.info().name, "svchost.exe");

        let base: Address = proc.primary_module().unwrap().base;
        let mut out = [0_u8; 2];
        let res = unsafe { virt_read_raw_into(&mut proc, base, out.as_mut_ptr(), out.len()) };
        assert_eq!(res, 0);
        assert_eq!(out, [0xaa, 0xbb]);

        let data = [0x10_u8];
        assert_eq!(unsafe { virt_write_raw(&mut proc, base, data.as_ptr(), 1) }, 0);

        let mut clone = MaybeUninit::uninit();
        assert_eq!(unsafe { process_clone(&proc, &mut clone) }, 0);
        let mut clone = unsafe { clone.assume_init() };
        assert_eq!(clone.virt_read::<u8>(base).unwrap(), 0x10);

        // the os handle was consumed
        assert_eq!(
            unsafe { os_into_process_by_pid(&mut os, 0, &mut MaybeUninit::uninit()) },
            Error(ErrorOrigin::Ffi, ErrorKind::Uninitialized).into_i32()
        );
        std::mem::forget(os);

        unsafe { process_drop(&mut clone) };
        unsafe { process_drop(&mut proc) };
        unsafe { process_drop(&mut proc) };
        std::mem::forget(clone);
        std::mem::forget(proc);
    }

    #[test]
    fn missing_process_consumes_the_os() {
        let (mut os, pid) = os_with("cmd.exe");

        let mut proc = MaybeUninit::uninit();
        assert_eq!(
            unsafe { os_into_process_by_pid(&mut os, pid + 100, &mut proc) },
            Error(ErrorOrigin::OsLayer, ErrorKind::ProcessNotFound).into_i32()
        );
        assert!(unsafe { handle_ref(&os as *const OsInstance) }.is_err());
        std::mem::forget(os);
    }
}
