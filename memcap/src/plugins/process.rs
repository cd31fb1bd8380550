//! Process capability bundles.

use core::ffi::c_void;
use core::mem::MaybeUninit;

use super::mem::{
    call_out, forward_virtual_memory, forward_virtual_translate, CloneVtbl, VirtualMemoryVtbl,
    VirtualTranslateVtbl,
};
use crate::architecture::ArchitectureIdent;
use crate::error::AsIntResult;
use crate::mem::{VirtualMemory, VirtualTranslate};
use crate::os::{
    ExportCallback, ImportCallback, ModuleAddressCallback, ModuleInfo, ModuleInfoCallback,
    Process, ProcessInfo, ProcessState, SectionCallback,
};
use crate::types::{Address, COptArc, CSliceRef, CtxBox};

#[repr(C)]
pub struct ProcessVtbl {
    pub state: unsafe extern "C" fn(this: *mut c_void) -> ProcessState,
    pub module_address_list_callback: unsafe extern "C" fn(
        this: *mut c_void,
        target_arch: Option<&ArchitectureIdent>,
        callback: ModuleAddressCallback,
    ) -> i32,
    pub module_list_callback: unsafe extern "C" fn(
        this: *mut c_void,
        target_arch: Option<&ArchitectureIdent>,
        callback: ModuleInfoCallback,
    ) -> i32,
    pub module_by_address: unsafe extern "C" fn(
        this: *mut c_void,
        address: Address,
        architecture: ArchitectureIdent,
        out: &mut MaybeUninit<ModuleInfo>,
    ) -> i32,
    pub module_by_name_arch: unsafe extern "C" fn(
        this: *mut c_void,
        name: CSliceRef<u8>,
        architecture: Option<&ArchitectureIdent>,
        out: &mut MaybeUninit<ModuleInfo>,
    ) -> i32,
    pub primary_module_address:
        unsafe extern "C" fn(this: *mut c_void, out: &mut MaybeUninit<Address>) -> i32,
    pub module_import_list_callback: unsafe extern "C" fn(
        this: *mut c_void,
        info: &ModuleInfo,
        callback: ImportCallback,
    ) -> i32,
    pub module_export_list_callback: unsafe extern "C" fn(
        this: *mut c_void,
        info: &ModuleInfo,
        callback: ExportCallback,
    ) -> i32,
    pub module_section_list_callback: unsafe extern "C" fn(
        this: *mut c_void,
        info: &ModuleInfo,
        callback: SectionCallback,
    ) -> i32,
    pub info: unsafe extern "C" fn(this: *const c_void) -> *const ProcessInfo,
}

unsafe extern "C" fn c_state<T: Process>(this: *mut c_void) -> ProcessState {
    (*(this as *mut T)).state()
}

unsafe extern "C" fn c_module_address_list_callback<T: Process>(
    this: *mut c_void,
    target_arch: Option<&ArchitectureIdent>,
    callback: ModuleAddressCallback,
) -> i32 {
    (*(this as *mut T))
        .module_address_list_callback(target_arch, callback)
        .into_int_result()
}

unsafe extern "C" fn c_module_list_callback<T: Process>(
    this: *mut c_void,
    target_arch: Option<&ArchitectureIdent>,
    callback: ModuleInfoCallback,
) -> i32 {
    (*(this as *mut T))
        .module_list_callback(target_arch, callback)
        .into_int_result()
}

unsafe extern "C" fn c_module_by_address<T: Process>(
    this: *mut c_void,
    address: Address,
    architecture: ArchitectureIdent,
    out: &mut MaybeUninit<ModuleInfo>,
) -> i32 {
    (*(this as *mut T))
        .module_by_address(address, architecture)
        .into_int_out_result(out)
}

unsafe extern "C" fn c_module_by_name_arch<T: Process>(
    this: *mut c_void,
    name: CSliceRef<u8>,
    architecture: Option<&ArchitectureIdent>,
    out: &mut MaybeUninit<ModuleInfo>,
) -> i32 {
    (*(this as *mut T))
        .module_by_name_arch(name.as_str(), architecture)
        .into_int_out_result(out)
}

unsafe extern "C" fn c_primary_module_address<T: Process>(
    this: *mut c_void,
    out: &mut MaybeUninit<Address>,
) -> i32 {
    (*(this as *mut T))
        .primary_module_address()
        .into_int_out_result(out)
}

unsafe extern "C" fn c_module_import_list_callback<T: Process>(
    this: *mut c_void,
    info: &ModuleInfo,
    callback: ImportCallback,
) -> i32 {
    (*(this as *mut T))
        .module_import_list_callback(info, callback)
        .into_int_result()
}

unsafe extern "C" fn c_module_export_list_callback<T: Process>(
    this: *mut c_void,
    info: &ModuleInfo,
    callback: ExportCallback,
) -> i32 {
    (*(this as *mut T))
        .module_export_list_callback(info, callback)
        .into_int_result()
}

unsafe extern "C" fn c_module_section_list_callback<T: Process>(
    this: *mut c_void,
    info: &ModuleInfo,
    callback: SectionCallback,
) -> i32 {
    (*(this as *mut T))
        .module_section_list_callback(info, callback)
        .into_int_result()
}

unsafe extern "C" fn c_info<T: Process>(this: *const c_void) -> *const ProcessInfo {
    (*(this as *const T)).info()
}

impl ProcessVtbl {
    pub fn of<T: Process>() -> &'static Self {
        &ProcessVtbl {
            state: c_state::<T>,
            module_address_list_callback: c_module_address_list_callback::<T>,
            module_list_callback: c_module_list_callback::<T>,
            module_by_address: c_module_by_address::<T>,
            module_by_name_arch: c_module_by_name_arch::<T>,
            primary_module_address: c_primary_module_address::<T>,
            module_import_list_callback: c_module_import_list_callback::<T>,
            module_export_list_callback: c_module_export_list_callback::<T>,
            module_section_list_callback: c_module_section_list_callback::<T>,
            info: c_info::<T>,
        }
    }
}

macro_rules! forward_process {
    ($ty:ty) => {
        impl Process for $ty {
            fn state(&mut self) -> ProcessState {
                unsafe { (self.vtbl_process.state)(self.instance.as_ptr()) }
            }

            fn module_address_list_callback(
                &mut self,
                target_arch: Option<&ArchitectureIdent>,
                callback: ModuleAddressCallback,
            ) -> crate::error::Result<()> {
                crate::error::result_from_int_void(unsafe {
                    (self.vtbl_process.module_address_list_callback)(
                        self.instance.as_ptr(),
                        target_arch,
                        callback,
                    )
                })
            }

            fn module_list_callback(
                &mut self,
                target_arch: Option<&ArchitectureIdent>,
                callback: ModuleInfoCallback,
            ) -> crate::error::Result<()> {
                crate::error::result_from_int_void(unsafe {
                    (self.vtbl_process.module_list_callback)(
                        self.instance.as_ptr(),
                        target_arch,
                        callback,
                    )
                })
            }

            fn module_by_address(
                &mut self,
                address: Address,
                architecture: ArchitectureIdent,
            ) -> crate::error::Result<ModuleInfo> {
                let this = self.instance.as_ptr();
                let f = self.vtbl_process.module_by_address;
                call_out(|out| unsafe { f(this, address, architecture, out) })
            }

            fn module_by_name_arch(
                &mut self,
                name: &str,
                architecture: Option<&ArchitectureIdent>,
            ) -> crate::error::Result<ModuleInfo> {
                let this = self.instance.as_ptr();
                let f = self.vtbl_process.module_by_name_arch;
                call_out(|out| unsafe { f(this, name.into(), architecture, out) })
            }

            fn primary_module_address(&mut self) -> crate::error::Result<Address> {
                let this = self.instance.as_ptr();
                let f = self.vtbl_process.primary_module_address;
                call_out(|out| unsafe { f(this, out) })
            }

            fn module_import_list_callback(
                &mut self,
                info: &ModuleInfo,
                callback: ImportCallback,
            ) -> crate::error::Result<()> {
                crate::error::result_from_int_void(unsafe {
                    (self.vtbl_process.module_import_list_callback)(
                        self.instance.as_ptr(),
                        info,
                        callback,
                    )
                })
            }

            fn module_export_list_callback(
                &mut self,
                info: &ModuleInfo,
                callback: ExportCallback,
            ) -> crate::error::Result<()> {
                crate::error::result_from_int_void(unsafe {
                    (self.vtbl_process.module_export_list_callback)(
                        self.instance.as_ptr(),
                        info,
                        callback,
                    )
                })
            }

            fn module_section_list_callback(
                &mut self,
                info: &ModuleInfo,
                callback: SectionCallback,
            ) -> crate::error::Result<()> {
                crate::error::result_from_int_void(unsafe {
                    (self.vtbl_process.module_section_list_callback)(
                        self.instance.as_ptr(),
                        info,
                        callback,
                    )
                })
            }

            fn info(&self) -> &ProcessInfo {
                unsafe { &*(self.vtbl_process.info)(self.instance.as_ptr()) }
            }
        }
    };
}

/// Process borrowing the os it was created from.
#[repr(C)]
pub struct ProcessInstance<'a> {
    instance: CtxBox<'a>,
    vtbl_process: &'static ProcessVtbl,
    vtbl_virtualmemory: &'static VirtualMemoryVtbl,
    vtbl_virtualtranslate: &'static VirtualTranslateVtbl,
}

impl<'a> ProcessInstance<'a> {
    pub fn new<T: Process + VirtualMemory + VirtualTranslate + 'a>(
        obj: T,
        ctx: COptArc<c_void>,
    ) -> Self {
        Self {
            instance: CtxBox::new(obj, ctx),
            vtbl_process: ProcessVtbl::of::<T>(),
            vtbl_virtualmemory: VirtualMemoryVtbl::of::<T>(),
            vtbl_virtualtranslate: VirtualTranslateVtbl::of::<T>(),
        }
    }
}

forward_process!(ProcessInstance<'_>);
forward_virtual_memory!(ProcessInstance<'_>, vtbl_virtualmemory);
forward_virtual_translate!(ProcessInstance<'_>, vtbl_virtualtranslate);

/// Process owning all of its resources.
#[repr(C)]
pub struct IntoProcessInstance {
    instance: CtxBox<'static>,
    vtbl_clone: &'static CloneVtbl,
    vtbl_process: &'static ProcessVtbl,
    vtbl_virtualmemory: &'static VirtualMemoryVtbl,
    vtbl_virtualtranslate: &'static VirtualTranslateVtbl,
}

impl IntoProcessInstance {
    pub fn new<T: Process + VirtualMemory + VirtualTranslate + Clone + 'static>(
        obj: T,
        ctx: COptArc<c_void>,
    ) -> Self {
        Self {
            instance: CtxBox::new(obj, ctx),
            vtbl_clone: CloneVtbl::of::<T>(),
            vtbl_process: ProcessVtbl::of::<T>(),
            vtbl_virtualmemory: VirtualMemoryVtbl::of::<T>(),
            vtbl_virtualtranslate: VirtualTranslateVtbl::of::<T>(),
        }
    }
}

impl Clone for IntoProcessInstance {
    fn clone(&self) -> Self {
        Self {
            instance: self.vtbl_clone.clone_box(&self.instance),
            vtbl_clone: self.vtbl_clone,
            vtbl_process: self.vtbl_process,
            vtbl_virtualmemory: self.vtbl_virtualmemory,
            vtbl_virtualtranslate: self.vtbl_virtualtranslate,
        }
    }
}

forward_process!(IntoProcessInstance);
forward_virtual_memory!(IntoProcessInstance, vtbl_virtualmemory);
forward_virtual_translate!(IntoProcessInstance, vtbl_virtualtranslate);
