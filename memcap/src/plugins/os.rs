use core::ffi::c_void;
use core::mem::MaybeUninit;

use super::mem::{
    call_out, forward_physical_memory, forward_virtual_memory, CloneVtbl, PhysicalMemoryVtbl,
    VirtualMemoryVtbl,
};
use super::process::{IntoProcessInstance, ProcessInstance};
use super::{ConnectorInstance, Loadable, PluginDescriptor};
use crate::error::{result_from_int_void, AsIntResult, Error, ErrorKind, ErrorOrigin, Result};
use crate::mem::{PhysicalMemory, VirtualMemory};
use crate::os::{
    AddressCallback, Keyboard, KeyboardState, ModuleInfo, ModuleInfoCallback, OsInfo, OsInner,
    OsKeyboardInner, Pid, ProcessInfo, ProcessInfoCallback,
};
use crate::types::{Address, COptArc, CSliceRef, CtxBox};

#[repr(C)]
pub struct KeyboardStateVtbl {
    pub is_down: unsafe extern "C" fn(this: *const c_void, vk: i32) -> bool,
}

unsafe extern "C" fn c_state_is_down<T: KeyboardState>(this: *const c_void, vk: i32) -> bool {
    (*(this as *const T)).is_down(vk)
}

impl KeyboardStateVtbl {
    pub fn of<T: KeyboardState>() -> &'static Self {
        &KeyboardStateVtbl {
            is_down: c_state_is_down::<T>,
        }
    }
}

/// Snapshot of the keyboard state.
#[repr(C)]
pub struct KeyboardStateInstance {
    instance: CtxBox<'static>,
    vtbl_keyboardstate: &'static KeyboardStateVtbl,
}

impl KeyboardStateInstance {
    pub fn new<T: KeyboardState + 'static>(obj: T, ctx: COptArc<c_void>) -> Self {
        Self {
            instance: CtxBox::new(obj, ctx),
            vtbl_keyboardstate: KeyboardStateVtbl::of::<T>(),
        }
    }
}

impl KeyboardState for KeyboardStateInstance {
    fn is_down(&self, vk: i32) -> bool {
        unsafe { (self.vtbl_keyboardstate.is_down)(self.instance.as_ptr(), vk) }
    }
}

#[repr(C)]
pub struct KeyboardVtbl {
    pub is_down: unsafe extern "C" fn(this: *mut c_void, vk: i32) -> bool,
    pub set_down: unsafe extern "C" fn(this: *mut c_void, vk: i32, down: bool),
    pub state: unsafe extern "C" fn(
        this: *mut c_void,
        ctx: &COptArc<c_void>,
        out: &mut MaybeUninit<KeyboardStateInstance>,
    ) -> i32,
}

unsafe extern "C" fn c_is_down<T: Keyboard>(this: *mut c_void, vk: i32) -> bool {
    (*(this as *mut T)).is_down(vk)
}

unsafe extern "C" fn c_set_down<T: Keyboard>(this: *mut c_void, vk: i32, down: bool) {
    (*(this as *mut T)).set_down(vk, down)
}

unsafe extern "C" fn c_state<T: Keyboard>(
    this: *mut c_void,
    ctx: &COptArc<c_void>,
    out: &mut MaybeUninit<KeyboardStateInstance>,
) -> i32 {
    (*(this as *mut T))
        .state()
        .map(|state| KeyboardStateInstance::new(state, ctx.clone()))
        .into_int_out_result(out)
}

impl KeyboardVtbl {
    pub fn of<T: Keyboard>() -> &'static Self {
        &KeyboardVtbl {
            is_down: c_is_down::<T>,
            set_down: c_set_down::<T>,
            state: c_state::<T>,
        }
    }
}

macro_rules! forward_keyboard {
    ($ty:ty) => {
        impl Keyboard for $ty {
            type KeyboardStateType = KeyboardStateInstance;

            fn is_down(&mut self, vk: i32) -> bool {
                unsafe { (self.vtbl_keyboard.is_down)(self.instance.as_ptr(), vk) }
            }

            fn set_down(&mut self, vk: i32, down: bool) {
                unsafe { (self.vtbl_keyboard.set_down)(self.instance.as_ptr(), vk, down) }
            }

            fn state(&mut self) -> Result<KeyboardStateInstance> {
                let this = self.instance.as_ptr();
                let ctx = self.instance.ctx();
                let f = self.vtbl_keyboard.state;
                call_out(|out| unsafe { f(this, ctx, out) })
            }
        }
    };
}

/// Keyboard borrowing the os it was created from.
#[repr(C)]
pub struct KeyboardInstance<'a> {
    instance: CtxBox<'a>,
    vtbl_keyboard: &'static KeyboardVtbl,
}

impl<'a> KeyboardInstance<'a> {
    pub fn new<T: Keyboard + 'a>(obj: T, ctx: COptArc<c_void>) -> Self {
        Self {
            instance: CtxBox::new(obj, ctx),
            vtbl_keyboard: KeyboardVtbl::of::<T>(),
        }
    }
}

forward_keyboard!(KeyboardInstance<'_>);

/// Keyboard owning the os it was created from.
#[repr(C)]
pub struct IntoKeyboardInstance {
    instance: CtxBox<'static>,
    vtbl_clone: &'static CloneVtbl,
    vtbl_keyboard: &'static KeyboardVtbl,
}

impl IntoKeyboardInstance {
    pub fn new<T: Keyboard + Clone + 'static>(obj: T, ctx: COptArc<c_void>) -> Self {
        Self {
            instance: CtxBox::new(obj, ctx),
            vtbl_clone: CloneVtbl::of::<T>(),
            vtbl_keyboard: KeyboardVtbl::of::<T>(),
        }
    }
}

impl Clone for IntoKeyboardInstance {
    fn clone(&self) -> Self {
        Self {
            instance: self.vtbl_clone.clone_box(&self.instance),
            vtbl_clone: self.vtbl_clone,
            vtbl_keyboard: self.vtbl_keyboard,
        }
    }
}

forward_keyboard!(IntoKeyboardInstance);

#[repr(C)]
pub struct OsKeyboardVtbl {
    pub keyboard: unsafe extern "C" fn(
        this: *mut c_void,
        ctx: &COptArc<c_void>,
        out: &mut MaybeUninit<KeyboardInstance<'static>>,
    ) -> i32,
    pub into_keyboard: unsafe extern "C" fn(
        instance: CtxBox<'static>,
        out: &mut MaybeUninit<IntoKeyboardInstance>,
    ) -> i32,
}

unsafe extern "C" fn c_keyboard<T: OsKeyboardInner + 'static>(
    this: *mut c_void,
    ctx: &COptArc<c_void>,
    out: &mut MaybeUninit<KeyboardInstance<'static>>,
) -> i32 {
    let this: &'static mut T = &mut *(this as *mut T);
    this.keyboard()
        .map(|kbd| KeyboardInstance::new(kbd, ctx.clone()))
        .into_int_out_result(out)
}

unsafe extern "C" fn c_into_keyboard<T: OsKeyboardInner + 'static>(
    instance: CtxBox<'static>,
    out: &mut MaybeUninit<IntoKeyboardInstance>,
) -> i32 {
    let (this, ctx) = instance.into_parts::<T>();
    this.into_keyboard()
        .map(|kbd| IntoKeyboardInstance::new(kbd, ctx))
        .into_int_out_result(out)
}

impl OsKeyboardVtbl {
    pub fn of<T: OsKeyboardInner + 'static>() -> &'static Self {
        &OsKeyboardVtbl {
            keyboard: c_keyboard::<T>,
            into_keyboard: c_into_keyboard::<T>,
        }
    }
}

#[repr(C)]
pub struct OsVtbl {
    pub process_address_list_callback:
        unsafe extern "C" fn(this: *mut c_void, callback: AddressCallback) -> i32,
    pub process_info_list_callback:
        unsafe extern "C" fn(this: *mut c_void, callback: ProcessInfoCallback) -> i32,
    pub process_info_by_address: unsafe extern "C" fn(
        this: *mut c_void,
        address: Address,
        out: &mut MaybeUninit<ProcessInfo>,
    ) -> i32,
    pub process_info_by_name: unsafe extern "C" fn(
        this: *mut c_void,
        name: CSliceRef<u8>,
        out: &mut MaybeUninit<ProcessInfo>,
    ) -> i32,
    pub process_info_by_pid:
        unsafe extern "C" fn(this: *mut c_void, pid: Pid, out: &mut MaybeUninit<ProcessInfo>) -> i32,
    pub process_by_info: unsafe extern "C" fn(
        this: *mut c_void,
        ctx: &COptArc<c_void>,
        info: ProcessInfo,
        out: &mut MaybeUninit<ProcessInstance<'static>>,
    ) -> i32,
    pub into_process_by_info: unsafe extern "C" fn(
        instance: CtxBox<'static>,
        info: ProcessInfo,
        out: &mut MaybeUninit<IntoProcessInstance>,
    ) -> i32,
    pub module_address_list_callback:
        unsafe extern "C" fn(this: *mut c_void, callback: AddressCallback) -> i32,
    pub module_list_callback:
        unsafe extern "C" fn(this: *mut c_void, callback: ModuleInfoCallback) -> i32,
    pub module_by_address: unsafe extern "C" fn(
        this: *mut c_void,
        address: Address,
        out: &mut MaybeUninit<ModuleInfo>,
    ) -> i32,
    pub module_by_name: unsafe extern "C" fn(
        this: *mut c_void,
        name: CSliceRef<u8>,
        out: &mut MaybeUninit<ModuleInfo>,
    ) -> i32,
    pub info: unsafe extern "C" fn(this: *const c_void) -> *const OsInfo,
}

unsafe extern "C" fn c_process_address_list_callback<T: OsInner>(
    this: *mut c_void,
    callback: AddressCallback,
) -> i32 {
    (*(this as *mut T))
        .process_address_list_callback(callback)
        .into_int_result()
}

unsafe extern "C" fn c_process_info_list_callback<T: OsInner>(
    this: *mut c_void,
    callback: ProcessInfoCallback,
) -> i32 {
    (*(this as *mut T))
        .process_info_list_callback(callback)
        .into_int_result()
}

unsafe extern "C" fn c_process_info_by_address<T: OsInner>(
    this: *mut c_void,
    address: Address,
    out: &mut MaybeUninit<ProcessInfo>,
) -> i32 {
    (*(this as *mut T))
        .process_info_by_address(address)
        .into_int_out_result(out)
}

unsafe extern "C" fn c_process_info_by_name<T: OsInner>(
    this: *mut c_void,
    name: CSliceRef<u8>,
    out: &mut MaybeUninit<ProcessInfo>,
) -> i32 {
    (*(this as *mut T))
        .process_info_by_name(name.as_str())
        .into_int_out_result(out)
}

unsafe extern "C" fn c_process_info_by_pid<T: OsInner>(
    this: *mut c_void,
    pid: Pid,
    out: &mut MaybeUninit<ProcessInfo>,
) -> i32 {
    (*(this as *mut T))
        .process_info_by_pid(pid)
        .into_int_out_result(out)
}

unsafe extern "C" fn c_process_by_info<T: OsInner + 'static>(
    this: *mut c_void,
    ctx: &COptArc<c_void>,
    info: ProcessInfo,
    out: &mut MaybeUninit<ProcessInstance<'static>>,
) -> i32 {
    let this: &'static mut T = &mut *(this as *mut T);
    this.process_by_info(info)
        .map(|proc| ProcessInstance::new(proc, ctx.clone()))
        .into_int_out_result(out)
}

unsafe extern "C" fn c_into_process_by_info<T: OsInner + 'static>(
    instance: CtxBox<'static>,
    info: ProcessInfo,
    out: &mut MaybeUninit<IntoProcessInstance>,
) -> i32 {
    let (this, ctx) = instance.into_parts::<T>();
    this.into_process_by_info(info)
        .map(|proc| IntoProcessInstance::new(proc, ctx))
        .into_int_out_result(out)
}

unsafe extern "C" fn c_module_address_list_callback<T: OsInner>(
    this: *mut c_void,
    callback: AddressCallback,
) -> i32 {
    (*(this as *mut T))
        .module_address_list_callback(callback)
        .into_int_result()
}

unsafe extern "C" fn c_module_list_callback<T: OsInner>(
    this: *mut c_void,
    callback: ModuleInfoCallback,
) -> i32 {
    (*(this as *mut T))
        .module_list_callback(callback)
        .into_int_result()
}

unsafe extern "C" fn c_module_by_address<T: OsInner>(
    this: *mut c_void,
    address: Address,
    out: &mut MaybeUninit<ModuleInfo>,
) -> i32 {
    (*(this as *mut T))
        .module_by_address(address)
        .into_int_out_result(out)
}

unsafe extern "C" fn c_module_by_name<T: OsInner>(
    this: *mut c_void,
    name: CSliceRef<u8>,
    out: &mut MaybeUninit<ModuleInfo>,
) -> i32 {
    (*(this as *mut T))
        .module_by_name(name.as_str())
        .into_int_out_result(out)
}

unsafe extern "C" fn c_os_info<T: OsInner>(this: *const c_void) -> *const OsInfo {
    (*(this as *const T)).info()
}

impl OsVtbl {
    pub fn of<T: OsInner + 'static>() -> &'static Self {
        &OsVtbl {
            process_address_list_callback: c_process_address_list_callback::<T>,
            process_info_list_callback: c_process_info_list_callback::<T>,
            process_info_by_address: c_process_info_by_address::<T>,
            process_info_by_name: c_process_info_by_name::<T>,
            process_info_by_pid: c_process_info_by_pid::<T>,
            process_by_info: c_process_by_info::<T>,
            into_process_by_info: c_into_process_by_info::<T>,
            module_address_list_callback: c_module_address_list_callback::<T>,
            module_list_callback: c_module_list_callback::<T>,
            module_by_address: c_module_by_address::<T>,
            module_by_name: c_module_by_name::<T>,
            info: c_os_info::<T>,
        }
    }
}

/// Os capability bundle.
///
/// Every os exposes cloning, introspection, physical and virtual memory. The keyboard capability
/// is optional and decided once when the bundle is built.
#[repr(C)]
pub struct OsInstance {
    instance: CtxBox<'static>,
    vtbl_clone: &'static CloneVtbl,
    vtbl_os: &'static OsVtbl,
    vtbl_keyboard: Option<&'static OsKeyboardVtbl>,
    vtbl_physicalmemory: &'static PhysicalMemoryVtbl,
    vtbl_virtualmemory: &'static VirtualMemoryVtbl,
}

impl OsInstance {
    pub fn builder<T>(obj: T) -> OsInstanceBuilder<T>
    where
        T: OsInner + PhysicalMemory + VirtualMemory + Clone + 'static,
    {
        OsInstanceBuilder {
            obj,
            ctx: COptArc::none(),
            vtbl_keyboard: None,
        }
    }

    pub fn has_keyboard(&self) -> bool {
        self.vtbl_keyboard.is_some()
    }

    fn vtbl_keyboard(&self) -> Result<&'static OsKeyboardVtbl> {
        self.vtbl_keyboard.ok_or_else(|| {
            Error(ErrorOrigin::OsLayer, ErrorKind::UnsupportedOptionalFeature)
                .log_debug("os does not expose a keyboard")
        })
    }
}

pub struct OsInstanceBuilder<T> {
    obj: T,
    ctx: COptArc<c_void>,
    vtbl_keyboard: Option<&'static OsKeyboardVtbl>,
}

impl<T> OsInstanceBuilder<T>
where
    T: OsInner + PhysicalMemory + VirtualMemory + Clone + 'static,
{
    /// Attaches the library context that keeps the producing library loaded.
    pub fn with_context(mut self, ctx: COptArc<c_void>) -> Self {
        self.ctx = ctx;
        self
    }

    pub fn enable_keyboard(mut self) -> Self
    where
        T: OsKeyboardInner,
    {
        self.vtbl_keyboard = Some(OsKeyboardVtbl::of::<T>());
        self
    }

    pub fn build(self) -> OsInstance {
        OsInstance {
            instance: CtxBox::new(self.obj, self.ctx),
            vtbl_clone: CloneVtbl::of::<T>(),
            vtbl_os: OsVtbl::of::<T>(),
            vtbl_keyboard: self.vtbl_keyboard,
            vtbl_physicalmemory: PhysicalMemoryVtbl::of::<T>(),
            vtbl_virtualmemory: VirtualMemoryVtbl::of::<T>(),
        }
    }
}

impl Clone for OsInstance {
    fn clone(&self) -> Self {
        Self {
            instance: self.vtbl_clone.clone_box(&self.instance),
            vtbl_clone: self.vtbl_clone,
            vtbl_os: self.vtbl_os,
            vtbl_keyboard: self.vtbl_keyboard,
            vtbl_physicalmemory: self.vtbl_physicalmemory,
            vtbl_virtualmemory: self.vtbl_virtualmemory,
        }
    }
}

forward_physical_memory!(OsInstance, vtbl_physicalmemory);
forward_virtual_memory!(OsInstance, vtbl_virtualmemory);

impl OsInner for OsInstance {
    type ProcessType<'a> = ProcessInstance<'a>;
    type IntoProcessType = IntoProcessInstance;

    fn process_address_list_callback(&mut self, callback: AddressCallback) -> Result<()> {
        result_from_int_void(unsafe {
            (self.vtbl_os.process_address_list_callback)(self.instance.as_ptr(), callback)
        })
    }

    fn process_info_list_callback(&mut self, callback: ProcessInfoCallback) -> Result<()> {
        result_from_int_void(unsafe {
            (self.vtbl_os.process_info_list_callback)(self.instance.as_ptr(), callback)
        })
    }

    fn process_info_by_address(&mut self, address: Address) -> Result<ProcessInfo> {
        let this = self.instance.as_ptr();
        let f = self.vtbl_os.process_info_by_address;
        call_out(|out| unsafe { f(this, address, out) })
    }

    fn process_info_by_name(&mut self, name: &str) -> Result<ProcessInfo> {
        let this = self.instance.as_ptr();
        let f = self.vtbl_os.process_info_by_name;
        call_out(|out| unsafe { f(this, name.into(), out) })
    }

    fn process_info_by_pid(&mut self, pid: Pid) -> Result<ProcessInfo> {
        let this = self.instance.as_ptr();
        let f = self.vtbl_os.process_info_by_pid;
        call_out(|out| unsafe { f(this, pid, out) })
    }

    fn process_by_info(&mut self, info: ProcessInfo) -> Result<ProcessInstance<'_>> {
        let this = self.instance.as_ptr();
        let ctx = self.instance.ctx();
        let f = self.vtbl_os.process_by_info;
        call_out(|out| unsafe { f(this, ctx, info, out) })
    }

    fn into_process_by_info(self, info: ProcessInfo) -> Result<IntoProcessInstance> {
        let f = self.vtbl_os.into_process_by_info;
        // keep the library mapped until the consuming call has returned
        let _ctx = self.instance.ctx().clone();
        let OsInstance { instance, .. } = self;
        call_out(|out| unsafe { f(instance, info, out) })
    }

    fn module_address_list_callback(&mut self, callback: AddressCallback) -> Result<()> {
        result_from_int_void(unsafe {
            (self.vtbl_os.module_address_list_callback)(self.instance.as_ptr(), callback)
        })
    }

    fn module_list_callback(&mut self, callback: ModuleInfoCallback) -> Result<()> {
        result_from_int_void(unsafe {
            (self.vtbl_os.module_list_callback)(self.instance.as_ptr(), callback)
        })
    }

    fn module_by_address(&mut self, address: Address) -> Result<ModuleInfo> {
        let this = self.instance.as_ptr();
        let f = self.vtbl_os.module_by_address;
        call_out(|out| unsafe { f(this, address, out) })
    }

    fn module_by_name(&mut self, name: &str) -> Result<ModuleInfo> {
        let this = self.instance.as_ptr();
        let f = self.vtbl_os.module_by_name;
        call_out(|out| unsafe { f(this, name.into(), out) })
    }

    fn info(&self) -> &OsInfo {
        unsafe { &*(self.vtbl_os.info)(self.instance.as_ptr()) }
    }
}

impl OsKeyboardInner for OsInstance {
    type KeyboardType<'a> = KeyboardInstance<'a>;
    type IntoKeyboardType = IntoKeyboardInstance;

    fn keyboard(&mut self) -> Result<KeyboardInstance<'_>> {
        let vtbl = self.vtbl_keyboard()?;
        let this = self.instance.as_ptr();
        let ctx = self.instance.ctx();
        call_out(|out| unsafe { (vtbl.keyboard)(this, ctx, out) })
    }

    fn into_keyboard(self) -> Result<IntoKeyboardInstance> {
        let vtbl = self.vtbl_keyboard()?;
        let _ctx = self.instance.ctx().clone();
        let OsInstance { instance, .. } = self;
        call_out(|out| unsafe { (vtbl.into_keyboard)(instance, out) })
    }
}

pub type OsDescriptor = PluginDescriptor<LoadableOs>;

pub struct LoadableOs {
    descriptor: PluginDescriptor<Self>,
}

impl Loadable for LoadableOs {
    type Instance = OsInstance;
    type Input = ConnectorInstance;

    fn plugin_type() -> &'static str {
        "Os"
    }

    fn export_prefix() -> &'static str {
        "MEMCAP_OS_"
    }

    fn origin() -> ErrorOrigin {
        ErrorOrigin::OsLayer
    }

    fn new(descriptor: PluginDescriptor<Self>) -> Self {
        Self { descriptor }
    }

    fn descriptor(&self) -> &PluginDescriptor<Self> {
        &self.descriptor
    }
}

#[cfg(all(test, feature = "dummy_mem"))]
mod tests {
    use super::*;
    use crate::dummy::{DummyMemory, DummyOs};
    use crate::mem::VirtualTranslate;
    use crate::os::Process;
    use crate::types::size;

    fn os_instance(keyboard: bool) -> (OsInstance, Pid) {
        let mut os = DummyOs::new(DummyMemory::new(size::mb(16)));
        let pid = os.alloc_process(size::mb(1), &[0x55; 16]).unwrap();
        let builder = OsInstance::builder(os);
        let builder = if keyboard {
            builder.enable_keyboard()
        } else {
            builder
        };
        (builder.build(), pid)
    }

    #[test]
    fn keyboard_is_optional() {
        let (mut os, _) = os_instance(false);
        assert!(!os.has_keyboard());
        assert_eq!(
            os.keyboard().err(),
            Some(Error(
                ErrorOrigin::OsLayer,
                ErrorKind::UnsupportedOptionalFeature
            ))
        );

        let (mut os, _) = os_instance(true);
        let mut kbd = os.keyboard().unwrap();
        kbd.set_down(0x41, true);
        assert!(kbd.is_down(0x41));
        assert!(kbd.state().unwrap().is_down(0x41));
        assert!(!kbd.state().unwrap().is_down(0x42));
    }

    #[test]
    fn context_outlives_every_clone() {
        use crate::types::CArc;
        use std::sync::Arc;

        let ctx_arc = Arc::new(());
        let ctx: COptArc<c_void> = CArc::from_arc(ctx_arc.clone()).into_opaque().into();
        let mut inner = DummyOs::new(DummyMemory::new(size::mb(16)));
        let pid = inner.alloc_process(size::kb(64), &[0x11; 8]).unwrap();
        let os = OsInstance::builder(inner).with_context(ctx).build();
        assert_eq!(Arc::strong_count(&ctx_arc), 2);

        let mut clones = (0..3).map(|_| os.clone()).collect::<Vec<_>>();
        assert_eq!(Arc::strong_count(&ctx_arc), 5);
        drop(os);
        assert_eq!(Arc::strong_count(&ctx_arc), 4);

        {
            let proc = clones[0].process_by_pid(pid).unwrap();
            assert_eq!(Arc::strong_count(&ctx_arc), 5);
            drop(proc);
        }
        assert_eq!(Arc::strong_count(&ctx_arc), 4);

        // the consumed clone hands its reference to the process
        let mut proc = clones.remove(1).into_process_by_pid(pid).unwrap();
        assert_eq!(Arc::strong_count(&ctx_arc), 4);
        let copy = proc.clone();
        assert_eq!(Arc::strong_count(&ctx_arc), 5);

        // a failed consumption releases the reference
        assert!(clones.remove(1).into_process_by_pid(pid + 100).is_err());
        assert_eq!(Arc::strong_count(&ctx_arc), 4);

        drop(clones);
        assert_eq!(Arc::strong_count(&ctx_arc), 3);
        let base = proc.primary_module().unwrap().base;
        assert_eq!(proc.virt_read::<u8>(base).unwrap(), 0x11);

        drop(proc);
        assert_eq!(Arc::strong_count(&ctx_arc), 2);
        drop(copy);
        assert_eq!(Arc::strong_count(&ctx_arc), 1);
    }

    #[test]
    fn borrowed_and_owned_processes() {
        let (mut os, pid) = os_instance(false);

        {
            let mut proc = os.process_by_pid(pid).unwrap();
            assert_eq!(proc.info().pid, pid);
            let base = proc.primary_module().unwrap().base;
            assert_eq!(proc.virt_read::<u32>(base).unwrap(), 0x5555_5555);
            assert!(proc.virt_to_phys(base).is_ok());
        }

        let mut proc = os.into_process_by_pid(pid).unwrap();
        let mut copy = proc.clone();
        let base = copy.primary_module_address().unwrap();
        assert_eq!(proc.primary_module_address().unwrap(), base);
    }

    #[test]
    fn os_info_forwarded() {
        let (os, _) = os_instance(false);
        assert!(os.info().arch.is_x86());
        assert_eq!(os.clone().info(), os.info());
    }
}
