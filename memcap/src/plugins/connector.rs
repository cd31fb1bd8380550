use core::ffi::c_void;
use core::mem::MaybeUninit;

use super::mem::{call_out, forward_physical_memory, CloneVtbl, PhysicalMemoryVtbl};
use super::{Loadable, OsInstance, PluginDescriptor};
use crate::connector::{ConnectorCpuStateInner, CpuState};
use crate::error::{AsIntResult, Error, ErrorKind, ErrorOrigin, Result};
use crate::mem::PhysicalMemory;
use crate::types::{COptArc, CtxBox};

#[repr(C)]
pub struct CpuStateVtbl {
    pub pause: unsafe extern "C" fn(this: *mut c_void),
    pub resume: unsafe extern "C" fn(this: *mut c_void),
}

unsafe extern "C" fn c_pause<T: CpuState>(this: *mut c_void) {
    (*(this as *mut T)).pause()
}

unsafe extern "C" fn c_resume<T: CpuState>(this: *mut c_void) {
    (*(this as *mut T)).resume()
}

impl CpuStateVtbl {
    pub fn of<T: CpuState>() -> &'static Self {
        &CpuStateVtbl {
            pause: c_pause::<T>,
            resume: c_resume::<T>,
        }
    }
}

/// Cpu state borrowing the connector it was created from.
#[repr(C)]
pub struct CpuStateInstance<'a> {
    instance: CtxBox<'a>,
    vtbl_cpustate: &'static CpuStateVtbl,
}

impl<'a> CpuStateInstance<'a> {
    pub fn new<T: CpuState + 'a>(obj: T, ctx: COptArc<c_void>) -> Self {
        Self {
            instance: CtxBox::new(obj, ctx),
            vtbl_cpustate: CpuStateVtbl::of::<T>(),
        }
    }
}

impl CpuState for CpuStateInstance<'_> {
    fn pause(&mut self) {
        unsafe { (self.vtbl_cpustate.pause)(self.instance.as_ptr()) }
    }

    fn resume(&mut self) {
        unsafe { (self.vtbl_cpustate.resume)(self.instance.as_ptr()) }
    }
}

/// Cpu state owning the connector it was created from.
#[repr(C)]
pub struct IntoCpuStateInstance {
    instance: CtxBox<'static>,
    vtbl_clone: &'static CloneVtbl,
    vtbl_cpustate: &'static CpuStateVtbl,
}

impl IntoCpuStateInstance {
    pub fn new<T: CpuState + Clone + 'static>(obj: T, ctx: COptArc<c_void>) -> Self {
        Self {
            instance: CtxBox::new(obj, ctx),
            vtbl_clone: CloneVtbl::of::<T>(),
            vtbl_cpustate: CpuStateVtbl::of::<T>(),
        }
    }
}

impl Clone for IntoCpuStateInstance {
    fn clone(&self) -> Self {
        Self {
            instance: self.vtbl_clone.clone_box(&self.instance),
            vtbl_clone: self.vtbl_clone,
            vtbl_cpustate: self.vtbl_cpustate,
        }
    }
}

impl CpuState for IntoCpuStateInstance {
    fn pause(&mut self) {
        unsafe { (self.vtbl_cpustate.pause)(self.instance.as_ptr()) }
    }

    fn resume(&mut self) {
        unsafe { (self.vtbl_cpustate.resume)(self.instance.as_ptr()) }
    }
}

#[repr(C)]
pub struct ConnectorCpuStateVtbl {
    pub cpu_state: unsafe extern "C" fn(
        this: *mut c_void,
        ctx: &COptArc<c_void>,
        out: &mut MaybeUninit<CpuStateInstance<'static>>,
    ) -> i32,
    pub into_cpu_state: unsafe extern "C" fn(
        instance: CtxBox<'static>,
        out: &mut MaybeUninit<IntoCpuStateInstance>,
    ) -> i32,
}

unsafe extern "C" fn c_cpu_state<T: ConnectorCpuStateInner + 'static>(
    this: *mut c_void,
    ctx: &COptArc<c_void>,
    out: &mut MaybeUninit<CpuStateInstance<'static>>,
) -> i32 {
    let this: &'static mut T = &mut *(this as *mut T);
    this.cpu_state()
        .map(|state| CpuStateInstance::new(state, ctx.clone()))
        .into_int_out_result(out)
}

unsafe extern "C" fn c_into_cpu_state<T: ConnectorCpuStateInner + 'static>(
    instance: CtxBox<'static>,
    out: &mut MaybeUninit<IntoCpuStateInstance>,
) -> i32 {
    let (this, ctx) = instance.into_parts::<T>();
    this.into_cpu_state()
        .map(|state| IntoCpuStateInstance::new(state, ctx))
        .into_int_out_result(out)
}

impl ConnectorCpuStateVtbl {
    pub fn of<T: ConnectorCpuStateInner + 'static>() -> &'static Self {
        &ConnectorCpuStateVtbl {
            cpu_state: c_cpu_state::<T>,
            into_cpu_state: c_into_cpu_state::<T>,
        }
    }
}

/// Connector capability bundle.
///
/// Every connector exposes cloning and physical memory. The cpu state capability is optional and
/// decided once when the bundle is built.
#[repr(C)]
pub struct ConnectorInstance {
    instance: CtxBox<'static>,
    vtbl_clone: &'static CloneVtbl,
    vtbl_physicalmemory: &'static PhysicalMemoryVtbl,
    vtbl_cpustate: Option<&'static ConnectorCpuStateVtbl>,
}

impl ConnectorInstance {
    /// Starts building a bundle around `obj`.
    ///
    /// # Examples
    ///
    /// ```
    /// use memcap::dummy::DummyMemory;
    /// use memcap::mem::PhysicalMemory;
    /// use memcap::plugins::ConnectorInstance;
    /// use memcap::types::size;
    ///
    /// let mut conn = ConnectorInstance::builder(DummyMemory::new(size::mb(1)))
    ///     .enable_cpu_state()
    ///     .build();
    /// assert!(conn.has_cpu_state());
    /// assert_eq!(conn.metadata().real_size, size::mb(1) as u64);
    /// ```
    pub fn builder<T: PhysicalMemory + Clone + 'static>(obj: T) -> ConnectorInstanceBuilder<T> {
        ConnectorInstanceBuilder {
            obj,
            ctx: COptArc::none(),
            vtbl_cpustate: None,
        }
    }

    /// Re-exposes an os as a connector, forwarding its physical memory.
    pub fn from_os(os: OsInstance) -> Self {
        Self::builder(os).build()
    }

    pub fn has_cpu_state(&self) -> bool {
        self.vtbl_cpustate.is_some()
    }

    fn vtbl_cpustate(&self) -> Result<&'static ConnectorCpuStateVtbl> {
        self.vtbl_cpustate.ok_or_else(|| {
            Error(ErrorOrigin::Connector, ErrorKind::UnsupportedOptionalFeature)
                .log_debug("connector does not expose a cpu state")
        })
    }
}

pub struct ConnectorInstanceBuilder<T> {
    obj: T,
    ctx: COptArc<c_void>,
    vtbl_cpustate: Option<&'static ConnectorCpuStateVtbl>,
}

impl<T: PhysicalMemory + Clone + 'static> ConnectorInstanceBuilder<T> {
    /// Attaches the library context that keeps the producing library loaded.
    pub fn with_context(mut self, ctx: COptArc<c_void>) -> Self {
        self.ctx = ctx;
        self
    }

    pub fn enable_cpu_state(mut self) -> Self
    where
        T: ConnectorCpuStateInner,
    {
        self.vtbl_cpustate = Some(ConnectorCpuStateVtbl::of::<T>());
        self
    }

    pub fn build(self) -> ConnectorInstance {
        ConnectorInstance {
            instance: CtxBox::new(self.obj, self.ctx),
            vtbl_clone: CloneVtbl::of::<T>(),
            vtbl_physicalmemory: PhysicalMemoryVtbl::of::<T>(),
            vtbl_cpustate: self.vtbl_cpustate,
        }
    }
}

impl Clone for ConnectorInstance {
    fn clone(&self) -> Self {
        Self {
            instance: self.vtbl_clone.clone_box(&self.instance),
            vtbl_clone: self.vtbl_clone,
            vtbl_physicalmemory: self.vtbl_physicalmemory,
            vtbl_cpustate: self.vtbl_cpustate,
        }
    }
}

forward_physical_memory!(ConnectorInstance, vtbl_physicalmemory);

impl ConnectorCpuStateInner for ConnectorInstance {
    type CpuStateType<'a> = CpuStateInstance<'a>;
    type IntoCpuStateType = IntoCpuStateInstance;

    fn cpu_state(&mut self) -> Result<CpuStateInstance<'_>> {
        let vtbl = self.vtbl_cpustate()?;
        let this = self.instance.as_ptr();
        let ctx = self.instance.ctx();
        call_out(|out| unsafe { (vtbl.cpu_state)(this, ctx, out) })
    }

    fn into_cpu_state(self) -> Result<IntoCpuStateInstance> {
        let vtbl = self.vtbl_cpustate()?;
        // keep the library mapped until the consuming call has returned
        let _ctx = self.instance.ctx().clone();
        let ConnectorInstance { instance, .. } = self;
        call_out(|out| unsafe { (vtbl.into_cpu_state)(instance, out) })
    }
}

pub type ConnectorDescriptor = PluginDescriptor<LoadableConnector>;

pub struct LoadableConnector {
    descriptor: PluginDescriptor<Self>,
}

impl Loadable for LoadableConnector {
    type Instance = ConnectorInstance;
    type Input = OsInstance;

    fn plugin_type() -> &'static str {
        "Connector"
    }

    fn export_prefix() -> &'static str {
        "MEMCAP_CONNECTOR_"
    }

    fn origin() -> ErrorOrigin {
        ErrorOrigin::Connector
    }

    fn new(descriptor: PluginDescriptor<Self>) -> Self {
        Self { descriptor }
    }

    fn descriptor(&self) -> &PluginDescriptor<Self> {
        &self.descriptor
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::mem::{PhysicalMemoryMetadata, PhysicalReadData, PhysicalWriteData};
    use crate::types::{Address, CArc};
    use std::sync::atomic::{AtomicUsize, Ordering};
    use std::sync::Arc;

    #[derive(Clone, Default)]
    struct Paused(Arc<AtomicUsize>);

    impl CpuState for Paused {
        fn pause(&mut self) {
            self.0.fetch_add(1, Ordering::SeqCst);
        }

        fn resume(&mut self) {
            self.0.fetch_sub(1, Ordering::SeqCst);
        }
    }

    #[derive(Clone, Default)]
    struct Null {
        paused: Paused,
    }

    impl PhysicalMemory for Null {
        fn phys_read_raw_list(&mut self, data: &mut [PhysicalReadData]) -> Result<()> {
            data.iter_mut().for_each(|d| d.1.iter_mut().for_each(|b| *b = 0));
            Ok(())
        }

        fn phys_write_raw_list(&mut self, _data: &[PhysicalWriteData]) -> Result<()> {
            Err(Error(ErrorOrigin::PhysicalMemory, ErrorKind::ReadOnly))
        }

        fn metadata(&self) -> PhysicalMemoryMetadata {
            PhysicalMemoryMetadata {
                max_address: Address::from(0xfffu64),
                real_size: 0x1000,
                readonly: true,
            }
        }
    }

    impl ConnectorCpuStateInner for Null {
        type CpuStateType<'a> = &'a mut Paused;
        type IntoCpuStateType = Paused;

        fn cpu_state(&mut self) -> Result<&mut Paused> {
            Ok(&mut self.paused)
        }

        fn into_cpu_state(self) -> Result<Paused> {
            Ok(self.paused)
        }
    }

    impl CpuState for &mut Paused {
        fn pause(&mut self) {
            (**self).pause()
        }

        fn resume(&mut self) {
            (**self).resume()
        }
    }

    #[test]
    fn missing_cpu_state() {
        let mut conn = ConnectorInstance::builder(Null::default()).build();
        assert!(!conn.has_cpu_state());
        assert_eq!(
            conn.cpu_state().err(),
            Some(Error(
                ErrorOrigin::Connector,
                ErrorKind::UnsupportedOptionalFeature
            ))
        );
        assert!(conn.metadata().readonly);
        assert_eq!(
            conn.into_cpu_state().err(),
            Some(Error(
                ErrorOrigin::Connector,
                ErrorKind::UnsupportedOptionalFeature
            ))
        );
    }

    #[test]
    fn cpu_state_dispatch() {
        let null = Null::default();
        let counter = null.paused.0.clone();
        let mut conn = ConnectorInstance::builder(null).enable_cpu_state().build();

        conn.cpu_state().unwrap().pause();
        assert_eq!(counter.load(Ordering::SeqCst), 1);

        let mut owned = conn.into_cpu_state().unwrap();
        owned.resume();
        assert_eq!(counter.load(Ordering::SeqCst), 0);
    }

    #[test]
    fn clones_share_context() {
        let ctx_arc = Arc::new(());
        let ctx: COptArc<c_void> = CArc::from_arc(ctx_arc.clone()).into_opaque().into();
        let conn = ConnectorInstance::builder(Null::default())
            .with_context(ctx)
            .build();

        let clones = (0..3).map(|_| conn.clone()).collect::<Vec<_>>();
        assert_eq!(Arc::strong_count(&ctx_arc), 5);
        std::mem::drop(conn);
        assert_eq!(Arc::strong_count(&ctx_arc), 4);
        std::mem::drop(clones);
        assert_eq!(Arc::strong_count(&ctx_arc), 1);
    }
}
