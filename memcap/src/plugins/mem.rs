/*!
Dispatch tables for the memory capabilities.

Every table is a `repr(C)` struct of `extern "C"` thunks that are generic over the concrete
instance type. The thunks receive the type erased instance pointer first. Tables are promoted to
`'static` constants, one per instance type.
*/

use core::ffi::c_void;
use core::mem::MaybeUninit;

use crate::error::{AsIntResult, Result};
use crate::mem::{
    MemoryRange, PhysicalMemory, PhysicalMemoryMapping, PhysicalMemoryMetadata,
    PhysicalReadData, PhysicalWriteData, ReadData, VirtualMemory, VirtualTranslate,
    VirtualTranslationCallback, VirtualTranslationFailCallback, WriteData,
};
use crate::types::{COptArc, CSliceMut, CSliceRef, CtxBox};

/// Clones an instance, attaching the same shared context to the copy.
#[repr(C)]
pub struct CloneVtbl {
    pub clone: unsafe extern "C" fn(this: *const c_void, ctx: &COptArc<c_void>) -> CtxBox<'static>,
}

unsafe extern "C" fn c_clone<T: Clone + 'static>(
    this: *const c_void,
    ctx: &COptArc<c_void>,
) -> CtxBox<'static> {
    let this = &*(this as *const T);
    CtxBox::new(this.clone(), ctx.clone())
}

impl CloneVtbl {
    pub fn of<T: Clone + 'static>() -> &'static Self {
        &CloneVtbl {
            clone: c_clone::<T>,
        }
    }

    /// Clones the instance behind `instance`.
    pub fn clone_box(&self, instance: &CtxBox<'static>) -> CtxBox<'static> {
        unsafe { (self.clone)(instance.as_ptr(), instance.ctx()) }
    }
}

#[repr(C)]
pub struct PhysicalMemoryVtbl {
    pub phys_read_raw_list:
        unsafe extern "C" fn(this: *mut c_void, data: CSliceMut<PhysicalReadData>) -> i32,
    pub phys_write_raw_list:
        unsafe extern "C" fn(this: *mut c_void, data: CSliceRef<PhysicalWriteData>) -> i32,
    pub metadata: unsafe extern "C" fn(this: *const c_void) -> PhysicalMemoryMetadata,
    pub set_mem_map:
        unsafe extern "C" fn(this: *mut c_void, mem_map: CSliceRef<PhysicalMemoryMapping>),
}

unsafe extern "C" fn c_phys_read_raw_list<T: PhysicalMemory>(
    this: *mut c_void,
    data: CSliceMut<PhysicalReadData>,
) -> i32 {
    let this = &mut *(this as *mut T);
    this.phys_read_raw_list(data.into_slice()).into_int_result()
}

unsafe extern "C" fn c_phys_write_raw_list<T: PhysicalMemory>(
    this: *mut c_void,
    data: CSliceRef<PhysicalWriteData>,
) -> i32 {
    let this = &mut *(this as *mut T);
    this.phys_write_raw_list(data.as_slice()).into_int_result()
}

unsafe extern "C" fn c_metadata<T: PhysicalMemory>(this: *const c_void) -> PhysicalMemoryMetadata {
    let this = &*(this as *const T);
    this.metadata()
}

unsafe extern "C" fn c_set_mem_map<T: PhysicalMemory>(
    this: *mut c_void,
    mem_map: CSliceRef<PhysicalMemoryMapping>,
) {
    let this = &mut *(this as *mut T);
    this.set_mem_map(mem_map.as_slice())
}

impl PhysicalMemoryVtbl {
    pub fn of<T: PhysicalMemory>() -> &'static Self {
        &PhysicalMemoryVtbl {
            phys_read_raw_list: c_phys_read_raw_list::<T>,
            phys_write_raw_list: c_phys_write_raw_list::<T>,
            metadata: c_metadata::<T>,
            set_mem_map: c_set_mem_map::<T>,
        }
    }
}

#[repr(C)]
pub struct VirtualMemoryVtbl {
    pub virt_read_raw_list: unsafe extern "C" fn(this: *mut c_void, data: CSliceMut<ReadData>) -> i32,
    pub virt_write_raw_list:
        unsafe extern "C" fn(this: *mut c_void, data: CSliceRef<WriteData>) -> i32,
}

unsafe extern "C" fn c_virt_read_raw_list<T: VirtualMemory>(
    this: *mut c_void,
    data: CSliceMut<ReadData>,
) -> i32 {
    let this = &mut *(this as *mut T);
    this.virt_read_raw_list(data.into_slice()).into_int_result()
}

unsafe extern "C" fn c_virt_write_raw_list<T: VirtualMemory>(
    this: *mut c_void,
    data: CSliceRef<WriteData>,
) -> i32 {
    let this = &mut *(this as *mut T);
    this.virt_write_raw_list(data.as_slice()).into_int_result()
}

impl VirtualMemoryVtbl {
    pub fn of<T: VirtualMemory>() -> &'static Self {
        &VirtualMemoryVtbl {
            virt_read_raw_list: c_virt_read_raw_list::<T>,
            virt_write_raw_list: c_virt_write_raw_list::<T>,
        }
    }
}

#[repr(C)]
pub struct VirtualTranslateVtbl {
    pub virt_to_phys_list: unsafe extern "C" fn(
        this: *mut c_void,
        addrs: CSliceRef<MemoryRange>,
        out: VirtualTranslationCallback,
        out_fail: VirtualTranslationFailCallback,
    ),
}

unsafe extern "C" fn c_virt_to_phys_list<T: VirtualTranslate>(
    this: *mut c_void,
    addrs: CSliceRef<MemoryRange>,
    out: VirtualTranslationCallback,
    out_fail: VirtualTranslationFailCallback,
) {
    let this = &mut *(this as *mut T);
    this.virt_to_phys_list(addrs.as_slice(), out, out_fail)
}

impl VirtualTranslateVtbl {
    pub fn of<T: VirtualTranslate>() -> &'static Self {
        &VirtualTranslateVtbl {
            virt_to_phys_list: c_virt_to_phys_list::<T>,
        }
    }
}

/// Reads a status code and out parameter written by a thunk.
pub(crate) fn call_out<T>(f: impl FnOnce(&mut MaybeUninit<T>) -> i32) -> Result<T> {
    let mut out = MaybeUninit::uninit();
    let res = f(&mut out);
    crate::error::result_from_int(res, out)
}

/// Forwards a memory trait of a bundle to one of its tables.
///
/// `$vtbl` names the field holding the table, the instance lives in the `instance` field.
macro_rules! forward_physical_memory {
    ($ty:ty, $vtbl:ident) => {
        impl $crate::mem::PhysicalMemory for $ty {
            fn phys_read_raw_list(
                &mut self,
                data: &mut [$crate::mem::PhysicalReadData],
            ) -> $crate::error::Result<()> {
                $crate::error::result_from_int_void(unsafe {
                    (self.$vtbl.phys_read_raw_list)(self.instance.as_ptr(), data.into())
                })
            }

            fn phys_write_raw_list(
                &mut self,
                data: &[$crate::mem::PhysicalWriteData],
            ) -> $crate::error::Result<()> {
                $crate::error::result_from_int_void(unsafe {
                    (self.$vtbl.phys_write_raw_list)(self.instance.as_ptr(), data.into())
                })
            }

            fn metadata(&self) -> $crate::mem::PhysicalMemoryMetadata {
                unsafe { (self.$vtbl.metadata)(self.instance.as_ptr()) }
            }

            fn set_mem_map(&mut self, mem_map: &[$crate::mem::PhysicalMemoryMapping]) {
                unsafe { (self.$vtbl.set_mem_map)(self.instance.as_ptr(), mem_map.into()) }
            }
        }
    };
}

macro_rules! forward_virtual_memory {
    ($ty:ty, $vtbl:ident) => {
        impl $crate::mem::VirtualMemory for $ty {
            fn virt_read_raw_list(
                &mut self,
                data: &mut [$crate::mem::ReadData],
            ) -> $crate::error::Result<()> {
                $crate::error::result_from_int_void(unsafe {
                    (self.$vtbl.virt_read_raw_list)(self.instance.as_ptr(), data.into())
                })
            }

            fn virt_write_raw_list(
                &mut self,
                data: &[$crate::mem::WriteData],
            ) -> $crate::error::Result<()> {
                $crate::error::result_from_int_void(unsafe {
                    (self.$vtbl.virt_write_raw_list)(self.instance.as_ptr(), data.into())
                })
            }
        }
    };
}

macro_rules! forward_virtual_translate {
    ($ty:ty, $vtbl:ident) => {
        impl $crate::mem::VirtualTranslate for $ty {
            fn virt_to_phys_list(
                &mut self,
                addrs: &[$crate::mem::MemoryRange],
                out: $crate::mem::VirtualTranslationCallback,
                out_fail: $crate::mem::VirtualTranslationFailCallback,
            ) {
                unsafe {
                    (self.$vtbl.virt_to_phys_list)(
                        self.instance.as_ptr(),
                        addrs.into(),
                        out,
                        out_fail,
                    )
                }
            }
        }
    };
}

pub(crate) use {forward_physical_memory, forward_virtual_memory, forward_virtual_translate};

#[cfg(test)]
mod tests {
    use super::*;
    use crate::error::{Error, ErrorKind, ErrorOrigin};
    use crate::mem::MemData;
    use crate::types::{umem, Address};

    #[derive(Clone, Default)]
    struct Flat {
        buf: Vec<u8>,
        mappings: usize,
    }

    impl PhysicalMemory for Flat {
        fn phys_read_raw_list(&mut self, data: &mut [PhysicalReadData]) -> Result<()> {
            let mut res = Ok(());
            for MemData(addr, out) in data.iter_mut() {
                let start = addr.to_umem() as usize;
                match self.buf.get(start..start + out.len()) {
                    Some(src) => out.copy_from_slice(src),
                    None => res = Err(Error(ErrorOrigin::PhysicalMemory, ErrorKind::UnableToReadMemory)),
                }
            }
            res
        }

        fn phys_write_raw_list(&mut self, data: &[PhysicalWriteData]) -> Result<()> {
            for MemData(addr, src) in data.iter() {
                let start = addr.to_umem() as usize;
                self.buf[start..start + src.len()].copy_from_slice(src);
            }
            Ok(())
        }

        fn metadata(&self) -> PhysicalMemoryMetadata {
            PhysicalMemoryMetadata {
                max_address: Address::from(self.buf.len() as umem - 1),
                real_size: self.buf.len() as umem,
                readonly: false,
            }
        }

        fn set_mem_map(&mut self, mem_map: &[PhysicalMemoryMapping]) {
            self.mappings = mem_map.len();
        }
    }

    #[test]
    fn thunks_dispatch() {
        let mut flat = Flat {
            buf: vec![0; 0x100],
            mappings: 0,
        };
        let vtbl = PhysicalMemoryVtbl::of::<Flat>();
        let this = &mut flat as *mut Flat as *mut c_void;

        let data: [PhysicalWriteData; 1] =
            [MemData(Address::from(0x10u64).into(), (&[1u8, 2, 3][..]).into())];
        assert_eq!(unsafe { (vtbl.phys_write_raw_list)(this, (&data[..]).into()) }, 0);

        let mut out = [0u8; 3];
        let mut data: [PhysicalReadData; 1] =
            [MemData(Address::from(0x10u64).into(), (&mut out[..]).into())];
        assert_eq!(unsafe { (vtbl.phys_read_raw_list)(this, (&mut data[..]).into()) }, 0);
        assert_eq!(out, [1, 2, 3]);

        let mut out = [0u8; 4];
        let mut data: [PhysicalReadData; 1] =
            [MemData(Address::from(0xfeu64).into(), (&mut out[..]).into())];
        let res = unsafe { (vtbl.phys_read_raw_list)(this, (&mut data[..]).into()) };
        assert_eq!(
            Error::from_i32(res),
            Error(ErrorOrigin::PhysicalMemory, ErrorKind::UnableToReadMemory)
        );

        let meta = unsafe { (vtbl.metadata)(this) };
        assert_eq!(meta.real_size, 0x100);

        let map = [PhysicalMemoryMapping {
            base: Address::NULL,
            size: 0x100,
            real_base: Address::NULL,
        }];
        unsafe { (vtbl.set_mem_map)(this, (&map[..]).into()) };
        assert_eq!(flat.mappings, 1);
    }

    #[test]
    fn clone_keeps_context() {
        let ctx_arc = std::sync::Arc::new(());
        let ctx: COptArc<c_void> = crate::types::CArc::from_arc(ctx_arc.clone())
            .into_opaque()
            .into();
        let original = CtxBox::new(Flat::default(), ctx);
        let vtbl = CloneVtbl::of::<Flat>();
        let copy = vtbl.clone_box(&original);
        assert_eq!(std::sync::Arc::strong_count(&ctx_arc), 3);
        std::mem::drop(original);
        assert_eq!(std::sync::Arc::strong_count(&ctx_arc), 2);
        std::mem::drop(copy);
        assert_eq!(std::sync::Arc::strong_count(&ctx_arc), 1);
    }
}
