/*!
FFI-safe reference counted pointers.

Both types are thin wrappers around `std::sync::Arc`. The reference count is manipulated through
function pointers carried alongside the object, so a count that was created inside a plugin is
always incremented and released by the code that allocated it.
*/

use core::ffi::c_void;
use core::ops::Deref;
use std::sync::Arc;

unsafe extern "C" fn c_clone<T>(ptr: *const T) -> *const T {
    Arc::increment_strong_count(ptr);
    ptr
}

unsafe extern "C" fn c_drop<T>(ptr: *const T) {
    Arc::decrement_strong_count(ptr);
}

type CloneFn<T> = unsafe extern "C" fn(*const T) -> *const T;
type DropFn<T> = unsafe extern "C" fn(*const T);

/// Non-nullable atomically reference counted pointer.
#[repr(C)]
pub struct CArc<T: 'static> {
    instance: *const T,
    clone_fn: CloneFn<T>,
    drop_fn: DropFn<T>,
}

unsafe impl<T: Sync + Send> Send for CArc<T> {}
unsafe impl<T: Sync + Send> Sync for CArc<T> {}

impl<T> From<T> for CArc<T> {
    fn from(obj: T) -> Self {
        Self::from_arc(Arc::new(obj))
    }
}

impl<T> CArc<T> {
    /// Takes over one strong reference of `arc`.
    pub fn from_arc(arc: Arc<T>) -> Self {
        Self {
            instance: Arc::into_raw(arc),
            clone_fn: c_clone::<T>,
            drop_fn: c_drop::<T>,
        }
    }

    /// Erases the type of the pointee.
    ///
    /// The erased arc can still be cloned and dropped, which is all a library context needs.
    pub fn into_opaque(self) -> CArc<c_void>
    where
        T: Send + Sync,
    {
        let ret = CArc {
            instance: self.instance as *const c_void,
            clone_fn: unsafe { core::mem::transmute::<CloneFn<T>, CloneFn<c_void>>(self.clone_fn) },
            drop_fn: unsafe { core::mem::transmute::<DropFn<T>, DropFn<c_void>>(self.drop_fn) },
        };
        core::mem::forget(self);
        ret
    }

    pub fn as_ptr(&self) -> *const T {
        self.instance
    }
}

impl<T> Clone for CArc<T> {
    fn clone(&self) -> Self {
        Self {
            instance: unsafe { (self.clone_fn)(self.instance) },
            clone_fn: self.clone_fn,
            drop_fn: self.drop_fn,
        }
    }
}

impl<T> Drop for CArc<T> {
    fn drop(&mut self) {
        unsafe { (self.drop_fn)(self.instance) }
    }
}

impl<T> Deref for CArc<T> {
    type Target = T;

    fn deref(&self) -> &T {
        unsafe { &*self.instance }
    }
}

impl<T> AsRef<T> for CArc<T> {
    fn as_ref(&self) -> &T {
        self
    }
}

/// Nullable counterpart of [`CArc`].
#[repr(C)]
pub struct COptArc<T: 'static> {
    instance: *const T,
    clone_fn: Option<CloneFn<T>>,
    drop_fn: Option<DropFn<T>>,
}

unsafe impl<T: Sync + Send> Send for COptArc<T> {}
unsafe impl<T: Sync + Send> Sync for COptArc<T> {}

impl<T> COptArc<T> {
    pub const fn none() -> Self {
        Self {
            instance: core::ptr::null(),
            clone_fn: None,
            drop_fn: None,
        }
    }

    pub fn is_some(&self) -> bool {
        !self.instance.is_null()
    }

    pub fn as_ref(&self) -> Option<&T> {
        if self.is_some() {
            Some(unsafe { &*self.instance })
        } else {
            None
        }
    }

    pub fn take(&mut self) -> Self {
        core::mem::replace(self, Self::none())
    }
}

impl<T> Default for COptArc<T> {
    fn default() -> Self {
        Self::none()
    }
}

impl<T> From<CArc<T>> for COptArc<T> {
    fn from(arc: CArc<T>) -> Self {
        let ret = Self {
            instance: arc.instance,
            clone_fn: Some(arc.clone_fn),
            drop_fn: Some(arc.drop_fn),
        };
        core::mem::forget(arc);
        ret
    }
}

impl<T> From<Option<CArc<T>>> for COptArc<T> {
    fn from(opt: Option<CArc<T>>) -> Self {
        opt.map(Self::from).unwrap_or_default()
    }
}

impl<T> From<COptArc<T>> for Option<CArc<T>> {
    fn from(mut opt: COptArc<T>) -> Self {
        let ret = match (opt.instance.is_null(), opt.clone_fn, opt.drop_fn) {
            (false, Some(clone_fn), Some(drop_fn)) => Some(CArc {
                instance: opt.instance,
                clone_fn,
                drop_fn,
            }),
            _ => None,
        };
        if ret.is_some() {
            opt.drop_fn = None;
        }
        ret
    }
}

impl<T> Clone for COptArc<T> {
    fn clone(&self) -> Self {
        match (self.instance.is_null(), self.clone_fn) {
            (false, Some(clone_fn)) => Self {
                instance: unsafe { clone_fn(self.instance) },
                clone_fn: self.clone_fn,
                drop_fn: self.drop_fn,
            },
            _ => Self::none(),
        }
    }
}

impl<T> Drop for COptArc<T> {
    fn drop(&mut self) {
        if let (false, Some(drop_fn)) = (self.instance.is_null(), self.drop_fn.take()) {
            unsafe { drop_fn(self.instance) }
        }
    }
}

// the C side relies on both arcs sharing one layout
const _: [(); core::mem::size_of::<CArc<u128>>()] = [(); core::mem::size_of::<COptArc<u128>>()];
