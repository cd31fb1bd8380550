/*!
FFI-safe building blocks shared by every vtable.
*/

use core::ffi::c_void;
use core::marker::PhantomData;
use core::ops::{Deref, DerefMut};

use super::arc::COptArc;

/// FFI-safe replacement for `Option<T>`.
#[repr(C, u8)]
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum COption<T> {
    None,
    Some(T),
}

impl<T> Default for COption<T> {
    fn default() -> Self {
        Self::None
    }
}

impl<T> From<Option<T>> for COption<T> {
    fn from(opt: Option<T>) -> Self {
        match opt {
            None => Self::None,
            Some(t) => Self::Some(t),
        }
    }
}

impl<T> From<COption<T>> for Option<T> {
    fn from(opt: COption<T>) -> Self {
        match opt {
            COption::None => None,
            COption::Some(t) => Some(t),
        }
    }
}

impl<T> COption<T> {
    pub fn is_some(&self) -> bool {
        matches!(self, COption::Some(_))
    }

    pub fn as_ref(&self) -> Option<&T> {
        match self {
            COption::None => None,
            COption::Some(t) => Some(t),
        }
    }

    pub fn take(&mut self) -> Option<T> {
        core::mem::take(self).into()
    }
}

/// Borrowed slice with a stable layout.
#[repr(C)]
pub struct CSliceRef<'a, T> {
    data: *const T,
    len: usize,
    _lifetime: PhantomData<&'a T>,
}

unsafe impl<'a, T: Sync> Send for CSliceRef<'a, T> {}
unsafe impl<'a, T: Sync> Sync for CSliceRef<'a, T> {}

impl<'a, T> Clone for CSliceRef<'a, T> {
    fn clone(&self) -> Self {
        *self
    }
}

impl<'a, T> Copy for CSliceRef<'a, T> {}

impl<'a, T> CSliceRef<'a, T> {
    pub fn len(&self) -> usize {
        self.len
    }

    pub fn is_empty(&self) -> bool {
        self.len == 0
    }

    pub fn as_ptr(&self) -> *const T {
        self.data
    }

    pub fn as_slice(&self) -> &'a [T] {
        if self.len == 0 || self.data.is_null() {
            &[]
        } else {
            unsafe { core::slice::from_raw_parts(self.data, self.len) }
        }
    }

    /// Constructs a slice from raw parts.
    ///
    /// # Safety
    ///
    /// `data` must point to `len` valid elements that live for `'a`.
    pub unsafe fn from_raw_parts(data: *const T, len: usize) -> Self {
        Self {
            data,
            len,
            _lifetime: PhantomData,
        }
    }
}

impl CSliceRef<'static, u8> {
    /// Usable in `static` plugin descriptors.
    pub const fn from_static_str(s: &'static str) -> Self {
        Self {
            data: s.as_ptr(),
            len: s.len(),
            _lifetime: PhantomData,
        }
    }
}

impl<'a> CSliceRef<'a, u8> {
    /// Interprets the bytes as a utf-8 string.
    ///
    /// Invalid sequences produce an empty string.
    pub fn as_str(&self) -> &'a str {
        core::str::from_utf8(self.as_slice()).unwrap_or("")
    }
}

impl<'a, T> From<&'a [T]> for CSliceRef<'a, T> {
    fn from(s: &'a [T]) -> Self {
        Self {
            data: s.as_ptr(),
            len: s.len(),
            _lifetime: PhantomData,
        }
    }
}

impl<'a> From<&'a str> for CSliceRef<'a, u8> {
    fn from(s: &'a str) -> Self {
        s.as_bytes().into()
    }
}

impl<'a, T> Deref for CSliceRef<'a, T> {
    type Target = [T];

    fn deref(&self) -> &[T] {
        self.as_slice()
    }
}

impl<'a, T: core::fmt::Debug> core::fmt::Debug for CSliceRef<'a, T> {
    fn fmt(&self, f: &mut core::fmt::Formatter<'_>) -> core::fmt::Result {
        f.debug_list().entries(self.as_slice()).finish()
    }
}

/// Mutably borrowed slice with a stable layout.
#[repr(C)]
pub struct CSliceMut<'a, T> {
    data: *mut T,
    len: usize,
    _lifetime: PhantomData<&'a mut T>,
}

unsafe impl<'a, T: Send> Send for CSliceMut<'a, T> {}
unsafe impl<'a, T: Sync> Sync for CSliceMut<'a, T> {}

impl<'a, T> CSliceMut<'a, T> {
    pub fn len(&self) -> usize {
        self.len
    }

    pub fn is_empty(&self) -> bool {
        self.len == 0
    }

    pub fn as_mut_ptr(&mut self) -> *mut T {
        self.data
    }

    /// Constructs a mutable slice from raw parts.
    ///
    /// # Safety
    ///
    /// `data` must point to `len` valid elements that are exclusively borrowed for `'a`.
    pub unsafe fn from_raw_parts(data: *mut T, len: usize) -> Self {
        Self {
            data,
            len,
            _lifetime: PhantomData,
        }
    }

    /// Converts the slice back into a native one for the full lifetime.
    pub fn into_slice(self) -> &'a mut [T] {
        if self.len == 0 || self.data.is_null() {
            &mut []
        } else {
            unsafe { core::slice::from_raw_parts_mut(self.data, self.len) }
        }
    }
}

impl<'a, T> From<&'a mut [T]> for CSliceMut<'a, T> {
    fn from(s: &'a mut [T]) -> Self {
        Self {
            data: s.as_mut_ptr(),
            len: s.len(),
            _lifetime: PhantomData,
        }
    }
}

impl<'a, T> Deref for CSliceMut<'a, T> {
    type Target = [T];

    fn deref(&self) -> &[T] {
        if self.len == 0 || self.data.is_null() {
            &[]
        } else {
            unsafe { core::slice::from_raw_parts(self.data, self.len) }
        }
    }
}

impl<'a, T> DerefMut for CSliceMut<'a, T> {
    fn deref_mut(&mut self) -> &mut [T] {
        if self.len == 0 || self.data.is_null() {
            &mut []
        } else {
            unsafe { core::slice::from_raw_parts_mut(self.data, self.len) }
        }
    }
}

impl<'a, T: core::fmt::Debug> core::fmt::Debug for CSliceMut<'a, T> {
    fn fmt(&self, f: &mut core::fmt::Formatter<'_>) -> core::fmt::Result {
        f.debug_list().entries(self.iter()).finish()
    }
}

unsafe extern "C" fn c_box_drop<T>(instance: *mut c_void) {
    let _ = Box::from_raw(instance as *mut T);
}

/// Type erased owning box.
///
/// The box remembers how to free its contents, so it can be dropped on either side of the
/// boundary.
#[repr(C)]
pub struct CBox<'a> {
    instance: *mut c_void,
    drop_fn: Option<unsafe extern "C" fn(*mut c_void)>,
    _lifetime: PhantomData<&'a mut ()>,
}

unsafe impl<'a> Send for CBox<'a> {}

impl<'a> CBox<'a> {
    /// Moves `obj` onto the heap and erases its type.
    pub fn new<T: 'a>(obj: T) -> Self {
        Self {
            instance: Box::into_raw(Box::new(obj)) as *mut c_void,
            drop_fn: Some(c_box_drop::<T>),
            _lifetime: PhantomData,
        }
    }

    pub fn as_ptr(&self) -> *mut c_void {
        self.instance
    }

    /// Takes the object back out of the box.
    ///
    /// # Safety
    ///
    /// `T` has to be the type the box was created with.
    pub unsafe fn into_inner<T>(mut self) -> T {
        self.drop_fn = None;
        *Box::from_raw(self.instance as *mut T)
    }
}

impl<'a> Drop for CBox<'a> {
    fn drop(&mut self) {
        if let Some(drop_fn) = self.drop_fn.take() {
            unsafe { drop_fn(self.instance) };
        }
    }
}

/// Owning box paired with the reference counted context of the library that produced it.
///
/// The instance is always dropped before the context, so a library can never be unloaded while
/// one of its objects is still alive.
#[repr(C)]
pub struct CtxBox<'a> {
    inner: CBox<'a>,
    ctx: COptArc<c_void>,
}

impl<'a> CtxBox<'a> {
    pub fn new<T: 'a>(obj: T, ctx: COptArc<c_void>) -> Self {
        Self {
            inner: CBox::new(obj),
            ctx,
        }
    }

    pub fn as_ptr(&self) -> *mut c_void {
        self.inner.as_ptr()
    }

    pub fn ctx(&self) -> &COptArc<c_void> {
        &self.ctx
    }

    /// Splits the box into its object and its context.
    ///
    /// # Safety
    ///
    /// `T` has to be the type the box was created with.
    pub unsafe fn into_parts<T>(self) -> (T, COptArc<c_void>) {
        let CtxBox { inner, ctx } = self;
        (inner.into_inner::<T>(), ctx)
    }
}
