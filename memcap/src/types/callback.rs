/*!
Opaque, cancellable callbacks used by every enumeration across the plugin boundary.

A callback pairs a context pointer with a single function. The producer invokes it once per
item. Returning `false` from the function asks the producer to stop immediately.
*/

use core::ffi::c_void;
use core::marker::PhantomData;

/// Type erased callback handed to producers.
#[repr(C)]
pub struct OpaqueCallback<'a, T> {
    context: *mut c_void,
    func: extern "C" fn(*mut c_void, T) -> bool,
    _phantom: PhantomData<&'a mut c_void>,
}

impl<'a, T> OpaqueCallback<'a, T> {
    /// Constructs a callback from a raw context pointer and function.
    ///
    /// # Safety
    ///
    /// `func` has to accept `context` for the entirety of `'a`.
    pub unsafe fn from_raw(context: *mut c_void, func: extern "C" fn(*mut c_void, T) -> bool) -> Self {
        Self {
            context,
            func,
            _phantom: PhantomData,
        }
    }

    /// Invokes the callback. `false` means the consumer wants no more items.
    #[inline]
    pub fn call(&mut self, arg: T) -> bool {
        (self.func)(self.context, arg)
    }

    /// Feeds items from `iter` into the callback until either side is done.
    ///
    /// Items are pulled lazily, so a cancelled enumeration never produces the remaining items.
    /// Returns `true` if the iterator was fully consumed.
    pub fn feed<I: IntoIterator<Item = T>>(&mut self, iter: I) -> bool {
        for item in iter {
            if !self.call(item) {
                return false;
            }
        }
        true
    }
}

impl<'a, T, F: FnMut(T) -> bool> From<&'a mut F> for OpaqueCallback<'a, T> {
    fn from(func: &'a mut F) -> Self {
        extern "C" fn callback<T, F: FnMut(T) -> bool>(func: *mut c_void, data: T) -> bool {
            let func = unsafe { &mut *(func as *mut F) };
            func(data)
        }

        Self {
            context: func as *mut F as *mut c_void,
            func: callback::<T, F>,
            _phantom: PhantomData,
        }
    }
}

impl<'a, T> From<&'a mut Vec<T>> for OpaqueCallback<'a, T> {
    fn from(vec: &'a mut Vec<T>) -> Self {
        extern "C" fn callback<T>(vec: *mut c_void, data: T) -> bool {
            let vec = unsafe { &mut *(vec as *mut Vec<T>) };
            vec.push(data);
            true
        }

        Self {
            context: vec as *mut Vec<T> as *mut c_void,
            func: callback::<T>,
            _phantom: PhantomData,
        }
    }
}

impl<'a, T> Extend<T> for OpaqueCallback<'a, T> {
    fn extend<I: IntoIterator<Item = T>>(&mut self, iter: I) {
        self.feed(iter);
    }
}
