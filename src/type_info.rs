use core::ffi::c_void;
use core::fmt;

use crate::opaque::OpaqueBuf;

/// Caller-supplied reference-count hook. Receives the address of the
/// opaque bytes whose count should change.
pub type RefcountFn = unsafe extern "C" fn(data: *mut c_void);

/// TypeInfo describes how the engine takes and gives up ownership of one
/// opaque type: its byte size plus optional increment/decrement hooks.
///
/// It plays the role `Rc::increment_strong_count` /
/// `Rc::decrement_strong_count` play for native Rust values, except that
/// the count lives in the caller's runtime and is reached through raw
/// function pointers.
///
/// Safety: the hooks are only invoked at occupancy transitions (new entry,
/// overwrite, erase, clear, destruction), never from read-only operations.
/// Whoever builds a `TypeInfo` with hooks vouches that they accept any
/// pointer to `size` bytes of the described type.
#[derive(Copy, Clone)]
pub struct TypeInfo {
    incref: Option<RefcountFn>,
    decref: Option<RefcountFn>,
    size: u64,
}

impl TypeInfo {
    pub const fn new(incref: Option<RefcountFn>, decref: Option<RefcountFn>, size: u64) -> Self {
        Self {
            incref,
            decref,
            size,
        }
    }

    /// Descriptor for a plain scalar: no hooks, size of `T`.
    pub const fn scalar<T>() -> Self {
        Self::new(None, None, core::mem::size_of::<T>() as u64)
    }

    #[inline]
    pub fn size(&self) -> usize {
        self.size as usize
    }

    #[inline]
    pub fn has_hooks(&self) -> bool {
        self.incref.is_some() || self.decref.is_some()
    }

    /// Copy `size` bytes from `src` into a fresh engine-owned buffer.
    /// No hook runs.
    ///
    /// # Safety
    /// `src` must be valid for reads of `self.size()` bytes.
    #[inline]
    pub(crate) unsafe fn copy(&self, src: *const c_void) -> OpaqueBuf {
        OpaqueBuf::copy_from(src, self.size())
    }

    /// Run the increment hook on `data`, if there is one.
    ///
    /// # Safety
    /// `data` must point to `self.size()` bytes of the described type.
    #[inline]
    pub(crate) unsafe fn increment(&self, data: *mut c_void) {
        if let Some(incref) = self.incref {
            incref(data);
        }
    }

    /// Give up an owned buffer: run the decrement hook on it, then free it.
    ///
    /// # Safety
    /// `buf` must hold bytes of the described type whose count was
    /// previously incremented by this map.
    #[inline]
    pub(crate) unsafe fn release(&self, buf: OpaqueBuf) {
        if let Some(decref) = self.decref {
            decref(buf.as_ptr());
        }
        drop(buf);
    }
}

impl fmt::Debug for TypeInfo {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("TypeInfo")
            .field("incref", &self.incref.is_some())
            .field("decref", &self.decref.is_some())
            .field("size", &self.size)
            .finish()
    }
}
