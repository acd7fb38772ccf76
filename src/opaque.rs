//! Engine-owned copies of opaque keys and values.
//!
//! Every opaque byte buffer the engine holds goes through `OpaqueBuf`, so the
//! allocation, copy and free paths live in one place.

use core::ffi::c_void;
use core::fmt;
use core::ptr::{self, NonNull};
use std::alloc::{self, Layout};

/// Alignment of every opaque allocation. Matches what `malloc` guarantees on
/// the platforms the host runtime targets, so callbacks may read the bytes as
/// any plain C struct.
const ALIGN: usize = 16;

/// A heap buffer of a fixed, caller-declared size holding a copy of an
/// opaque key or value.
///
/// Dropping the buffer only frees the memory. Running the decrement callback
/// is the job of [`crate::TypeInfo::release`].
pub struct OpaqueBuf {
    ptr: NonNull<u8>,
    size: usize,
}

impl OpaqueBuf {
    fn layout(size: usize) -> Layout {
        // Zero-sized requests still get a unique, freeable address.
        Layout::from_size_align(size.max(1), ALIGN).expect("opaque byte size overflows isize")
    }

    /// Allocate `size` bytes and copy them from `src`.
    ///
    /// Allocation failure aborts through `handle_alloc_error`.
    ///
    /// # Safety
    /// `src` must be valid for reads of `size` bytes. It may be null only
    /// when `size` is zero.
    pub unsafe fn copy_from(src: *const c_void, size: usize) -> Self {
        let layout = Self::layout(size);
        let raw = alloc::alloc(layout);
        let Some(ptr) = NonNull::new(raw) else {
            alloc::handle_alloc_error(layout)
        };
        if size > 0 {
            ptr::copy_nonoverlapping(src.cast::<u8>(), ptr.as_ptr(), size);
        }
        Self { ptr, size }
    }

    /// Address handed to callbacks and returned from lookups.
    #[inline]
    pub fn as_ptr(&self) -> *mut c_void {
        self.ptr.as_ptr().cast()
    }

    #[inline]
    pub fn len(&self) -> usize {
        self.size
    }

    #[inline]
    pub fn is_empty(&self) -> bool {
        self.size == 0
    }

    pub fn as_bytes(&self) -> &[u8] {
        // SAFETY: `ptr` owns `size` initialized bytes for the lifetime of `self`.
        unsafe { core::slice::from_raw_parts(self.ptr.as_ptr(), self.size) }
    }

    /// Copy the bytes out to `dst`.
    ///
    /// # Safety
    /// `dst` must be valid for writes of `self.len()` bytes and must not
    /// overlap this buffer.
    pub unsafe fn copy_to(&self, dst: *mut c_void) {
        if self.size > 0 {
            ptr::copy_nonoverlapping(self.ptr.as_ptr(), dst.cast::<u8>(), self.size);
        }
    }
}

impl Drop for OpaqueBuf {
    fn drop(&mut self) {
        // SAFETY: allocated in `copy_from` with the same layout.
        unsafe { alloc::dealloc(self.ptr.as_ptr(), Self::layout(self.size)) }
    }
}

impl fmt::Debug for OpaqueBuf {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("OpaqueBuf")
            .field("ptr", &self.ptr)
            .field("size", &self.size)
            .finish()
    }
}
