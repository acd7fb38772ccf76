//! Boundary with the host runtime's memory manager.
//!
//! Maps and iterator states are not destroyed by the engine. Each one is
//! registered with the host together with a destructor, and the host runs
//! that destructor exactly once when its own reference count for the object
//! drops to zero. The engine never calls the host's reclamation path.

use core::ffi::c_void;
use core::marker::{PhantomData, PhantomPinned};
use core::ptr::NonNull;

/// Destructor registered for a managed object; receives the object's data
/// pointer.
pub type Destructor = unsafe extern "C" fn(data: *mut c_void);

/// The host's handle for a managed object. Only ever seen behind a pointer.
#[repr(C)]
pub struct MemInfo {
    _data: [u8; 0],
    _marker: PhantomData<(*mut u8, PhantomPinned)>,
}

/// What the engine needs from a host memory manager.
pub trait HostMemory {
    /// Take over the lifetime of `data`; `dtor(data)` runs once when the
    /// host is done with it.
    ///
    /// # Safety
    /// `dtor` must be the correct destructor for `data`.
    unsafe fn manage(&self, data: *mut c_void, dtor: Destructor) -> *mut MemInfo;
}

/// The function table a numba-style runtime hands to native extensions.
/// Field order is the C layout of that table.
#[repr(C)]
pub struct NrtApiTable {
    pub allocate: unsafe extern "C" fn(size: usize) -> *mut MemInfo,
    pub manage_memory: unsafe extern "C" fn(data: *mut c_void, dtor: Destructor) -> *mut MemInfo,
    pub acquire: unsafe extern "C" fn(mi: *mut MemInfo),
    pub release: unsafe extern "C" fn(mi: *mut MemInfo),
    pub get_data: unsafe extern "C" fn(mi: *mut MemInfo) -> *mut c_void,
}

impl HostMemory for NrtApiTable {
    unsafe fn manage(&self, data: *mut c_void, dtor: Destructor) -> *mut MemInfo {
        (self.manage_memory)(data, dtor)
    }
}

/// Destructor for any engine object boxed by `register`.
pub(crate) unsafe extern "C" fn drop_boxed<T>(data: *mut c_void) {
    drop(Box::from_raw(data.cast::<T>()));
}

/// Box `object`, hand it to the host with its destructor and store the
/// returned handle in `*meminfo`.
///
/// # Safety
/// `meminfo` must be valid for a write.
pub(crate) unsafe fn register<T, H>(meminfo: *mut *mut MemInfo, host: &H, object: T) -> NonNull<T>
where
    H: HostMemory + ?Sized,
{
    let raw = NonNull::from(Box::leak(Box::new(object)));
    *meminfo = host.manage(raw.as_ptr().cast(), drop_boxed::<T>);
    raw
}
