//! Typed entry points for the dispatch layer.
//!
//! Compiled code only ever holds a `*mut c_void` for a map or iterator. The
//! dispatch layer picks the `(K, V)` instantiation from the static key and
//! value types it was compiled for and forwards to the functions here; each
//! one reinterprets the pointer as that variant. No runtime tag is stored,
//! so calling with the wrong `(K, V)` is undefined behavior.
//!
//! Raw-pointer conventions follow the host ABI:
//! - lookup/iternext outputs receive a `K::Arg`/`V::Arg` (the scalar or the
//!   opaque buffer address);
//! - pop writes the value itself (scalar or `val_size` bytes) to `res`.

use core::ffi::c_void;
use core::ptr::NonNull;

use crate::config::{CreateError, CreateParams};
use crate::host::{register, HostMemory, MemInfo};
use crate::iter_state::{IterState, IterStatus};
use crate::kind::{KeyKind, Kind, Scalar, ScalarKey};
use crate::typed_map::TypedHashMap;

#[inline]
unsafe fn map_ref<'a, K: KeyKind, V: Kind>(p: *mut c_void) -> &'a TypedHashMap<K, V> {
    &*p.cast::<TypedHashMap<K, V>>()
}

#[inline]
unsafe fn map_mut<'a, K: KeyKind, V: Kind>(p: *mut c_void) -> &'a mut TypedHashMap<K, V> {
    &mut *p.cast::<TypedHashMap<K, V>>()
}

unsafe fn slice_or_empty<'a, T>(data: *const T, len: u64) -> &'a [T] {
    if len == 0 {
        &[]
    } else {
        core::slice::from_raw_parts(data, len as usize)
    }
}

/// Create a map of variant `(K, V)` and register it with `host`.
///
/// # Safety
/// `meminfo` must be writable. Every callback in `params` must accept
/// pointers to bytes of the declared sizes.
pub unsafe fn hashmap_create<K, V, H>(
    meminfo: *mut *mut MemInfo,
    host: &H,
    params: &CreateParams,
) -> Result<NonNull<c_void>, CreateError>
where
    K: KeyKind,
    V: Kind,
    H: HostMemory + ?Sized,
{
    let map = TypedHashMap::<K, V>::from_params(params).map_err(|e| {
        tracing::warn!(error = %e, "rejected hashmap creation");
        e
    })?;
    tracing::debug!(
        opaque_key = K::OPAQUE,
        opaque_value = V::OPAQUE,
        key_size = params.key_size,
        val_size = params.val_size,
        "created hashmap"
    );
    Ok(register(meminfo, host, map).cast())
}

/// Create a scalar map from `len` keys and values, as if by `set` per index.
///
/// # Safety
/// `keys` and `values` must be readable for `len` elements; `meminfo` must
/// be writable.
pub unsafe fn hashmap_create_from_arrays<K, V, H>(
    meminfo: *mut *mut MemInfo,
    host: &H,
    keys: *const K,
    values: *const V,
    len: u64,
) -> NonNull<c_void>
where
    K: ScalarKey,
    V: Scalar,
    H: HostMemory + ?Sized,
{
    let keys = slice_or_empty(keys, len);
    let values = slice_or_empty(values, len);
    let map = TypedHashMap::<K, V>::from_arrays(keys, values);
    register(meminfo, host, map).cast()
}

/// Create a scalar map with every key in `keys` mapped to `value`.
///
/// # Safety
/// As for [`hashmap_create_from_arrays`].
pub unsafe fn hashmap_create_from_keys<K, V, H>(
    meminfo: *mut *mut MemInfo,
    host: &H,
    keys: *const K,
    len: u64,
    value: V,
) -> NonNull<c_void>
where
    K: ScalarKey,
    V: Scalar,
    H: HostMemory + ?Sized,
{
    let map = TypedHashMap::<K, V>::from_keys(slice_or_empty(keys, len), value);
    register(meminfo, host, map).cast()
}

/// Create a `K -> i64` map from `data[i] -> i`; the last position wins.
///
/// # Safety
/// As for [`hashmap_create_from_arrays`].
pub unsafe fn hashmap_build_map_positions<K, H>(
    meminfo: *mut *mut MemInfo,
    host: &H,
    data: *const K,
    len: u64,
) -> NonNull<c_void>
where
    K: ScalarKey,
    H: HostMemory + ?Sized,
{
    let map = TypedHashMap::<K, i64>::positions(slice_or_empty(data, len));
    tracing::trace!(len, distinct = map.len(), "built position map");
    register(meminfo, host, map).cast()
}

/// # Safety
/// `map` must be a live `(K, V)` map.
pub unsafe fn hashmap_size<K: KeyKind, V: Kind>(map: *mut c_void) -> u64 {
    map_ref::<K, V>(map).len() as u64
}

/// # Safety
/// `map` must be a live `(K, V)` map; opaque arguments must be readable
/// for the declared sizes.
pub unsafe fn hashmap_set<K: KeyKind, V: Kind>(map: *mut c_void, key: K::Arg, val: V::Arg) {
    map_mut::<K, V>(map).set(key, val)
}

/// # Safety
/// As for [`hashmap_set`].
pub unsafe fn hashmap_contains<K: KeyKind, V: Kind>(map: *mut c_void, key: K::Arg) -> bool {
    map_ref::<K, V>(map).contains_key(key)
}

/// Write the value stored for `key` to `*res`. `res` is not touched when
/// the key is absent.
///
/// # Safety
/// As for [`hashmap_set`]; `res` must be writable when the key is present.
pub unsafe fn hashmap_lookup<K: KeyKind, V: Kind>(
    map: *mut c_void,
    key: K::Arg,
    res: *mut V::Arg,
) -> bool {
    match map_ref::<K, V>(map).lookup(key) {
        Some(v) => {
            res.write(v);
            true
        }
        None => false,
    }
}

/// # Safety
/// `map` must be a live `(K, V)` map.
pub unsafe fn hashmap_clear<K: KeyKind, V: Kind>(map: *mut c_void) {
    map_mut::<K, V>(map).clear()
}

/// Remove `key`, transferring its value to `res`.
///
/// # Safety
/// As for [`hashmap_lookup`].
pub unsafe fn hashmap_pop<K: KeyKind, V: Kind>(
    map: *mut c_void,
    key: K::Arg,
    res: *mut c_void,
) -> bool {
    map_mut::<K, V>(map).pop(key, res)
}

/// Merge `other` into `target`. Merging a map into itself leaves it as is.
///
/// # Safety
/// Both must be live `(K, V)` maps created with the same descriptors.
pub unsafe fn hashmap_update<K: KeyKind, V: Kind>(target: *mut c_void, other: *mut c_void) {
    if target == other {
        return;
    }
    let other = map_ref::<K, V>(other);
    map_mut::<K, V>(target).update(other)
}

/// Create a cursor over `map` and register it with `host`.
///
/// # Safety
/// `map` must be a live `(K, V)` map that outlives the cursor and is not
/// mutated while the cursor is used; `meminfo` must be writable.
pub unsafe fn hashmap_getiter<K, V, H>(
    meminfo: *mut *mut MemInfo,
    host: &H,
    map: *mut c_void,
) -> NonNull<c_void>
where
    K: KeyKind,
    V: Kind,
    H: HostMemory + ?Sized,
{
    let target = NonNull::new_unchecked(map.cast::<TypedHashMap<K, V>>());
    let state = IterState::new(target);
    register(meminfo, host, state).cast()
}

/// Copy out the next entry and advance. Output slots are only written when
/// an entry is yielded.
///
/// # Safety
/// `iter` must be a live cursor from `hashmap_getiter::<K, V, _>` whose map
/// satisfies that function's contract; outputs must be writable.
pub unsafe fn hashmap_iternext<K: KeyKind, V: Kind>(
    iter: *mut c_void,
    ret_key: *mut K::Arg,
    ret_val: *mut V::Arg,
) -> IterStatus {
    let state = &mut *iter.cast::<IterState<K, V>>();
    match state.next_entry() {
        Some((k, v)) => {
            ret_key.write(k);
            ret_val.write(v);
            IterStatus::Yielded
        }
        None => IterStatus::Exhausted,
    }
}

/// Render `map` for debugging.
///
/// # Safety
/// `map` must be a live `(K, V)` map.
#[cfg(debug_assertions)]
pub unsafe fn hashmap_dump<K: KeyKind, V: Kind>(map: *mut c_void) -> String {
    map_ref::<K, V>(map).dump()
}
