//! TypedHashMap: ownership-aware mutators on top of the storage core.
//!
//! The pair of kinds `(K, V)` selects one of four variants at compile time:
//!
//! | key    | value  | alias                    | owned buffers     |
//! |--------|--------|--------------------------|-------------------|
//! | scalar | scalar | `NumericHashMap<K, V>`   | none              |
//! | scalar | opaque | `GenericValueHashMap<K>` | one per value     |
//! | opaque | scalar | `GenericKeyHashMap<V>`   | one per key       |
//! | opaque | opaque | `GenericHashMap`         | one per key/value |
//!
//! Ownership rules, applied uniformly through `Kind`:
//! - A key is copied and incremented once, when it first becomes occupied.
//!   Re-setting a present key never touches the key.
//! - A value is copied and incremented on every `set`. The value it
//!   replaces is released (decrement, then free) after the increment.
//! - `pop`/`take` release the key but hand the value to the caller without
//!   its decrement.
//! - `clear` and `Drop` release every key and value still held.
//!
//! Increment hooks receive the caller's pointer, not the engine's copy; the
//! caller's handle is treated as the refcounted identity.

use core::ffi::c_void;

use crate::config::{CreateError, CreateParams};
use crate::kind::{KeyKind, Kind, Opaque, Scalar, ScalarKey};
use crate::reentrancy::DebugEpoch;
use crate::storage::{Iter, Storage};
use crate::strategy::ScalarStrategy;
use crate::type_info::TypeInfo;

pub struct TypedHashMap<K: KeyKind, V: Kind> {
    storage: Storage<K, V>,
    key_info: TypeInfo,
    val_info: TypeInfo,
    pub(crate) epoch: DebugEpoch,
}

pub type NumericHashMap<K, V> = TypedHashMap<K, V>;
pub type GenericKeyHashMap<V> = TypedHashMap<Opaque, V>;
pub type GenericValueHashMap<K> = TypedHashMap<K, Opaque>;
pub type GenericHashMap = TypedHashMap<Opaque, Opaque>;

impl<K: KeyKind, V: Kind> TypedHashMap<K, V> {
    /// Assemble a map from already-checked parts.
    ///
    /// # Safety
    /// Hooks in `key_info`/`val_info` and the callbacks behind `strategy`
    /// must accept any pointer to bytes of the declared sizes.
    pub unsafe fn from_parts(key_info: TypeInfo, val_info: TypeInfo, strategy: K::Strategy) -> Self {
        Self {
            storage: Storage::with_strategy(strategy),
            key_info,
            val_info,
            epoch: DebugEpoch::new(),
        }
    }

    /// Build a map from `create` parameters, rejecting flags that disagree
    /// with `K`/`V` and incomplete opaque descriptions.
    ///
    /// # Safety
    /// As for [`TypedHashMap::from_parts`], for every callback in `params`.
    pub unsafe fn from_params(params: &CreateParams) -> Result<Self, CreateError> {
        params.validate::<K, V>()?;
        let strategy = K::strategy(params)?;
        Ok(Self::from_parts(params.key_info(), params.val_info(), strategy))
    }

    pub fn key_info(&self) -> &TypeInfo {
        &self.key_info
    }

    pub fn val_info(&self) -> &TypeInfo {
        &self.val_info
    }

    pub fn len(&self) -> usize {
        self.storage.len()
    }

    pub fn is_empty(&self) -> bool {
        self.storage.is_empty()
    }

    /// # Safety
    /// An opaque `key` must be readable for the map's key size.
    pub unsafe fn contains_key(&self, key: K::Arg) -> bool {
        self.storage.contains_key(key)
    }

    /// Copy out the value stored for `key`. For opaque values this is the
    /// address of the engine's buffer; it stays owned by the map.
    ///
    /// # Safety
    /// As for [`TypedHashMap::contains_key`].
    pub unsafe fn lookup(&self, key: K::Arg) -> Option<V::Arg> {
        self.storage.lookup(key)
    }

    /// Insert or overwrite; the last write wins.
    ///
    /// # Safety
    /// Opaque arguments must be readable for the declared sizes.
    pub unsafe fn set(&mut self, key: K::Arg, value: V::Arg) {
        self.epoch.bump();
        let probe = self.storage.probe(key);
        match probe.slot {
            Some(slot) => {
                // `value` may alias the buffer being replaced.
                let fresh = V::store(&self.val_info, value);
                V::acquire(&self.val_info, value);
                if let Some(old) = self.storage.replace_value(slot, fresh) {
                    V::release(&self.val_info, old);
                }
            }
            None => {
                let stored_key = K::store(&self.key_info, key);
                let stored_val = V::store(&self.val_info, value);
                self.storage.insert_new(probe.hash, stored_key, stored_val);
                K::acquire(&self.key_info, key);
                V::acquire(&self.val_info, value);
            }
        }
    }

    /// Remove `key` and hand its stored value to the caller. The key is
    /// released; the value's decrement does not run. An opaque value comes
    /// back as an `OpaqueBuf` that only frees memory when dropped.
    ///
    /// # Safety
    /// As for [`TypedHashMap::contains_key`].
    pub unsafe fn take(&mut self, key: K::Arg) -> Option<V::Stored> {
        let slot = self.storage.probe(key).slot?;
        self.epoch.bump();
        let (k, v) = self.storage.remove(slot)?;
        K::release(&self.key_info, k);
        Some(v)
    }

    /// Remove `key`, writing its value to `out`. Returns false and leaves
    /// `out` untouched when the key is absent.
    ///
    /// # Safety
    /// As for [`TypedHashMap::contains_key`]; `out` must be writable for
    /// the value size whenever the key is present.
    pub unsafe fn pop(&mut self, key: K::Arg, out: *mut c_void) -> bool {
        match self.take(key) {
            Some(v) => {
                V::surrender(&self.val_info, v, out);
                true
            }
            None => false,
        }
    }

    /// Release every key and value, then empty the table.
    pub fn clear(&mut self) {
        self.epoch.bump();
        self.release_all();
    }

    /// Merge `other` into `self` with `set` semantics; `other` wins on
    /// collisions and is left untouched. Every copied entry is owned and
    /// counted by `self` independently of `other`.
    ///
    /// # Safety
    /// `other` must describe the same key and value types as `self`.
    pub unsafe fn update(&mut self, other: &Self) {
        debug_assert_eq!(self.key_info.size(), other.key_info.size());
        debug_assert_eq!(self.val_info.size(), other.val_info.size());
        self.storage.reserve(other.len());
        for (k, v) in other.iter() {
            self.set(k, v);
        }
    }

    /// Iterate `(key, value)` handles without transferring ownership.
    pub fn iter(&self) -> Iter<'_, K, V> {
        self.storage.iter()
    }

    /// Render the table for debugging: a header, then one `key, value`
    /// line per entry. Opaque sides print their buffer address.
    #[cfg(debug_assertions)]
    pub fn dump(&self) -> String {
        use core::fmt::Write;

        let mut out = format!("Hashmap at: {:p}, size = {}\n", self, self.len());
        for (k, v) in self.iter() {
            tracing::debug!(key = ?k, value = ?v, "hashmap entry");
            let _ = writeln!(out, "key, value: {:?}, {:?}", k, v);
        }
        out
    }

    fn release_all(&mut self) {
        if !(K::OPAQUE || V::OPAQUE) {
            let _ = self.storage.take_all();
            return;
        }
        for (k, v) in self.storage.take_all() {
            // SAFETY: every stored item was acquired by this map.
            unsafe {
                K::release(&self.key_info, k);
                V::release(&self.val_info, v);
            }
        }
    }
}

impl<K: KeyKind, V: Kind> Drop for TypedHashMap<K, V> {
    fn drop(&mut self) {
        tracing::debug!(
            entries = self.len(),
            opaque_key = K::OPAQUE,
            opaque_value = V::OPAQUE,
            "releasing hashmap"
        );
        self.release_all();
    }
}

impl<K: KeyKind, V: Kind> core::fmt::Debug for TypedHashMap<K, V> {
    fn fmt(&self, f: &mut core::fmt::Formatter<'_>) -> core::fmt::Result {
        f.debug_map().entries(self.iter()).finish()
    }
}

/// Safe surface for maps whose key and value are both scalars: scalar
/// arguments are never dereferenced and no hooks exist.
impl<K: ScalarKey, V: Scalar> TypedHashMap<K, V> {
    pub fn new() -> Self {
        // SAFETY: scalar descriptors carry no hooks.
        unsafe {
            Self::from_parts(
                TypeInfo::scalar::<K>(),
                TypeInfo::scalar::<V>(),
                ScalarStrategy::default(),
            )
        }
    }

    /// Build from parallel key/value slices; equivalent to `insert` per
    /// index in order, so later duplicates win.
    pub fn from_arrays(keys: &[K], values: &[V]) -> Self {
        debug_assert_eq!(keys.len(), values.len(), "key and value arrays differ in length");
        let mut m = Self::new();
        m.storage.reserve(keys.len());
        for (&k, &v) in keys.iter().zip(values) {
            m.insert(k, v);
        }
        tracing::trace!(len = keys.len(), distinct = m.len(), "built hashmap from arrays");
        m
    }

    /// Build with every key in `keys` mapped to `value`.
    pub fn from_keys(keys: &[K], value: V) -> Self {
        let mut m = Self::new();
        m.storage.reserve(keys.len());
        for &k in keys {
            m.insert(k, value);
        }
        m
    }

    pub fn insert(&mut self, key: K, value: V) {
        // SAFETY: scalars are passed by value.
        unsafe { self.set(key, value) }
    }

    pub fn get(&self, key: K) -> Option<V> {
        // SAFETY: scalars are passed by value.
        unsafe { self.lookup(key) }
    }

    pub fn contains(&self, key: K) -> bool {
        // SAFETY: scalars are passed by value.
        unsafe { self.contains_key(key) }
    }

    pub fn remove(&mut self, key: K) -> Option<V> {
        // SAFETY: scalars are passed by value.
        unsafe { self.take(key) }
    }

    pub fn extend_from(&mut self, other: &Self) {
        // SAFETY: both sides are the same scalar types.
        unsafe { self.update(other) }
    }
}

impl<K: ScalarKey> TypedHashMap<K, i64> {
    /// Map every element of `data` to its position; with duplicates the last
    /// position wins.
    pub fn positions(data: &[K]) -> Self {
        let mut m = Self::new();
        m.storage.reserve(data.len());
        for (i, &k) in data.iter().enumerate() {
            m.insert(k, i as i64);
        }
        m
    }
}

impl<K: ScalarKey, V: Scalar> Default for TypedHashMap<K, V> {
    fn default() -> Self {
        Self::new()
    }
}
