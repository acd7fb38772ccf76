//! Storage core shared by every map variant.
//!
//! Entries live in a `SlotMap`; a `hashbrown::HashTable` indexes them by
//! precomputed hash. The stored hash is reused on growth, so the key
//! strategy (and any caller hash callback behind it) runs only on the key
//! being probed, never during a rehash.
//!
//! This layer knows nothing about ownership hooks. It hands stored items
//! back to the caller on removal; `TypedHashMap` decides whether they are
//! released or surrendered.

use crate::kind::{KeyKind, Kind};
use crate::reentrancy::DebugReentrancy;
use crate::strategy::KeyStrategy;
use hashbrown::HashTable;
use slotmap::{DefaultKey, SlotMap};

struct Entry<KS, VS> {
    key: KS,
    value: VS,
    hash: u64,
}

pub struct Storage<K: KeyKind, V: Kind> {
    strategy: K::Strategy,
    index: HashTable<DefaultKey>,
    slots: SlotMap<DefaultKey, Entry<K::Stored, V::Stored>>,
    reentrancy: DebugReentrancy,
}

/// Where a probe landed: the key's hash, and the slot holding an equal key
/// if there is one.
pub(crate) struct Probe {
    pub(crate) hash: u64,
    pub(crate) slot: Option<DefaultKey>,
}

/// Iterator over `(key, value)` handles in slot order.
pub struct Iter<'a, K: KeyKind, V: Kind> {
    it: slotmap::basic::Iter<'a, DefaultKey, Entry<K::Stored, V::Stored>>,
}

impl<'a, K: KeyKind, V: Kind> Iterator for Iter<'a, K, V> {
    type Item = (K::Arg, V::Arg);

    #[inline]
    fn next(&mut self) -> Option<Self::Item> {
        self.it
            .next()
            .map(|(_, e)| (K::view(&e.key), V::view(&e.value)))
    }

    fn size_hint(&self) -> (usize, Option<usize>) {
        self.it.size_hint()
    }
}

impl<K: KeyKind, V: Kind> Storage<K, V> {
    pub fn with_strategy(strategy: K::Strategy) -> Self {
        Self {
            strategy,
            index: HashTable::new(),
            slots: SlotMap::with_key(),
            reentrancy: DebugReentrancy::new(),
        }
    }

    pub fn len(&self) -> usize {
        self.slots.len()
    }

    pub fn is_empty(&self) -> bool {
        self.slots.is_empty()
    }

    /// Hash `key` and look for an equal stored key.
    pub(crate) fn probe(&self, key: K::Arg) -> Probe {
        let _g = self.reentrancy.enter();
        let hash = self.strategy.hash(key);
        let slot = self
            .index
            .find(hash, |&k| {
                self.slots
                    .get(k)
                    .map(|e| self.strategy.equal(K::view(&e.key), key))
                    .unwrap_or(false)
            })
            .copied();
        Probe { hash, slot }
    }

    pub fn contains_key(&self, key: K::Arg) -> bool {
        self.probe(key).slot.is_some()
    }

    /// Copy out the value handle stored for `key`.
    pub fn lookup(&self, key: K::Arg) -> Option<V::Arg> {
        let slot = self.probe(key).slot?;
        self.slots.get(slot).map(|e| V::view(&e.value))
    }

    /// Add an entry for a key known to be absent; `hash` comes from the
    /// `probe` that established its absence.
    pub(crate) fn insert_new(&mut self, hash: u64, key: K::Stored, value: V::Stored) -> DefaultKey {
        let _g = self.reentrancy.enter();
        let k = self.slots.insert(Entry { key, value, hash });
        let slots = &self.slots;
        self.index
            .insert_unique(hash, k, |&kk| slots.get(kk).map(|e| e.hash).unwrap_or(0));
        k
    }

    /// Swap in a new value for a live slot and hand back the old one.
    pub(crate) fn replace_value(&mut self, slot: DefaultKey, value: V::Stored) -> Option<V::Stored> {
        self.slots
            .get_mut(slot)
            .map(|e| core::mem::replace(&mut e.value, value))
    }

    /// Unlink a slot. The structure is consistent again before the stored
    /// items are handed back.
    pub(crate) fn remove(&mut self, slot: DefaultKey) -> Option<(K::Stored, V::Stored)> {
        let _g = self.reentrancy.enter();
        let entry = self.slots.remove(slot)?;
        if let Ok(occupied) = self.index.find_entry(entry.hash, |&kk| kk == slot) {
            let _ = occupied.remove();
        }
        Some((entry.key, entry.value))
    }

    /// Empty the table and return everything it held.
    pub(crate) fn take_all(&mut self) -> impl Iterator<Item = (K::Stored, V::Stored)> {
        let _g = self.reentrancy.enter();
        self.index.clear();
        let slots = core::mem::replace(&mut self.slots, SlotMap::with_key());
        slots.into_iter().map(|(_, e)| (e.key, e.value))
    }

    pub(crate) fn reserve(&mut self, additional: usize) {
        self.slots.reserve(additional);
        let slots = &self.slots;
        self.index
            .reserve(additional, |&kk| slots.get(kk).map(|e| e.hash).unwrap_or(0));
    }

    pub fn iter(&self) -> Iter<'_, K, V> {
        Iter {
            it: self.slots.iter(),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::kind::Opaque;
    use crate::strategy::{CallbackStrategy, ScalarStrategy};
    use crate::type_info::TypeInfo;
    use core::ffi::c_void;
    use std::collections::BTreeSet;

    fn scalar() -> Storage<i64, i64> {
        Storage::with_strategy(ScalarStrategy::default())
    }

    fn put(s: &mut Storage<i64, i64>, k: i64, v: i64) {
        let p = s.probe(k);
        match p.slot {
            Some(slot) => {
                s.replace_value(slot, v);
            }
            None => {
                s.insert_new(p.hash, k, v);
            }
        }
    }

    /// Invariant: `probe` finds exactly the keys inserted, and `lookup`
    /// returns the stored value for them.
    #[test]
    fn probe_and_lookup_parity() {
        let mut s = scalar();
        for k in 0..50 {
            put(&mut s, k, k * 10);
        }
        for k in 0..50 {
            assert!(s.contains_key(k));
            assert_eq!(s.lookup(k), Some(k * 10));
        }
        for k in 50..60 {
            assert!(!s.contains_key(k));
            assert_eq!(s.lookup(k), None);
        }
        assert_eq!(s.len(), 50);
    }

    /// Invariant: replacing a value keeps the slot and hands back the old value.
    #[test]
    fn replace_value_returns_previous() {
        let mut s = scalar();
        put(&mut s, 1, 10);
        let slot = s.probe(1).slot.unwrap();
        assert_eq!(s.replace_value(slot, 11), Some(10));
        assert_eq!(s.lookup(1), Some(11));
        assert_eq!(s.len(), 1);
    }

    /// Invariant: removal unlinks both slot and index; the key can be
    /// reinserted afterwards.
    #[test]
    fn remove_then_reinsert() {
        let mut s = scalar();
        put(&mut s, 7, 70);
        let slot = s.probe(7).slot.unwrap();
        assert_eq!(s.remove(slot), Some((7, 70)));
        assert!(!s.contains_key(7));
        assert_eq!(s.remove(slot), None, "stale slot must not resolve");
        put(&mut s, 7, 71);
        assert_eq!(s.lookup(7), Some(71));
    }

    /// Invariant: iteration yields every live entry once; `take_all` empties
    /// the table and returns the same set.
    #[test]
    fn iter_and_take_all_agree() {
        let mut s = scalar();
        for k in [3, 1, 4, 1, 5, 9, 2, 6] {
            put(&mut s, k, -k);
        }
        let seen: BTreeSet<(i64, i64)> = s.iter().collect();
        let expected: BTreeSet<(i64, i64)> =
            [1, 2, 3, 4, 5, 6, 9].into_iter().map(|k| (k, -k)).collect();
        assert_eq!(seen, expected);

        let taken: BTreeSet<(i64, i64)> = s.take_all().collect();
        assert_eq!(taken, expected);
        assert!(s.is_empty());
        assert!(!s.contains_key(3));
    }

    /// Invariant: growth after `reserve` and many inserts keeps every key
    /// reachable (rehash uses stored hashes).
    #[test]
    fn growth_keeps_entries_reachable() {
        let mut s = scalar();
        s.reserve(4);
        for k in 0..10_000 {
            put(&mut s, k, k);
        }
        assert_eq!(s.len(), 10_000);
        assert!((0..10_000).step_by(97).all(|k| s.lookup(k) == Some(k)));
    }

    unsafe extern "C" fn const_hash(_p: *mut c_void) -> usize {
        0
    }

    unsafe extern "C" fn u32_eq(a: *mut c_void, b: *mut c_void) -> bool {
        *a.cast::<u32>() == *b.cast::<u32>()
    }

    /// Invariant: lookups under total hash collision resolve through the
    /// equality callback.
    #[test]
    fn collisions_resolve_through_equality_callback() {
        let info = TypeInfo::new(None, None, 4);
        let mut s: Storage<Opaque, i32> =
            Storage::with_strategy(CallbackStrategy::new(const_hash, u32_eq));
        for (i, key) in [10u32, 20, 30].iter().enumerate() {
            let arg = key as *const u32 as *mut c_void;
            let p = s.probe(arg);
            assert!(p.slot.is_none());
            let stored = unsafe { Opaque::store(&info, arg) };
            s.insert_new(p.hash, stored, i as i32);
        }
        let mut q = 20u32;
        assert_eq!(s.lookup(&mut q as *mut u32 as *mut c_void), Some(1));
        let mut miss = 40u32;
        assert!(!s.contains_key(&mut miss as *mut u32 as *mut c_void));
    }

    thread_local! {
        static NESTED_PANICKED: std::cell::Cell<bool> = const { std::cell::Cell::new(false) };
    }

    unsafe extern "C" fn reentrant_eq(a: *mut c_void, _b: *mut c_void) -> bool {
        // The key bytes carry a pointer back to the storage being probed.
        let owner = *a.cast::<*const Storage<Opaque, i32>>();
        // Unwinding out of an `extern "C"` callback aborts, so the nested
        // panic is caught here and reported through a flag.
        let res = std::panic::catch_unwind(std::panic::AssertUnwindSafe(|| {
            let _ = (*owner).contains_key(a);
        }));
        NESTED_PANICKED.with(|f| f.set(res.is_err()));
        false
    }

    /// Invariant (debug-only): an equality callback that probes the same
    /// storage again trips the reentrancy guard.
    #[cfg(debug_assertions)]
    #[test]
    fn reentrant_callback_panics_in_debug() {
        let size = core::mem::size_of::<usize>() as u64;
        let info = TypeInfo::new(None, None, size);
        let mut s: Box<Storage<Opaque, i32>> =
            Box::new(Storage::with_strategy(CallbackStrategy::new(const_hash, reentrant_eq)));
        let owner: *const Storage<Opaque, i32> = &*s;
        let arg = &owner as *const _ as *mut c_void;
        let p = s.probe(arg);
        let stored = unsafe { Opaque::store(&info, arg) };
        s.insert_new(p.hash, stored, 1);

        let _ = s.contains_key(arg);
        assert!(
            NESTED_PANICKED.with(|f| f.get()),
            "expected nested probe to panic in debug builds"
        );
    }
}
