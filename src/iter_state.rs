//! Externally driven cursor over a `TypedHashMap`.
//!
//! `IterState` exists for callers that cannot hold a Rust borrow across
//! calls: compiled code creates one, calls `next_entry` until it reports
//! exhaustion, and hands it back to the host for destruction whenever it
//! likes. The back-reference to the map is non-owning; the map must outlive
//! the cursor and must not be mutated while the cursor is in use. Debug
//! builds check the second condition through the map's mutation epoch.

use core::ptr::NonNull;

use crate::kind::{KeyKind, Kind};
use crate::storage::Iter;
use crate::typed_map::TypedHashMap;

/// Where a cursor is in its protocol. `Exhausted` is terminal.
#[derive(Copy, Clone, Debug, PartialEq, Eq)]
pub enum IterPhase {
    Created,
    Advancing,
    Exhausted,
}

/// Status code returned to compiled code by `hashmap_iternext`.
#[repr(i8)]
#[derive(Copy, Clone, Debug, PartialEq, Eq)]
pub enum IterStatus {
    Yielded = 0,
    Exhausted = 1,
}

pub struct IterState<K: KeyKind, V: Kind> {
    map: NonNull<TypedHashMap<K, V>>,
    cursor: Iter<'static, K, V>,
    current: Option<(K::Arg, V::Arg)>,
    phase: IterPhase,
    epoch: u64,
}

impl<K: KeyKind, V: Kind> IterState<K, V> {
    /// Position a cursor on the first entry of `map`, or at the end if the
    /// map is empty.
    ///
    /// # Safety
    /// `map` must stay alive and unmodified for as long as `next_entry`,
    /// `current` or `advance` are called on the returned state.
    pub unsafe fn new(map: NonNull<TypedHashMap<K, V>>) -> Self {
        let target: &'static TypedHashMap<K, V> = &*map.as_ptr();
        let epoch = target.epoch.current();
        let mut cursor = target.iter();
        let current = cursor.next();
        tracing::trace!(map = ?map, entries = target.len(), "created hashmap iterator");
        Self {
            map,
            cursor,
            current,
            phase: IterPhase::Created,
            epoch,
        }
    }

    pub fn phase(&self) -> IterPhase {
        self.phase
    }

    pub fn at_end(&self) -> bool {
        self.current.is_none()
    }

    /// The entry under the cursor, if any.
    pub fn current(&self) -> Option<(K::Arg, V::Arg)> {
        self.current
    }

    /// Move to the next entry.
    pub fn advance(&mut self) {
        if self.phase == IterPhase::Exhausted {
            return;
        }
        self.check_epoch();
        self.current = self.cursor.next();
        self.phase = IterPhase::Advancing;
    }

    /// Yield the entry under the cursor and advance. Once the end is
    /// reached, every call returns `None` without touching the map.
    pub fn next_entry(&mut self) -> Option<(K::Arg, V::Arg)> {
        if self.phase == IterPhase::Exhausted {
            return None;
        }
        self.check_epoch();
        match self.current.take() {
            Some(entry) => {
                self.current = self.cursor.next();
                self.phase = IterPhase::Advancing;
                Some(entry)
            }
            None => {
                self.phase = IterPhase::Exhausted;
                None
            }
        }
    }

    #[inline]
    fn check_epoch(&self) {
        // SAFETY: the map outlives this state (constructor contract).
        let now = unsafe { (*self.map.as_ptr()).epoch.current() };
        debug_assert_eq!(now, self.epoch, "hashmap mutated while an iterator was live");
    }
}

impl<K: KeyKind, V: Kind> Drop for IterState<K, V> {
    fn drop(&mut self) {
        tracing::trace!(map = ?self.map, phase = ?self.phase, "dropping hashmap iterator");
    }
}
