//! Hash and equality strategies for the two kinds of keys.
//!
//! Scalar keys hash through a `BuildHasher`; opaque keys hash through the
//! caller's callbacks, invoked with raw buffer addresses. Either way the
//! strategy is a small `Clone` value copied into the table.

use core::ffi::c_void;
use core::hash::{BuildHasher, Hash};
use hashbrown::hash_map::DefaultHashBuilder;

/// Caller-supplied hash over the bytes at `key`.
pub type HashFn = unsafe extern "C" fn(key: *mut c_void) -> usize;

/// Caller-supplied equality over the bytes at `lhs` and `rhs`.
pub type EqFn = unsafe extern "C" fn(lhs: *mut c_void, rhs: *mut c_void) -> bool;

/// Hashing and equality over the caller-facing key representation `A`.
pub trait KeyStrategy<A>: Clone {
    fn hash(&self, key: A) -> u64;
    fn equal(&self, stored: A, probe: A) -> bool;
}

/// Strategy for fixed-size scalar keys.
#[derive(Clone, Default)]
pub struct ScalarStrategy {
    state: DefaultHashBuilder,
}

impl<T> KeyStrategy<T> for ScalarStrategy
where
    T: Copy + Eq + Hash,
{
    #[inline]
    fn hash(&self, key: T) -> u64 {
        self.state.hash_one(key)
    }

    #[inline]
    fn equal(&self, stored: T, probe: T) -> bool {
        stored == probe
    }
}

/// Strategy for opaque keys: wraps the caller's hash and equality callbacks.
#[derive(Copy, Clone)]
pub struct CallbackStrategy {
    hash: HashFn,
    eq: EqFn,
}

impl CallbackStrategy {
    /// Safety contract (carried by map creation, which is `unsafe`): both
    /// callbacks accept any pointer to a key of the map's declared size and
    /// do not mutate the map they are probing.
    pub const fn new(hash: HashFn, eq: EqFn) -> Self {
        Self { hash, eq }
    }
}

impl KeyStrategy<*mut c_void> for CallbackStrategy {
    #[inline]
    fn hash(&self, key: *mut c_void) -> u64 {
        // SAFETY: see `CallbackStrategy::new`.
        unsafe { (self.hash)(key) as u64 }
    }

    #[inline]
    fn equal(&self, stored: *mut c_void, probe: *mut c_void) -> bool {
        // SAFETY: see `CallbackStrategy::new`.
        unsafe { (self.eq)(stored, probe) }
    }
}

impl core::fmt::Debug for ScalarStrategy {
    fn fmt(&self, f: &mut core::fmt::Formatter<'_>) -> core::fmt::Result {
        f.write_str("ScalarStrategy")
    }
}

impl core::fmt::Debug for CallbackStrategy {
    fn fmt(&self, f: &mut core::fmt::Formatter<'_>) -> core::fmt::Result {
        f.write_str("CallbackStrategy")
    }
}
