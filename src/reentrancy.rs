//! Debug-only structural checks.
//!
//! `DebugReentrancy` catches a hash or equality callback that calls back
//! into the map it is probing. `DebugEpoch` counts mutations so an iterator
//! can notice that its map changed underneath it. Both compile to nothing
//! in release builds.

use core::cell::Cell;
use core::marker::PhantomData;

/// Per-map reentrancy tracker. Probing sections start with
/// `let _g = self.reentrancy.enter();`.
#[derive(Debug)]
pub struct DebugReentrancy {
    #[cfg(debug_assertions)]
    depth: Cell<u32>,
    // Single-threaded by contract.
    _nosend: PhantomData<*mut ()>,
}

impl DebugReentrancy {
    pub const fn new() -> Self {
        Self {
            #[cfg(debug_assertions)]
            depth: Cell::new(0),
            _nosend: PhantomData,
        }
    }

    /// Enter a guarded section. In debug builds, panics if already entered.
    #[inline]
    pub fn enter(&self) -> ReentrancyGuard<'_> {
        #[cfg(debug_assertions)]
        {
            let d = self.depth.get();
            assert!(d == 0, "reentrancy detected: callback re-entered the map it is probing");
            self.depth.set(d + 1);
            ReentrancyGuard { owner: self }
        }

        #[cfg(not(debug_assertions))]
        {
            ReentrancyGuard { _z: PhantomData }
        }
    }
}

impl Default for DebugReentrancy {
    fn default() -> Self {
        Self::new()
    }
}

/// RAII guard returned by `DebugReentrancy::enter`.
pub struct ReentrancyGuard<'a> {
    #[cfg(debug_assertions)]
    owner: &'a DebugReentrancy,
    #[cfg(not(debug_assertions))]
    _z: PhantomData<&'a ()>,
}

impl<'a> Drop for ReentrancyGuard<'a> {
    fn drop(&mut self) {
        #[cfg(debug_assertions)]
        {
            let d = self.owner.depth.get();
            debug_assert!(d > 0);
            self.owner.depth.set(d - 1);
        }
    }
}

/// Mutation counter. Always reads 0 in release builds.
#[derive(Debug, Default)]
pub struct DebugEpoch {
    #[cfg(debug_assertions)]
    value: u64,
}

impl DebugEpoch {
    pub const fn new() -> Self {
        Self {
            #[cfg(debug_assertions)]
            value: 0,
        }
    }

    #[inline]
    pub fn bump(&mut self) {
        #[cfg(debug_assertions)]
        {
            self.value = self.value.wrapping_add(1);
        }
    }

    #[inline]
    pub fn current(&self) -> u64 {
        #[cfg(debug_assertions)]
        {
            self.value
        }
        #[cfg(not(debug_assertions))]
        {
            0
        }
    }
}
