//! jit-hashmap: a type-erased hash map engine driven by JIT-compiled code.
//!
//! Internal Design:
//!
//! Summary
//! - Goal: one hash map engine that compiled code can drive through raw
//!   pointers, for keys and values that are either plain scalars or
//!   caller-defined "opaque" byte blobs with their own hashing, equality and
//!   reference counting.
//! - Layers:
//!   - `Storage<K, V>`: structural table (slot map + hash index) with
//!     probe/insert/remove and iteration; includes a debug-only reentrancy
//!     guard around every section that calls a key strategy.
//!   - `TypedHashMap<K, V>`: wraps `Storage` and applies the ownership
//!     discipline (copy, increment, release, surrender) at each occupancy
//!     transition.
//!   - `IterState<K, V>`: cursor that survives across calls from compiled
//!     code; holds a non-owning pointer to its map.
//!   - `api`: typed entry points that reinterpret `*mut c_void` handles and
//!     register maps and cursors with the host memory manager.
//!
//! Variants
//! - A map is specialized at compile time by two kinds, one per side. A
//!   kind is a scalar (`i32`, `i64`, `u32`, `u64`, plus `f32`/`f64` as
//!   values) or `Opaque`. The four combinations are the four variants; no
//!   runtime tag or virtual dispatch is involved.
//!
//! Ownership
//! - Opaque keys and values are copied into engine-owned `OpaqueBuf`s of
//!   the size fixed at creation.
//! - The increment hook runs once per new occupancy: a key when it first
//!   appears, a value on every `set`. The decrement hook followed by a free
//!   runs once per occupancy that ends through overwrite, clear or
//!   destruction. `pop` ends the key's occupancy normally but hands the
//!   value to the caller with its reference intact.
//! - Hooks never run from read-only operations.
//!
//! Constraints
//! - Single-threaded: no locks, no atomics; `!Send`/`!Sync` by construction.
//! - Keys are unique; `set` is last-write-wins.
//! - Each entry stores its hash; the key strategy is never invoked during
//!   growth.
//! - Maps and cursors handed to the host are destroyed only by the host,
//!   through the destructor registered at creation.
//!
//! Undefined behavior that is not detected
//! - Passing arguments of a size other than the one declared at creation.
//! - Using a cursor after its map is destroyed. Using it after the map was
//!   mutated panics in debug builds and is undefined in release builds.
//! - Calling an `api` function with a `(K, V)` other than the one used to
//!   create the handle.

pub mod api;
mod config;
pub mod host;
mod iter_state;
mod kind;
mod opaque;
mod reentrancy;
mod storage;
mod strategy;
mod type_info;
mod typed_map;
mod typed_map_proptest;

// Public surface
pub use config::{CreateError, CreateParams};
pub use iter_state::{IterPhase, IterState, IterStatus};
pub use kind::{KeyKind, Kind, Opaque, Scalar, ScalarKey};
pub use opaque::OpaqueBuf;
pub use storage::Iter;
pub use strategy::{CallbackStrategy, EqFn, HashFn, KeyStrategy, ScalarStrategy};
pub use type_info::{RefcountFn, TypeInfo};
pub use typed_map::{
    GenericHashMap, GenericKeyHashMap, GenericValueHashMap, NumericHashMap, TypedHashMap,
};
