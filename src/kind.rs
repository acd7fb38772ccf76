//! Key and value kinds.
//!
//! A kind decides how one side of an entry is stored and how ownership of
//! it is taken and given up. Scalars are stored by value and never touch
//! the ownership hooks; `Opaque` stores an engine-owned `OpaqueBuf` and runs
//! the hooks from its `TypeInfo`. A map is specialized at compile time by
//! its pair of kinds, which yields the four storage variants.

use core::ffi::c_void;
use core::fmt::Debug;
use core::hash::Hash;

use crate::config::{CreateError, CreateParams};
use crate::opaque::OpaqueBuf;
use crate::strategy::{CallbackStrategy, KeyStrategy, ScalarStrategy};
use crate::type_info::TypeInfo;

mod sealed {
    pub trait Sealed {}
}

/// Storage and ownership discipline for one side of an entry.
pub trait Kind: sealed::Sealed + 'static {
    /// True for the caller-defined opaque kind.
    const OPAQUE: bool;

    /// What the table holds.
    type Stored: 'static;

    /// What callers pass in and get back: the scalar itself, or the address
    /// of opaque bytes.
    type Arg: Copy + Debug + 'static;

    /// Borrow a stored item as a caller-facing handle. No ownership moves.
    fn view(stored: &Self::Stored) -> Self::Arg;

    /// Make an engine-owned copy of `arg`. No hook runs.
    ///
    /// # Safety
    /// Opaque `arg` must be readable for `info.size()` bytes.
    unsafe fn store(info: &TypeInfo, arg: Self::Arg) -> Self::Stored;

    /// Record a new occupancy by running the increment hook on `arg`.
    ///
    /// # Safety
    /// As for `store`.
    unsafe fn acquire(info: &TypeInfo, arg: Self::Arg);

    /// End an occupancy: decrement, then free.
    ///
    /// # Safety
    /// `stored` must have been acquired by the map that owns `info`.
    unsafe fn release(info: &TypeInfo, stored: Self::Stored);

    /// Move a stored item out to `out`, transferring its reference to the
    /// caller. The decrement hook does not run.
    ///
    /// # Safety
    /// `out` must be writable for `info.size()` bytes (opaque) or one
    /// unaligned `Self` (scalar).
    unsafe fn surrender(info: &TypeInfo, stored: Self::Stored, out: *mut c_void);
}

/// A kind usable as a key.
pub trait KeyKind: Kind {
    type Strategy: KeyStrategy<Self::Arg> + Debug;

    /// Build the hash/equality strategy from creation parameters.
    fn strategy(params: &CreateParams) -> Result<Self::Strategy, CreateError>;
}

/// Fixed-size numeric kinds, stored and passed by value.
pub trait Scalar: Kind<Stored = Self, Arg = Self> + Copy + Debug + PartialEq {}

/// Scalar kinds that can be hashed as keys.
pub trait ScalarKey: Scalar + KeyKind<Strategy = ScalarStrategy> + Eq + Hash {}

macro_rules! scalar_kind {
    ($($t:ty),*) => {$(
        impl sealed::Sealed for $t {}

        impl Kind for $t {
            const OPAQUE: bool = false;
            type Stored = $t;
            type Arg = $t;

            #[inline]
            fn view(stored: &$t) -> $t {
                *stored
            }

            #[inline]
            unsafe fn store(_info: &TypeInfo, arg: $t) -> $t {
                arg
            }

            #[inline]
            unsafe fn acquire(_info: &TypeInfo, _arg: $t) {}

            #[inline]
            unsafe fn release(_info: &TypeInfo, _stored: $t) {}

            #[inline]
            unsafe fn surrender(_info: &TypeInfo, stored: $t, out: *mut c_void) {
                out.cast::<$t>().write_unaligned(stored);
            }
        }

        impl Scalar for $t {}
    )*};
}

macro_rules! scalar_key {
    ($($t:ty),*) => {$(
        impl KeyKind for $t {
            type Strategy = ScalarStrategy;

            fn strategy(_params: &CreateParams) -> Result<ScalarStrategy, CreateError> {
                Ok(ScalarStrategy::default())
            }
        }

        impl ScalarKey for $t {}
    )*};
}

scalar_kind!(i32, i64, u32, u64, f32, f64);
scalar_key!(i32, i64, u32, u64);

/// Marker for caller-defined values of a size fixed at map creation.
#[derive(Debug)]
pub enum Opaque {}

impl sealed::Sealed for Opaque {}

impl Kind for Opaque {
    const OPAQUE: bool = true;
    type Stored = OpaqueBuf;
    type Arg = *mut c_void;

    #[inline]
    fn view(stored: &OpaqueBuf) -> *mut c_void {
        stored.as_ptr()
    }

    #[inline]
    unsafe fn store(info: &TypeInfo, arg: *mut c_void) -> OpaqueBuf {
        info.copy(arg)
    }

    #[inline]
    unsafe fn acquire(info: &TypeInfo, arg: *mut c_void) {
        info.increment(arg)
    }

    #[inline]
    unsafe fn release(info: &TypeInfo, stored: OpaqueBuf) {
        info.release(stored)
    }

    #[inline]
    unsafe fn surrender(_info: &TypeInfo, stored: OpaqueBuf, out: *mut c_void) {
        stored.copy_to(out);
    }
}

impl KeyKind for Opaque {
    type Strategy = CallbackStrategy;

    fn strategy(params: &CreateParams) -> Result<CallbackStrategy, CreateError> {
        let hash = params.hash_fn.ok_or(CreateError::MissingHashFn)?;
        let eq = params.eq_fn.ok_or(CreateError::MissingEqFn)?;
        Ok(CallbackStrategy::new(hash, eq))
    }
}
