//! Map creation parameters and the checks run on them.

use core::ffi::c_void;
use thiserror::Error;

use crate::kind::{KeyKind, Kind};
use crate::strategy::{EqFn, HashFn};
use crate::type_info::{RefcountFn, TypeInfo};

/// Errors rejected at map creation. Every later operation on a live map is
/// total and reports outcomes through status values instead.
#[derive(Error, Debug, Clone, Copy, PartialEq, Eq)]
pub enum CreateError {
    /// `gen_key` disagrees with the static key kind.
    #[error("gen_key = {requested} does not match the key kind (opaque = {expected})")]
    KeyKindMismatch { requested: bool, expected: bool },

    /// `gen_val` disagrees with the static value kind.
    #[error("gen_val = {requested} does not match the value kind (opaque = {expected})")]
    ValueKindMismatch { requested: bool, expected: bool },

    #[error("opaque keys need a hash callback")]
    MissingHashFn,

    #[error("opaque keys need an equality callback")]
    MissingEqFn,

    #[error("opaque key byte size must be non-zero")]
    ZeroKeySize,

    #[error("opaque value byte size must be non-zero")]
    ZeroValueSize,
}

/// Everything `create` receives: the two variant flags, the callback
/// addresses and the opaque byte sizes. Scalar sides ignore their
/// callbacks and sizes.
#[derive(Clone, Copy, Debug, Default)]
pub struct CreateParams {
    pub gen_key: bool,
    pub gen_val: bool,
    pub hash_fn: Option<HashFn>,
    pub eq_fn: Option<EqFn>,
    pub key_incref: Option<RefcountFn>,
    pub key_decref: Option<RefcountFn>,
    pub val_incref: Option<RefcountFn>,
    pub val_decref: Option<RefcountFn>,
    pub key_size: u64,
    pub val_size: u64,
}

macro_rules! fn_from_addr {
    ($addr:expr, $ty:ty) => {
        if $addr.is_null() {
            None
        } else {
            Some(core::mem::transmute::<*mut c_void, $ty>($addr))
        }
    };
}

impl CreateParams {
    /// Parameters for a map whose key and value are both scalars.
    pub fn scalar<K: Kind, V: Kind>() -> Self {
        Self {
            key_size: core::mem::size_of::<K>() as u64,
            val_size: core::mem::size_of::<V>() as u64,
            ..Self::default()
        }
    }

    /// Decode the flat argument list a JIT passes to `create`. Null
    /// addresses become `None`; flags are C booleans.
    ///
    /// # Safety
    /// Every non-null address must be the entry point of a function with
    /// the matching signature (`HashFn`, `EqFn` or `RefcountFn`).
    #[allow(clippy::too_many_arguments)]
    pub unsafe fn from_raw(
        gen_key: i8,
        gen_val: i8,
        hash_fn: *mut c_void,
        eq_fn: *mut c_void,
        key_incref: *mut c_void,
        key_decref: *mut c_void,
        val_incref: *mut c_void,
        val_decref: *mut c_void,
        key_size: u64,
        val_size: u64,
    ) -> Self {
        Self {
            gen_key: gen_key != 0,
            gen_val: gen_val != 0,
            hash_fn: fn_from_addr!(hash_fn, HashFn),
            eq_fn: fn_from_addr!(eq_fn, EqFn),
            key_incref: fn_from_addr!(key_incref, RefcountFn),
            key_decref: fn_from_addr!(key_decref, RefcountFn),
            val_incref: fn_from_addr!(val_incref, RefcountFn),
            val_decref: fn_from_addr!(val_decref, RefcountFn),
            key_size,
            val_size,
        }
    }

    pub fn key_info(&self) -> TypeInfo {
        TypeInfo::new(self.key_incref, self.key_decref, self.key_size)
    }

    pub fn val_info(&self) -> TypeInfo {
        TypeInfo::new(self.val_incref, self.val_decref, self.val_size)
    }

    /// Check the flags against the static kinds `K`/`V` and that every
    /// opaque side is fully described.
    pub fn validate<K: KeyKind, V: Kind>(&self) -> Result<(), CreateError> {
        if self.gen_key != K::OPAQUE {
            return Err(CreateError::KeyKindMismatch {
                requested: self.gen_key,
                expected: K::OPAQUE,
            });
        }
        if self.gen_val != V::OPAQUE {
            return Err(CreateError::ValueKindMismatch {
                requested: self.gen_val,
                expected: V::OPAQUE,
            });
        }
        if K::OPAQUE {
            if self.hash_fn.is_none() {
                return Err(CreateError::MissingHashFn);
            }
            if self.eq_fn.is_none() {
                return Err(CreateError::MissingEqFn);
            }
            if self.key_size == 0 {
                return Err(CreateError::ZeroKeySize);
            }
        }
        if V::OPAQUE && self.val_size == 0 {
            return Err(CreateError::ZeroValueSize);
        }
        Ok(())
    }
}
