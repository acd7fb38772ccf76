#![allow(dead_code)]

// Shared fixtures: a host memory manager that records registrations, and a
// C-ABI opaque payload whose reference counts are tracked per id.

use core::ffi::c_void;
use jit_hashmap::host::{Destructor, HostMemory, MemInfo};
use jit_hashmap::CreateParams;
use std::cell::{Cell, RefCell};
use std::collections::{BTreeMap, BTreeSet};

/// Opaque payload handed to the map by address. `id` is the identity used by
/// hashing, equality and the reference-count ledger.
#[repr(C)]
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub struct Payload {
    pub id: i64,
    pub tag: i64,
}

impl Payload {
    pub fn new(id: i64, tag: i64) -> Self {
        Self { id, tag }
    }

    pub fn arg(&mut self) -> *mut c_void {
        (self as *mut Payload).cast()
    }
}

pub const PAYLOAD_SIZE: u64 = core::mem::size_of::<Payload>() as u64;

pub unsafe fn read(p: *mut c_void) -> Payload {
    *p.cast::<Payload>()
}

thread_local! {
    static KEY_COUNTS: RefCell<BTreeMap<i64, i64>> = const { RefCell::new(BTreeMap::new()) };
    static VAL_COUNTS: RefCell<BTreeMap<i64, i64>> = const { RefCell::new(BTreeMap::new()) };
    static VAL_DECREFS: Cell<usize> = const { Cell::new(0) };
    static VAL_ZEROED: RefCell<BTreeSet<i64>> = const { RefCell::new(BTreeSet::new()) };
    static HASH_CALLS: Cell<usize> = const { Cell::new(0) };
}

fn bump(ledger: &'static std::thread::LocalKey<RefCell<BTreeMap<i64, i64>>>, id: i64, by: i64) {
    ledger.with(|l| *l.borrow_mut().entry(id).or_insert(0) += by);
}

pub unsafe extern "C" fn payload_hash(p: *mut c_void) -> usize {
    HASH_CALLS.with(|c| c.set(c.get() + 1));
    (read(p).id as u64).wrapping_mul(0x9e37_79b9_7f4a_7c15) as usize
}

pub unsafe extern "C" fn payload_eq(a: *mut c_void, b: *mut c_void) -> bool {
    read(a).id == read(b).id
}

pub unsafe extern "C" fn key_incref(p: *mut c_void) {
    bump(&KEY_COUNTS, read(p).id, 1);
}

pub unsafe extern "C" fn key_decref(p: *mut c_void) {
    bump(&KEY_COUNTS, read(p).id, -1);
}

pub unsafe extern "C" fn val_incref(p: *mut c_void) {
    bump(&VAL_COUNTS, read(p).id, 1);
}

pub unsafe extern "C" fn val_decref(p: *mut c_void) {
    VAL_DECREFS.with(|c| c.set(c.get() + 1));
    let id = read(p).id;
    bump(&VAL_COUNTS, id, -1);
    if val_count(id) <= 0 {
        VAL_ZEROED.with(|z| z.borrow_mut().insert(id));
    }
}

pub fn key_count(id: i64) -> i64 {
    KEY_COUNTS.with(|l| l.borrow().get(&id).copied().unwrap_or(0))
}

pub fn val_count(id: i64) -> i64 {
    VAL_COUNTS.with(|l| l.borrow().get(&id).copied().unwrap_or(0))
}

pub fn val_decrefs() -> usize {
    VAL_DECREFS.with(Cell::get)
}

/// True when some decrement has taken the value `id` down to zero.
pub fn val_hit_zero(id: i64) -> bool {
    VAL_ZEROED.with(|z| z.borrow().contains(&id))
}

pub fn hash_calls() -> usize {
    HASH_CALLS.with(Cell::get)
}

/// True when every id has been decremented as often as incremented.
pub fn balanced() -> bool {
    let zero = |l: &RefCell<BTreeMap<i64, i64>>| l.borrow().values().all(|&n| n == 0);
    KEY_COUNTS.with(zero) && VAL_COUNTS.with(zero)
}

pub fn reset_ledger() {
    KEY_COUNTS.with(|l| l.borrow_mut().clear());
    VAL_COUNTS.with(|l| l.borrow_mut().clear());
    VAL_DECREFS.with(|c| c.set(0));
    VAL_ZEROED.with(|z| z.borrow_mut().clear());
    HASH_CALLS.with(|c| c.set(0));
}

/// Creation parameters with the payload callbacks wired to whichever sides
/// are opaque.
pub fn payload_params(gen_key: bool, gen_val: bool) -> CreateParams {
    let mut p = CreateParams {
        gen_key,
        gen_val,
        key_size: 8,
        val_size: 8,
        ..CreateParams::default()
    };
    if gen_key {
        p.hash_fn = Some(payload_hash);
        p.eq_fn = Some(payload_eq);
        p.key_incref = Some(key_incref);
        p.key_decref = Some(key_decref);
        p.key_size = PAYLOAD_SIZE;
    }
    if gen_val {
        p.val_incref = Some(val_incref);
        p.val_decref = Some(val_decref);
        p.val_size = PAYLOAD_SIZE;
    }
    p
}

/// Host memory manager that remembers every registration so tests can play
/// the part of the host and run destructors when they choose.
#[derive(Default)]
pub struct RecordingHost {
    managed: RefCell<Vec<(usize, Destructor)>>,
}

impl RecordingHost {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn live(&self) -> usize {
        self.managed.borrow().len()
    }

    /// Run the destructor registered for `data`.
    pub fn reclaim(&self, data: *mut c_void) {
        let pos = self
            .managed
            .borrow()
            .iter()
            .position(|&(d, _)| d == data as usize)
            .expect("object was registered");
        let (d, dtor) = self.managed.borrow_mut().remove(pos);
        unsafe { dtor(d as *mut c_void) };
    }

    /// Run every outstanding destructor, newest first.
    pub fn reclaim_all(&self) {
        loop {
            let next = self.managed.borrow_mut().pop();
            match next {
                Some((d, dtor)) => unsafe { dtor(d as *mut c_void) },
                None => break,
            }
        }
    }
}

impl HostMemory for RecordingHost {
    unsafe fn manage(&self, data: *mut c_void, dtor: Destructor) -> *mut MemInfo {
        self.managed.borrow_mut().push((data as usize, dtor));
        data.cast()
    }
}

pub fn meminfo() -> *mut MemInfo {
    core::ptr::null_mut()
}
