#![cfg(test)]

// State-machine property tests for TypedHashMap kept inside the crate so the
// iterator cursor and the opaque-key constructors are reachable directly.

use crate::config::CreateParams;
use crate::iter_state::IterState;
use crate::typed_map::{GenericKeyHashMap, NumericHashMap};
use core::ffi::c_void;
use core::ptr::NonNull;
use proptest::prelude::*;
use std::collections::{BTreeMap, BTreeSet, HashMap};

// Pool-indexed operations to improve shrinking: indices shrink to earlier keys,
// pool length shrinks, and op lists shrink in length.
#[derive(Clone, Debug)]
enum OpI {
    Set(usize, i32),
    Pop(usize),
    Lookup(usize),
    Contains(i64),
    Merge(Vec<(usize, i32)>),
    Clear,
    Iterate,
}

fn arb_scenario() -> impl Strategy<Value = (Vec<i64>, Vec<OpI>)> {
    proptest::collection::vec(any::<i64>(), 1..=8).prop_flat_map(|pool| {
        let idxs: Vec<usize> = (0..pool.len()).collect();
        let idx = proptest::sample::select(idxs);
        let contains_pool = proptest::sample::select(pool.clone());
        let op = prop_oneof![
            4 => (idx.clone(), any::<i32>()).prop_map(|(i, v)| OpI::Set(i, v)),
            2 => idx.clone().prop_map(OpI::Pop),
            2 => idx.clone().prop_map(OpI::Lookup),
            1 => prop_oneof![contains_pool, any::<i64>()].prop_map(OpI::Contains),
            1 => proptest::collection::vec((idx.clone(), any::<i32>()), 0..6).prop_map(OpI::Merge),
            1 => Just(OpI::Clear),
            1 => Just(OpI::Iterate),
        ];
        proptest::collection::vec(op, 1..60).prop_map(move |ops| (pool.clone(), ops))
    })
}

// Walk a map through the externally driven cursor and collect what it yields.
fn drain_cursor(m: &NumericHashMap<i64, i32>) -> Vec<(i64, i32)> {
    let mut it = unsafe { IterState::new(NonNull::from(m)) };
    let mut out = Vec::new();
    while let Some(kv) = it.next_entry() {
        out.push(kv);
    }
    out
}

// Property: state-machine equivalence against std::collections::HashMap.
// - `set` is last-write-wins; `len` counts distinct keys.
// - `remove` hands back the model's value and the key disappears.
// - `extend_from` lets the other map win and leaves it untouched.
// - Both `iter` and the cursor yield each live entry exactly once.
proptest! {
    #![proptest_config(ProptestConfig { cases: 64, .. ProptestConfig::default() })]
    #[test]
    fn prop_state_machine((pool, ops) in arb_scenario()) {
        let mut sut: NumericHashMap<i64, i32> = NumericHashMap::new();
        let mut model: HashMap<i64, i32> = HashMap::new();

        for op in ops {
            match op {
                OpI::Set(i, v) => {
                    sut.insert(pool[i], v);
                    model.insert(pool[i], v);
                }
                OpI::Pop(i) => {
                    prop_assert_eq!(sut.remove(pool[i]), model.remove(&pool[i]));
                    prop_assert!(!sut.contains(pool[i]));
                }
                OpI::Lookup(i) => {
                    prop_assert_eq!(sut.get(pool[i]), model.get(&pool[i]).copied());
                }
                OpI::Contains(k) => {
                    prop_assert_eq!(sut.contains(k), model.contains_key(&k));
                }
                OpI::Merge(pairs) => {
                    let mut other: NumericHashMap<i64, i32> = NumericHashMap::new();
                    let mut other_model = BTreeMap::new();
                    for (i, v) in pairs {
                        other.insert(pool[i], v);
                        other_model.insert(pool[i], v);
                    }
                    sut.extend_from(&other);
                    model.extend(other_model.iter().map(|(&k, &v)| (k, v)));
                    let after: BTreeMap<i64, i32> = other.iter().collect();
                    prop_assert_eq!(after, other_model);
                }
                OpI::Clear => {
                    sut.clear();
                    model.clear();
                }
                OpI::Iterate => {
                    let walked = drain_cursor(&sut);
                    prop_assert_eq!(walked.len(), model.len(), "cursor yields each entry once");
                    let s: BTreeMap<i64, i32> = walked.into_iter().collect();
                    let m: BTreeMap<i64, i32> = model.iter().map(|(&k, &v)| (k, v)).collect();
                    prop_assert_eq!(s, m);
                }
            }

            prop_assert_eq!(sut.len(), model.len());
            prop_assert_eq!(sut.is_empty(), model.is_empty());
            let keys: BTreeSet<i64> = sut.iter().map(|(k, _)| k).collect();
            prop_assert_eq!(keys.len(), sut.len());
        }
    }
}

// Opaque keys are `i64`s read through the pointer; every key hashes to the
// same bucket, so each probe resolves through the equality callback.
unsafe extern "C" fn const_hash(_key: *mut c_void) -> usize {
    0
}

unsafe extern "C" fn i64_eq(lhs: *mut c_void, rhs: *mut c_void) -> bool {
    *lhs.cast::<i64>() == *rhs.cast::<i64>()
}

fn colliding_map() -> GenericKeyHashMap<i32> {
    let params = CreateParams {
        gen_key: true,
        hash_fn: Some(const_hash),
        eq_fn: Some(i64_eq),
        key_size: 8,
        ..CreateParams::scalar::<i64, i32>()
    };
    unsafe { GenericKeyHashMap::<i32>::from_params(&params).expect("valid parameters") }
}

fn key_arg(k: &mut i64) -> *mut c_void {
    (k as *mut i64).cast()
}

// Property: same state-machine invariants with opaque keys under worst-case
// collision behavior. Stored keys are the map's own copies, so the pool
// values can be reused freely between operations.
proptest! {
    #![proptest_config(ProptestConfig { cases: 64, .. ProptestConfig::default() })]
    #[test]
    fn prop_state_machine_with_collisions((pool, ops) in arb_scenario()) {
        let mut sut = colliding_map();
        let mut model: HashMap<i64, i32> = HashMap::new();

        for op in ops {
            match op {
                OpI::Set(i, v) => {
                    let mut k = pool[i];
                    unsafe { sut.set(key_arg(&mut k), v) };
                    model.insert(pool[i], v);
                }
                OpI::Pop(i) => {
                    let mut k = pool[i];
                    let mut out = i32::MIN;
                    let found = unsafe { sut.pop(key_arg(&mut k), (&mut out as *mut i32).cast()) };
                    match model.remove(&pool[i]) {
                        Some(v) => {
                            prop_assert!(found);
                            prop_assert_eq!(out, v);
                        }
                        None => {
                            prop_assert!(!found);
                            prop_assert_eq!(out, i32::MIN, "output untouched on miss");
                        }
                    }
                }
                OpI::Lookup(i) => {
                    let mut k = pool[i];
                    let got = unsafe { sut.lookup(key_arg(&mut k)) };
                    prop_assert_eq!(got, model.get(&pool[i]).copied());
                }
                OpI::Contains(mut k) => {
                    let has = unsafe { sut.contains_key(key_arg(&mut k)) };
                    prop_assert_eq!(has, model.contains_key(&k));
                }
                OpI::Merge(pairs) => {
                    let mut other = colliding_map();
                    for (i, v) in pairs {
                        let mut k = pool[i];
                        unsafe { other.set(key_arg(&mut k), v) };
                        model.insert(pool[i], v);
                    }
                    unsafe { sut.update(&other) };
                }
                OpI::Clear => {
                    sut.clear();
                    model.clear();
                }
                OpI::Iterate => {
                    let s: BTreeMap<i64, i32> = sut
                        .iter()
                        .map(|(k, v)| (unsafe { *k.cast::<i64>() }, v))
                        .collect();
                    let m: BTreeMap<i64, i32> = model.iter().map(|(&k, &v)| (k, v)).collect();
                    prop_assert_eq!(s, m);
                }
            }

            prop_assert_eq!(sut.len(), model.len());
        }
    }
}
