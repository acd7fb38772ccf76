use core::ffi::c_void;
use criterion::{black_box, criterion_group, criterion_main, BatchSize, Criterion};
use jit_hashmap::{CreateParams, GenericKeyHashMap, NumericHashMap};
use std::time::Duration;

fn lcg(mut s: u64) -> impl Iterator<Item = u64> {
    std::iter::from_fn(move || {
        s = s.wrapping_mul(6364136223846793005).wrapping_add(1);
        Some(s)
    })
}

fn bench_insert(c: &mut Criterion) {
    c.bench_function("numeric_insert_10k", |b| {
        let keys: Vec<i64> = lcg(1).take(10_000).map(|x| x as i64).collect();
        b.iter_batched(
            NumericHashMap::<i64, i64>::new,
            |mut m| {
                for (i, &k) in keys.iter().enumerate() {
                    m.insert(k, i as i64);
                }
                black_box(m)
            },
            BatchSize::SmallInput,
        )
    });
}

fn bench_from_arrays(c: &mut Criterion) {
    c.bench_function("numeric_from_arrays_10k", |b| {
        let keys: Vec<i64> = lcg(3).take(10_000).map(|x| (x % 5_000) as i64).collect();
        let vals: Vec<i64> = (0..keys.len() as i64).collect();
        b.iter(|| black_box(NumericHashMap::<i64, i64>::from_arrays(&keys, &vals)))
    });
}

fn bench_get_hit(c: &mut Criterion) {
    c.bench_function("numeric_get_hit", |b| {
        let keys: Vec<i64> = lcg(7).take(20_000).map(|x| x as i64).collect();
        let vals: Vec<i64> = (0..keys.len() as i64).collect();
        let m = NumericHashMap::<i64, i64>::from_arrays(&keys, &vals);
        let mut i = 0usize;
        b.iter(|| {
            let k = keys[i % keys.len()];
            i = i.wrapping_add(1);
            black_box(m.get(k));
        })
    });
}

fn bench_get_miss(c: &mut Criterion) {
    c.bench_function("numeric_get_miss", |b| {
        let keys: Vec<i64> = lcg(11).take(10_000).map(|x| x as i64).collect();
        let m = NumericHashMap::<i64, i64>::from_keys(&keys, 0);
        let mut miss = lcg(0xdead_beef);
        b.iter(|| {
            // generate keys unlikely in map
            let k = miss.next().unwrap_or(0) as i64;
            black_box(m.get(k));
        })
    });
}

unsafe extern "C" fn word_hash(p: *mut c_void) -> usize {
    (*p.cast::<u64>()).wrapping_mul(0x9e37_79b9_7f4a_7c15) as usize
}

unsafe extern "C" fn word_eq(a: *mut c_void, b: *mut c_void) -> bool {
    *a.cast::<[u64; 2]>() == *b.cast::<[u64; 2]>()
}

fn bench_opaque_key_set(c: &mut Criterion) {
    c.bench_function("opaque_key_set_10k", |b| {
        let params = CreateParams {
            gen_key: true,
            hash_fn: Some(word_hash),
            eq_fn: Some(word_eq),
            key_size: 16,
            ..CreateParams::scalar::<u64, u64>()
        };
        let mut keys: Vec<[u64; 2]> = lcg(5).take(10_000).map(|x| [x, !x]).collect();
        b.iter_batched(
            || unsafe { GenericKeyHashMap::<u64>::from_params(&params) }.expect("valid parameters"),
            |mut m| {
                for (i, k) in keys.iter_mut().enumerate() {
                    unsafe { m.set(k.as_mut_ptr().cast(), i as u64) };
                }
                black_box(m)
            },
            BatchSize::SmallInput,
        )
    });
}

fn bench_config() -> Criterion {
    Criterion::default()
        .sample_size(50)
        .measurement_time(Duration::from_secs(8))
        .warm_up_time(Duration::from_secs(2))
}

criterion_group! {
    name = benches;
    config = bench_config();
    targets = bench_insert, bench_from_arrays, bench_get_hit, bench_get_miss, bench_opaque_key_set
}
criterion_main!(benches);
