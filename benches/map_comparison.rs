use core::hash::BuildHasher;
use core::hint::black_box;

use criterion::Criterion;
use criterion::Throughput;
use criterion::criterion_group;
use criterion::criterion_main;
use siphasher::sip::SipHasher;

/// Fixed-key SipHash so all three maps hash identically and runs are
/// reproducible.
#[derive(Clone, Default)]
struct BenchState;

impl BuildHasher for BenchState {
    type Hasher = SipHasher;

    fn build_hasher(&self) -> SipHasher {
        SipHasher::new_with_keys(0x5112_81b6_7ee2_82cb, 0x0aa1_60fd_3aba_61ff)
    }
}

const SIZES: &[usize] = &[
    ((1 << 10) as f32 * 0.87) as usize,
    ((1 << 15) as f32 * 0.87) as usize,
    ((1 << 19) as f32 * 0.87) as usize,
];

fn keys(size: usize) -> Vec<String> {
    (0..size).map(|i| format!("key_{}", i)).collect()
}

fn bench_insert_sequential(c: &mut Criterion) {
    let mut group = c.benchmark_group("insert_sequential");

    for &size in SIZES {
        let keys = keys(size);
        group.throughput(Throughput::Elements(size as u64));

        group.bench_function(format!("robin_map/{}", size), |b| {
            b.iter(|| {
                let mut map = robin_map::HashMap::with_hasher(BenchState);
                for (i, key) in keys.iter().enumerate() {
                    map.insert(key.clone(), i as u64);
                }
                black_box(map)
            })
        });
        group.bench_function(format!("robin_map_preallocated/{}", size), |b| {
            b.iter(|| {
                let mut map = robin_map::HashMap::with_capacity_and_hasher(size, BenchState);
                for (i, key) in keys.iter().enumerate() {
                    map.insert(key.clone(), i as u64);
                }
                black_box(map)
            })
        });
        group.bench_function(format!("hashbrown/{}", size), |b| {
            b.iter(|| {
                let mut map = hashbrown::HashMap::with_hasher(BenchState);
                for (i, key) in keys.iter().enumerate() {
                    map.insert(key.clone(), i as u64);
                }
                black_box(map)
            })
        });
        group.bench_function(format!("std/{}", size), |b| {
            b.iter(|| {
                let mut map = std::collections::HashMap::with_hasher(BenchState);
                for (i, key) in keys.iter().enumerate() {
                    map.insert(key.clone(), i as u64);
                }
                black_box(map)
            })
        });
    }

    group.finish();
}

fn bench_lookup(c: &mut Criterion) {
    let mut group = c.benchmark_group("lookup_hit");

    for &size in SIZES {
        let keys = keys(size);
        group.throughput(Throughput::Elements(size as u64));

        let mut robin = robin_map::HashMap::with_capacity_and_hasher(size, BenchState);
        let mut brown = hashbrown::HashMap::with_capacity_and_hasher(size, BenchState);
        let mut std_map = std::collections::HashMap::with_capacity_and_hasher(size, BenchState);
        for (i, key) in keys.iter().enumerate() {
            robin.insert(key.clone(), i as u64);
            brown.insert(key.clone(), i as u64);
            std_map.insert(key.clone(), i as u64);
        }

        group.bench_function(format!("robin_map/{}", size), |b| {
            b.iter(|| {
                let mut found = 0u64;
                for key in &keys {
                    if robin.get(key.as_str()).is_some() {
                        found += 1;
                    }
                }
                black_box(found)
            })
        });
        group.bench_function(format!("hashbrown/{}", size), |b| {
            b.iter(|| {
                let mut found = 0u64;
                for key in &keys {
                    if brown.get(key.as_str()).is_some() {
                        found += 1;
                    }
                }
                black_box(found)
            })
        });
        group.bench_function(format!("std/{}", size), |b| {
            b.iter(|| {
                let mut found = 0u64;
                for key in &keys {
                    if std_map.get(key.as_str()).is_some() {
                        found += 1;
                    }
                }
                black_box(found)
            })
        });
    }

    group.finish();
}

fn bench_lookup_miss(c: &mut Criterion) {
    let mut group = c.benchmark_group("lookup_miss");

    for &size in SIZES {
        let keys = keys(size);
        let missing: Vec<String> = (0..size).map(|i| format!("missing_{}", i)).collect();

        let mut robin = robin_map::HashMap::with_capacity_and_hasher(size, BenchState);
        let mut brown = hashbrown::HashMap::with_capacity_and_hasher(size, BenchState);
        for (i, key) in keys.iter().enumerate() {
            robin.insert(key.clone(), i as u64);
            brown.insert(key.clone(), i as u64);
        }

        group.throughput(Throughput::Elements(size as u64));
        group.bench_function(format!("robin_map/{}", size), |b| {
            b.iter(|| {
                let mut found = 0u64;
                for key in &missing {
                    if robin.get(key.as_str()).is_some() {
                        found += 1;
                    }
                }
                black_box(found)
            })
        });
        group.bench_function(format!("hashbrown/{}", size), |b| {
            b.iter(|| {
                let mut found = 0u64;
                for key in &missing {
                    if brown.get(key.as_str()).is_some() {
                        found += 1;
                    }
                }
                black_box(found)
            })
        });
    }

    group.finish();
}

fn bench_remove(c: &mut Criterion) {
    let mut group = c.benchmark_group("insert_then_remove_all");

    for &size in SIZES {
        let keys = keys(size);
        group.throughput(Throughput::Elements(size as u64));

        group.bench_function(format!("robin_map/{}", size), |b| {
            b.iter(|| {
                let mut map = robin_map::HashMap::with_capacity_and_hasher(size, BenchState);
                for (i, key) in keys.iter().enumerate() {
                    map.insert(key.clone(), i as u64);
                }
                for key in &keys {
                    black_box(map.remove(key.as_str()));
                }
                black_box(map)
            })
        });
        group.bench_function(format!("hashbrown/{}", size), |b| {
            b.iter(|| {
                let mut map = hashbrown::HashMap::with_capacity_and_hasher(size, BenchState);
                for (i, key) in keys.iter().enumerate() {
                    map.insert(key.clone(), i as u64);
                }
                for key in &keys {
                    black_box(map.remove(key.as_str()));
                }
                black_box(map)
            })
        });
    }

    group.finish();
}

fn bench_iterate(c: &mut Criterion) {
    let mut group = c.benchmark_group("iterate");

    for &size in SIZES {
        let keys = keys(size);
        group.throughput(Throughput::Elements(size as u64));

        let mut robin = robin_map::HashMap::with_capacity_and_hasher(size, BenchState);
        let mut brown = hashbrown::HashMap::with_capacity_and_hasher(size, BenchState);
        for (i, key) in keys.iter().enumerate() {
            robin.insert(key.clone(), i as u64);
            brown.insert(key.clone(), i as u64);
        }

        group.bench_function(format!("robin_map/{}", size), |b| {
            b.iter(|| {
                let mut sum = 0u64;
                for (_, v) in robin.iter() {
                    sum = sum.wrapping_add(*v);
                }
                black_box(sum)
            })
        });
        group.bench_function(format!("hashbrown/{}", size), |b| {
            b.iter(|| {
                let mut sum = 0u64;
                for (_, v) in brown.iter() {
                    sum = sum.wrapping_add(*v);
                }
                black_box(sum)
            })
        });
    }

    group.finish();
}

criterion_group!(
    benches,
    bench_insert_sequential,
    bench_lookup,
    bench_lookup_miss,
    bench_remove,
    bench_iterate
);
criterion_main!(benches);
