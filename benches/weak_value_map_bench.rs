use criterion::{black_box, criterion_group, criterion_main, BatchSize, Criterion};
use std::rc::Rc;
use std::time::Duration;
use weak_value_map::{SweepPolicy, WeakValueMap};

fn lcg(mut s: u64) -> impl Iterator<Item = u64> {
    std::iter::from_fn(move || {
        s = s.wrapping_mul(6364136223846793005).wrapping_add(1);
        Some(s)
    })
}

fn key(n: u64) -> String {
    format!("k{:016x}", n)
}

fn bench_insert(c: &mut Criterion) {
    c.bench_function("weak_value_map_insert_10k", |b| {
        let values: Vec<Rc<u64>> = (0..10_000).map(Rc::new).collect();
        let keys: Vec<String> = lcg(1).take(10_000).map(key).collect();
        b.iter_batched(
            WeakValueMap::<String, u64>::new,
            |mut m| {
                for (k, v) in keys.iter().zip(&values) {
                    m.insert(k.clone(), v);
                }
                black_box(m)
            },
            BatchSize::SmallInput,
        )
    });
}

fn bench_get_hit(c: &mut Criterion) {
    c.bench_function("weak_value_map_get_hit", |b| {
        let mut m = WeakValueMap::new();
        let keys: Vec<_> = lcg(7).take(20_000).map(key).collect();
        // Keep the values alive so every lookup upgrades.
        let held: Vec<Rc<u64>> = (0..keys.len() as u64).map(Rc::new).collect();
        for (k, v) in keys.iter().zip(&held) {
            m.insert(k.clone(), v);
        }
        let mut it = keys.iter().cycle();
        b.iter(|| {
            let k = it.next().unwrap();
            black_box(m.get(k.as_str()));
        })
    });
}

fn bench_get_miss(c: &mut Criterion) {
    c.bench_function("weak_value_map_get_miss", |b| {
        let mut m = WeakValueMap::new();
        let held: Vec<Rc<u64>> = (0..10_000).map(Rc::new).collect();
        for (x, v) in lcg(11).zip(&held) {
            m.insert(key(x), v);
        }
        let mut miss = lcg(0xdead_beef);
        b.iter(|| {
            let k = key(miss.next().unwrap());
            black_box(m.get(k.as_str()));
        })
    });
}

fn bench_sweep(c: &mut Criterion) {
    c.bench_function("weak_value_map_sweep_half_dead_10k", |b| {
        b.iter_batched(
            || {
                let mut m = WeakValueMap::new().with_sweep_policy(SweepPolicy::Manual);
                let mut held = Vec::with_capacity(5_000);
                for (i, x) in lcg(3).take(10_000).enumerate() {
                    let v = Rc::new(i as u64);
                    m.insert(key(x), &v);
                    if i % 2 == 0 {
                        held.push(v);
                    }
                }
                (m, held)
            },
            |(mut m, held)| {
                black_box(m.sweep());
                black_box((m, held))
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
    targets = bench_insert, bench_get_hit, bench_get_miss, bench_sweep
}
criterion_main!(benches);
