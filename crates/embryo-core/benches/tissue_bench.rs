use criterion::{BatchSize, Criterion, criterion_group, criterion_main};
use embryo_core::{Embryo, TissueConfig};
use std::time::Duration;

fn env_or<T: std::str::FromStr>(key: &str, default: T) -> T {
    std::env::var(key)
        .ok()
        .and_then(|s| s.parse::<T>().ok())
        .unwrap_or(default)
}

fn bench_tissue_steps(c: &mut Criterion) {
    let mut group = c.benchmark_group("tissue_step");
    group.sample_size(env_or("EMBRYO_BENCH_SAMPLES", 20_usize).max(10));
    group.warm_up_time(Duration::from_secs(env_or("EMBRYO_BENCH_WARMUP_SECS", 2)));
    group.measurement_time(Duration::from_secs(env_or("EMBRYO_BENCH_MEASURE_SECS", 10)));
    // Ticks per iteration, and how long the tissue grows before measuring.
    let steps: usize = env_or("EMBRYO_BENCH_STEPS", 16_usize).max(1);
    let warm_ticks: usize = env_or("EMBRYO_BENCH_GROWN_TICKS", 200);

    for &side in &[100_u32, 200] {
        group.bench_function(format!("steps{steps}_grid{side}_grown{warm_ticks}"), |b| {
            b.iter_batched(
                || {
                    let config = TissueConfig {
                        width: side,
                        height: side,
                        rng_seed: Some(0xBEEF),
                        history_capacity: 1,
                        ..TissueConfig::default()
                    };
                    let mut embryo = Embryo::new(config).expect("embryo");
                    for _ in 0..warm_ticks {
                        embryo.step();
                    }
                    embryo
                },
                |mut embryo| {
                    for _ in 0..steps {
                        embryo.step();
                    }
                },
                BatchSize::LargeInput,
            );
        });
    }
    group.finish();
}

criterion_group!(benches, bench_tissue_steps);
criterion_main!(benches);
