//! Performance benchmarks for dispatch_core using Criterion.rs.

use criterion::{black_box, criterion_group, criterion_main, BenchmarkId, Criterion};
use dispatch_core::config::DispatchConfig;
use dispatch_core::dispatch::Dispatch;
use dispatch_core::pool::DriverPool;
use dispatch_core::test_helpers::{test_driver, test_passenger};
use tokio::runtime::Runtime;

fn runtime() -> Runtime {
    tokio::runtime::Builder::new_multi_thread()
        .enable_time()
        .build()
        .expect("benchmark runtime")
}

fn bench_pool_cycle(c: &mut Criterion) {
    let rt = runtime();
    let pool = DriverPool::new(64);
    for i in 0..8 {
        pool.release(test_driver(i, 0)).expect("seed pool");
    }

    c.bench_function("pool_acquire_release", |b| {
        b.iter(|| {
            rt.block_on(async {
                let driver = pool.acquire().await;
                pool.release(black_box(driver)).expect("release");
            })
        });
    });
}

fn bench_dispatch_run(c: &mut Criterion) {
    let rt = runtime();
    let scenarios = vec![("small", 2, 100), ("medium", 8, 1_000), ("large", 32, 5_000)];

    let mut group = c.benchmark_group("dispatch_run");
    for (name, drivers, bookings) in scenarios {
        group.bench_with_input(
            BenchmarkId::from_parameter(name),
            &(drivers, bookings),
            |b, &(drivers, bookings)| {
                b.iter(|| {
                    rt.block_on(async {
                        let config = DispatchConfig::default()
                            .with_region("north", 8)
                            .with_region("south", 8)
                            .with_seed(42);
                        let dispatch = Dispatch::new(config).expect("dispatch");
                        for i in 0..drivers {
                            dispatch.add_driver(test_driver(i, 0)).expect("driver");
                        }
                        let handles = (0..bookings)
                            .map(|i| {
                                let region = if i % 2 == 0 { "north" } else { "south" };
                                dispatch
                                    .book_passenger(test_passenger(i, 0), region)
                                    .expect("accepted")
                            })
                            .collect::<Vec<_>>();
                        for handle in handles {
                            black_box(handle.await.expect("completed"));
                        }
                    })
                });
            },
        );
    }
    group.finish();
}

criterion_group!(benches, bench_pool_cycle, bench_dispatch_run);
criterion_main!(benches);
