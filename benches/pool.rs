//! Benchmarks for the worker pool's submit/resolve path.
//!
//! Measures single-threaded submission throughput, submit+wait latency, and
//! scaling across worker counts.

use criterion::{black_box, criterion_group, criterion_main, BenchmarkId, Criterion, Throughput};
use taskmill::pool::ThreadPool;

const TASKS_PER_ITER: u64 = 1_000;

fn bench_submit_wait_roundtrip(c: &mut Criterion) {
    let mut group = c.benchmark_group("submit_wait_roundtrip");
    group.throughput(Throughput::Elements(1));

    let pool = ThreadPool::new(2).unwrap();
    group.bench_function("single_task", |b| {
        b.iter(|| {
            let handle = pool.submit(|| black_box(21) * 2);
            black_box(handle.wait().unwrap());
        })
    });
    group.finish();
}

fn bench_submission_burst(c: &mut Criterion) {
    let mut group = c.benchmark_group("submission_burst");
    group.throughput(Throughput::Elements(TASKS_PER_ITER));

    for workers in [1usize, 2, 4, 8] {
        let pool = ThreadPool::new(workers).unwrap();
        group.bench_with_input(
            BenchmarkId::from_parameter(workers),
            &workers,
            |b, _| {
                b.iter(|| {
                    let handles: Vec<_> = (0..TASKS_PER_ITER)
                        .map(|i| pool.submit(move || black_box(i).wrapping_mul(31)))
                        .collect();
                    for handle in handles {
                        black_box(handle.wait().unwrap());
                    }
                })
            },
        );
    }
    group.finish();
}

fn bench_quiescence_wait(c: &mut Criterion) {
    let mut group = c.benchmark_group("quiescence");

    let pool = ThreadPool::new(4).unwrap();
    group.bench_function("wait_for_tasks_after_burst", |b| {
        b.iter(|| {
            for _ in 0..64 {
                drop(pool.submit(|| ()));
            }
            pool.wait_for_tasks();
        })
    });
    group.finish();
}

criterion_group!(
    benches,
    bench_submit_wait_roundtrip,
    bench_submission_burst,
    bench_quiescence_wait
);
criterion_main!(benches);
