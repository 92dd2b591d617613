use bagsum::workload::WorkloadSpec;
use bagsum::{embedding_lookup, embedding_lookup_par, ParallelParams};
use criterion::{black_box, criterion_group, criterion_main, BenchmarkId, Criterion};

fn bench_parallel(c: &mut Criterion) {
    let w = WorkloadSpec { data_size: 500_000, block_size: 64, output_size: 16_384, mean_bag_len: 30.0, ..WorkloadSpec::default() }
        .generate()
        .expect("workload");
    let lk = w.lookup(&w.table);
    let mut out = vec![0f32; lk.output_size * lk.block_size];

    let mut group = c.benchmark_group("bags_16k_block_64");
    group.sample_size(20);
    group.bench_function("sequential", |b| {
        b.iter(|| {
            embedding_lookup(black_box(&lk), &mut out).expect("lookup");
            black_box(&out);
        })
    });
    for threads in [2usize, 4, 8] {
        let pool = rayon::ThreadPoolBuilder::new().num_threads(threads).build().expect("thread pool");
        let params = ParallelParams::default();
        group.bench_with_input(BenchmarkId::new("parallel", threads), &threads, |b, _| {
            b.iter(|| {
                pool.install(|| embedding_lookup_par(black_box(&lk), &mut out, &params)).expect("lookup");
                black_box(&out);
            })
        });
    }
    group.finish();
}

criterion_group!(benches, bench_parallel);
criterion_main!(benches);
