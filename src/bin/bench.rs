use anyhow::{Context, Result};
use bagsum::lookup::{Accum, Element, Kernel};
use bagsum::workload::{Workload, WorkloadSpec};
use bagsum::{embedding_lookup, embedding_lookup_par, Lookup, ParallelParams};
use clap::{Parser, ValueEnum};
use indicatif::{ProgressBar, ProgressStyle};
use log::info;
use serde::Serialize;
use std::path::PathBuf;
use std::time::{Duration, Instant};

#[derive(Copy, Clone, Debug, PartialEq, Eq, ValueEnum)]
enum Dtype {
    F32,
    F16,
    U8,
}

#[derive(Parser, Debug)]
#[command(name = "bagsum-bench", version, about = "Benchmark embedding-bag reduction throughput")]
struct Args {
    /// Workload spec as JSON (overrides the workload flags below)
    #[arg(long)]
    config: Option<PathBuf>,

    /// Table rows
    #[arg(long, default_value_t = 100_000)]
    data_size: usize,

    /// Row width
    #[arg(long, default_value_t = 64)]
    block_size: usize,

    /// Number of bags
    #[arg(long, default_value_t = 4096)]
    output_size: usize,

    /// Mean bag length (Poisson)
    #[arg(long, default_value_t = 20.0)]
    mean_bag_len: f64,

    /// Zipf exponent of index popularity (0 = uniform)
    #[arg(long, default_value_t = 1.05)]
    zipf: f64,

    /// Use per-index weights
    #[arg(long, default_value_t = false)]
    weighted: bool,

    /// Mean pooling instead of sum
    #[arg(long, default_value_t = false)]
    normalize: bool,

    /// RNG seed
    #[arg(long, default_value_t = 0x5eed_ba65)]
    seed: u64,

    /// Table element type
    #[arg(long, value_enum, default_value_t = Dtype::F32)]
    dtype: Dtype,

    /// Accumulate in f64 instead of f32
    #[arg(long, default_value_t = false)]
    f64: bool,

    /// Use 32-bit indices
    #[arg(long, default_value_t = false)]
    i32_indices: bool,

    /// Timed iterations
    #[arg(long, default_value_t = 100)]
    iters: usize,

    /// Threads (1 = sequential kernel)
    #[arg(long, default_value_t = 1)]
    threads: usize,

    /// Minimum bags per parallel task
    #[arg(long, default_value_t = 64)]
    min_rows_per_task: usize,

    /// Print a JSON report instead of a summary line
    #[arg(long, default_value_t = false)]
    json: bool,
}

#[derive(Debug, Serialize)]
struct BenchReport {
    dtype: &'static str,
    accum: &'static str,
    index_bits: u32,
    block_size: usize,
    output_size: usize,
    index_size: usize,
    weighted: bool,
    normalize_by_lengths: bool,
    threads: usize,
    iters: usize,
    elapsed_secs: f64,
    us_per_call: f64,
    rows_per_sec: f64,
    table_gbytes_per_sec: f64,
    checksum: f64,
}

impl Args {
    fn workload_spec(&self) -> Result<WorkloadSpec> {
        if let Some(path) = &self.config {
            return WorkloadSpec::from_json_file(path);
        }
        Ok(WorkloadSpec {
            data_size: self.data_size,
            block_size: self.block_size,
            output_size: self.output_size,
            mean_bag_len: self.mean_bag_len,
            zipf_exponent: self.zipf,
            weighted: self.weighted,
            normalize_by_lengths: self.normalize,
            seed: self.seed,
        })
    }
}

fn timed<I, E, O>(args: &Args, lookup: &Lookup<'_, I, E>) -> Result<(Duration, f64)>
where
    I: bagsum::lookup::LookupIndex,
    E: Kernel<O>,
    O: Accum,
{
    let mut out = vec![O::ZERO; lookup.output_len()?];
    let params = ParallelParams { min_rows_per_task: args.min_rows_per_task, ..ParallelParams::default() };
    let run = |out: &mut [O]| -> Result<()> {
        if args.threads > 1 { embedding_lookup_par(lookup, out, &params)?; } else { embedding_lookup(lookup, out)?; }
        Ok(())
    };

    // Warm-up, also surfaces contract errors before timing
    run(&mut out).context("warm-up lookup")?;

    let pb = if args.json { ProgressBar::hidden() } else { ProgressBar::new(args.iters as u64) };
    pb.set_style(
        ProgressStyle::with_template("{bar:40} {pos}/{len} iters [{elapsed_precise}]")
            .context("progress template")?,
    );
    let t0 = Instant::now();
    for _ in 0..args.iters {
        run(&mut out)?;
        pb.inc(1);
    }
    let dt = t0.elapsed();
    pb.finish_and_clear();
    let checksum = out.iter().map(|v| v.to_f64()).sum::<f64>();
    Ok((dt, checksum))
}

fn bench_table<E>(args: &Args, w: &Workload, table: &[E], scale_bias: Option<&[f32]>) -> Result<BenchReport>
where
    E: Kernel<f32> + Kernel<f64>,
{
    let mut lookup = w.lookup(table);
    if let Some(sb) = scale_bias {
        lookup = lookup.with_scale_bias(sb);
    }
    let indices32 = if args.i32_indices { Some(w.indices_i32()?) } else { None };
    let (dt, checksum) = match (&indices32, args.f64) {
        (None, false) => timed::<i64, E, f32>(args, &lookup)?,
        (None, true) => timed::<i64, E, f64>(args, &lookup)?,
        (Some(idx), f64_acc) => {
            let l32 = Lookup {
                block_size: lookup.block_size,
                output_size: lookup.output_size,
                index_size: lookup.index_size,
                data_size: lookup.data_size,
                input: lookup.input,
                indices: idx.as_slice(),
                lengths: lookup.lengths,
                weights: lookup.weights,
                scale_bias: lookup.scale_bias,
                normalize_by_lengths: lookup.normalize_by_lengths,
            };
            if f64_acc { timed::<i32, E, f64>(args, &l32)? } else { timed::<i32, E, f32>(args, &l32)? }
        }
    };

    let secs = dt.as_secs_f64();
    let iters = args.iters.max(1) as f64;
    let rows = w.index_size() as f64 * iters;
    let row_bytes = (w.spec.block_size * std::mem::size_of::<E>()) as f64;
    Ok(BenchReport {
        dtype: <E as Element>::NAME,
        accum: if args.f64 { <f64 as Accum>::NAME } else { <f32 as Accum>::NAME },
        index_bits: if args.i32_indices { 32 } else { 64 },
        block_size: w.spec.block_size,
        output_size: w.spec.output_size,
        index_size: w.index_size(),
        weighted: w.weights.is_some(),
        normalize_by_lengths: w.spec.normalize_by_lengths,
        threads: args.threads.max(1),
        iters: args.iters,
        elapsed_secs: secs,
        us_per_call: secs * 1e6 / iters,
        rows_per_sec: if secs > 0.0 { rows / secs } else { 0.0 },
        table_gbytes_per_sec: if secs > 0.0 { rows * row_bytes / secs / 1e9 } else { 0.0 },
        checksum,
    })
}

fn run(args: &Args) -> Result<BenchReport> {
    let spec = args.workload_spec()?;
    info!("generating workload: {:?}", spec);
    let w = spec.generate().context("generate workload")?;
    info!("workload ready: {} indices over {} bags", w.index_size(), w.spec.output_size);
    match args.dtype {
        Dtype::F32 => bench_table(args, &w, &w.table, None),
        Dtype::F16 => {
            let t = w.table_f16();
            bench_table(args, &w, &t, None)
        }
        Dtype::U8 => {
            let q = w.quantize();
            bench_table(args, &w, &q.codes, Some(&q.scale_bias))
        }
    }
}

fn main() -> Result<()> {
    env_logger::init();
    let args = Args::parse();

    let report = if args.threads > 1 {
        let pool = rayon::ThreadPoolBuilder::new().num_threads(args.threads).build().context("thread pool")?;
        pool.install(|| run(&args))?
    } else {
        run(&args)?
    };

    if args.json {
        println!("{}", serde_json::to_string_pretty(&report)?);
    } else {
        println!(
            "{}->{} block={} bags={} indices={} threads={} {:.2}us/call rows/s={:.3e} table_GB/s={:.2} checksum={:.6}",
            report.dtype,
            report.accum,
            report.block_size,
            report.output_size,
            report.index_size,
            report.threads,
            report.us_per_call,
            report.rows_per_sec,
            report.table_gbytes_per_sec,
            report.checksum
        );
    }
    Ok(())
}
