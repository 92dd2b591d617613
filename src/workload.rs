//! Synthetic embedding-bag workloads for benches, the `bench` binary and tests.
//!
//! Index popularity follows a Zipf law (a few hot rows, a long tail) and bag
//! lengths are Poisson distributed, which is roughly what categorical
//! features look like in recommendation traffic.

use crate::lookup::Lookup;
use anyhow::{anyhow, bail, Context, Result};
use half::f16;
use rand::rngs::SmallRng;
use rand::{Rng, SeedableRng};
use rand_distr::{Distribution, Normal, Poisson, Zipf};
use serde::{Deserialize, Serialize};
use std::fs::File;
use std::io::BufReader;
use std::path::Path;

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct WorkloadSpec {
    /// Table rows.
    pub data_size: usize,
    pub block_size: usize,
    /// Number of bags.
    pub output_size: usize,
    pub mean_bag_len: f64,
    /// Zipf exponent of index popularity; 0 is uniform.
    pub zipf_exponent: f64,
    pub weighted: bool,
    pub normalize_by_lengths: bool,
    pub seed: u64,
}

impl Default for WorkloadSpec {
    fn default() -> Self {
        Self {
            data_size: 100_000,
            block_size: 64,
            output_size: 4096,
            mean_bag_len: 20.0,
            zipf_exponent: 1.05,
            weighted: false,
            normalize_by_lengths: false,
            seed: 0x5eed_ba65,
        }
    }
}

impl WorkloadSpec {
    pub fn from_json_file<P: AsRef<Path>>(path: P) -> Result<Self> {
        let f = File::open(&path).with_context(|| format!("open workload spec: {}", path.as_ref().display()))?;
        serde_json::from_reader(BufReader::new(f))
            .with_context(|| format!("parse workload spec: {}", path.as_ref().display()))
    }

    pub fn generate(&self) -> Result<Workload> {
        if self.block_size == 0 {
            bail!("block_size must be positive");
        }
        let mut rng = SmallRng::seed_from_u64(self.seed);

        let normal = Normal::new(0.0f32, 0.1).map_err(|e| anyhow!("table distribution: {e:?}"))?;
        let table: Vec<f32> = (0..self.data_size * self.block_size).map(|_| normal.sample(&mut rng)).collect();

        let lengths: Vec<i32> = if self.data_size == 0 || self.mean_bag_len <= 0.0 {
            vec![0; self.output_size]
        } else {
            let poisson = Poisson::new(self.mean_bag_len)
                .map_err(|e| anyhow!("bag length distribution (mean {}): {e:?}", self.mean_bag_len))?;
            (0..self.output_size)
                .map(|_| {
                    let n: f64 = poisson.sample(&mut rng);
                    n.min(i32::MAX as f64) as i32
                })
                .collect()
        };
        let index_size: usize = lengths.iter().map(|&l| l as usize).sum();

        let indices: Vec<i64> = if index_size == 0 {
            Vec::new()
        } else {
            let zipf = Zipf::new(self.data_size as u64, self.zipf_exponent)
                .map_err(|e| anyhow!("index distribution (exponent {}): {e:?}", self.zipf_exponent))?;
            // Zipf ranks start at 1; scatter them so hot rows are not adjacent.
            let stride = scatter_stride(self.data_size as u64);
            (0..index_size)
                .map(|_| {
                    let rank: f64 = zipf.sample(&mut rng);
                    let r = (rank as u64).clamp(1, self.data_size as u64) - 1;
                    scatter(r, stride, self.data_size as u64) as i64
                })
                .collect()
        };

        let weights = self.weighted.then(|| (0..index_size).map(|_| rng.gen_range(0.0f32..2.0)).collect());

        Ok(Workload { spec: self.clone(), table, indices, lengths, weights })
    }
}

/// An odd multiplier coprime with `n`, so `r * stride % n` permutes `0..n`.
fn scatter_stride(n: u64) -> u64 {
    let mut stride = 0x9e37_79b9u64 % n.max(1) | 1;
    while gcd(stride, n) != 1 {
        stride += 2;
    }
    stride
}

/// `rank * stride % n` without overflowing for tables past 2^32 rows.
fn scatter(rank: u64, stride: u64, n: u64) -> u64 {
    (rank as u128 * stride as u128 % n as u128) as u64
}

fn gcd(mut a: u64, mut b: u64) -> u64 {
    while b != 0 {
        (a, b) = (b, a % b);
    }
    a
}

/// Owned buffers of one generated workload.
#[derive(Debug, Clone)]
pub struct Workload {
    pub spec: WorkloadSpec,
    pub table: Vec<f32>,
    pub indices: Vec<i64>,
    pub lengths: Vec<i32>,
    pub weights: Option<Vec<f32>>,
}

/// A table stored as `u8` codes with one `(scale, bias)` pair per row.
#[derive(Debug, Clone)]
pub struct QuantizedTable {
    pub codes: Vec<u8>,
    pub scale_bias: Vec<f32>,
}

impl Workload {
    pub fn index_size(&self) -> usize { self.indices.len() }

    pub fn indices_i32(&self) -> Result<Vec<i32>> {
        self.indices
            .iter()
            .map(|&i| i32::try_from(i).with_context(|| format!("index {} does not fit in i32", i)))
            .collect()
    }

    pub fn table_f16(&self) -> Vec<f16> { self.table.iter().map(|&v| f16::from_f32(v)).collect() }

    pub fn quantize(&self) -> QuantizedTable { quantize_rows(&self.table, self.spec.block_size) }

    /// A lookup over this workload's indices, lengths and weights with the
    /// given table, which must have `data_size` rows.
    pub fn lookup<'a, E: crate::lookup::Element>(&'a self, table: &'a [E]) -> Lookup<'a, i64, E> {
        let mut lk = Lookup::new(self.spec.block_size, table, &self.indices, &self.lengths)
            .normalize_by_lengths(self.spec.normalize_by_lengths);
        lk.data_size = self.spec.data_size;
        if let Some(w) = &self.weights {
            lk = lk.with_weights(w);
        }
        lk
    }
}

/// Per-row min/max quantization to 8 bits: `scale = (max - min) / 255`,
/// `bias = min`. Constant rows get scale 0 and decode to exactly `bias`.
pub fn quantize_rows(table: &[f32], block_size: usize) -> QuantizedTable {
    let rows = table.len().checked_div(block_size).unwrap_or(0);
    let mut codes = Vec::with_capacity(rows * block_size);
    let mut scale_bias = Vec::with_capacity(rows * 2);
    for row in table.chunks_exact(block_size.max(1)).take(rows) {
        let min = row.iter().copied().fold(f32::INFINITY, f32::min);
        let max = row.iter().copied().fold(f32::NEG_INFINITY, f32::max);
        let scale = (max - min) / 255.0;
        for &v in row {
            let q = if scale > 0.0 { ((v - min) / scale).round().clamp(0.0, 255.0) } else { 0.0 };
            codes.push(q as u8);
        }
        scale_bias.push(scale);
        scale_bias.push(min);
    }
    QuantizedTable { codes, scale_bias }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn scatter_stride_is_coprime() {
        for n in [1u64, 2, 3, 10, 97, 1000, 65536] {
            assert_eq!(gcd(scatter_stride(n), n), 1, "n={n}");
        }
    }

    #[test]
    fn scatter_stays_in_range_for_huge_tables() {
        let n = (1u64 << 40) + 7;
        let stride = scatter_stride(n);
        assert!(stride > u64::MAX / n, "stride {stride} too small to overflow a u64 product");
        for rank in [0, 1, n / 2, n - 1] {
            let row = scatter(rank, stride, n);
            assert!(row < n);
            assert_eq!(row as u128, rank as u128 * stride as u128 % n as u128);
        }
        assert_eq!(scatter(3, 5, 7), 1);
    }

    #[test]
    fn quantized_rows_decode_within_half_step() {
        let table = [0.0f32, 0.5, -1.0, 2.0, 3.0, 3.0, 3.0, 3.0];
        let q = quantize_rows(&table, 4);
        assert_eq!(q.codes.len(), 8);
        for (r, row) in table.chunks(4).enumerate() {
            let (scale, bias) = (q.scale_bias[2 * r], q.scale_bias[2 * r + 1]);
            for (c, &v) in row.iter().enumerate() {
                let decoded = scale * q.codes[r * 4 + c] as f32 + bias;
                assert!((decoded - v).abs() <= scale / 2.0 + 1e-6, "row {r} col {c}: {decoded} vs {v}");
            }
        }
        assert_eq!(q.scale_bias[2], 0.0);
    }
}
