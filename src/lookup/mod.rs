//! Embedding lookup with reduction.
//!
//! `input` holds `data_size` rows of `block_size` elements, `indices` holds
//! `index_size` row numbers, and `lengths` splits them into `output_size`
//! consecutive bags. Each bag reduces to one output row:
//!
//! ```text
//! out[i] = sum over j in bag i of row(indices[j]) * weight(j)
//! out[i] /= lengths[i]          if normalize_by_lengths and lengths[i] > 0
//! ```
//!
//! Quantized tables (`u8`) decode row `k` as `scale[k] * raw + bias[k]`,
//! with the pairs stored interleaved in `scale_bias`.

pub mod element;
pub mod index;
pub mod kernel;
pub mod reference;
pub(crate) mod rows;
#[cfg(all(target_arch = "x86_64", feature = "simd-avx2"))]
pub(crate) mod avx2;

use crate::error::LookupError;
use std::ops::Range;

pub use element::{Accum, Element};
pub use index::LookupIndex;
pub use kernel::Kernel;
pub use reference::embedding_lookup_reference;

/// One reduction call: borrowed buffers plus the size scalars they must match.
#[derive(Debug, Clone, Copy)]
pub struct Lookup<'a, I, E> {
    pub block_size: usize,
    pub output_size: usize,
    pub index_size: usize,
    pub data_size: usize,
    pub input: &'a [E],
    pub indices: &'a [I],
    pub lengths: &'a [i32],
    /// Per-position weights, aligned with `indices`.
    pub weights: Option<&'a [f32]>,
    /// `[scale0, bias0, scale1, bias1, ...]`, one pair per table row.
    pub scale_bias: Option<&'a [f32]>,
    pub normalize_by_lengths: bool,
}

impl<'a, I: LookupIndex, E: Element> Lookup<'a, I, E> {
    /// Sizes are taken from the buffers; `data_size` is `input.len() / block_size`.
    pub fn new(block_size: usize, input: &'a [E], indices: &'a [I], lengths: &'a [i32]) -> Self {
        Self {
            block_size,
            output_size: lengths.len(),
            index_size: indices.len(),
            data_size: input.len().checked_div(block_size).unwrap_or(0),
            input,
            indices,
            lengths,
            weights: None,
            scale_bias: None,
            normalize_by_lengths: false,
        }
    }

    pub fn with_weights(mut self, weights: &'a [f32]) -> Self { self.weights = Some(weights); self }

    pub fn with_scale_bias(mut self, scale_bias: &'a [f32]) -> Self { self.scale_bias = Some(scale_bias); self }

    pub fn normalize_by_lengths(mut self, on: bool) -> Self { self.normalize_by_lengths = on; self }

    /// Number of output elements the call writes.
    pub fn output_len(&self) -> Result<usize, LookupError> {
        self.output_size
            .checked_mul(self.block_size)
            .ok_or(LookupError::ShapeOverflow { rows: self.output_size, block_size: self.block_size })
    }

    /// Checks every precondition of the kernel. Runs in `O(index_size + output_size)`
    /// and touches no table data.
    pub fn validate(&self) -> Result<(), LookupError> {
        if self.block_size == 0 {
            return Err(LookupError::ZeroBlockSize);
        }
        let table_len = self
            .data_size
            .checked_mul(self.block_size)
            .ok_or(LookupError::ShapeOverflow { rows: self.data_size, block_size: self.block_size })?;
        check_len("input", table_len, self.input.len())?;
        check_len("indices", self.index_size, self.indices.len())?;
        check_len("lengths", self.output_size, self.lengths.len())?;
        if let Some(w) = self.weights {
            check_len("weights", self.index_size, w.len())?;
        }
        match (E::QUANTIZED, self.scale_bias) {
            (true, None) => return Err(LookupError::MissingScaleBias),
            (false, Some(_)) => return Err(LookupError::UnexpectedScaleBias),
            (true, Some(sb)) => {
                let pairs = self
                    .data_size
                    .checked_mul(2)
                    .ok_or(LookupError::ShapeOverflow { rows: self.data_size, block_size: 2 })?;
                check_len("scale_bias", pairs, sb.len())?;
            }
            (false, None) => {}
        }

        let mut total: u64 = 0;
        for (bag, &length) in self.lengths.iter().enumerate() {
            if length < 0 {
                return Err(LookupError::NegativeLength { bag, length });
            }
            total += length as u64;
        }
        if total != self.index_size as u64 {
            return Err(LookupError::LengthSum { expected: self.index_size, actual: total });
        }

        for (position, &idx) in self.indices.iter().enumerate() {
            match idx.to_row() {
                Some(row) if row < self.data_size => {}
                _ => {
                    return Err(LookupError::IndexOutOfRange {
                        position,
                        index: idx.to_i64(),
                        data_size: self.data_size,
                    })
                }
            }
        }
        Ok(())
    }

    /// The sub-problem covering bags `rows`, sharing this call's table.
    ///
    /// Panics if `rows` is not within `0..lengths.len()`.
    pub fn bags(&self, rows: Range<usize>) -> Self {
        let first_index = self.lengths[..rows.start].iter().map(|&l| l.max(0) as usize).sum();
        self.slice_rows(rows, first_index)
    }

    /// Like [`Lookup::bags`] with the index offset of `rows.start` already known.
    pub(crate) fn slice_rows(&self, rows: Range<usize>, first_index: usize) -> Self {
        let lengths = &self.lengths[rows.clone()];
        let count: usize = lengths.iter().map(|&l| l.max(0) as usize).sum();
        let end = first_index.saturating_add(count).min(self.indices.len());
        let start = first_index.min(end);
        Self {
            output_size: rows.len(),
            index_size: count,
            indices: &self.indices[start..end],
            lengths,
            weights: self.weights.map(|w| &w[start.min(w.len())..end.min(w.len())]),
            ..*self
        }
    }
}

fn check_len(buffer: &'static str, expected: usize, actual: usize) -> Result<(), LookupError> {
    if expected == actual { Ok(()) } else { Err(LookupError::BufferLength { buffer, expected, actual }) }
}

/// Runs the reduction into `out`, which must hold `output_size * block_size`
/// elements. Everything is validated before the first write; on error `out`
/// is left as it was.
pub fn embedding_lookup<I, E, O>(lookup: &Lookup<'_, I, E>, out: &mut [O]) -> Result<(), LookupError>
where
    I: LookupIndex,
    E: Kernel<O>,
    O: Accum,
{
    lookup.validate()?;
    check_len("output", lookup.output_len()?, out.len())?;
    E::reduce(lookup, out);
    Ok(())
}
