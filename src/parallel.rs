//! Bag-parallel driver on top of the sequential kernel.
//!
//! Bags are split into contiguous row ranges; every task reads the shared
//! table and writes only its own slice of the output, so no synchronization
//! is needed and the result is identical to the sequential call.

use crate::error::LookupError;
use crate::lookup::{Accum, Kernel, Lookup, LookupIndex};
use log::debug;
use rayon::prelude::*;
use serde::{Deserialize, Serialize};
use std::ops::Range;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct ParallelParams {
    /// Lower bound on bags per task.
    pub min_rows_per_task: usize,
    /// Target number of tasks per pool thread, for load balance across
    /// uneven bag lengths.
    pub tasks_per_thread: usize,
}

impl Default for ParallelParams {
    fn default() -> Self { Self { min_rows_per_task: 64, tasks_per_thread: 4 } }
}

impl ParallelParams {
    /// Bags per task for `output_size` bags on a pool of `threads` threads.
    ///
    /// Never more than `output_size`, so a huge `min_rows_per_task` means a
    /// single task.
    pub fn rows_per_task(&self, output_size: usize, threads: usize) -> usize {
        let tasks = threads.max(1).saturating_mul(self.tasks_per_thread.max(1));
        output_size.div_ceil(tasks).max(self.min_rows_per_task).min(output_size).max(1)
    }
}

/// Row range and first index position of each task.
fn plan_tasks(lengths: &[i32], rows_per_task: usize) -> Vec<(Range<usize>, usize)> {
    let mut tasks = Vec::with_capacity(lengths.len().div_ceil(rows_per_task));
    let mut first_index = 0usize;
    for (t, chunk) in lengths.chunks(rows_per_task).enumerate() {
        let start = t * rows_per_task;
        tasks.push((start..start + chunk.len(), first_index));
        first_index += chunk.iter().map(|&l| l.max(0) as usize).sum::<usize>();
    }
    tasks
}

/// Same contract as [`crate::lookup::embedding_lookup`], run on the current
/// rayon pool. Install a pool around the call to control the thread count.
pub fn embedding_lookup_par<I, E, O>(
    lookup: &Lookup<'_, I, E>,
    out: &mut [O],
    params: &ParallelParams,
) -> Result<(), LookupError>
where
    I: LookupIndex,
    E: Kernel<O>,
    O: Accum,
{
    lookup.validate()?;
    let expected = lookup.output_len()?;
    if out.len() != expected {
        return Err(LookupError::BufferLength { buffer: "output", expected, actual: out.len() });
    }
    let threads = rayon::current_num_threads();
    let rows_per_task = params.rows_per_task(lookup.output_size, threads);
    let tasks = plan_tasks(lookup.lengths, rows_per_task);
    debug!(
        "parallel lookup: {} bags in {} tasks of <= {} rows on {} threads",
        lookup.output_size,
        tasks.len(),
        rows_per_task,
        threads
    );
    out.par_chunks_mut(rows_per_task * lookup.block_size)
        .zip(tasks.par_iter())
        .for_each(|(chunk, (rows, first_index))| {
            let sub = lookup.slice_rows(rows.clone(), *first_index);
            E::reduce(&sub, chunk);
        });
    Ok(())
}
