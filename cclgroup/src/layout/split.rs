//! Per-rank element counts for variable-count collectives.

use crate::error::{CclError, Result};
use crate::memory::Buffer;
use crate::types::Rank;

/// Send and receive element counts, one entry per rank.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct SplitPlan {
    pub send: Vec<usize>,
    pub recv: Vec<usize>,
}

impl SplitPlan {
    /// Counts for a variable all-to-all over `input`/`output`. An empty
    /// split list means an equal split of that side.
    ///
    /// Split lists must already have passed
    /// [`require_split_sizes_consistent`](super::validate::require_split_sizes_consistent).
    pub fn alltoall(
        input: &Buffer,
        input_splits: &[usize],
        output: &Buffer,
        output_splits: &[usize],
        size: u32,
    ) -> Result<Self> {
        Ok(Self {
            send: side_counts(input, input_splits, size)?,
            recv: side_counts(output, output_splits, size)?,
        })
    }

    /// The local rank must send itself exactly what it expects to receive.
    pub fn check_local(&self, operation: &'static str, rank: Rank) -> Result<()> {
        let r = rank as usize;
        let send = self.send.get(r).copied().unwrap_or(0);
        let recv = self.recv.get(r).copied().unwrap_or(0);
        if send != recv {
            return Err(CclError::CountMismatch {
                operation,
                send,
                recv,
            });
        }
        Ok(())
    }
}

fn side_counts(buf: &Buffer, splits: &[usize], size: u32) -> Result<Vec<usize>> {
    if splits.is_empty() {
        Ok(equal_counts(buf.numel(), size))
    } else {
        explicit_counts(buf, splits)
    }
}

/// `total / size` elements for every rank.
pub fn equal_counts(total: usize, size: u32) -> Vec<usize> {
    let size = size.max(1) as usize;
    vec![total / size; size]
}

/// Scale per-rank dim-0 lengths by the element count of one dim-0 row.
pub fn explicit_counts(buf: &Buffer, splits: &[usize]) -> Result<Vec<usize>> {
    let extent = buf
        .leading_dim()
        .ok_or_else(|| CclError::split_sizes("buffer has no dim 0"))?;
    let row = if extent == 0 { 0 } else { buf.numel() / extent };
    Ok(splits.iter().map(|&s| s * row).collect())
}

/// Zero for every rank except `slot`, which gets `count`.
///
/// Rooted collectives run as a variable all-to-all where only the root
/// exchanges data; every other rank still gets an explicit zero entry.
pub fn single_slot(size: u32, slot: Rank, count: usize) -> Vec<usize> {
    let mut counts = vec![0; size as usize];
    if let Some(c) = counts.get_mut(slot as usize) {
        *c = count;
    }
    counts
}
