//! Argument checks run before any engine interaction.
//!
//! Every function here is pure: it inspects buffer descriptors and returns a
//! validation-kind [`CclError`] on the first violated precondition.

use crate::error::{CclError, Result};
use crate::memory::{Buffer, MemorySpace};
use crate::types::Rank;

/// Contiguous, dense, host-resident. Element counts are unsigned, so the
/// non-negative requirement holds by construction.
pub fn require_single_dense(buf: &Buffer, what: &'static str) -> Result<()> {
    if !buf.is_contiguous() {
        return Err(CclError::NonContiguous { what });
    }
    if buf.is_sparse() {
        return Err(CclError::SparseBuffer { what });
    }
    if buf.space() != MemorySpace::Host {
        return Err(CclError::DeviceBuffer { what });
    }
    Ok(())
}

pub fn require_rank_in_range(rank: Rank, size: u32) -> Result<()> {
    if rank >= size {
        return Err(CclError::InvalidRank { rank, size });
    }
    Ok(())
}

pub fn require_group_len(operation: &'static str, group: &[Buffer], expected: usize) -> Result<()> {
    if group.len() != expected {
        return Err(CclError::GroupSizeMismatch {
            operation,
            expected,
            actual: group.len(),
        });
    }
    Ok(())
}

/// Every member matches `reference` in element count and element type, and
/// is itself a valid single buffer.
pub fn require_homogeneous(
    operation: &'static str,
    reference: &Buffer,
    group: &[Buffer],
) -> Result<()> {
    for (index, buf) in group.iter().enumerate() {
        if buf.numel() != reference.numel() || buf.dtype() != reference.dtype() {
            return Err(CclError::BufferMismatch {
                operation,
                index,
                expected_count: reference.numel(),
                expected_dtype: reference.dtype(),
                actual_count: buf.numel(),
                actual_dtype: buf.dtype(),
            });
        }
        require_single_dense(buf, "group member")?;
    }
    Ok(())
}

/// Every member shares `reference`'s element type; counts may differ.
pub fn require_same_type(
    operation: &'static str,
    reference: &Buffer,
    group: &[Buffer],
) -> Result<()> {
    for buf in group {
        if buf.dtype() != reference.dtype() {
            return Err(CclError::DTypeMismatch {
                operation,
                expected: reference.dtype(),
                actual: buf.dtype(),
            });
        }
        require_single_dense(buf, "group member")?;
    }
    Ok(())
}

/// Empty `sizes` means an equal split, so dim 0 must divide by the group
/// size. Otherwise there is one entry per rank summing to dim 0.
pub fn require_split_sizes_consistent(sizes: &[usize], buf: &Buffer, group_size: u32) -> Result<()> {
    let extent = buf
        .leading_dim()
        .ok_or_else(|| CclError::split_sizes("buffer has no dim 0"))?;

    if sizes.is_empty() {
        if group_size == 0 || extent % group_size as usize != 0 {
            return Err(CclError::IndivisibleCount { extent, group_size });
        }
        return Ok(());
    }

    if sizes.len() != group_size as usize {
        return Err(CclError::split_sizes(format!(
            "{} splits for group size {group_size}",
            sizes.len()
        )));
    }
    let sum: usize = sizes.iter().sum();
    if sum != extent {
        return Err(CclError::split_sizes(format!(
            "splits sum to {sum}, dim 0 is {extent}"
        )));
    }
    Ok(())
}
