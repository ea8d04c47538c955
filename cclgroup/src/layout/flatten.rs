//! Detects whether a buffer group already forms one flat region, and stages
//! through a fresh contiguous buffer when it does not.

use crate::error::{CclError, Result};
use crate::memory::Buffer;

/// The result of normalizing a buffer group.
#[derive(Debug, Clone)]
pub struct FlatLayout {
    flat: Buffer,
    counts: Vec<usize>,
    is_flat: bool,
}

/// Normalize `group` (rank order) into one contiguous region.
///
/// The group is flat when every non-empty member views the same storage as
/// the first non-empty member and starts exactly where the previous members
/// end. A flat group is used in place; otherwise a zero-filled staging
/// buffer of the total element count is allocated.
///
/// Members must already share one element type and be contiguous.
pub fn flatten(group: &[Buffer]) -> Result<FlatLayout> {
    let first = group
        .first()
        .ok_or_else(|| CclError::view("cannot flatten an empty buffer group"))?;
    let reference = group.iter().find(|b| b.numel() > 0).unwrap_or(first);

    let mut counts = Vec::with_capacity(group.len());
    let mut running = 0;
    let mut is_flat = true;
    for member in group {
        let n = member.numel();
        if n > 0
            && (!member.aliases(reference)
                || member.storage_offset() != reference.storage_offset() + running)
        {
            is_flat = false;
        }
        counts.push(n);
        running += n;
    }

    let flat = if is_flat {
        reference.flat_span(running)?
    } else {
        Buffer::zeros(reference.dtype(), &[running])
    };
    Ok(FlatLayout {
        flat,
        counts,
        is_flat,
    })
}

impl FlatLayout {
    /// The contiguous region handed to the engine.
    pub fn flat(&self) -> &Buffer {
        &self.flat
    }

    /// Element count of each member, in rank order.
    pub fn counts(&self) -> &[usize] {
        &self.counts
    }

    pub fn is_flat(&self) -> bool {
        self.is_flat
    }

    pub fn total(&self) -> usize {
        self.counts.iter().sum()
    }

    /// Copy every member into its slice of the staging buffer. No-op when
    /// the group is flat.
    pub fn stage_in(&self, group: &[Buffer]) -> Result<()> {
        if self.is_flat {
            return Ok(());
        }
        self.for_each_slice(group, |member, slice| slice.copy_from(member))
    }

    /// Copy each slice of the staging buffer back out to its member. No-op
    /// when the group is flat.
    pub fn split_out(&self, group: &[Buffer]) -> Result<()> {
        if self.is_flat {
            return Ok(());
        }
        self.for_each_slice(group, |member, slice| member.copy_from(slice))
    }

    fn for_each_slice(
        &self,
        group: &[Buffer],
        mut f: impl FnMut(&Buffer, &Buffer) -> Result<()>,
    ) -> Result<()> {
        let mut displ = 0;
        for (member, &n) in group.iter().zip(&self.counts) {
            if n > 0 {
                f(member, &self.flat.narrow(displ, n)?)?;
            }
            displ += n;
        }
        Ok(())
    }
}
