use std::sync::Arc;

use super::{CallShape, issue};
use crate::error::Result;
use crate::gate::EngineGate;
use crate::layout::validate::{require_rank_in_range, require_single_dense};
use crate::memory::Buffer;
use crate::types::{Rank, to_wire_dtype};
use crate::work::Work;

/// Broadcast `buf` from `root` to every rank, in place.
pub(crate) fn broadcast(gate: &Arc<EngineGate>, buf: &Buffer, root: Rank) -> Result<Work> {
    require_single_dense(buf, "broadcast buffer")?;
    require_rank_in_range(root, gate.size())?;

    let attr = CallShape {
        operation: "broadcast",
        dtype: buf.dtype(),
        counts: &[buf.numel()],
        root: Some(root),
    }
    .attr(gate.config());
    let dtype = to_wire_dtype(buf.dtype());

    tracing::debug!(rank = gate.rank(), root, count = buf.numel(), "broadcast");
    issue(gate, vec![buf.clone()], |engine| {
        engine.broadcast(buf, root, dtype, attr)
    })
}
