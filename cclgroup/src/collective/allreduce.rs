use std::sync::Arc;

use super::{CallShape, issue};
use crate::error::Result;
use crate::gate::EngineGate;
use crate::layout::validate::{require_rank_in_range, require_single_dense};
use crate::memory::Buffer;
use crate::types::{Rank, ReduceOp, flag_unsigned_narrowing, to_wire_dtype};
use crate::work::Work;

/// In-place allreduce: `buf` is both source and destination on every rank.
pub(crate) fn allreduce(gate: &Arc<EngineGate>, buf: &Buffer, op: ReduceOp) -> Result<Work> {
    require_single_dense(buf, "allreduce buffer")?;
    flag_unsigned_narrowing(buf.dtype(), op);

    let attr = CallShape {
        operation: "allreduce",
        dtype: buf.dtype(),
        counts: &[buf.numel()],
        root: None,
    }
    .attr(gate.config());
    let dtype = to_wire_dtype(buf.dtype());

    tracing::debug!(rank = gate.rank(), %op, count = buf.numel(), "allreduce");
    issue(gate, vec![buf.clone()], |engine| {
        engine.allreduce(buf, buf, dtype, op, attr)
    })
}

/// In-place reduce; the result lands in `root`'s `buf` only. Other ranks'
/// buffers are left as they were.
pub(crate) fn reduce(gate: &Arc<EngineGate>, buf: &Buffer, op: ReduceOp, root: Rank) -> Result<Work> {
    require_single_dense(buf, "reduce buffer")?;
    require_rank_in_range(root, gate.size())?;
    flag_unsigned_narrowing(buf.dtype(), op);

    let attr = CallShape {
        operation: "reduce",
        dtype: buf.dtype(),
        counts: &[buf.numel()],
        root: Some(root),
    }
    .attr(gate.config());
    let dtype = to_wire_dtype(buf.dtype());

    tracing::debug!(rank = gate.rank(), %op, root, count = buf.numel(), "reduce");
    issue(gate, vec![buf.clone()], |engine| {
        engine.reduce(buf, buf, dtype, op, root, attr)
    })
}
