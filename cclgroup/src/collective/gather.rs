use std::sync::Arc;

use super::{CallShape, issue};
use crate::error::Result;
use crate::gate::EngineGate;
use crate::layout::split::single_slot;
use crate::layout::validate::{
    require_group_len, require_homogeneous, require_rank_in_range, require_single_dense,
};
use crate::layout::{SplitPlan, flatten};
use crate::memory::Buffer;
use crate::types::{Rank, to_wire_dtype};
use crate::work::Work;

/// Gather every rank's `input` into `outputs` on `root`.
///
/// Runs as a variable all-to-all in which each rank sends only to the root
/// and only the root receives. Non-root ranks must pass no outputs.
pub(crate) fn gather(
    gate: &Arc<EngineGate>,
    input: &Buffer,
    outputs: &[Buffer],
    root: Rank,
) -> Result<Work> {
    let (rank, size) = (gate.rank(), gate.size());
    require_single_dense(input, "gather input")?;
    require_rank_in_range(root, size)?;
    let dtype = to_wire_dtype(input.dtype());
    let send_counts = single_slot(size, root, input.numel());

    if rank != root {
        require_group_len("gather", outputs, 0)?;
        let plan = SplitPlan {
            send: send_counts,
            recv: vec![0; size as usize],
        };
        let recv = Buffer::empty(input.dtype());
        let attr = CallShape {
            operation: "gather",
            dtype: input.dtype(),
            counts: &[input.numel()],
            root: Some(root),
        }
        .attr(gate.config());

        tracing::debug!(rank, root, count = input.numel(), "gather send");
        return issue(gate, vec![input.clone()], |engine| {
            engine.alltoallv(input, &plan.send, &recv, &plan.recv, dtype, attr)
        });
    }

    require_group_len("gather", outputs, size as usize)?;
    require_homogeneous("gather", input, outputs)?;
    let layout = flatten(outputs)?;
    let plan = SplitPlan {
        send: send_counts,
        recv: layout.counts().to_vec(),
    };
    plan.check_local("gather", rank)?;
    let attr = CallShape {
        operation: "gather",
        dtype: input.dtype(),
        counts: &[input.numel()],
        root: Some(root),
    }
    .attr(gate.config());

    tracing::debug!(rank, root, total = layout.total(), flat = layout.is_flat(), "gather");
    let recv = layout.flat();
    let mut work = issue(gate, vec![recv.clone(), input.clone()], |engine| {
        engine.alltoallv(input, &plan.send, recv, &plan.recv, dtype, attr)
    })?;
    if !layout.is_flat() {
        work.wait()?;
        layout.split_out(outputs)?;
    }
    Ok(work)
}
