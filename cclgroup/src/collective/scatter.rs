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

/// Scatter `inputs[r]` from `root` into `output` on rank `r`.
///
/// The mirror image of gather: only the root sends, each rank receives its
/// slice from the root. Non-root ranks must pass no inputs.
pub(crate) fn scatter(
    gate: &Arc<EngineGate>,
    output: &Buffer,
    inputs: &[Buffer],
    root: Rank,
) -> Result<Work> {
    let (rank, size) = (gate.rank(), gate.size());
    require_single_dense(output, "scatter output")?;
    require_rank_in_range(root, size)?;
    let dtype = to_wire_dtype(output.dtype());
    let recv_counts = single_slot(size, root, output.numel());
    let attr = CallShape {
        operation: "scatter",
        dtype: output.dtype(),
        counts: &[output.numel()],
        root: Some(root),
    }
    .attr(gate.config());

    if rank != root {
        require_group_len("scatter", inputs, 0)?;
        let plan = SplitPlan {
            send: vec![0; size as usize],
            recv: recv_counts,
        };
        let send = Buffer::empty(output.dtype());

        tracing::debug!(rank, root, count = output.numel(), "scatter receive");
        return issue(gate, vec![output.clone()], |engine| {
            engine.alltoallv(&send, &plan.send, output, &plan.recv, dtype, attr)
        });
    }

    require_group_len("scatter", inputs, size as usize)?;
    require_homogeneous("scatter", output, inputs)?;
    let layout = flatten(inputs)?;
    let plan = SplitPlan {
        send: layout.counts().to_vec(),
        recv: recv_counts,
    };
    plan.check_local("scatter", rank)?;
    layout.stage_in(inputs)?;

    tracing::debug!(rank, root, total = layout.total(), flat = layout.is_flat(), "scatter");
    let send = layout.flat();
    issue(gate, vec![send.clone(), output.clone()], |engine| {
        engine.alltoallv(send, &plan.send, output, &plan.recv, dtype, attr)
    })
}
