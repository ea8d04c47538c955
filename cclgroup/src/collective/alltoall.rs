use std::sync::Arc;

use super::{CallShape, issue};
use crate::error::{CclError, Result};
use crate::gate::EngineGate;
use crate::layout::validate::{
    require_group_len, require_same_type, require_single_dense, require_split_sizes_consistent,
};
use crate::layout::{SplitPlan, flatten};
use crate::memory::Buffer;
use crate::types::to_wire_dtype;
use crate::work::Work;

/// Exchange `inputs[r]` with rank `r`, receiving into `outputs[r]`.
///
/// Members may differ in length but not in element type. Non-flat inputs
/// are staged before the call; non-flat outputs make the call synchronous
/// so results can be copied back before returning.
pub(crate) fn alltoall(gate: &Arc<EngineGate>, outputs: &[Buffer], inputs: &[Buffer]) -> Result<Work> {
    let size = gate.size() as usize;
    require_group_len("alltoall", outputs, size)?;
    require_group_len("alltoall", inputs, size)?;
    let reference = inputs.first().ok_or(CclError::GroupSizeMismatch {
        operation: "alltoall",
        expected: size,
        actual: 0,
    })?;
    require_same_type("alltoall", reference, inputs)?;
    require_same_type("alltoall", reference, outputs)?;

    let send = flatten(inputs)?;
    let recv = flatten(outputs)?;
    send.stage_in(inputs)?;

    let dtype = to_wire_dtype(reference.dtype());
    let attr = CallShape {
        operation: "alltoall",
        dtype: reference.dtype(),
        counts: &[send.counts(), recv.counts()].concat(),
        root: None,
    }
    .attr(gate.config());

    tracing::debug!(
        rank = gate.rank(),
        send_flat = send.is_flat(),
        recv_flat = recv.is_flat(),
        "alltoall"
    );
    let pinned = vec![send.flat().clone(), recv.flat().clone()];
    let mut work = issue(gate, pinned, |engine| {
        engine.alltoallv(
            send.flat(),
            send.counts(),
            recv.flat(),
            recv.counts(),
            dtype,
            attr,
        )
    })?;
    if !recv.is_flat() {
        work.wait()?;
        recv.split_out(outputs)?;
    }
    Ok(work)
}

/// All-to-all over single buffers, split along dim 0.
///
/// With both split lists empty this is a fixed-size exchange of
/// `numel / size` elements per rank. Otherwise each list (or an equal split
/// where a list is empty) gives the dim-0 rows sent to or received from
/// each rank.
pub(crate) fn alltoall_base(
    gate: &Arc<EngineGate>,
    output: &Buffer,
    input: &Buffer,
    output_splits: &[usize],
    input_splits: &[usize],
) -> Result<Work> {
    let size = gate.size();
    require_single_dense(output, "alltoall output")?;
    require_single_dense(input, "alltoall input")?;
    let dtype = to_wire_dtype(input.dtype());
    let pinned = vec![input.clone(), output.clone()];

    if output_splits.is_empty() && input_splits.is_empty() {
        if output.numel() != input.numel() || output.dtype() != input.dtype() {
            return Err(CclError::BufferMismatch {
                operation: "alltoall_base",
                index: 0,
                expected_count: input.numel(),
                expected_dtype: input.dtype(),
                actual_count: output.numel(),
                actual_dtype: output.dtype(),
            });
        }
        require_split_sizes_consistent(&[], output, size)?;
        let count = input.numel() / size as usize;
        let attr = CallShape {
            operation: "alltoall_base",
            dtype: input.dtype(),
            counts: &[count],
            root: None,
        }
        .attr(gate.config());

        tracing::debug!(rank = gate.rank(), count, "alltoall_base equal split");
        return issue(gate, pinned, |engine| {
            engine.alltoall(input, output, count, dtype, attr)
        });
    }

    require_split_sizes_consistent(output_splits, output, size)?;
    require_split_sizes_consistent(input_splits, input, size)?;
    if output.dtype() != input.dtype() {
        return Err(CclError::DTypeMismatch {
            operation: "alltoall_base",
            expected: input.dtype(),
            actual: output.dtype(),
        });
    }
    let plan = SplitPlan::alltoall(input, input_splits, output, output_splits, size)?;
    let attr = CallShape {
        operation: "alltoall_base",
        dtype: input.dtype(),
        counts: &[plan.send.as_slice(), plan.recv.as_slice()].concat(),
        root: None,
    }
    .attr(gate.config());

    tracing::debug!(rank = gate.rank(), send = ?plan.send, recv = ?plan.recv, "alltoall_base");
    issue(gate, pinned, |engine| {
        engine.alltoallv(input, &plan.send, output, &plan.recv, dtype, attr)
    })
}
