use std::sync::Arc;

use super::{CallShape, issue};
use crate::engine::RecvTarget;
use crate::error::Result;
use crate::gate::EngineGate;
use crate::layout::flatten;
use crate::layout::validate::{require_group_len, require_homogeneous, require_single_dense};
use crate::memory::Buffer;
use crate::types::to_wire_dtype;
use crate::work::Work;

/// Gather every rank's `input` into `outputs[r]` on every rank.
///
/// Three paths, in order of preference:
/// - vector receive (config toggle): the engine writes each output directly;
/// - flat outputs: the engine writes straight into their shared storage;
/// - otherwise: stage through one flat buffer, wait, and copy out. The
///   returned handle is already completed.
pub(crate) fn allgather(gate: &Arc<EngineGate>, input: &Buffer, outputs: &[Buffer]) -> Result<Work> {
    let size = gate.size() as usize;
    require_single_dense(input, "allgather input")?;
    require_group_len("allgather", outputs, size)?;
    require_homogeneous("allgather", input, outputs)?;

    let recv_counts = vec![input.numel(); size];
    let attr = CallShape {
        operation: "allgather",
        dtype: input.dtype(),
        counts: &recv_counts,
        root: None,
    }
    .attr(gate.config());
    let dtype = to_wire_dtype(input.dtype());

    if gate.config().vector_allgatherv {
        tracing::debug!(rank = gate.rank(), count = input.numel(), "allgather into per-rank outputs");
        let mut pinned = outputs.to_vec();
        pinned.push(input.clone());
        return issue(gate, pinned, |engine| {
            engine.allgatherv(input, RecvTarget::Scattered(outputs.to_vec()), &recv_counts, dtype, attr)
        });
    }

    let layout = flatten(outputs)?;
    tracing::debug!(
        rank = gate.rank(),
        count = input.numel(),
        flat = layout.is_flat(),
        "allgather"
    );
    let recv = layout.flat().clone();
    let pinned = vec![recv.clone(), input.clone()];
    let mut work = issue(gate, pinned, |engine| {
        engine.allgatherv(input, RecvTarget::Flat(recv), &recv_counts, dtype, attr)
    })?;
    if !layout.is_flat() {
        work.wait()?;
        layout.split_out(outputs)?;
    }
    Ok(work)
}
