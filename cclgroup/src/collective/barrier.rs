use std::panic::Location;

use crate::error::{CclError, Result};
use crate::gate::EngineGate;
use crate::work::Work;

/// Block until every rank has entered the barrier. The returned handle is
/// already completed.
#[track_caller]
pub(crate) fn barrier(gate: &EngineGate) -> Result<Work> {
    let location = Location::caller();
    tracing::debug!(rank = gate.rank(), "barrier");
    gate.with_lock(|engine| {
        engine.barrier().map_err(|fault| CclError::Engine {
            location,
            message: fault.to_string(),
        })
    })?;
    Ok(Work::completed())
}
