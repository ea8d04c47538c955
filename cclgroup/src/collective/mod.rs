//! Per-operation dispatch: validate, plan the layout, issue exactly one
//! engine call under the gate, and wrap the request in a [`Work`].

mod allgather;
mod allreduce;
mod alltoall;
mod barrier;
mod broadcast;
mod gather;
mod scatter;

pub(crate) use allgather::allgather;
pub(crate) use allreduce::{allreduce, reduce};
pub(crate) use alltoall::{alltoall, alltoall_base};
pub(crate) use barrier::barrier;
pub(crate) use broadcast::broadcast;
pub(crate) use gather::gather;
pub(crate) use scatter::scatter;

use std::panic::Location;
use std::sync::Arc;

use crate::config::CclConfig;
use crate::engine::{CollAttr, Engine, EngineFault, Request};
use crate::error::{CclError, Result};
use crate::gate::EngineGate;
use crate::memory::Buffer;
use crate::types::{DataType, Rank};
use crate::work::Work;

/// Issue one engine call under the gate and wrap the request.
///
/// Engine faults are reported at the location of the dispatcher line that
/// called this.
#[track_caller]
pub(crate) fn issue<F>(gate: &Arc<EngineGate>, pinned: Vec<Buffer>, call: F) -> Result<Work>
where
    F: FnOnce(&mut dyn Engine) -> std::result::Result<Request, EngineFault>,
{
    let location = Location::caller();
    let request = gate.with_lock(|engine| {
        call(engine).map_err(|fault| CclError::Engine {
            location,
            message: fault.to_string(),
        })
    })?;
    Ok(Work::pending(Arc::clone(gate), request, pinned))
}

/// Describes one call shape for the engine's resource cache.
pub(crate) struct CallShape<'a> {
    pub operation: &'static str,
    pub dtype: DataType,
    pub counts: &'a [usize],
    pub root: Option<Rank>,
}

impl CallShape<'_> {
    /// Attributes for the engine call; carries a match id only when
    /// caching is enabled.
    pub(crate) fn attr(&self, config: &CclConfig) -> CollAttr {
        CollAttr {
            match_id: config.cache_collectives.then(|| self.match_id()),
        }
    }

    /// Deterministic across ranks and processes for the same shape.
    fn match_id(&self) -> u64 {
        let root = self.root.map_or(u64::MAX, u64::from);
        let counts = self.counts.iter().flat_map(|&c| (c as u64).to_le_bytes());
        fnv1a(
            self.operation
                .bytes()
                .chain(self.dtype.name().bytes())
                .chain(root.to_le_bytes())
                .chain(counts),
        )
    }
}

/// Non-zero FNV-1a hash over a byte stream.
fn fnv1a(bytes: impl IntoIterator<Item = u8>) -> u64 {
    let mut h: u64 = 0xcbf29ce484222325; // FNV-1a offset basis
    for b in bytes {
        h ^= b as u64;
        h = h.wrapping_mul(0x100000001b3);
    }
    if h == 0 { 1 } else { h }
}
