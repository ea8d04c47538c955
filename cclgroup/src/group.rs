//! The host-facing process group.

use std::collections::HashMap;
use std::sync::{Arc, Mutex};
use std::time::Duration;

use crate::collective;
use crate::config::CclConfig;
use crate::error::{CclError, Result};
use crate::gate::EngineGate;
use crate::memory::Buffer;
use crate::types::{Rank, ReduceOp};
use crate::work::Work;

/// Key/value rendezvous store handed in by the host.
///
/// The adapter takes its identity from the engine, so it only keeps the
/// store for the host's own use.
pub trait Store: Send + Sync {
    fn set(&self, key: &str, value: Vec<u8>) -> Result<()>;

    fn get(&self, key: &str) -> Result<Option<Vec<u8>>>;
}

/// In-memory [`Store`].
#[derive(Debug, Default)]
pub struct HashStore {
    map: Mutex<HashMap<String, Vec<u8>>>,
}

impl Store for HashStore {
    fn set(&self, key: &str, value: Vec<u8>) -> Result<()> {
        self.map
            .lock()
            .map_err(|_| CclError::LockPoisoned("hash store"))?
            .insert(key.to_owned(), value);
        Ok(())
    }

    fn get(&self, key: &str) -> Result<Option<Vec<u8>>> {
        Ok(self
            .map
            .lock()
            .map_err(|_| CclError::LockPoisoned("hash store"))?
            .get(key)
            .cloned())
    }
}

/// One rank's membership in the group served by an [`EngineGate`].
///
/// Every collective validates its arguments, issues a single engine call
/// under the gate and returns a [`Work`]. Unsupported operations fail with
/// [`CclError::Unsupported`] before looking at their arguments.
pub struct ProcessGroup {
    gate: Arc<EngineGate>,
    store: Arc<dyn Store>,
    timeout: Duration,
}

impl ProcessGroup {
    /// Join the group served by `gate`.
    ///
    /// `rank` and `size`, when given, must match the engine's own identity.
    /// `timeout` is recorded but not enforced: waits block until the engine
    /// reports completion.
    pub fn create(
        gate: Arc<EngineGate>,
        store: Arc<dyn Store>,
        rank: Option<Rank>,
        size: Option<u32>,
        timeout: Duration,
    ) -> Result<Self> {
        if let Some(requested) = rank
            && requested != gate.rank()
        {
            return Err(CclError::RankMismatch {
                requested,
                actual: gate.rank(),
            });
        }
        if let Some(requested) = size
            && requested != gate.size()
        {
            return Err(CclError::SizeMismatch {
                requested,
                actual: gate.size(),
            });
        }
        if !timeout.is_zero() {
            tracing::warn!(
                rank = gate.rank(),
                timeout_ms = timeout.as_millis() as u64,
                "collective timeout is accepted but not enforced"
            );
        }
        tracing::info!(rank = gate.rank(), size = gate.size(), "process group created");
        Ok(Self {
            gate,
            store,
            timeout,
        })
    }

    pub fn rank(&self) -> Rank {
        self.gate.rank()
    }

    pub fn size(&self) -> u32 {
        self.gate.size()
    }

    pub fn timeout(&self) -> Duration {
        self.timeout
    }

    pub fn store(&self) -> &Arc<dyn Store> {
        &self.store
    }

    pub fn config(&self) -> &CclConfig {
        self.gate.config()
    }

    pub fn gate(&self) -> &Arc<EngineGate> {
        &self.gate
    }

    pub fn broadcast(&self, buf: &Buffer, root: Rank) -> Result<Work> {
        collective::broadcast(&self.gate, buf, root)
    }

    pub fn allreduce(&self, buf: &Buffer, op: ReduceOp) -> Result<Work> {
        collective::allreduce(&self.gate, buf, op)
    }

    pub fn reduce(&self, buf: &Buffer, op: ReduceOp, root: Rank) -> Result<Work> {
        collective::reduce(&self.gate, buf, op, root)
    }

    pub fn allgather(&self, input: &Buffer, outputs: &[Buffer]) -> Result<Work> {
        collective::allgather(&self.gate, input, outputs)
    }

    /// `outputs` is read only on `root`; other ranks must pass an empty slice.
    pub fn gather(&self, input: &Buffer, outputs: &[Buffer], root: Rank) -> Result<Work> {
        collective::gather(&self.gate, input, outputs, root)
    }

    /// `inputs` is read only on `root`; other ranks must pass an empty slice.
    pub fn scatter(&self, output: &Buffer, inputs: &[Buffer], root: Rank) -> Result<Work> {
        collective::scatter(&self.gate, output, inputs, root)
    }

    pub fn alltoall(&self, outputs: &[Buffer], inputs: &[Buffer]) -> Result<Work> {
        collective::alltoall(&self.gate, outputs, inputs)
    }

    pub fn alltoall_base(
        &self,
        output: &Buffer,
        input: &Buffer,
        output_splits: &[usize],
        input_splits: &[usize],
    ) -> Result<Work> {
        collective::alltoall_base(&self.gate, output, input, output_splits, input_splits)
    }

    pub fn barrier(&self) -> Result<Work> {
        collective::barrier(&self.gate)
    }

    pub fn allreduce_coalesced(&self, _bufs: &[Buffer], _op: ReduceOp) -> Result<Work> {
        unsupported("allreduce_coalesced")
    }

    pub fn allgather_base(&self, _output: &Buffer, _input: &Buffer) -> Result<Work> {
        unsupported("allgather_base")
    }

    pub fn allgather_coalesced(&self, _outputs: &[Vec<Buffer>], _inputs: &[Buffer]) -> Result<Work> {
        unsupported("allgather_coalesced")
    }

    pub fn reduce_scatter(&self, _output: &Buffer, _inputs: &[Buffer], _op: ReduceOp) -> Result<Work> {
        unsupported("reduce_scatter")
    }

    pub fn send(&self, _bufs: &[Buffer], _dst: Rank, _tag: i32) -> Result<Work> {
        unsupported("send")
    }

    pub fn recv(&self, _bufs: &[Buffer], _src: Rank, _tag: i32) -> Result<Work> {
        unsupported("recv")
    }

    pub fn recv_anysource(&self, _bufs: &[Buffer], _tag: i32) -> Result<Work> {
        unsupported("recv_anysource")
    }
}

fn unsupported(operation: &'static str) -> Result<Work> {
    Err(CclError::Unsupported { operation })
}

impl std::fmt::Debug for ProcessGroup {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("ProcessGroup")
            .field("rank", &self.rank())
            .field("size", &self.size())
            .field("timeout", &self.timeout)
            .finish_non_exhaustive()
    }
}
