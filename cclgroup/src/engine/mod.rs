//! The seam between the adapter and a collective-communication engine.
//!
//! The adapter drives exactly one [`Engine`] per process and never calls it
//! concurrently; see [`crate::gate::EngineGate`]. Every collective returns an
//! [`EngineRequest`] that the adapter later tests or waits on.

pub mod local;

pub use local::{CacheStats, LocalEngine, LocalFabric};

use crate::memory::Buffer;
use crate::types::{Rank, ReduceOp, WireType};

/// A fault reported by the engine while issuing or completing a call.
#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
#[error("{operation}: {reason}")]
pub struct EngineFault {
    pub operation: &'static str,
    pub reason: String,
}

impl EngineFault {
    pub fn new(operation: &'static str, reason: impl Into<String>) -> Self {
        Self {
            operation,
            reason: reason.into(),
        }
    }
}

/// Per-call attributes.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct CollAttr {
    /// Identifier shared by every call of the same shape. When present the
    /// engine may reuse resources it built for an earlier call with this id.
    pub match_id: Option<u64>,
}

/// Where allgatherv places the received data.
#[derive(Debug, Clone)]
pub enum RecvTarget {
    /// One contiguous buffer, rank `r`'s data at the prefix sum of counts.
    Flat(Buffer),
    /// One buffer per rank.
    Scattered(Vec<Buffer>),
}

/// An in-flight engine call.
pub trait EngineRequest: Send {
    /// Non-blocking completion check.
    fn test(&mut self) -> Result<bool, EngineFault>;

    /// Block until the call completes.
    fn wait(&mut self) -> Result<(), EngineFault>;
}

/// Boxed request returned by every non-blocking engine call.
pub type Request = Box<dyn EngineRequest>;

/// A collective-communication engine bound to one rank of a group.
///
/// Counts are in elements of the given wire type. Variable-count calls take
/// one count per rank, laid out back to back in rank order.
pub trait Engine: Send {
    fn rank(&self) -> Rank;

    fn size(&self) -> u32;

    fn broadcast(
        &mut self,
        buf: &Buffer,
        root: Rank,
        dtype: WireType,
        attr: CollAttr,
    ) -> Result<Request, EngineFault>;

    fn allreduce(
        &mut self,
        send: &Buffer,
        recv: &Buffer,
        dtype: WireType,
        op: ReduceOp,
        attr: CollAttr,
    ) -> Result<Request, EngineFault>;

    /// Only `root`'s `recv` is written.
    fn reduce(
        &mut self,
        send: &Buffer,
        recv: &Buffer,
        dtype: WireType,
        op: ReduceOp,
        root: Rank,
        attr: CollAttr,
    ) -> Result<Request, EngineFault>;

    fn allgatherv(
        &mut self,
        send: &Buffer,
        recv: RecvTarget,
        recv_counts: &[usize],
        dtype: WireType,
        attr: CollAttr,
    ) -> Result<Request, EngineFault>;

    /// Fixed-size exchange: `count` elements to and from every rank.
    fn alltoall(
        &mut self,
        send: &Buffer,
        recv: &Buffer,
        count: usize,
        dtype: WireType,
        attr: CollAttr,
    ) -> Result<Request, EngineFault>;

    fn alltoallv(
        &mut self,
        send: &Buffer,
        send_counts: &[usize],
        recv: &Buffer,
        recv_counts: &[usize],
        dtype: WireType,
        attr: CollAttr,
    ) -> Result<Request, EngineFault>;

    /// Blocks until every rank has entered the barrier.
    fn barrier(&mut self) -> Result<(), EngineFault>;
}
