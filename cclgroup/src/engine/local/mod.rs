//! An in-process engine: every rank lives in the same process and messages
//! travel through per-rank mailboxes on a shared tokio runtime.
//!
//! Collectives are spawned as tasks and progress on their own; the returned
//! request only observes the task. Calls block the caller only in
//! [`Engine::barrier`] and [`EngineRequest::wait`], which must not be
//! invoked from inside an async context.

mod mailbox;
mod ops;

use std::collections::HashMap;
use std::future::Future;
use std::sync::Arc;
use std::sync::atomic::{AtomicU64, Ordering};

use tokio::runtime::Runtime;
use tokio::task::JoinHandle;

use self::mailbox::Mailbox;
use self::ops::{Peer, Plan};
use super::{CollAttr, Engine, EngineFault, EngineRequest, RecvTarget, Request};
use crate::memory::Buffer;
use crate::types::{Rank, ReduceOp, WireType};

/// Shared state of one in-process group.
pub struct LocalFabric {
    runtime: Runtime,
    boxes: Arc<[Mailbox]>,
}

impl LocalFabric {
    /// Build a group of `world` ranks and return one engine per rank, in
    /// rank order. Each engine is meant to be driven by its own thread.
    pub fn connect(world: u32) -> Result<Vec<LocalEngine>, EngineFault> {
        if world == 0 {
            return Err(EngineFault::new("connect", "group size must be at least 1"));
        }
        let runtime = tokio::runtime::Builder::new_multi_thread()
            .worker_threads(world.clamp(1, 4) as usize)
            .thread_name("ccl-local")
            .build()
            .map_err(|e| EngineFault::new("connect", format!("runtime: {e}")))?;
        let boxes: Arc<[Mailbox]> = (0..world).map(|_| Mailbox::new()).collect();
        let fabric = Arc::new(Self { runtime, boxes });

        tracing::debug!(world, "local fabric connected");
        Ok((0..world)
            .map(|rank| LocalEngine {
                rank,
                size: world,
                seq: 0,
                fabric: Arc::clone(&fabric),
                plans: HashMap::new(),
                stats: CacheStats::default(),
            })
            .collect())
    }
}

/// Hit and miss counters for calls that carried a match id.
#[derive(Debug, Clone, Default)]
pub struct CacheStats {
    hits: Arc<AtomicU64>,
    misses: Arc<AtomicU64>,
}

impl CacheStats {
    pub fn hits(&self) -> u64 {
        self.hits.load(Ordering::Relaxed)
    }

    pub fn misses(&self) -> u64 {
        self.misses.load(Ordering::Relaxed)
    }
}

/// One rank's engine on a [`LocalFabric`].
pub struct LocalEngine {
    rank: Rank,
    size: u32,
    seq: u64,
    fabric: Arc<LocalFabric>,
    plans: HashMap<u64, Arc<Plan>>,
    stats: CacheStats,
}

impl LocalEngine {
    /// Counters shared with this engine; stays valid after the engine has
    /// been boxed and handed to a gate.
    pub fn cache_stats(&self) -> CacheStats {
        self.stats.clone()
    }

    fn next_peer(&mut self, operation: &'static str) -> Peer {
        let seq = self.seq;
        self.seq += 1;
        Peer {
            rank: self.rank,
            size: self.size,
            seq,
            operation,
            boxes: Arc::clone(&self.fabric.boxes),
        }
    }

    fn spawn<F>(&mut self, operation: &'static str, body: impl FnOnce(Peer) -> F) -> Request
    where
        F: Future<Output = Result<(), EngineFault>> + Send + 'static,
    {
        let peer = self.next_peer(operation);
        let task = self.fabric.runtime.spawn(body(peer));
        Box::new(LocalRequest {
            fabric: Arc::clone(&self.fabric),
            task: Some(task),
        })
    }

    fn plan(&mut self, attr: CollAttr, send_counts: &[usize], recv_counts: &[usize]) -> Arc<Plan> {
        let Some(id) = attr.match_id else {
            return Arc::new(Plan::new(send_counts, recv_counts));
        };
        if let Some(plan) = self.plans.get(&id)
            && plan.matches(send_counts, recv_counts)
        {
            self.stats.hits.fetch_add(1, Ordering::Relaxed);
            return Arc::clone(plan);
        }
        self.stats.misses.fetch_add(1, Ordering::Relaxed);
        let plan = Arc::new(Plan::new(send_counts, recv_counts));
        self.plans.insert(id, Arc::clone(&plan));
        plan
    }

    fn check_root(&self, operation: &'static str, root: Rank) -> Result<(), EngineFault> {
        if root >= self.size {
            return Err(EngineFault::new(
                operation,
                format!("root {root} outside group of {}", self.size),
            ));
        }
        Ok(())
    }

    fn check_counts(
        &self,
        operation: &'static str,
        counts: &[usize],
        buf: &Buffer,
    ) -> Result<(), EngineFault> {
        if counts.len() != self.size as usize {
            return Err(EngineFault::new(
                operation,
                format!("{} counts for group of {}", counts.len(), self.size),
            ));
        }
        let total: usize = counts.iter().sum();
        if total > buf.numel() {
            return Err(EngineFault::new(
                operation,
                format!("counts total {total} exceed buffer of {} elements", buf.numel()),
            ));
        }
        Ok(())
    }
}

fn check_width(operation: &'static str, buf: &Buffer, dtype: WireType) -> Result<(), EngineFault> {
    if buf.dtype().size_in_bytes() != dtype.size_in_bytes() {
        return Err(EngineFault::new(
            operation,
            format!("{} buffer sent as {dtype:?}", buf.dtype()),
        ));
    }
    Ok(())
}

impl Engine for LocalEngine {
    fn rank(&self) -> Rank {
        self.rank
    }

    fn size(&self) -> u32 {
        self.size
    }

    fn broadcast(
        &mut self,
        buf: &Buffer,
        root: Rank,
        dtype: WireType,
        _attr: CollAttr,
    ) -> Result<Request, EngineFault> {
        self.check_root("broadcast", root)?;
        check_width("broadcast", buf, dtype)?;
        let buf = buf.clone();
        Ok(self.spawn("broadcast", move |peer| ops::broadcast(peer, buf, root)))
    }

    fn allreduce(
        &mut self,
        send: &Buffer,
        recv: &Buffer,
        dtype: WireType,
        op: ReduceOp,
        _attr: CollAttr,
    ) -> Result<Request, EngineFault> {
        check_width("allreduce", send, dtype)?;
        let (send, recv) = (send.clone(), recv.clone());
        Ok(self.spawn("allreduce", move |peer| {
            ops::allreduce(peer, send, recv, dtype, op)
        }))
    }

    fn reduce(
        &mut self,
        send: &Buffer,
        recv: &Buffer,
        dtype: WireType,
        op: ReduceOp,
        root: Rank,
        _attr: CollAttr,
    ) -> Result<Request, EngineFault> {
        self.check_root("reduce", root)?;
        check_width("reduce", send, dtype)?;
        let (send, recv) = (send.clone(), recv.clone());
        Ok(self.spawn("reduce", move |peer| {
            ops::reduce(peer, send, recv, dtype, op, root)
        }))
    }

    fn allgatherv(
        &mut self,
        send: &Buffer,
        recv: RecvTarget,
        recv_counts: &[usize],
        dtype: WireType,
        attr: CollAttr,
    ) -> Result<Request, EngineFault> {
        check_width("allgatherv", send, dtype)?;
        match &recv {
            RecvTarget::Flat(buf) => self.check_counts("allgatherv", recv_counts, buf)?,
            RecvTarget::Scattered(bufs) if bufs.len() != self.size as usize => {
                return Err(EngineFault::new(
                    "allgatherv",
                    format!("{} receive buffers for group of {}", bufs.len(), self.size),
                ));
            }
            RecvTarget::Scattered(_) => {}
        }
        let mut send_counts = vec![0; self.size as usize];
        send_counts[self.rank as usize] = send.numel();
        let plan = self.plan(attr, &send_counts, recv_counts);
        let send = send.clone();
        let esize = dtype.size_in_bytes();
        Ok(self.spawn("allgatherv", move |peer| {
            ops::allgatherv(peer, send, recv, plan, esize)
        }))
    }

    fn alltoall(
        &mut self,
        send: &Buffer,
        recv: &Buffer,
        count: usize,
        dtype: WireType,
        attr: CollAttr,
    ) -> Result<Request, EngineFault> {
        let counts = vec![count; self.size as usize];
        self.alltoallv(send, &counts, recv, &counts, dtype, attr)
    }

    fn alltoallv(
        &mut self,
        send: &Buffer,
        send_counts: &[usize],
        recv: &Buffer,
        recv_counts: &[usize],
        dtype: WireType,
        attr: CollAttr,
    ) -> Result<Request, EngineFault> {
        check_width("alltoallv", send, dtype)?;
        check_width("alltoallv", recv, dtype)?;
        self.check_counts("alltoallv", send_counts, send)?;
        self.check_counts("alltoallv", recv_counts, recv)?;
        let plan = self.plan(attr, send_counts, recv_counts);
        let (send, recv) = (send.clone(), recv.clone());
        let esize = dtype.size_in_bytes();
        Ok(self.spawn("alltoallv", move |peer| {
            ops::alltoallv(peer, send, recv, plan, esize)
        }))
    }

    fn barrier(&mut self) -> Result<(), EngineFault> {
        let peer = self.next_peer("barrier");
        self.fabric.runtime.block_on(ops::barrier(peer))
    }
}

/// A spawned collective task.
struct LocalRequest {
    fabric: Arc<LocalFabric>,
    task: Option<JoinHandle<Result<(), EngineFault>>>,
}

impl LocalRequest {
    fn finish(&mut self) -> Result<(), EngineFault> {
        let Some(task) = self.task.take() else {
            return Ok(());
        };
        match self.fabric.runtime.block_on(task) {
            Ok(result) => result,
            Err(e) => Err(EngineFault::new("request", format!("collective task failed: {e}"))),
        }
    }
}

impl EngineRequest for LocalRequest {
    fn test(&mut self) -> Result<bool, EngineFault> {
        let finished = match &self.task {
            None => return Ok(true),
            Some(task) => task.is_finished(),
        };
        if !finished {
            return Ok(false);
        }
        self.finish().map(|()| true)
    }

    fn wait(&mut self) -> Result<(), EngineFault> {
        self.finish()
    }
}

impl Drop for LocalRequest {
    fn drop(&mut self) {
        if let Some(task) = &self.task {
            task.abort();
        }
    }
}
