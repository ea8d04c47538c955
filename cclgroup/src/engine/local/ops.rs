//! Collective algorithms run as tasks on the fabric's runtime.
//!
//! All of them are flat: every rank talks to every other rank directly,
//! and reductions fold contributions in rank order so every rank computes
//! bit-identical results.

use std::sync::Arc;

use futures::future::try_join_all;

use super::mailbox::Mailbox;
use crate::engine::{EngineFault, RecvTarget};
use crate::memory::Buffer;
use crate::reduce::reduce_slice;
use crate::types::{Rank, ReduceOp, WireType};

/// Send and receive displacements, in elements, for one call shape.
#[derive(Debug, PartialEq, Eq)]
pub(super) struct Plan {
    pub(super) send_counts: Vec<usize>,
    pub(super) recv_counts: Vec<usize>,
    pub(super) send_displs: Vec<usize>,
    pub(super) recv_displs: Vec<usize>,
}

impl Plan {
    pub(super) fn new(send_counts: &[usize], recv_counts: &[usize]) -> Self {
        Self {
            send_counts: send_counts.to_vec(),
            recv_counts: recv_counts.to_vec(),
            send_displs: displacements(send_counts),
            recv_displs: displacements(recv_counts),
        }
    }

    pub(super) fn matches(&self, send_counts: &[usize], recv_counts: &[usize]) -> bool {
        self.send_counts == send_counts && self.recv_counts == recv_counts
    }
}

fn displacements(counts: &[usize]) -> Vec<usize> {
    counts
        .iter()
        .scan(0, |acc, &c| {
            let d = *acc;
            *acc += c;
            Some(d)
        })
        .collect()
}

/// One rank's view of a single call.
pub(super) struct Peer {
    pub(super) rank: Rank,
    pub(super) size: u32,
    pub(super) seq: u64,
    pub(super) operation: &'static str,
    pub(super) boxes: Arc<[Mailbox]>,
}

impl Peer {
    fn fault(&self, reason: impl Into<String>) -> EngineFault {
        EngineFault::new(self.operation, reason)
    }

    fn others(&self) -> impl Iterator<Item = Rank> + '_ {
        (0..self.size).filter(move |&r| r != self.rank)
    }

    fn send(&self, dst: Rank, data: Vec<u8>) -> Result<(), EngineFault> {
        self.boxes[dst as usize].post(self.rank, self.seq, data)
    }

    async fn recv(&self, src: Rank) -> Result<Vec<u8>, EngineFault> {
        self.boxes[self.rank as usize].take(src, self.seq).await
    }

    /// Receive one message from every other rank; `own` fills this rank's
    /// slot so the result is indexed by rank.
    async fn collect(&self, own: Vec<u8>) -> Result<Vec<Vec<u8>>, EngineFault> {
        let mut parts = try_join_all(self.others().map(|src| self.recv(src))).await?;
        parts.insert(self.rank as usize, own);
        Ok(parts)
    }

    fn expect_len(&self, src: usize, got: usize, want: usize) -> Result<(), EngineFault> {
        if got != want {
            return Err(self.fault(format!(
                "rank {src} contributed {got} bytes, expected {want}"
            )));
        }
        Ok(())
    }

    fn read(&self, buf: &Buffer) -> Result<Vec<u8>, EngineFault> {
        buf.read_bytes().map_err(|e| self.fault(e.to_string()))
    }

    fn write(&self, buf: &Buffer, data: &[u8]) -> Result<(), EngineFault> {
        buf.write_bytes(data).map_err(|e| self.fault(e.to_string()))
    }

    /// Write `data` at element offset `displ` of a contiguous buffer.
    fn write_at(&self, buf: &Buffer, displ: usize, data: &[u8], esize: usize) -> Result<(), EngineFault> {
        if data.is_empty() {
            return Ok(());
        }
        buf.reshape(&[buf.numel()])
            .and_then(|flat| flat.narrow(displ, data.len() / esize))
            .and_then(|segment| segment.write_bytes(data))
            .map_err(|e| self.fault(e.to_string()))
    }

    fn fold(&self, parts: Vec<Vec<u8>>, dtype: WireType, op: ReduceOp) -> Result<Vec<u8>, EngineFault> {
        let mut parts = parts.into_iter();
        let mut acc = parts.next().unwrap_or_default();
        for (i, part) in parts.enumerate() {
            self.expect_len(i + 1, part.len(), acc.len())?;
            reduce_slice(&mut acc, &part, dtype, op);
        }
        Ok(acc)
    }
}

pub(super) async fn broadcast(peer: Peer, buf: Buffer, root: Rank) -> Result<(), EngineFault> {
    if peer.rank == root {
        let data = peer.read(&buf)?;
        for dst in peer.others() {
            peer.send(dst, data.clone())?;
        }
        return Ok(());
    }
    let data = peer.recv(root).await?;
    peer.expect_len(root as usize, data.len(), buf.len_bytes())?;
    peer.write(&buf, &data)
}

pub(super) async fn allreduce(
    peer: Peer,
    send: Buffer,
    recv: Buffer,
    dtype: WireType,
    op: ReduceOp,
) -> Result<(), EngineFault> {
    let own = peer.read(&send)?;
    for dst in peer.others() {
        peer.send(dst, own.clone())?;
    }
    let parts = peer.collect(own).await?;
    let acc = peer.fold(parts, dtype, op)?;
    peer.write(&recv, &acc)
}

pub(super) async fn reduce(
    peer: Peer,
    send: Buffer,
    recv: Buffer,
    dtype: WireType,
    op: ReduceOp,
    root: Rank,
) -> Result<(), EngineFault> {
    let own = peer.read(&send)?;
    if peer.rank != root {
        return peer.send(root, own);
    }
    let parts = peer.collect(own).await?;
    let acc = peer.fold(parts, dtype, op)?;
    peer.write(&recv, &acc)
}

pub(super) async fn allgatherv(
    peer: Peer,
    send: Buffer,
    recv: RecvTarget,
    plan: Arc<Plan>,
    esize: usize,
) -> Result<(), EngineFault> {
    let own = peer.read(&send)?;
    for dst in peer.others() {
        peer.send(dst, own.clone())?;
    }
    let parts = peer.collect(own).await?;
    for (src, part) in parts.iter().enumerate() {
        peer.expect_len(src, part.len(), plan.recv_counts[src] * esize)?;
    }
    match recv {
        RecvTarget::Flat(buf) => {
            for (src, part) in parts.iter().enumerate() {
                peer.write_at(&buf, plan.recv_displs[src], part, esize)?;
            }
        }
        RecvTarget::Scattered(bufs) => {
            for (buf, part) in bufs.iter().zip(&parts) {
                peer.write(buf, part)?;
            }
        }
    }
    Ok(())
}

pub(super) async fn alltoallv(
    peer: Peer,
    send: Buffer,
    recv: Buffer,
    plan: Arc<Plan>,
    esize: usize,
) -> Result<(), EngineFault> {
    let data = peer.read(&send)?;
    let mut own = Vec::new();
    for dst in 0..peer.size {
        let d = dst as usize;
        let start = plan.send_displs[d] * esize;
        let chunk = data[start..start + plan.send_counts[d] * esize].to_vec();
        if dst == peer.rank {
            own = chunk;
        } else {
            peer.send(dst, chunk)?;
        }
    }
    let parts = peer.collect(own).await?;
    for (src, part) in parts.iter().enumerate() {
        peer.expect_len(src, part.len(), plan.recv_counts[src] * esize)?;
        peer.write_at(&recv, plan.recv_displs[src], part, esize)?;
    }
    Ok(())
}

pub(super) async fn barrier(peer: Peer) -> Result<(), EngineFault> {
    for dst in peer.others() {
        peer.send(dst, Vec::new())?;
    }
    peer.collect(Vec::new()).await.map(|_| ())
}
