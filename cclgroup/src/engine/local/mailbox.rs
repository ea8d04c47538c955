use std::collections::HashMap;
use std::sync::{Mutex, MutexGuard};

use tokio::sync::Notify;

use crate::engine::EngineFault;
use crate::types::Rank;

/// Messages addressed to one rank, keyed by sender and call sequence number.
///
/// Every rank numbers its collectives in issue order, so a (sender, seq)
/// pair names exactly one message and out-of-order arrivals from later
/// calls simply wait in the map.
pub(super) struct Mailbox {
    slots: Mutex<HashMap<(Rank, u64), Vec<u8>>>,
    arrived: Notify,
}

impl Mailbox {
    pub(super) fn new() -> Self {
        Self {
            slots: Mutex::new(HashMap::new()),
            arrived: Notify::new(),
        }
    }

    fn lock(&self) -> Result<MutexGuard<'_, HashMap<(Rank, u64), Vec<u8>>>, EngineFault> {
        self.slots
            .lock()
            .map_err(|_| EngineFault::new("mailbox", "lock poisoned"))
    }

    pub(super) fn post(&self, src: Rank, seq: u64, data: Vec<u8>) -> Result<(), EngineFault> {
        {
            let mut slots = self.lock()?;
            if slots.insert((src, seq), data).is_some() {
                return Err(EngineFault::new(
                    "mailbox",
                    format!("duplicate message from rank {src} for call {seq}"),
                ));
            }
        }
        self.arrived.notify_waiters();
        Ok(())
    }

    pub(super) async fn take(&self, src: Rank, seq: u64) -> Result<Vec<u8>, EngineFault> {
        loop {
            // Register before checking so a post between the check and the
            // await still wakes us.
            let arrived = self.arrived.notified();
            let taken = self.lock()?.remove(&(src, seq));
            if let Some(data) = taken {
                return Ok(data);
            }
            arrived.await;
        }
    }
}
