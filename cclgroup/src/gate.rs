//! The single serialized path into the engine.
//!
//! The engine is not assumed safe under concurrent use, so an [`EngineGate`]
//! owns it behind one mutex. Issuing a collective, testing or waiting on a
//! request, and barrier all go through that mutex.

use std::sync::{Mutex, MutexGuard};

use crate::config::CclConfig;
use crate::engine::Engine;
use crate::error::{CclError, Result};
use crate::types::Rank;

pub struct EngineGate {
    engine: Mutex<Option<Box<dyn Engine>>>,
    rank: Rank,
    size: u32,
    config: CclConfig,
}

impl EngineGate {
    pub fn new(engine: Box<dyn Engine>, config: CclConfig) -> Self {
        let (rank, size) = (engine.rank(), engine.size());
        tracing::info!(rank, size, ?config, "engine gate initialized");
        Self {
            engine: Mutex::new(Some(engine)),
            rank,
            size,
            config,
        }
    }

    pub fn rank(&self) -> Rank {
        self.rank
    }

    pub fn size(&self) -> u32 {
        self.size
    }

    pub fn config(&self) -> &CclConfig {
        &self.config
    }

    fn lock(&self) -> Result<MutexGuard<'_, Option<Box<dyn Engine>>>> {
        self.engine
            .lock()
            .map_err(|_| CclError::LockPoisoned("engine gate"))
    }

    /// Run `f` against the engine while holding the gate.
    pub fn with_lock<T>(&self, f: impl FnOnce(&mut dyn Engine) -> Result<T>) -> Result<T> {
        let mut guard = self.lock()?;
        let engine = guard.as_deref_mut().ok_or(CclError::ShutDown)?;
        f(engine)
    }

    /// Run `f` while holding the gate, without touching the engine itself.
    ///
    /// Requests issued before [`shutdown`](Self::shutdown) can still be
    /// completed through this.
    pub(crate) fn serialized<T>(&self, f: impl FnOnce() -> T) -> Result<T> {
        let _guard = self.lock()?;
        Ok(f())
    }

    /// Tear the engine down. Later calls fail with [`CclError::ShutDown`].
    /// Idempotent.
    pub fn shutdown(&self) -> Result<()> {
        let engine = self.lock()?.take();
        if engine.is_some() {
            tracing::info!(rank = self.rank, "engine gate shut down");
        }
        Ok(())
    }

    pub fn is_shut_down(&self) -> bool {
        self.lock().map(|g| g.is_none()).unwrap_or(true)
    }
}

impl std::fmt::Debug for EngineGate {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("EngineGate")
            .field("rank", &self.rank)
            .field("size", &self.size)
            .field("config", &self.config)
            .finish_non_exhaustive()
    }
}

/// The process-wide gate, for hosts that need exactly one engine per
/// process and no place to thread a handle through.
pub mod global {
    use std::sync::{Arc, Mutex, OnceLock};

    use super::EngineGate;
    use crate::error::{CclError, Result};

    static GATE: OnceLock<Arc<EngineGate>> = OnceLock::new();
    static INIT: Mutex<()> = Mutex::new(());

    /// Return the process-wide gate, building it with `factory` on first
    /// use. Concurrent first callers run the factory exactly once; a failed
    /// factory leaves the slot empty for the next caller.
    pub fn ensure_initialized<F>(factory: F) -> Result<Arc<EngineGate>>
    where
        F: FnOnce() -> Result<EngineGate>,
    {
        if let Some(gate) = GATE.get() {
            return Ok(Arc::clone(gate));
        }
        let _init = INIT
            .lock()
            .map_err(|_| CclError::LockPoisoned("global gate init"))?;
        if let Some(gate) = GATE.get() {
            return Ok(Arc::clone(gate));
        }
        let gate = Arc::new(factory()?);
        let _ = GATE.set(Arc::clone(&gate));
        Ok(gate)
    }

    pub fn get() -> Option<Arc<EngineGate>> {
        GATE.get().cloned()
    }

    /// Shut the process-wide engine down, if one was ever built.
    pub fn shutdown() -> Result<()> {
        match GATE.get() {
            Some(gate) => gate.shutdown(),
            None => Ok(()),
        }
    }
}
