//! Handles to in-flight collectives.

use std::sync::Arc;

use crate::engine::Request;
use crate::error::{CclError, Result};
use crate::gate::EngineGate;
use crate::memory::Buffer;

enum State {
    Pending {
        gate: Arc<EngineGate>,
        request: Request,
        /// Buffers the engine may still read or write.
        pinned: Vec<Buffer>,
    },
    Completed,
}

/// A handle to one collective call.
///
/// While pending it owns the engine request and keeps every buffer the call
/// touches alive. Completion is observed through [`poll`](Self::poll) or
/// [`wait`](Self::wait), both of which run under the gate.
///
/// Dropping a `Work` that is still pending aborts the process: the engine
/// could otherwise keep writing into memory the caller believes it owns
/// again. Always `wait()` (or `poll()` to completion) before dropping.
#[must_use = "a pending Work aborts the process when dropped; wait on it"]
pub struct Work {
    state: State,
}

impl Work {
    pub(crate) fn pending(gate: Arc<EngineGate>, request: Request, pinned: Vec<Buffer>) -> Self {
        Self {
            state: State::Pending {
                gate,
                request,
                pinned,
            },
        }
    }

    /// A handle with nothing in flight.
    pub fn completed() -> Self {
        Self {
            state: State::Completed,
        }
    }

    pub fn is_completed(&self) -> bool {
        matches!(self.state, State::Completed)
    }

    /// Non-blocking completion check. Once this returns `true` every later
    /// call returns `true` without consulting the engine.
    #[track_caller]
    pub fn poll(&mut self) -> Result<bool> {
        let State::Pending { gate, request, .. } = &mut self.state else {
            return Ok(true);
        };
        let outcome = gate.serialized(|| request.test())?;
        match outcome {
            Ok(true) => {
                self.release();
                Ok(true)
            }
            Ok(false) => Ok(false),
            Err(fault) => {
                self.release();
                Err(CclError::engine(fault.to_string()))
            }
        }
    }

    /// Block until the call completes.
    ///
    /// The engine cannot cancel a call, so a completed wait is a successful
    /// one; faults surface as [`CclError::Engine`].
    #[track_caller]
    pub fn wait(&mut self) -> Result<()> {
        let State::Pending { gate, request, .. } = &mut self.state else {
            return Ok(());
        };
        let outcome = gate.serialized(|| request.wait())?;
        self.release();
        match outcome {
            Ok(()) => Ok(()),
            Err(fault) => Err(CclError::engine(fault.to_string())),
        }
    }

    /// Whether the call succeeded. Only valid once completed.
    pub fn is_success(&self) -> Result<bool> {
        match self.state {
            State::Pending { .. } => Err(CclError::WorkPending("is_success")),
            State::Completed => Ok(true),
        }
    }

    pub fn abort(&mut self) -> Result<()> {
        Err(CclError::AbortUnsupported)
    }

    fn release(&mut self) {
        if let State::Pending { pinned, .. } = std::mem::replace(&mut self.state, State::Completed)
        {
            tracing::trace!(buffers = pinned.len(), "work completed, releasing buffers");
        }
    }
}

impl std::fmt::Debug for Work {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        let state = match &self.state {
            State::Pending { pinned, .. } => format!("Pending({} buffers)", pinned.len()),
            State::Completed => "Completed".to_owned(),
        };
        f.debug_struct("Work").field("state", &state).finish()
    }
}

impl Drop for Work {
    fn drop(&mut self) {
        if let State::Pending { gate, pinned, .. } = &self.state {
            tracing::error!(
                rank = gate.rank(),
                buffers = pinned.len(),
                "work dropped while its request is still pending; aborting"
            );
            std::process::abort();
        }
    }
}
