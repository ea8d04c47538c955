use std::panic::Location;

use crate::types::{DataType, Rank};

pub type Result<T> = std::result::Result<T, CclError>;

/// Coarse classification of every [`CclError`].
///
/// Callers branch on this instead of matching on messages.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum ErrorKind {
    /// A precondition on buffers or arguments failed before any engine call.
    Validation,
    /// The operation is not offered by this adapter.
    Unsupported,
    /// The engine reported a fault while executing a call.
    Engine,
    /// The caller used a handle or the gate incorrectly.
    Usage,
    /// A pending request was destroyed. Never returned; the process aborts.
    FatalLifecycle,
}

impl std::fmt::Display for ErrorKind {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            ErrorKind::Validation => f.write_str("validation"),
            ErrorKind::Unsupported => f.write_str("unsupported"),
            ErrorKind::Engine => f.write_str("engine"),
            ErrorKind::Usage => f.write_str("usage"),
            ErrorKind::FatalLifecycle => f.write_str("fatal-lifecycle"),
        }
    }
}

#[derive(Debug, thiserror::Error)]
pub enum CclError {
    #[error("invalid rank {rank}: group size is {size}")]
    InvalidRank { rank: Rank, size: u32 },

    #[error("{what} has to be contiguous")]
    NonContiguous { what: &'static str },

    #[error("{what} has to be dense")]
    SparseBuffer { what: &'static str },

    #[error("{what} is device-resident; only host buffers are supported")]
    DeviceBuffer { what: &'static str },

    #[error("{operation}: expected {expected} buffers, got {actual}")]
    GroupSizeMismatch {
        operation: &'static str,
        expected: usize,
        actual: usize,
    },

    #[error(
        "{operation}: buffer {index} is {actual_count}x{actual_dtype}, expected {expected_count}x{expected_dtype}"
    )]
    BufferMismatch {
        operation: &'static str,
        index: usize,
        expected_count: usize,
        expected_dtype: DataType,
        actual_count: usize,
        actual_dtype: DataType,
    },

    #[error("{operation}: element types differ ({expected} vs {actual})")]
    DTypeMismatch {
        operation: &'static str,
        expected: DataType,
        actual: DataType,
    },

    #[error("split sizes invalid: {reason}")]
    SplitSizes { reason: String },

    #[error("dim 0 extent {extent} does not divide equally across group size {group_size}")]
    IndivisibleCount { extent: usize, group_size: u32 },

    #[error("{operation}: send count {send} and recv count {recv} for the local rank differ")]
    CountMismatch {
        operation: &'static str,
        send: usize,
        recv: usize,
    },

    #[error("invalid buffer view: {reason}")]
    View { reason: String },

    #[error("unexpected rank {requested}, engine rank {actual}")]
    RankMismatch { requested: Rank, actual: Rank },

    #[error("unexpected size {requested}, engine size {actual}")]
    SizeMismatch { requested: u32, actual: u32 },

    #[error("operation not supported by this adapter: {operation}")]
    Unsupported { operation: &'static str },

    #[error("engine error in {location}: {message}")]
    Engine {
        location: &'static Location<'static>,
        message: String,
    },

    #[error("invalid call to {0} before work has completed")]
    WorkPending(&'static str),

    #[error("abort is not supported: the engine cannot cancel in-flight collectives")]
    AbortUnsupported,

    #[error("engine gate has been shut down")]
    ShutDown,

    #[error("internal lock poisoned: {0}")]
    LockPoisoned(&'static str),
}

impl CclError {
    pub fn kind(&self) -> ErrorKind {
        match self {
            CclError::InvalidRank { .. }
            | CclError::NonContiguous { .. }
            | CclError::SparseBuffer { .. }
            | CclError::DeviceBuffer { .. }
            | CclError::GroupSizeMismatch { .. }
            | CclError::BufferMismatch { .. }
            | CclError::DTypeMismatch { .. }
            | CclError::SplitSizes { .. }
            | CclError::IndivisibleCount { .. }
            | CclError::CountMismatch { .. }
            | CclError::View { .. }
            | CclError::RankMismatch { .. }
            | CclError::SizeMismatch { .. } => ErrorKind::Validation,
            CclError::Unsupported { .. } => ErrorKind::Unsupported,
            CclError::Engine { .. } | CclError::LockPoisoned(_) => ErrorKind::Engine,
            CclError::WorkPending(_) | CclError::AbortUnsupported | CclError::ShutDown => {
                ErrorKind::Usage
            }
        }
    }

    /// Wrap an engine message with the location of the call that issued it.
    #[track_caller]
    pub fn engine(message: impl Into<String>) -> Self {
        Self::Engine {
            location: Location::caller(),
            message: message.into(),
        }
    }

    pub(crate) fn view(reason: impl Into<String>) -> Self {
        Self::View {
            reason: reason.into(),
        }
    }

    pub(crate) fn split_sizes(reason: impl Into<String>) -> Self {
        Self::SplitSizes {
            reason: reason.into(),
        }
    }
}
