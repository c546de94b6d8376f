//! Error types for RouteFlow
//!
//! Load-path errors are `Clone` so a single in-flight outcome can be
//! broadcast to every caller joined on the same chunk.

use thiserror::Error;

/// Errors produced by the chunk loading path
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum LoadError {
    /// The requested key was never registered. A programming error on the
    /// caller's side, fatal to this call.
    #[error("chunk '{0}' is not registered")]
    UnitNotFound(String),

    /// All retry attempts were exhausted. The last failure is preserved in
    /// `last_error`; callers may retry `load` later.
    #[error("chunk '{key}' failed to load after {attempts} attempt(s): {last_error}")]
    ChunkLoadFailed {
        key: String,
        attempts: u32,
        last_error: String,
    },

    /// A single load attempt exceeded its time budget. Recorded as the
    /// attempt's failure detail; surfaces inside `ChunkLoadFailed`.
    #[error("chunk '{key}' load attempt exceeded {timeout_ms} ms")]
    TimeoutExceeded { key: String, timeout_ms: u64 },
}

/// Errors produced by the transition path
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum TransitionError {
    /// Transition dispatch failed and no usable fallback completed. Carries
    /// the original (primary) failure, not the fallback's.
    #[error("transition dispatch failed: {0}")]
    DispatchFailed(String),

    /// The custom kind was selected but no callback is registered. Surfaces
    /// directly to the caller; never retried, never falls back.
    #[error("custom transition configured without a callback")]
    CustomMisconfigured,

    /// The transition was removed from the queue before or during execution.
    #[error("transition cancelled")]
    Cancelled,
}
