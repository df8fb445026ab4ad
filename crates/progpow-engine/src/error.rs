//! Engine error types.

use progpow_core::Hash;
use thiserror::Error;

/// Errors returned by seal verification.
///
/// These reject the offending header; the engine itself stays usable.
/// Artifact and I/O failures never surface here — they are handled inside
/// generation with an in-memory fallback.
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum EngineError {
    /// Header difficulty is not positive.
    #[error("non-positive difficulty")]
    InvalidDifficulty,

    /// The claimed mix digest does not match the computed one.
    #[error("invalid mix digest")]
    InvalidMixHash,

    /// The proof-of-work hash misses the difficulty target. Carries the
    /// computed pow hash for logging and propagation.
    #[error("invalid proof-of-work")]
    InvalidPoW(Hash),
}
