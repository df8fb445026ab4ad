#![forbid(unsafe_code)]
#![deny(missing_docs)]
#![deny(clippy::unwrap_used)]
#![deny(clippy::expect_used)]

//! Core types for Quai ProgPoW seal verification: hashes, headers, and the
//! canonical seal pre-image.
//!
//! This crate is deliberately small. It defines the consensus-visible value
//! types, the block header with its memoization slots, and the two BLAKE3
//! hashes every verifier needs: the seal hash (nonce zeroed) and the nonce'd
//! block hash. The proof-of-work engine itself lives in `progpow-engine`.

pub mod constants;
pub mod seal;
pub mod types;

pub use constants::*;
pub use seal::*;
pub use types::*;
