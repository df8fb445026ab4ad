#![deny(missing_docs)]
#![deny(clippy::unwrap_used)]
#![deny(clippy::expect_used)]

//! ProgPoW light seal-verification engine for Quai headers.
//!
//! The engine decides whether a header's claimed `(mix_hash, nonce)` pair
//! satisfies the proof-of-work, without materializing the full DAG:
//!
//! - [`params`] — epoch schedules and seed hashes
//! - [`keccak`] — the Keccak-f\[800\] permutation the kernel is built on
//! - [`cache`] — per-epoch cache, dataset item, and cDag generation
//! - [`kernel`] — the ProgPoW 0.9.3 hashing round itself
//! - [`artifact`] — the epoch artifact LRU with its future-epoch slot
//! - [`dump`] — memory-mapped on-disk cache persistence (not on wasm)
//! - [`engine`] — the [`Progpow`] verifier facade
//!
//! Verification is driven through [`Progpow::verify_seal`]; everything else
//! is exposed for tests and for callers that need the intermediate values.

pub mod artifact;
pub mod cache;
pub mod config;
#[cfg(not(target_arch = "wasm32"))]
pub mod dump;
pub mod engine;
pub mod error;
pub mod keccak;
pub mod kernel;
pub mod params;
pub mod target;

pub use config::{Config, Mode};
pub use engine::Progpow;
pub use error::EngineError;
