//! Engine configuration.

use num_bigint::BigUint;
use std::path::PathBuf;

/// The type and amount of PoW verification an engine performs.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Mode {
    /// Full verification with production-size caches.
    Normal,
    /// Delegate verification to the process-wide shared engine, reusing its
    /// artifact LRU.
    Shared,
    /// Full verification with tiny caches, for tests.
    Test,
    /// Accept every seal, optionally failing one configured block number.
    Fake,
    /// Accept everything and skip even the cheap checks.
    FullFake,
}

/// Configuration parameters of the progpow engine.
#[derive(Debug, Clone)]
pub struct Config {
    /// Verification mode.
    pub pow_mode: Mode,

    /// Directory for on-disk cache dumps; `None` keeps all artifacts in
    /// memory.
    pub cache_dir: Option<PathBuf>,

    /// Number of recent epoch artifacts kept in memory (minimum 1).
    pub caches_in_mem: usize,

    /// Number of recent epoch dumps retained on disk; older generations
    /// are deleted after a successful new creation.
    pub caches_on_disk: usize,

    /// Wire mmap'd cache pages into RAM.
    pub caches_lock_mmap: bool,

    /// Minimum difficulty. Consumed by consensus callers, not by the
    /// verifier itself.
    pub min_difficulty: BigUint,

    /// Block interval duration limit. Consumed by consensus callers.
    pub duration_limit: BigUint,

    /// Gas ceiling. Consumed by consensus callers.
    pub gas_ceil: u64,

    /// Send full header notifications to remote sealers. Irrelevant to
    /// verification; retained for configuration compatibility.
    pub notify_full: bool,
}

impl Default for Config {
    fn default() -> Self {
        Self {
            pow_mode: Mode::Normal,
            cache_dir: None,
            caches_in_mem: 2,
            caches_on_disk: 3,
            caches_lock_mmap: false,
            min_difficulty: BigUint::from(131_072u32),
            duration_limit: BigUint::from(5u32),
            gas_ceil: 0,
            notify_full: false,
        }
    }
}
