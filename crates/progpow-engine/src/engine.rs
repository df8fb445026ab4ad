//! The ProgPoW verifier facade.

use std::sync::{Arc, OnceLock};
use std::thread;
use std::time::Duration;

use num_traits::Zero;
use progpow_core::{Hash, Header};

use crate::artifact::{ArtifactCache, CacheEntry};
use crate::config::{Config, Mode};
use crate::error::EngineError;
use crate::kernel::progpow_light;
use crate::params::{dataset_size, epoch};
use crate::target::{difficulty_target, hash_meets_target};

/// Proof-of-work seal verifier for Quai headers.
///
/// Owns the per-epoch artifact LRU. Engines in [`Mode::Shared`] delegate to
/// one process-wide instance so all of them reuse a single LRU.
pub struct Progpow {
    config: Config,
    caches: ArtifactCache,
    shared: Option<Arc<Progpow>>,
    fake_fail: Option<u64>,
    fake_delay: Option<Duration>,
}

impl Progpow {
    /// Creates an engine from a configuration.
    pub fn new(config: Config) -> Self {
        let shared = match config.pow_mode {
            Mode::Shared => Some(shared_engine()),
            _ => None,
        };
        let caches = ArtifactCache::new(config.caches_in_mem);
        Self {
            config,
            caches,
            shared,
            fake_fail: None,
            fake_delay: None,
        }
    }

    /// Small-cache engine for tests.
    pub fn new_tester() -> Self {
        Self::new(Config {
            pow_mode: Mode::Test,
            caches_in_mem: 1,
            ..Config::default()
        })
    }

    /// Engine that accepts every seal without computing anything.
    pub fn new_faker() -> Self {
        Self::new(Config {
            pow_mode: Mode::Fake,
            ..Config::default()
        })
    }

    /// Fake engine that still rejects the given block number.
    pub fn new_fake_failer(fail: u64) -> Self {
        let mut engine = Self::new_faker();
        engine.fake_fail = Some(fail);
        engine
    }

    /// Fake engine that sleeps for `delay` before accepting.
    pub fn new_fake_delayer(delay: Duration) -> Self {
        let mut engine = Self::new_faker();
        engine.fake_delay = Some(delay);
        engine
    }

    /// Engine that accepts everything and skips even the cheap checks.
    pub fn new_full_faker() -> Self {
        Self::new(Config {
            pow_mode: Mode::FullFake,
            ..Config::default()
        })
    }

    /// Engine delegating to the process-wide shared verifier.
    pub fn new_shared() -> Self {
        Self::new(Config {
            pow_mode: Mode::Shared,
            ..Config::default()
        })
    }

    /// The engine configuration.
    pub fn config(&self) -> &Config {
        &self.config
    }

    /// Retrieves the artifact entry for a block number.
    ///
    /// Generates it on the calling thread if needed, and warms the next
    /// epoch in the background without blocking the current call.
    fn cache(&self, block: u64) -> Arc<CacheEntry> {
        let (current, future) = self.caches.get(epoch(block));
        current.generate(&self.config);

        #[cfg(not(target_arch = "wasm32"))]
        if let Some(future) = future {
            let config = self.config.clone();
            thread::spawn(move || {
                future.generate(&config);
            });
        }
        #[cfg(target_arch = "wasm32")]
        drop(future); // no background threads; generated on first use

        current
    }

    /// Computes `(mix_digest, pow_hash)` for a header and memoizes both on
    /// it.
    ///
    /// A pure function of the header's sealing fields, nonce, and
    /// zone-context height; repeat calls return the memoized pair.
    pub fn compute_pow_light(&self, header: &Header) -> (Hash, Hash) {
        if let (Some(digest), Some(pow)) = (header.cached.pow_digest(), header.cached.pow_hash())
        {
            return (digest, pow);
        }

        let number = header.zone_number();
        let entry = self.cache(number);
        let artifact = entry.generate(&self.config);

        let seal = header.seal_hash();
        let (digest, pow) = progpow_light(
            dataset_size(number),
            artifact.cache(),
            seal.as_bytes(),
            header.nonce_u64(),
            number,
            artifact.cdag(),
        );
        let digest = Hash(digest);
        let pow = Hash(pow);
        header.cached.set_pow(digest, pow);

        // `entry` stays alive past the kernel call, so a mapped cache can
        // never be unmapped while its words are being read.
        drop(entry);
        (digest, pow)
    }

    /// Checks whether a header satisfies the proof-of-work.
    ///
    /// Returns the computed pow hash on success. Errors reject the header;
    /// the engine stays usable.
    pub fn verify_seal(&self, header: &Header) -> Result<Hash, EngineError> {
        // Fake engines accept everything, except the configured failure.
        if matches!(self.config.pow_mode, Mode::Fake | Mode::FullFake) {
            if let Some(delay) = self.fake_delay {
                thread::sleep(delay);
            }
            if self.fake_fail == Some(header.zone_number()) {
                return Err(EngineError::InvalidPoW(Hash::zero()));
            }
            return Ok(Hash::zero());
        }
        // Shared engines delegate, reusing the shared artifact LRU.
        if let Some(shared) = &self.shared {
            return shared.verify_seal(header);
        }

        if header.difficulty.is_zero() {
            return Err(EngineError::InvalidDifficulty);
        }

        let (digest, pow) = match (header.cached.pow_digest(), header.cached.pow_hash()) {
            (Some(digest), Some(pow)) => (digest, pow),
            _ => self.compute_pow_light(header),
        };

        if header.mix_hash != digest {
            return Err(EngineError::InvalidMixHash);
        }

        let target = difficulty_target(&header.difficulty);
        if !hash_meets_target(&pow, &target) {
            return Err(EngineError::InvalidPoW(pow));
        }
        Ok(pow)
    }
}

/// Process-wide engine backing every [`Mode::Shared`] instance.
fn shared_engine() -> Arc<Progpow> {
    static SHARED: OnceLock<Arc<Progpow>> = OnceLock::new();
    Arc::clone(SHARED.get_or_init(|| {
        Arc::new(Progpow::new(Config {
            pow_mode: Mode::Normal,
            caches_in_mem: 3,
            ..Config::default()
        }))
    }))
}
