//! Per-epoch verification artifacts and their LRU.
//!
//! Every epoch owns one `(cache, cDag)` pair. Entries are created empty and
//! generated at most once behind a latch, so concurrent verifiers of the
//! same epoch block on a single generation instead of repeating it.

use std::num::NonZeroUsize;
use std::sync::{Arc, Mutex, OnceLock};

use log::{debug, trace, warn};
use lru::LruCache;

use crate::cache::{generate_cache, generate_cdag};
use crate::config::{Config, Mode};
use crate::kernel::PROGPOW_CACHE_WORDS;
use crate::params::{cache_size, seed_hash, EPOCH_LENGTH, MAX_EPOCH};

/// Cache size used in test mode, small enough for fast tests.
const TEST_CACHE_BYTES: u64 = 1024;

/// Backing storage of a generated epoch cache.
enum Backing {
    /// Heap-allocated cache words.
    Memory(Vec<u32>),
    /// Words borrowed from a memory-mapped dump file.
    #[cfg(not(target_arch = "wasm32"))]
    Mapped(crate::dump::CacheDump),
}

impl Backing {
    fn words(&self) -> &[u32] {
        match self {
            Backing::Memory(words) => words,
            #[cfg(not(target_arch = "wasm32"))]
            Backing::Mapped(dump) => dump.words(),
        }
    }
}

/// A generated `(cache, cDag)` pair.
///
/// Field order matters: the cDag drops before the backing it was derived
/// from, and an mmap'd backing unmaps last, after every word view is gone.
pub struct Artifact {
    cdag: Vec<u32>,
    backing: Backing,
}

impl Artifact {
    /// The epoch cache words (magic stripped when disk-backed).
    pub fn cache(&self) -> &[u32] {
        self.backing.words()
    }

    /// The compact DAG.
    pub fn cdag(&self) -> &[u32] {
        &self.cdag
    }
}

/// A per-epoch artifact slot with a one-shot generation latch.
pub struct CacheEntry {
    epoch: u64,
    built: OnceLock<Artifact>,
}

impl CacheEntry {
    fn new(epoch: u64) -> Self {
        Self {
            epoch,
            built: OnceLock::new(),
        }
    }

    /// Epoch this entry belongs to.
    pub fn epoch(&self) -> u64 {
        self.epoch
    }

    /// Whether generation has already completed.
    pub fn is_generated(&self) -> bool {
        self.built.get().is_some()
    }

    /// Ensures the artifact is generated and returns it.
    ///
    /// Idempotent: concurrent callers block until the single generation
    /// finishes. Disk failures degrade to in-memory generation; they never
    /// propagate.
    pub fn generate(&self, config: &Config) -> &Artifact {
        self.built.get_or_init(|| {
            let block = self.epoch * EPOCH_LENGTH + 1;
            let size = if config.pow_mode == Mode::Test {
                TEST_CACHE_BYTES
            } else {
                cache_size(block)
            };
            let seed = seed_hash(block);

            let backing = self.build_backing(config, size, &seed);
            let mut cdag = vec![0u32; PROGPOW_CACHE_WORDS];
            generate_cdag(&mut cdag, backing.words(), self.epoch);
            Artifact { cdag, backing }
        })
    }

    #[cfg(not(target_arch = "wasm32"))]
    fn build_backing(&self, config: &Config, size: u64, seed: &[u8; 32]) -> Backing {
        let Some(dir) = &config.cache_dir else {
            return Backing::Memory(generate_in_memory(size, self.epoch, seed));
        };

        let path = crate::dump::dump_path(dir, seed);

        match crate::dump::memory_map(&path, size, config.caches_lock_mmap) {
            Ok(dump) => {
                debug!("loaded epoch cache from disk epoch={}", self.epoch);
                return Backing::Mapped(dump);
            }
            Err(err) => debug!(
                "failed to load epoch cache from disk epoch={} err={err}",
                self.epoch
            ),
        }

        let epoch = self.epoch;
        match crate::dump::memory_map_and_generate(&path, size, config.caches_lock_mmap, |words| {
            generate_cache(words, epoch, seed)
        }) {
            Ok(dump) => {
                crate::dump::remove_stale_dumps(dir, self.epoch, config.caches_on_disk);
                Backing::Mapped(dump)
            }
            Err(err) => {
                warn!(
                    "failed to generate mapped epoch cache epoch={} err={err}; using memory",
                    self.epoch
                );
                Backing::Memory(generate_in_memory(size, self.epoch, seed))
            }
        }
    }

    #[cfg(target_arch = "wasm32")]
    fn build_backing(&self, _config: &Config, size: u64, seed: &[u8; 32]) -> Backing {
        Backing::Memory(generate_in_memory(size, self.epoch, seed))
    }
}

fn generate_in_memory(size: u64, epoch: u64, seed: &[u8; 32]) -> Vec<u32> {
    let mut words = vec![0u32; (size / 4) as usize];
    generate_cache(&mut words, epoch, seed);
    words
}

/// LRU of per-epoch entries plus the distinguished future slot.
///
/// The future slot always holds the next-higher epoch ever requested. It is
/// not counted against the LRU capacity and is promoted into the main map
/// on demand.
pub struct ArtifactCache {
    inner: Mutex<Inner>,
}

struct Inner {
    cache: LruCache<u64, Arc<CacheEntry>>,
    future: Option<u64>,
    future_item: Option<Arc<CacheEntry>>,
}

impl ArtifactCache {
    /// Creates an LRU keeping `max_items` epochs (minimum one).
    pub fn new(max_items: usize) -> Self {
        let cap = NonZeroUsize::new(max_items.max(1)).unwrap_or(NonZeroUsize::MIN);
        Self {
            inner: Mutex::new(Inner {
                cache: LruCache::new(cap),
                future: None,
                future_item: None,
            }),
        }
    }

    /// Retrieves or creates the entry for `epoch`.
    ///
    /// The first return value is always the entry for `epoch`, present in
    /// the main map afterwards. The second is the freshly installed future
    /// entry, when one was created: the caller should warm it up off the
    /// calling thread.
    pub fn get(&self, epoch: u64) -> (Arc<CacheEntry>, Option<Arc<CacheEntry>>) {
        let mut inner = match self.inner.lock() {
            Ok(guard) => guard,
            Err(poisoned) => poisoned.into_inner(),
        };

        let item = match inner.cache.get(&epoch) {
            Some(entry) => Arc::clone(entry),
            None => {
                let entry = if inner.future == Some(epoch) {
                    // Promote the pre-warmed future entry.
                    inner
                        .future_item
                        .clone()
                        .unwrap_or_else(|| Arc::new(CacheEntry::new(epoch)))
                } else {
                    trace!("requiring new epoch cache epoch={epoch}");
                    Arc::new(CacheEntry::new(epoch))
                };
                inner.cache.put(epoch, Arc::clone(&entry));
                entry
            }
        };

        let mut future = None;
        if epoch + 1 < MAX_EPOCH && inner.future.map_or(true, |f| f < epoch + 1) {
            trace!("requiring new future epoch cache epoch={}", epoch + 1);
            let entry = Arc::new(CacheEntry::new(epoch + 1));
            inner.future = Some(epoch + 1);
            inner.future_item = Some(Arc::clone(&entry));
            future = Some(entry);
        }
        (item, future)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::params::epoch;

    #[test]
    fn future_slot_stays_ahead() {
        let lru = ArtifactCache::new(2);
        let (entry, future) = lru.get(5);
        assert_eq!(entry.epoch(), 5);
        let future = future.expect("first get installs a future entry");
        assert_eq!(future.epoch(), 6);

        // A lower epoch does not move the future slot backwards.
        let (_, none) = lru.get(3);
        assert!(none.is_none());
        let inner = match lru.inner.lock() {
            Ok(guard) => guard,
            Err(poisoned) => poisoned.into_inner(),
        };
        assert_eq!(inner.future, Some(6));
    }

    #[test]
    fn future_entry_is_promoted_not_rebuilt() {
        let lru = ArtifactCache::new(2);
        let (_, future) = lru.get(1);
        let future = future.expect("future installed");

        let (promoted, next) = lru.get(2);
        assert!(Arc::ptr_eq(&promoted, &future));
        assert_eq!(next.expect("new future").epoch(), 3);
    }

    #[test]
    fn same_epoch_returns_same_entry() {
        let lru = ArtifactCache::new(2);
        let (a, _) = lru.get(0);
        let (b, _) = lru.get(0);
        assert!(Arc::ptr_eq(&a, &b));
    }

    #[test]
    fn epoch_boundary_keeps_both_entries() {
        let lru = ArtifactCache::new(2);
        let (e0, _) = lru.get(epoch(29_999));
        let (e1, _) = lru.get(epoch(30_000));
        assert_eq!(e0.epoch(), 0);
        assert_eq!(e1.epoch(), 1);

        let mut inner = match lru.inner.lock() {
            Ok(guard) => guard,
            Err(poisoned) => poisoned.into_inner(),
        };
        assert!(inner.cache.get(&0).is_some());
        assert!(inner.cache.get(&1).is_some());
        assert!(inner.future >= Some(2));
    }

    #[test]
    fn no_future_entry_past_the_last_epoch() {
        let lru = ArtifactCache::new(1);
        let (entry, future) = lru.get(MAX_EPOCH - 1);
        assert_eq!(entry.epoch(), MAX_EPOCH - 1);
        assert!(future.is_none());
    }

    #[test]
    fn generation_is_latched() {
        let lru = ArtifactCache::new(1);
        let (entry, _) = lru.get(0);
        assert!(!entry.is_generated());

        let config = Config {
            pow_mode: Mode::Test,
            ..Config::default()
        };
        let first = entry.generate(&config).cache().to_vec();
        assert!(entry.is_generated());

        // Second call returns the latched artifact.
        let second = entry.generate(&config).cache().to_vec();
        assert_eq!(first, second);
        assert_eq!(first.len(), TEST_CACHE_BYTES as usize / 4);
    }
}
