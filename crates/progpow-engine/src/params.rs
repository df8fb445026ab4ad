// Consensus-critical. Changes require spec update + tests.
//! Epoch parameters: seed hashes and the cache/dataset growth schedules.

use sha3::{Digest, Keccak256};

/// Blocks per epoch; all blocks of one epoch share a cache and cDag.
pub const EPOCH_LENGTH: u64 = 30_000;

/// Highest epoch the artifact cache will plan ahead for.
pub const MAX_EPOCH: u64 = 2048;

/// Bytes in one cache/dataset row.
pub(crate) const HASH_BYTES: usize = 64;

/// 32-bit words in one cache/dataset row.
pub(crate) const HASH_WORDS: usize = 16;

/// Parent rows mixed into every derived dataset item.
pub(crate) const DATASET_PARENTS: u32 = 256;

/// RandMemoHash rounds applied over the whole cache.
pub(crate) const CACHE_ROUNDS: usize = 3;

/// Mix granularity of the virtual dataset.
const MIX_BYTES: u64 = 128;

const CACHE_INIT_BYTES: u64 = 1 << 24;
const CACHE_GROWTH_BYTES: u64 = 1 << 17;
const DATASET_INIT_BYTES: u64 = 1 << 30;
const DATASET_GROWTH_BYTES: u64 = 1 << 23;

/// Epoch number of a block.
pub fn epoch(block: u64) -> u64 {
    block / EPOCH_LENGTH
}

/// Cache size in bytes for the epoch of `block`.
///
/// Grows linearly per epoch, backed off so the row count stays prime.
/// Always a multiple of 64.
pub fn cache_size(block: u64) -> u64 {
    let mut size = CACHE_INIT_BYTES + CACHE_GROWTH_BYTES * epoch(block) - HASH_BYTES as u64;
    while !is_prime(size / HASH_BYTES as u64) {
        size -= 2 * HASH_BYTES as u64;
    }
    size
}

/// Virtual dataset size in bytes for the epoch of `block`.
///
/// The light path never allocates this; it only bounds the kernel's DAG
/// index space.
pub fn dataset_size(block: u64) -> u64 {
    let mut size = DATASET_INIT_BYTES + DATASET_GROWTH_BYTES * epoch(block) - MIX_BYTES;
    while !is_prime(size / MIX_BYTES) {
        size -= 2 * MIX_BYTES;
    }
    size
}

/// Seed hash for the epoch of `block`: Keccak-256 iterated once per epoch
/// over 32 zero bytes. Depends only on the epoch.
pub fn seed_hash(block: u64) -> [u8; 32] {
    let mut seed = [0u8; 32];
    for _ in 0..epoch(block) {
        let mut hasher = Keccak256::new();
        hasher.update(seed);
        seed.copy_from_slice(&hasher.finalize());
    }
    seed
}

/// Deterministic Miller-Rabin primality test, exact for all `u64` inputs
/// with this witness set.
fn is_prime(n: u64) -> bool {
    const WITNESSES: [u64; 12] = [2, 3, 5, 7, 11, 13, 17, 19, 23, 29, 31, 37];

    if n < 2 {
        return false;
    }
    for p in WITNESSES {
        if n % p == 0 {
            return n == p;
        }
    }

    let mut d = n - 1;
    let mut r = 0u32;
    while d % 2 == 0 {
        d /= 2;
        r += 1;
    }

    'witness: for a in WITNESSES {
        let mut x = pow_mod(a, d, n);
        if x == 1 || x == n - 1 {
            continue;
        }
        for _ in 1..r {
            x = mul_mod(x, x, n);
            if x == n - 1 {
                continue 'witness;
            }
        }
        return false;
    }
    true
}

fn mul_mod(a: u64, b: u64, m: u64) -> u64 {
    ((a as u128 * b as u128) % m as u128) as u64
}

fn pow_mod(mut base: u64, mut exp: u64, m: u64) -> u64 {
    let mut acc = 1u64;
    base %= m;
    while exp > 0 {
        if exp & 1 == 1 {
            acc = mul_mod(acc, base, m);
        }
        base = mul_mod(base, base, m);
        exp >>= 1;
    }
    acc
}
