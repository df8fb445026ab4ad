// Consensus-critical. Changes require spec update + tests.
//! Epoch cache, virtual dataset item, and cDag generation.
//!
//! The cache is the memory-hard artifact every light verification hangs off:
//! a Keccak-512 row chain mixed with three RandMemoHash rounds. Dataset
//! items are derived from it on the fly, and the cDag is simply the first
//! `PROGPOW_CACHE_WORDS` words of that virtual dataset.

use std::time::Instant;

use log::debug;
use sha3::{Digest, Keccak512};

use crate::kernel::{FNV_PRIME, PROGPOW_CACHE_WORDS};
use crate::params::{CACHE_ROUNDS, DATASET_PARENTS, HASH_BYTES, HASH_WORDS};

/// Classic ethash fold: multiply, then xor.
fn fnv(a: u32, b: u32) -> u32 {
    a.wrapping_mul(FNV_PRIME) ^ b
}

fn keccak_512(dest: &mut [u8], data: &[u8]) {
    let mut hasher = Keccak512::new();
    hasher.update(data);
    dest.copy_from_slice(&hasher.finalize());
}

fn read_le_u32(bytes: &[u8], offset: usize) -> u32 {
    u32::from_le_bytes([
        bytes[offset],
        bytes[offset + 1],
        bytes[offset + 2],
        bytes[offset + 3],
    ])
}

/// Fills `dest` with the epoch cache derived from `seed`.
///
/// Rows are a Keccak-512 chain seeded by the epoch seed, then mixed with
/// `CACHE_ROUNDS` RandMemoHash rounds. The byte layout is little-endian; on
/// big-endian hosts the words are swapped afterwards so `dest` always holds
/// native-order words.
pub fn generate_cache(dest: &mut [u32], epoch: u64, seed: &[u8; 32]) {
    let start = Instant::now();

    let bytes: &mut [u8] = bytemuck::cast_slice_mut(&mut *dest);
    let size = bytes.len();
    let rows = size / HASH_BYTES;

    // Sequentially produce the initial rows.
    keccak_512(&mut bytes[..HASH_BYTES], seed);
    for offset in (HASH_BYTES..size).step_by(HASH_BYTES) {
        let (prev, cur) = bytes.split_at_mut(offset);
        keccak_512(&mut cur[..HASH_BYTES], &prev[offset - HASH_BYTES..]);
    }

    // Low-round RandMemoHash: row i becomes the hash of its predecessor
    // xored with a row picked by its own leading word.
    let mut temp = [0u8; HASH_BYTES];
    for _ in 0..CACHE_ROUNDS {
        for j in 0..rows {
            let src = ((j + rows - 1) % rows) * HASH_BYTES;
            let dst = j * HASH_BYTES;
            let xor = (read_le_u32(bytes, dst) as usize % rows) * HASH_BYTES;
            for k in 0..HASH_BYTES {
                temp[k] = bytes[src + k] ^ bytes[xor + k];
            }
            keccak_512(&mut bytes[dst..dst + HASH_BYTES], &temp);
        }
    }

    if cfg!(target_endian = "big") {
        for word in dest.iter_mut() {
            *word = word.swap_bytes();
        }
    }

    debug!(
        "generated epoch cache epoch={epoch} bytes={size} elapsed={:?}",
        start.elapsed()
    );
}

/// Derives one 64-byte item of the virtual dataset from the cache.
pub fn generate_dataset_item(cache: &[u32], index: u32) -> [u8; HASH_BYTES] {
    let rows = (cache.len() / HASH_WORDS) as u32;
    let row = ((index % rows) as usize) * HASH_WORDS;

    let mut mix = [0u8; HASH_BYTES];
    mix[..4].copy_from_slice(&(cache[row] ^ index).to_le_bytes());
    for i in 1..HASH_WORDS {
        mix[i * 4..i * 4 + 4].copy_from_slice(&cache[row + i].to_le_bytes());
    }
    let mut hashed = [0u8; HASH_BYTES];
    keccak_512(&mut hashed, &mix);

    let mut int_mix = [0u32; HASH_WORDS];
    for (i, word) in int_mix.iter_mut().enumerate() {
        *word = read_le_u32(&hashed, i * 4);
    }

    // Fold in pseudo-random parent rows selected by the running mix.
    for i in 0..DATASET_PARENTS {
        let parent = (fnv(index ^ i, int_mix[i as usize % HASH_WORDS]) % rows) as usize;
        for k in 0..HASH_WORDS {
            int_mix[k] = fnv(int_mix[k], cache[parent * HASH_WORDS + k]);
        }
    }

    let mut flat = [0u8; HASH_BYTES];
    for (i, word) in int_mix.iter().enumerate() {
        flat[i * 4..i * 4 + 4].copy_from_slice(&word.to_le_bytes());
    }
    let mut out = [0u8; HASH_BYTES];
    keccak_512(&mut out, &flat);
    out
}

/// Fills the cDag: the first `PROGPOW_CACHE_WORDS` words of the virtual
/// dataset, the kernel's hot working set. Never persisted.
pub fn generate_cdag(cdag: &mut [u32], cache: &[u32], epoch: u64) {
    let start = Instant::now();

    for i in 0..(PROGPOW_CACHE_WORDS / HASH_WORDS) as u32 {
        let raw = generate_dataset_item(cache, i);
        for j in 0..HASH_WORDS {
            cdag[i as usize * HASH_WORDS + j] = read_le_u32(&raw, j * 4);
        }
    }

    debug!("generated cDag epoch={epoch} elapsed={:?}", start.elapsed());
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::params::seed_hash;

    const TEST_WORDS: usize = 1024 / 4;

    fn test_cache() -> Vec<u32> {
        let mut cache = vec![0u32; TEST_WORDS];
        generate_cache(&mut cache, 0, &seed_hash(0));
        cache
    }

    #[test]
    fn cache_generation_is_deterministic() {
        let a = test_cache();
        let b = test_cache();
        assert_eq!(a, b);
        assert!(a.iter().any(|&w| w != 0));
    }

    #[test]
    fn cache_depends_on_seed() {
        let a = test_cache();
        let mut b = vec![0u32; TEST_WORDS];
        generate_cache(&mut b, 1, &seed_hash(crate::params::EPOCH_LENGTH));
        assert_ne!(a, b);
    }

    #[test]
    fn dataset_items_are_deterministic_and_index_sensitive() {
        let cache = test_cache();
        let a = generate_dataset_item(&cache, 0);
        let b = generate_dataset_item(&cache, 0);
        let c = generate_dataset_item(&cache, 1);
        assert_eq!(a, b);
        assert_ne!(a, c);
    }

    #[test]
    fn cdag_is_the_dataset_prefix() {
        let cache = test_cache();
        let mut cdag = vec![0u32; PROGPOW_CACHE_WORDS];
        generate_cdag(&mut cdag, &cache, 0);

        let first = generate_dataset_item(&cache, 0);
        for j in 0..HASH_WORDS {
            assert_eq!(cdag[j], read_le_u32(&first, j * 4));
        }

        let last = generate_dataset_item(&cache, (PROGPOW_CACHE_WORDS / HASH_WORDS - 1) as u32);
        let base = PROGPOW_CACHE_WORDS - HASH_WORDS;
        for j in 0..HASH_WORDS {
            assert_eq!(cdag[base + j], read_le_u32(&last, j * 4));
        }
    }
}
