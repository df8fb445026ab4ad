// Consensus-critical. Changes require spec update + tests.
//! Difficulty target utilities.
//!
//! A block is valid iff its pow hash, read as a big-endian 256-bit integer,
//! is at most `⌊2^256 / difficulty⌋`.

use num_bigint::BigUint;
use num_traits::One;
use progpow_core::Hash;

/// The proof-of-work target for a difficulty: `⌊2^256 / difficulty⌋`.
///
/// Callers must reject a zero difficulty before calling this.
pub fn difficulty_target(difficulty: &BigUint) -> BigUint {
    (BigUint::one() << 256u32) / difficulty
}

/// Returns `true` if `hash`, as a big-endian 256-bit integer, is within
/// `target`.
pub fn hash_meets_target(hash: &Hash, target: &BigUint) -> bool {
    BigUint::from_bytes_be(hash.as_bytes()) <= *target
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn unit_difficulty_accepts_everything() {
        let target = difficulty_target(&BigUint::one());
        assert!(hash_meets_target(&Hash([0xff; 32]), &target));
        assert!(hash_meets_target(&Hash::zero(), &target));
    }

    #[test]
    fn target_shrinks_with_difficulty() {
        let easy = difficulty_target(&BigUint::from(1000u32));
        let hard = difficulty_target(&BigUint::from(2000u32));
        assert!(hard < easy);
    }

    #[test]
    fn boundary_is_inclusive() {
        // difficulty 2^248 gives target 2^8 = 256.
        let difficulty = BigUint::one() << 248u32;
        let target = difficulty_target(&difficulty);
        assert_eq!(target, BigUint::from(256u32));

        let mut exactly = [0u8; 32];
        exactly[30] = 1; // 256 big-endian
        assert!(hash_meets_target(&Hash(exactly), &target));

        let mut above = exactly;
        above[31] = 1; // 257
        assert!(!hash_meets_target(&Hash(above), &target));
    }
}
