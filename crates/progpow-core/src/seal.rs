// Consensus-critical. Changes require spec update + tests.
//! Canonical seal pre-image and the BLAKE3 hashes derived from it.
//!
//! The seal pre-image is the RLP list of every sealing field with the nonce
//! zero-filled, so a miner can grind the nonce without re-encoding the
//! header. The seal hash is BLAKE3-256 of that encoding; the block hash is
//! BLAKE3-256 of `nonce ‖ seal_hash`.

use crate::constants::*;
use crate::types::{Address, BlockNonce, Hash, Header, Location};

use num_bigint::BigUint;
use num_traits::Zero;
use rlp::RlpStream;

impl rlp::Encodable for Hash {
    fn rlp_append(&self, s: &mut RlpStream) {
        s.encoder().encode_value(&self.0);
    }
}

impl rlp::Encodable for Address {
    fn rlp_append(&self, s: &mut RlpStream) {
        s.encoder().encode_value(&self.0);
    }
}

impl rlp::Encodable for BlockNonce {
    fn rlp_append(&self, s: &mut RlpStream) {
        s.encoder().encode_value(&self.0);
    }
}

impl rlp::Encodable for Location {
    fn rlp_append(&self, s: &mut RlpStream) {
        s.encoder().encode_value(&self.0);
    }
}

/// Appends a big integer as a canonical RLP unsigned: minimal big-endian
/// bytes, zero as the empty string.
fn append_biguint(s: &mut RlpStream, v: &BigUint) {
    if v.is_zero() {
        s.append_empty_data();
    } else {
        s.append(&v.to_bytes_be());
    }
}

/// Encodes the seal pre-image of a header.
///
/// An 18-item RLP list in sealing order; `parent_hash`, `manifest_hash` and
/// `number` are nested lists of `HIERARCHY_DEPTH` entries and the trailing
/// nonce is always zero-filled.
pub fn seal_preimage(h: &Header) -> Vec<u8> {
    let mut s = RlpStream::new_list(18);
    s.begin_list(HIERARCHY_DEPTH);
    for ph in &h.parent_hash {
        s.append(ph);
    }
    s.append(&h.uncle_hash);
    s.append(&h.coinbase);
    s.append(&h.root);
    s.append(&h.tx_hash);
    s.append(&h.etx_hash);
    s.append(&h.etx_rollup_hash);
    s.begin_list(HIERARCHY_DEPTH);
    for mh in &h.manifest_hash {
        s.append(mh);
    }
    s.append(&h.receipt_hash);
    s.begin_list(HIERARCHY_DEPTH);
    for n in &h.number {
        s.append(n);
    }
    s.append(&h.gas_limit);
    s.append(&h.gas_used);
    append_biguint(&mut s, &h.base_fee);
    append_biguint(&mut s, &h.difficulty);
    s.append(&h.location);
    s.append(&h.time);
    s.append(&h.extra);
    s.append(&BlockNonce::zero());
    s.out().to_vec()
}

impl Header {
    /// Hash of the header prior to it being sealed: BLAKE3-256 of the seal
    /// pre-image. Memoized on first use.
    pub fn seal_hash(&self) -> Hash {
        *self.cached.seal_hash.get_or_init(|| {
            let mut hasher = blake3::Hasher::new();
            hasher.update(&seal_preimage(self));
            Hash(*hasher.finalize().as_bytes())
        })
    }

    /// The nonce'd block hash: BLAKE3-256 of `nonce ‖ seal_hash`.
    /// Memoized on first use.
    pub fn hash(&self) -> Hash {
        *self.cached.hash.get_or_init(|| {
            let seal = self.seal_hash();
            let mut data = [0u8; NONCE_LEN + HASH_LEN];
            data[..NONCE_LEN].copy_from_slice(self.nonce.as_bytes());
            data[NONCE_LEN..].copy_from_slice(seal.as_bytes());
            Hash(*blake3::hash(&data).as_bytes())
        })
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use rlp::Rlp;

    fn sample_header() -> Header {
        Header {
            parent_hash: [Hash([1u8; 32]), Hash([2u8; 32]), Hash([3u8; 32])],
            difficulty: BigUint::from(1000u32),
            number: [10, 20, 30],
            gas_limit: 8_000_000,
            time: 1_700_000_000,
            location: Location(vec![0, 0]),
            extra: b"test".to_vec(),
            nonce: BlockNonce::from_u64(0x1234_5678_9abc_def0),
            ..Header::default()
        }
    }

    #[test]
    fn preimage_is_an_18_item_list() {
        let enc = seal_preimage(&sample_header());
        let r = Rlp::new(&enc);
        assert!(r.is_list());
        assert_eq!(r.item_count().unwrap(), 18);

        // Per-context arrays are nested lists of HIERARCHY_DEPTH entries.
        for idx in [0usize, 7, 9] {
            let item = r.at(idx).unwrap();
            assert!(item.is_list());
            assert_eq!(item.item_count().unwrap(), HIERARCHY_DEPTH);
        }
    }

    #[test]
    fn preimage_integers_are_canonical() {
        let enc = seal_preimage(&sample_header());
        let r = Rlp::new(&enc);

        assert_eq!(r.at(9).unwrap().val_at::<u64>(2).unwrap(), 30);
        assert_eq!(r.at(10).unwrap().as_val::<u64>().unwrap(), 8_000_000);
        // Zero gas_used encodes as the empty string.
        assert!(r.at(11).unwrap().data().unwrap().is_empty());
        // Difficulty 1000 as minimal big-endian bytes.
        assert_eq!(r.at(13).unwrap().data().unwrap(), &[0x03u8, 0xe8][..]);
    }

    #[test]
    fn preimage_nonce_is_zero_filled() {
        let enc = seal_preimage(&sample_header());
        let r = Rlp::new(&enc);
        assert_eq!(r.at(17).unwrap().data().unwrap(), &[0u8; 8][..]);
    }

    #[test]
    fn seal_hash_ignores_nonce_block_hash_does_not() {
        let a = sample_header();
        let b = Header {
            nonce: BlockNonce::from_u64(1),
            ..sample_header()
        };

        assert_eq!(a.seal_hash(), b.seal_hash());
        assert_ne!(a.hash(), b.hash());
    }

    #[test]
    fn seal_hash_is_memoized() {
        let h = sample_header();
        let first = h.seal_hash();
        assert_eq!(h.seal_hash(), first);

        // The memo slot never changes, even if a field is mutated later.
        let mut h = h;
        h.extra.push(0xff);
        assert_eq!(h.seal_hash(), first);
    }

    #[test]
    fn block_hash_commits_to_seal_fields() {
        let a = sample_header();
        let b = Header {
            gas_limit: 1,
            ..sample_header()
        };
        assert_ne!(a.seal_hash(), b.seal_hash());
        assert_ne!(a.hash(), b.hash());
    }
}
