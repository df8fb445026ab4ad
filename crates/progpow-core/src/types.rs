// Consensus-critical. Changes require spec update + tests.
//! Canonical header and value types shared with the verification engine.

use crate::constants::*;
use core::fmt;
use core::str::FromStr;
use std::sync::OnceLock;

use num_bigint::BigUint;

#[cfg(feature = "serde")]
use serde::{Deserialize, Serialize};

/// Failure to parse a core value type from text.
#[derive(Debug, thiserror::Error)]
pub enum CoreError {
    /// Input decoded to the wrong number of bytes for the target type.
    #[error("{kind} must be {want} bytes, found {found}")]
    WrongLength {
        /// Name of the type being parsed.
        kind: &'static str,
        /// Byte length the type requires.
        want: usize,
        /// Byte length the input decoded to.
        found: usize,
    },

    /// Input was not valid hexadecimal.
    #[error("bad hex string: {0}")]
    BadHex(#[from] hex::FromHexError),
}

/// Decodes a `0x`-optional hex string into an exact-length byte array.
fn decode_fixed<const N: usize>(kind: &'static str, s: &str) -> Result<[u8; N], CoreError> {
    let raw = hex::decode(s.strip_prefix("0x").unwrap_or(s))?;
    raw.try_into().map_err(|raw: Vec<u8>| CoreError::WrongLength {
        kind,
        want: N,
        found: raw.len(),
    })
}

/// Implements the shared surface of a fixed-length byte newtype: the zero
/// constructor, raw access, hex formatting, and hex parsing.
macro_rules! fixed_bytes {
    ($ty:ident, $len:expr) => {
        impl $ty {
            /// The all-zero value.
            pub const fn zero() -> Self {
                Self([0u8; $len])
            }

            /// Borrows the raw bytes.
            pub const fn as_bytes(&self) -> &[u8; $len] {
                &self.0
            }
        }

        impl fmt::Display for $ty {
            fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
                f.write_str(&hex::encode(self.0))
            }
        }

        impl fmt::Debug for $ty {
            fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
                write!(f, concat!(stringify!($ty), "(0x{})"), hex::encode(self.0))
            }
        }

        impl From<[u8; $len]> for $ty {
            fn from(bytes: [u8; $len]) -> Self {
                Self(bytes)
            }
        }

        impl From<$ty> for [u8; $len] {
            fn from(value: $ty) -> Self {
                value.0
            }
        }

        impl FromStr for $ty {
            type Err = CoreError;

            fn from_str(s: &str) -> Result<Self, Self::Err> {
                decode_fixed::<$len>(stringify!($ty), s).map(Self)
            }
        }
    };
}

/// Fixed-size 32-byte hash used throughout the protocol.
#[derive(Clone, Copy, PartialEq, Eq, Hash, Default)]
#[cfg_attr(feature = "serde", derive(Serialize, Deserialize))]
pub struct Hash(pub [u8; HASH_LEN]);

fixed_bytes!(Hash, HASH_LEN);

impl Hash {
    /// Builds a hash from an arbitrary byte slice.
    ///
    /// Longer input is cropped from the left (only the last 32 bytes are
    /// kept); shorter input is left-padded with zeros.
    pub fn from_slice(b: &[u8]) -> Self {
        let mut out = [0u8; HASH_LEN];
        if b.len() >= HASH_LEN {
            out.copy_from_slice(&b[b.len() - HASH_LEN..]);
        } else {
            out[HASH_LEN - b.len()..].copy_from_slice(b);
        }
        Self(out)
    }
}

/// 20-byte account address.
#[derive(Clone, Copy, PartialEq, Eq, Hash, Default)]
#[cfg_attr(feature = "serde", derive(Serialize, Deserialize))]
pub struct Address(pub [u8; ADDRESS_LEN]);

fixed_bytes!(Address, ADDRESS_LEN);

/// 64-bit sealing nonce, stored big-endian.
///
/// Combined with the mix digest it proves that a sufficient amount of
/// computation was carried out on a block.
#[derive(Clone, Copy, PartialEq, Eq, Hash, Default)]
#[cfg_attr(feature = "serde", derive(Serialize, Deserialize))]
pub struct BlockNonce(pub [u8; NONCE_LEN]);

fixed_bytes!(BlockNonce, NONCE_LEN);

impl BlockNonce {
    /// Encodes an integer nonce in big-endian byte order.
    pub const fn from_u64(n: u64) -> Self {
        Self(n.to_be_bytes())
    }

    /// Returns the nonce as a big-endian integer.
    pub const fn to_u64(self) -> u64 {
        u64::from_be_bytes(self.0)
    }
}

/// Location of a chain within the Quai hierarchy.
///
/// Encoded as a path from the root of the tree to the chain, so not all
/// indices need to be populated: prime is `[]`, region 0 is `[0]`, zone
/// (1, 2) is `[1, 2]`.
#[derive(Clone, PartialEq, Eq, Hash, Default, Debug)]
#[cfg_attr(feature = "serde", derive(Serialize, Deserialize))]
pub struct Location(pub Vec<u8>);

impl Location {
    /// Region index, if this location names one.
    pub fn region(&self) -> Option<u8> {
        self.0.first().copied()
    }

    /// Zone index, if this location names one.
    pub fn zone(&self) -> Option<u8> {
        self.0.get(1).copied()
    }

    /// Raw path bytes.
    pub fn as_bytes(&self) -> &[u8] {
        &self.0
    }
}

/// Memoized per-header hashes.
///
/// Each slot is set at most once; later writes are ignored, so a value
/// observed by one verifier can never change under another.
#[derive(Debug, Default, Clone)]
pub struct HeaderCache {
    pub(crate) seal_hash: OnceLock<Hash>,
    pub(crate) hash: OnceLock<Hash>,
    pow_hash: OnceLock<Hash>,
    pow_digest: OnceLock<Hash>,
}

impl HeaderCache {
    /// Memoized ProgPoW result hash, if it has been computed.
    pub fn pow_hash(&self) -> Option<Hash> {
        self.pow_hash.get().copied()
    }

    /// Memoized ProgPoW mix digest, if it has been computed.
    pub fn pow_digest(&self) -> Option<Hash> {
        self.pow_digest.get().copied()
    }

    /// Stores both ProgPoW outputs. A second write is a no-op.
    pub fn set_pow(&self, digest: Hash, pow_hash: Hash) {
        let _ = self.pow_digest.set(digest);
        let _ = self.pow_hash.set(pow_hash);
    }
}

/// A Quai block header.
///
/// Only the fields that participate in sealing are carried here, plus the
/// claimed `mix_hash`/`nonce` pair the verifier checks. The `cached` slots
/// make repeat verification of the same header cheap.
#[derive(Debug, Clone, Default)]
pub struct Header {
    /// Parent hash per hierarchy context.
    pub parent_hash: [Hash; HIERARCHY_DEPTH],
    /// Hash of the uncle list.
    pub uncle_hash: Hash,
    /// Block beneficiary.
    pub coinbase: Address,
    /// State root.
    pub root: Hash,
    /// Transaction trie root.
    pub tx_hash: Hash,
    /// External-transaction trie root.
    pub etx_hash: Hash,
    /// External-transaction rollup root.
    pub etx_rollup_hash: Hash,
    /// Sub-manifest hash per hierarchy context.
    pub manifest_hash: [Hash; HIERARCHY_DEPTH],
    /// Receipt trie root.
    pub receipt_hash: Hash,
    /// Block difficulty.
    pub difficulty: BigUint,
    /// Block number per hierarchy context.
    pub number: [u64; HIERARCHY_DEPTH],
    /// Gas limit.
    pub gas_limit: u64,
    /// Gas used.
    pub gas_used: u64,
    /// Base fee per gas.
    pub base_fee: BigUint,
    /// Chain location of this block.
    pub location: Location,
    /// Timestamp in Unix seconds.
    pub time: u64,
    /// Arbitrary extra data.
    pub extra: Vec<u8>,
    /// Claimed ProgPoW mix digest.
    pub mix_hash: Hash,
    /// Sealing nonce.
    pub nonce: BlockNonce,
    /// Memoized hashes. Set once, never reassigned.
    pub cached: HeaderCache,
}

impl Header {
    /// Block number at the given hierarchy context.
    pub fn number_at(&self, ctx: usize) -> u64 {
        self.number[ctx]
    }

    /// Zone-context block number, the height input of the ProgPoW kernel.
    pub fn zone_number(&self) -> u64 {
        self.number_at(ZONE_CTX)
    }

    /// Sealing nonce as a big-endian integer.
    pub fn nonce_u64(&self) -> u64 {
        self.nonce.to_u64()
    }
}
