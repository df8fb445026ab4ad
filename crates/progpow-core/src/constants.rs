//! Protocol-wide constants for the Quai chain hierarchy.

/// Length in bytes of a 32-byte hash.
pub const HASH_LEN: usize = 32;

/// Length in bytes of an account address.
pub const ADDRESS_LEN: usize = 20;

/// Length in bytes of the sealing nonce.
pub const NONCE_LEN: usize = 8;

/// Context index of the prime chain.
pub const PRIME_CTX: usize = 0;

/// Context index of a region chain.
pub const REGION_CTX: usize = 1;

/// Context index of a zone chain.
pub const ZONE_CTX: usize = 2;

/// Depth of the chain hierarchy (prime / region / zone).
///
/// Per-context header fields (`parent_hash`, `manifest_hash`, `number`)
/// always carry exactly this many entries.
pub const HIERARCHY_DEPTH: usize = 3;
