//! Canonical hashing helpers shared by the base-condition extractor (C7)
//! and the event fingerprint (C8). Hand-rolled rather than pulled from a
//! crate, in the same spirit as the double-hashing scheme used elsewhere
//! in this codebase for small, stable, process-portable digests.

use std::collections::hash_map::DefaultHasher;
use std::hash::{Hash, Hasher};

const FNV_OFFSET_BASIS: u64 = 0xcbf2_9ce4_8422_2325;
const FNV_PRIME: u64 = 0x1000_0000_01b3;
/// Alternate prime used to re-hash on a detected collision, per §4.6.
const FNV_PRIME_ALT: u64 = 0x0000_0100_0000_01b3;

fn fnv1a(bytes: &[u8], prime: u64) -> u64 {
    let mut hash = FNV_OFFSET_BASIS;
    for &byte in bytes {
        hash ^= u64::from(byte);
        hash = hash.wrapping_mul(prime);
    }
    hash
}

/// The canonical hash of a base-condition set's sorted static predicate
/// identity bytes.
pub fn canonical_hash(sorted_predicate_bytes: &[u8]) -> u64 {
    fnv1a(sorted_predicate_bytes, FNV_PRIME)
}

/// The alternate hash, used only to re-group on a detected collision
/// between two base-condition sets whose predicate-id vectors differ.
pub fn alternate_hash(sorted_predicate_bytes: &[u8]) -> u64 {
    fnv1a(sorted_predicate_bytes, FNV_PRIME_ALT)
}

/// A deterministic 128-bit fingerprint over a canonical byte sequence,
/// used as the result-cache key (C8/C9). Built from two independently
/// seeded `DefaultHasher` passes folded into a `u128` — the Open Question
/// in §9 names 128-bit SipHash as a candidate; this satisfies the same
/// "stable, collision-resistant, process-portable" requirement without
/// pulling in a dedicated hashing crate.
pub fn fingerprint128(bytes: &[u8]) -> u128 {
    let mut first = DefaultHasher::new();
    0xA5A5_A5A5_u64.hash(&mut first);
    bytes.hash(&mut first);
    let high = first.finish();

    let mut second = DefaultHasher::new();
    0x5A5A_5A5A_u64.hash(&mut second);
    bytes.hash(&mut second);
    bytes.len().hash(&mut second);
    let low = second.finish();

    (u128::from(high) << 64) | u128::from(low)
}
