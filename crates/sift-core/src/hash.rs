//! Hash functions for AdSift
//!
//! Uses Murmur3 32-bit with two different seeds to create a 64-bit composite key.
//! The full-fidelity element fingerprint is built on this.

use std::fmt;

/// 64-bit hash represented as two 32-bit parts.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Default)]
#[repr(C)]
pub struct Hash64 {
    pub lo: u32,
    pub hi: u32,
}

impl Hash64 {
    /// Create a new Hash64 from lo and hi parts.
    #[inline]
    pub const fn new(lo: u32, hi: u32) -> Self {
        Self { lo, hi }
    }

    /// Convert to a single u64.
    #[inline]
    pub const fn to_u64(&self) -> u64 {
        ((self.hi as u64) << 32) | (self.lo as u64)
    }
}

impl fmt::Display for Hash64 {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{:016x}", self.to_u64())
    }
}

const SEED_LO: u32 = 0x9e3779b9; // Golden ratio
const SEED_HI: u32 = 0x85ebca6b; // Murmur3 constant

/// Murmur3 32-bit hash implementation.
#[inline]
pub fn murmur3_32(data: &[u8], seed: u32) -> u32 {
    let len = data.len();
    let mut h = seed;

    let mut chunks = data.chunks_exact(4);
    for chunk in &mut chunks {
        let k = u32::from_le_bytes([chunk[0], chunk[1], chunk[2], chunk[3]]);
        let k = k.wrapping_mul(0xcc9e2d51);
        let k = k.rotate_left(15);
        let k = k.wrapping_mul(0x1b873593);

        h ^= k;
        h = h.rotate_left(13);
        h = h.wrapping_mul(5).wrapping_add(0xe6546b64);
    }

    // Process remaining bytes
    let tail = chunks.remainder();
    let mut k: u32 = 0;
    if tail.len() >= 3 {
        k ^= (tail[2] as u32) << 16;
    }
    if tail.len() >= 2 {
        k ^= (tail[1] as u32) << 8;
    }
    if !tail.is_empty() {
        k ^= tail[0] as u32;
        let k = k.wrapping_mul(0xcc9e2d51);
        let k = k.rotate_left(15);
        let k = k.wrapping_mul(0x1b873593);
        h ^= k;
    }

    // Finalization
    h ^= len as u32;
    h ^= h >> 16;
    h = h.wrapping_mul(0x85ebca6b);
    h ^= h >> 13;
    h = h.wrapping_mul(0xc2b2ae35);
    h ^= h >> 16;

    h
}

/// Compute 64-bit hash as (lo, hi) pair using two Murmur3 passes.
#[inline]
pub fn hash64(data: &[u8]) -> Hash64 {
    Hash64 {
        lo: murmur3_32(data, SEED_LO),
        hi: murmur3_32(data, SEED_HI),
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_murmur3_consistent() {
        let h1 = murmur3_32(b"div#top.ad-banner", 0);
        let h2 = murmur3_32(b"div#top.ad-banner", 0);
        assert_eq!(h1, h2);
    }

    #[test]
    fn test_murmur3_different_strings() {
        let h1 = murmur3_32(b"div#top", 0);
        let h2 = murmur3_32(b"div#bottom", 0);
        assert_ne!(h1, h2);
    }

    #[test]
    fn test_murmur3_different_seeds() {
        let h1 = murmur3_32(b"iframe", 0);
        let h2 = murmur3_32(b"iframe", 1);
        assert_ne!(h1, h2);
    }

    #[test]
    fn test_murmur3_tail_lengths_differ() {
        let hashes: Vec<u32> = (1..=7).map(|len| murmur3_32(&vec![b'a'; len], 0)).collect();
        for (i, a) in hashes.iter().enumerate() {
            for b in &hashes[i + 1..] {
                assert_ne!(a, b);
            }
        }
    }

    #[test]
    fn test_hash64_display_is_fixed_width() {
        let h = Hash64::new(1, 0);
        assert_eq!(h.to_string(), "0000000000000001");
        assert_eq!(hash64(b"div").to_string().len(), 16);
    }
}
