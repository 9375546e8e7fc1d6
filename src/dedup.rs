//! Dedup filter: an exact in-process set owned by the scheduler, plus a
//! shared probabilistic membership structure workers use only as a linking
//! hint (spec.md §3, §9).

use std::collections::hash_map::DefaultHasher;
use std::hash::{Hash, Hasher};
use std::sync::atomic::{AtomicU8, Ordering};
use std::sync::Arc;

use crate::config::{BLOOM_BITS, BLOOM_HASHES};

/// Fixed-size bit array with atomic single-bit reads/writes, addressed by
/// double hashing `h1 + i*h2 mod m`. Append-only: bits are never cleared.
/// False positives are acceptable — the scheduler's exact `KnownUrls` set
/// is the source of truth for dedup decisions; this structure is only a
/// hint the link rewriter uses to decide whether a target is "known enough"
/// to rewrite.
pub struct BloomFilter {
    bits: Vec<AtomicU8>,
    len_bits: usize,
    hashes: u32,
}

impl BloomFilter {
    pub fn new(len_bits: usize, hashes: u32) -> Self {
        let len_bytes = len_bits.div_ceil(8);
        let mut bits = Vec::with_capacity(len_bytes);
        bits.resize_with(len_bytes, || AtomicU8::new(0));
        Self {
            bits,
            len_bits,
            hashes,
        }
    }

    fn hash_pair(value: &str) -> (u64, u64) {
        let mut h1 = DefaultHasher::new();
        value.hash(&mut h1);
        let a = h1.finish();

        let mut h2 = DefaultHasher::new();
        0xD1B5_4A32_u64.hash(&mut h2);
        value.hash(&mut h2);
        let b = h2.finish() | 1; // force odd so h2 is coprime-ish with power-of-two m

        (a, b)
    }

    fn bit_indices(&self, value: &str) -> impl Iterator<Item = usize> + '_ {
        let (h1, h2) = Self::hash_pair(value);
        let m = self.len_bits as u64;
        (0..self.hashes).map(move |i| (h1.wrapping_add((i as u64).wrapping_mul(h2)) % m) as usize)
    }

    pub fn insert(&self, value: &str) {
        for idx in self.bit_indices(value).collect::<Vec<_>>() {
            let byte = idx / 8;
            let mask = 1u8 << (idx % 8);
            self.bits[byte].fetch_or(mask, Ordering::Relaxed);
        }
    }

    pub fn contains(&self, value: &str) -> bool {
        self.bit_indices(value).all(|idx| {
            let byte = idx / 8;
            let mask = 1u8 << (idx % 8);
            self.bits[byte].load(Ordering::Relaxed) & mask != 0
        })
    }
}

impl Default for BloomFilter {
    fn default() -> Self {
        Self::new(BLOOM_BITS, BLOOM_HASHES)
    }
}

/// Shared handle workers hold; cloning is cheap (`Arc`).
pub type SharedBloomFilter = Arc<BloomFilter>;

pub fn new_shared_filter() -> SharedBloomFilter {
    Arc::new(BloomFilter::default())
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn insert_then_contains_is_true() {
        let f = BloomFilter::new(1 << 12, 4);
        f.insert("https://example.com/a");
        assert!(f.contains("https://example.com/a"));
    }

    #[test]
    fn unrelated_values_are_usually_absent() {
        let f = BloomFilter::new(1 << 16, 4);
        f.insert("https://example.com/a");
        // Not a proof of no false positives, just a sanity check that the
        // filter does not degenerate to "always true" for a small table.
        let mut false_positives = 0;
        for i in 0..200 {
            if f.contains(&format!("https://example.com/other/{i}")) {
                false_positives += 1;
            }
        }
        assert!(false_positives < 200);
    }

    #[test]
    fn is_append_only_and_shareable() {
        let f = new_shared_filter();
        let f2 = f.clone();
        f.insert("x");
        assert!(f2.contains("x"));
    }
}
