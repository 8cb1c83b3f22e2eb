//! Probabilistic membership pre-check for change detection.

use sha2::{Digest, Sha256};
use std::sync::atomic::{AtomicU64, Ordering};

/// Fixed-size bloom filter with `k` double-hashed probe positions.
///
/// A negative answer is authoritative; a positive answer must be
/// confirmed against the cache. Mutations use release stores so that
/// lock-free lookups observe complete writes.
pub struct BloomFilter {
    bits: Vec<AtomicU64>,
    num_bits: u64,
    num_hashes: u32,
}

impl BloomFilter {
    /// Create a filter with an explicit bit count and hash count.
    pub fn new(num_bits: u64, num_hashes: u32) -> Self {
        let num_bits = num_bits.max(64);
        let words = num_bits.div_ceil(64) as usize;
        let mut bits = Vec::with_capacity(words);
        bits.resize_with(words, || AtomicU64::new(0));
        Self {
            bits,
            num_bits,
            num_hashes: num_hashes.max(1),
        }
    }

    /// Size the filter for an expected item count and false-positive rate.
    ///
    /// Uses the standard optimum `m = -n ln p / (ln 2)^2`,
    /// `k = (m / n) ln 2`.
    pub fn with_capacity(expected_items: usize, false_positive_rate: f64) -> Self {
        let n = expected_items.max(1) as f64;
        let p = false_positive_rate.clamp(1e-9, 0.5);
        let ln2 = std::f64::consts::LN_2;
        let m = (-n * p.ln() / (ln2 * ln2)).ceil() as u64;
        let k = ((m as f64 / n) * ln2).round().max(1.0) as u32;
        Self::new(m, k)
    }

    /// Number of bits in the array.
    pub fn num_bits(&self) -> u64 {
        self.num_bits
    }

    /// Number of probe positions per key.
    pub fn num_hashes(&self) -> u32 {
        self.num_hashes
    }

    /// Two independent 64-bit hashes derived from one SHA-256 digest.
    fn hash_pair(key: &str) -> (u64, u64) {
        let digest = Sha256::digest(key.as_bytes());
        let h1 = u64::from_be_bytes(digest[0..8].try_into().unwrap_or([0; 8]));
        let h2 = u64::from_be_bytes(digest[8..16].try_into().unwrap_or([0; 8]));
        // h2 must be odd so probe positions cycle through the array
        (h1, h2 | 1)
    }

    fn position(&self, h1: u64, h2: u64, i: u32) -> (usize, u64) {
        let bit = h1.wrapping_add((i as u64).wrapping_mul(h2)) % self.num_bits;
        ((bit / 64) as usize, 1u64 << (bit % 64))
    }

    /// Add a key to the filter.
    pub fn insert(&self, key: &str) {
        let (h1, h2) = Self::hash_pair(key);
        for i in 0..self.num_hashes {
            let (word, mask) = self.position(h1, h2, i);
            self.bits[word].fetch_or(mask, Ordering::Release);
        }
    }

    /// Whether the key might be in the set. Never false for added keys.
    pub fn might_contain(&self, key: &str) -> bool {
        let (h1, h2) = Self::hash_pair(key);
        (0..self.num_hashes).all(|i| {
            let (word, mask) = self.position(h1, h2, i);
            self.bits[word].load(Ordering::Acquire) & mask != 0
        })
    }

    /// Reset every bit.
    pub fn clear(&self) {
        for word in &self.bits {
            word.store(0, Ordering::Release);
        }
    }
}
