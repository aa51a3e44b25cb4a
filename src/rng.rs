//! Pluggable randomness seam.
//!
//! The opcode permutation (`opcode::OpcodePermutation`) and the key-table
//! generator (`keytable::KeyTable`) both need a source of bytes that varies
//! across instances in production but can be pinned down in tests. This
//! trait is the seam: production code defaults to the OS-backed
//! `rand::thread_rng`, tests construct a `ChaCha8`-seeded instance instead.

use rand::rngs::ThreadRng;
use rand::{Rng, RngCore, SeedableRng};
use rand_chacha::ChaCha8Rng;

/// A source of randomness used for opcode shuffling and key-table fill.
pub trait ShroudRng {
    /// Fill `buf` with random bytes.
    fn fill(&mut self, buf: &mut [u8]);

    /// Return a random value in `[0, bound)`. Panics if `bound == 0`.
    fn below(&mut self, bound: usize) -> usize;
}

/// Default, non-deterministic randomness source backed by the OS CSPRNG.
pub struct ThreadShroudRng(ThreadRng);

impl ThreadShroudRng {
    pub fn new() -> Self {
        ThreadShroudRng(rand::thread_rng())
    }
}

impl Default for ThreadShroudRng {
    fn default() -> Self {
        Self::new()
    }
}

impl ShroudRng for ThreadShroudRng {
    fn fill(&mut self, buf: &mut [u8]) {
        self.0.fill_bytes(buf);
    }

    fn below(&mut self, bound: usize) -> usize {
        self.0.gen_range(0..bound)
    }
}

/// Deterministic randomness source for tests; same seed always produces the
/// same permutation and key tables.
pub struct SeededShroudRng(ChaCha8Rng);

impl SeededShroudRng {
    pub fn new(seed: u64) -> Self {
        SeededShroudRng(ChaCha8Rng::seed_from_u64(seed))
    }
}

impl ShroudRng for SeededShroudRng {
    fn fill(&mut self, buf: &mut [u8]) {
        self.0.fill_bytes(buf);
    }

    fn below(&mut self, bound: usize) -> usize {
        self.0.gen_range(0..bound)
    }
}

/// Construct the default production randomness source.
pub fn default_rng() -> Box<dyn ShroudRng> {
    Box::new(ThreadShroudRng::new())
}

/// Construct a deterministic randomness source for tests.
pub fn seeded_rng(seed: u64) -> Box<dyn ShroudRng> {
    Box::new(SeededShroudRng::new(seed))
}
