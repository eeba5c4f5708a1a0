// Copyright (c) 2023 Mike Tsao. All rights reserved.

//! Provides a random-number generator for staggering background work.

use std::time::{SystemTime, UNIX_EPOCH};

/// A pseudorandom number generator (PRNG) for applications that don't require
/// cryptographically secure random numbers. Pass the same number to
/// [Rng::new_with_seed()] to get the same stream back again.
#[derive(Debug)]
pub struct Rng(oorandom::Rand64);
impl Default for Rng {
    fn default() -> Self {
        // A clock before the epoch is a broken clock, but it shouldn't stop
        // us from picking delays.
        let seed = SystemTime::now()
            .duration_since(UNIX_EPOCH)
            .map(|d| d.as_nanos())
            .unwrap_or(0x5EED);
        Self::new_with_seed(seed)
    }
}
impl Rng {
    /// Creates a generator whose stream is determined by `seed`.
    pub fn new_with_seed(seed: u128) -> Self {
        Self(oorandom::Rand64::new(seed))
    }

    /// A uniformly distributed value in `range`.
    pub fn rand_range(&mut self, range: std::ops::Range<u64>) -> u64 {
        self.0.rand_range(range)
    }

    /// A uniformly distributed whole number of seconds in `0..=max_secs`.
    pub fn delay_secs(&mut self, max_secs: u64) -> u64 {
        self.rand_range(0..max_secs.saturating_add(1))
    }
}
