//! Randomness seam for wheel/reel draws and shoe shuffling.
//!
//! Production code uses the thread-local generator; tests inject a
//! scripted source to force specific outcomes. Statistical fairness is
//! all that's required here, not cryptographic strength.

use rand::Rng;
use std::collections::VecDeque;
use std::sync::Mutex;

/// Source of uniform draws.
pub trait RandomSource: Send + Sync {
    /// Uniform draw in `[0, bound)`. `bound` must be non-zero.
    fn draw(&self, bound: usize) -> usize;
}

/// Default source backed by `rand`'s thread-local generator.
#[derive(Clone, Copy, Debug, Default)]
pub struct ThreadRandom;

impl RandomSource for ThreadRandom {
    fn draw(&self, bound: usize) -> usize {
        rand::rng().random_range(0..bound)
    }
}

/// Scripted source for deterministic tests.
///
/// Returns the queued values in order (each taken modulo the requested
/// bound), then falls back to zero when exhausted.
#[derive(Debug, Default)]
pub struct SequenceSource {
    values: Mutex<VecDeque<usize>>,
}

impl SequenceSource {
    #[must_use]
    pub fn new(values: impl IntoIterator<Item = usize>) -> Self {
        Self {
            values: Mutex::new(values.into_iter().collect()),
        }
    }

    /// Queue more draws onto the end of the script.
    pub fn extend(&self, values: impl IntoIterator<Item = usize>) {
        let mut queue = self.values.lock().unwrap_or_else(|e| e.into_inner());
        queue.extend(values);
    }
}

impl RandomSource for SequenceSource {
    fn draw(&self, bound: usize) -> usize {
        let mut queue = self.values.lock().unwrap_or_else(|e| e.into_inner());
        queue.pop_front().map_or(0, |v| v % bound)
    }
}
