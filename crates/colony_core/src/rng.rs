//! Seeded pseudo-random source for AI decisions.
//!
//! The AI never touches system randomness. Every "random" choice (direction
//! shuffles, gift selection) draws from an [`AiRng`] seeded by the caller so
//! that a game replays identically.

use serde::{Deserialize, Serialize};

use crate::map::Direction;

/// Simple deterministic linear congruential generator.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct AiRng {
    state: u64,
}

impl AiRng {
    /// Create a generator from a seed.
    #[must_use]
    pub fn new(seed: u64) -> Self {
        Self {
            state: seed.wrapping_add(0x9E37_79B9_7F4A_7C15),
        }
    }

    /// Next raw 64-bit value.
    pub fn next_u64(&mut self) -> u64 {
        self.state = self
            .state
            .wrapping_mul(6_364_136_223_846_793_005)
            .wrapping_add(1_442_695_040_888_963_407);
        // The low bits of an LCG are weak; use the high half.
        self.state >> 33
    }

    /// Uniform value in `0..bound`. Returns 0 when `bound` is 0.
    pub fn next_below(&mut self, bound: u32) -> u32 {
        if bound == 0 {
            return 0;
        }
        (self.next_u64() % u64::from(bound)) as u32
    }

    /// Uniform value in `min..max` (exclusive). Returns `min` for an empty range.
    pub fn next_range(&mut self, min: i32, max: i32) -> i32 {
        if max <= min {
            return min;
        }
        let span = (i64::from(max) - i64::from(min)) as u64;
        min + (self.next_u64() % span) as i32
    }

    /// Fisher-Yates shuffle in place.
    pub fn shuffle<T>(&mut self, items: &mut [T]) {
        for i in (1..items.len()).rev() {
            let j = self.next_below((i + 1) as u32) as usize;
            items.swap(i, j);
        }
    }

    /// All eight directions in a freshly shuffled order.
    pub fn random_directions(&mut self) -> [Direction; 8] {
        let mut directions = Direction::ALL;
        self.shuffle(&mut directions);
        directions
    }
}

impl Default for AiRng {
    fn default() -> Self {
        Self::new(0)
    }
}
