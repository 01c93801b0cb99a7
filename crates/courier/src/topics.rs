// SPDX-License-Identifier: Apache-2.0 OR MIT
// Copyright (c) 2025-2026 naskel.com

//! Topic interest selection.

/// Topics known to the demo applications.
pub const TOPIC_CATALOGUE: [&str; 9] = [
    "weather",
    "humidity",
    "airquality",
    "light",
    "pressure",
    "temperature",
    "sound",
    "altitude",
    "location",
];

/// Picks a set of distinct topics from [`TOPIC_CATALOGUE`].
///
/// Selection is deterministic for a given seed, so two runs with the same
/// application name choose the same interest set.
#[derive(Debug, Clone, Copy, Default)]
pub struct TopicSelector {
    seed: u64,
}

impl TopicSelector {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn with_seed(seed: u64) -> Self {
        Self { seed }
    }

    /// Seed the selection from a name (FNV-1a).
    pub fn seeded_by(name: &str) -> Self {
        let mut hash: u64 = 0xcbf2_9ce4_8422_2325;
        for byte in name.bytes() {
            hash ^= u64::from(byte);
            hash = hash.wrapping_mul(0x0000_0100_0000_01b3);
        }
        Self::with_seed(hash)
    }

    /// Return `count` distinct topics (capped at the catalogue size).
    pub fn interest(&self, count: usize) -> Vec<String> {
        let len = TOPIC_CATALOGUE.len();
        let start = (self.seed % len as u64) as usize;
        (0..count.min(len))
            .map(|i| TOPIC_CATALOGUE[(start + i) % len].to_string())
            .collect()
    }
}
