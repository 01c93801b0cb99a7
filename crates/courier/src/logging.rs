// SPDX-License-Identifier: Apache-2.0 OR MIT
// Copyright (c) 2025-2026 naskel.com

//! Tracing subscriber setup for the Courier binaries.

use tracing_subscriber::EnvFilter;

/// Install the global fmt subscriber.
///
/// `log_level` accepts anything `EnvFilter` understands (`info`,
/// `courier=debug,warn`, ...); an unparsable filter falls back to `info`.
pub fn init(log_level: &str) -> Result<(), Box<dyn std::error::Error + Send + Sync>> {
    let filter = EnvFilter::try_new(log_level).unwrap_or_else(|_| EnvFilter::new("info"));
    tracing_subscriber::fmt()
        .with_env_filter(filter)
        .with_target(true)
        .with_thread_ids(true)
        .try_init()
}
