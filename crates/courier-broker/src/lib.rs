// SPDX-License-Identifier: Apache-2.0 OR MIT
// Copyright (c) 2025-2026 naskel.com

//! Courier broker.
//!
//! Registers with the discovery service, connects to every publisher once the
//! topology is ready, and re-publishes each received sample unchanged on its
//! own data endpoint for subscribers to consume.
//!
//! ```text
//! Initialize -> Configure -> Register -> MatchPubs -> RelayMessages -> Completed
//! ```

pub mod broker;
pub mod config;

pub use broker::{Broker, BrokerError, BrokerState, RelayStats};
pub use config::BrokerConfig;
