// SPDX-License-Identifier: Apache-2.0 OR MIT
// Copyright (c) 2025-2026 naskel.com

//! Courier subscriber application.
//!
//! Registers its topic interest, waits for the topology to be ready, asks the
//! discovery service where to read from (the broker, or matching publishers
//! in direct mode) and consumes samples for its topics.
//!
//! ```text
//! Initialize -> Register -> IsReady -> LookupBroker -> Listen -> Completed
//! ```

pub mod config;
pub mod subscriber;

pub use config::SubscriberConfig;
pub use subscriber::{ReceiveStats, Subscriber, SubscriberError, SubscriberState};
