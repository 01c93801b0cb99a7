// SPDX-License-Identifier: Apache-2.0 OR MIT
// Copyright (c) 2025-2026 naskel.com

//! Courier publisher application.
//!
//! Registers its topic set, waits for the topology to be ready, then emits
//! one sample per topic per round at a fixed frequency.
//!
//! ```text
//! Initialize -> Register -> IsReady -> Disseminate -> Completed
//! ```

pub mod config;
pub mod publisher;

pub use config::PublisherConfig;
pub use publisher::{PublishStats, Publisher, PublisherError, PublisherState};
