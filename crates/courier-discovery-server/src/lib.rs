// SPDX-License-Identifier: Apache-2.0 OR MIT
// Copyright (c) 2025-2026 naskel.com

//! Courier Discovery Server
//!
//! Central registry for a Courier publish/subscribe topology:
//! - Publishers, subscribers and the broker register here
//! - Applications poll readiness until the configured publisher and
//!   subscriber counts are met and a broker is known
//! - Subscribers look up their data sources (the broker, or matching
//!   publishers in direct mode); the broker looks up every publisher
//!
//! Requests are served strictly one at a time by the task that owns the
//! registry, so registry state never needs a lock.

pub mod config;
pub mod server;

pub use config::ServerConfig;
pub use server::{DiscoveryServer, DiscoveryService, ServerError, ServerHandle, ServerState};
