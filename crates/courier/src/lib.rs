// SPDX-License-Identifier: Apache-2.0 OR MIT
// Copyright (c) 2025-2026 naskel.com

//! Courier shared runtime.
//!
//! Everything the discovery server, broker, publisher and subscriber have in
//! common:
//!
//! - **Control protocol**: register / is-ready / lookup messages exchanged with
//!   the discovery server ([`protocol`])
//! - **Framing**: length-prefixed JSON over any async byte stream ([`connection`])
//! - **Discovery client**: request helpers and readiness polling ([`client`])
//! - **Data plane**: fan-out sample endpoint and multi-source feed ([`data`])
//! - **Topic selection**: deterministic interest sets ([`topics`])
//!
//! # Example
//!
//! ```rust,ignore
//! use courier::{DiscoveryClient, RegistrantInfo, Role, StopHandle};
//!
//! let mut client = DiscoveryClient::connect("localhost:5555").await?;
//! client
//!     .register(Role::Subscriber, RegistrantInfo::new("sub1", "localhost", 0), &topics)
//!     .await?;
//! client.wait_until_ready(&StopHandle::new()).await?;
//! let sources = client.lookup_pub_by_topic(&topics).await?;
//! ```

pub mod client;
pub mod config;
pub mod connection;
pub mod data;
pub mod logging;
pub mod protocol;
pub mod stop;
#[cfg(any(test, feature = "test-util"))]
pub mod testing;
pub mod topics;

pub use client::{ClientError, DiscoveryClient, READY_POLL_INTERVAL};
pub use config::{ConfigError, DisseminationMode};
pub use connection::{Connection, ConnectionError, DEFAULT_MAX_FRAME_SIZE};
pub use data::{DataError, DataFeed, DataPublisher, DataSample};
pub use protocol::{
    BrokerInfo, DiscoveryRequest, DiscoveryResponse, MessageKind, ProtocolError,
    RegisterRequest, RegistrantInfo, Role, RoleWire, Status,
};
pub use stop::StopHandle;
pub use topics::TopicSelector;
