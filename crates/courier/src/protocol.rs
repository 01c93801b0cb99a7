// SPDX-License-Identifier: Apache-2.0 OR MIT
// Copyright (c) 2025-2026 naskel.com

//! Courier control-plane protocol.
//!
//! Every request sent to the discovery server receives exactly one response.
//! Messages travel as length-prefixed JSON (see [`crate::connection`]):
//!
//! ```text
//! +----------------+-------------------+
//! | Length (4B BE) | JSON payload      |
//! +----------------+-------------------+
//! ```
//!
//! The `type` field selects the message kind. A request whose `type` is not
//! recognised decodes as [`DiscoveryRequest::Unknown`] so the server can still
//! answer it.

use serde::{Deserialize, Serialize};
use std::fmt;
use std::str::FromStr;
use thiserror::Error;

/// Role a participant registers under.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum Role {
    Publisher,
    Subscriber,
    Broker,
}

impl Role {
    pub fn as_str(&self) -> &'static str {
        match self {
            Self::Publisher => "PUBLISHER",
            Self::Subscriber => "SUBSCRIBER",
            Self::Broker => "BROKER",
        }
    }
}

impl fmt::Display for Role {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl FromStr for Role {
    type Err = ProtocolError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s {
            "PUBLISHER" => Ok(Self::Publisher),
            "SUBSCRIBER" => Ok(Self::Subscriber),
            "BROKER" => Ok(Self::Broker),
            other => Err(ProtocolError::InvalidRole(other.to_string())),
        }
    }
}

/// Wire format for a role.
///
/// Kept as the raw string so that a request carrying an unsupported role
/// still decodes and can be rejected by the server with a proper response.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Eq, Hash)]
#[serde(transparent)]
pub struct RoleWire(pub String);

impl From<Role> for RoleWire {
    fn from(role: Role) -> Self {
        Self(role.as_str().to_string())
    }
}

impl TryFrom<RoleWire> for Role {
    type Error = ProtocolError;

    fn try_from(wire: RoleWire) -> Result<Self, Self::Error> {
        wire.0.parse()
    }
}

/// Outcome carried by register and lookup responses.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "SCREAMING_SNAKE_CASE")]
pub enum Status {
    Success,
    Failure,
}

impl Status {
    pub fn is_success(self) -> bool {
        self == Self::Success
    }
}

/// Message kinds of the control protocol.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum MessageKind {
    Register,
    IsReady,
    LookupPubByTopic,
    LookupAllPubs,
    LookupBroker,
    Unknown,
}

impl fmt::Display for MessageKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let name = match self {
            Self::Register => "REGISTER",
            Self::IsReady => "ISREADY",
            Self::LookupPubByTopic => "LOOKUP_PUB_BY_TOPIC",
            Self::LookupAllPubs => "LOOKUP_ALL_PUBS",
            Self::LookupBroker => "LOOKUP_BROKER",
            Self::Unknown => "UNKNOWN",
        };
        f.write_str(name)
    }
}

/// Identity and data endpoint of a registrant.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct RegistrantInfo {
    pub id: String,
    pub addr: String,
    pub port: u16,
}

impl RegistrantInfo {
    pub fn new(id: impl Into<String>, addr: impl Into<String>, port: u16) -> Self {
        Self {
            id: id.into(),
            addr: addr.into(),
            port,
        }
    }

    /// `addr:port` form suitable for connecting to the data endpoint.
    pub fn endpoint(&self) -> String {
        format!("{}:{}", self.addr, self.port)
    }
}

/// Data endpoint of the registered broker.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct BrokerInfo {
    pub addr: String,
    pub port: u16,
}

impl BrokerInfo {
    pub fn endpoint(&self) -> String {
        format!("{}:{}", self.addr, self.port)
    }
}

/// Payload of a REGISTER request.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct RegisterRequest {
    pub role: RoleWire,
    pub info: RegistrantInfo,
    #[serde(default)]
    pub topics: Vec<String>,
}

/// Requests accepted by the discovery server.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(tag = "type")]
pub enum DiscoveryRequest {
    /// Register a publisher, subscriber or broker.
    #[serde(rename = "register")]
    Register(RegisterRequest),

    /// Ask whether the readiness threshold has been reached.
    #[serde(rename = "is_ready")]
    IsReady,

    /// Find data sources for a set of topics.
    #[serde(rename = "lookup_pub_by_topic")]
    LookupPubByTopic {
        #[serde(default)]
        topics: Vec<String>,
    },

    /// List every registered publisher.
    #[serde(rename = "lookup_all_pubs")]
    LookupAllPubs,

    /// Locate the registered broker.
    #[serde(rename = "lookup_broker")]
    LookupBroker,

    /// Any request kind this server does not understand.
    #[serde(other)]
    Unknown,
}

impl DiscoveryRequest {
    pub fn kind(&self) -> MessageKind {
        match self {
            Self::Register(_) => MessageKind::Register,
            Self::IsReady => MessageKind::IsReady,
            Self::LookupPubByTopic { .. } => MessageKind::LookupPubByTopic,
            Self::LookupAllPubs => MessageKind::LookupAllPubs,
            Self::LookupBroker => MessageKind::LookupBroker,
            Self::Unknown => MessageKind::Unknown,
        }
    }

    /// Build a REGISTER request.
    pub fn register(role: Role, info: RegistrantInfo, topics: &[String]) -> Self {
        Self::Register(RegisterRequest {
            role: role.into(),
            info,
            topics: topics.to_vec(),
        })
    }
}

/// Responses produced by the discovery server.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(tag = "type")]
pub enum DiscoveryResponse {
    #[serde(rename = "register")]
    Register { status: Status, reason: String },

    #[serde(rename = "is_ready")]
    IsReady { ready: bool },

    #[serde(rename = "lookup_pub_by_topic")]
    LookupPubByTopic {
        status: Status,
        #[serde(default)]
        matched: Vec<RegistrantInfo>,
    },

    #[serde(rename = "lookup_all_pubs")]
    LookupAllPubs {
        status: Status,
        #[serde(default)]
        matched: Vec<RegistrantInfo>,
    },

    #[serde(rename = "lookup_broker")]
    LookupBroker {
        status: Status,
        #[serde(default)]
        broker: Option<BrokerInfo>,
    },

    #[serde(rename = "unknown")]
    Unknown { status: Status },
}

impl DiscoveryResponse {
    pub fn kind(&self) -> MessageKind {
        match self {
            Self::Register { .. } => MessageKind::Register,
            Self::IsReady { .. } => MessageKind::IsReady,
            Self::LookupPubByTopic { .. } => MessageKind::LookupPubByTopic,
            Self::LookupAllPubs { .. } => MessageKind::LookupAllPubs,
            Self::LookupBroker { .. } => MessageKind::LookupBroker,
            Self::Unknown { .. } => MessageKind::Unknown,
        }
    }

    /// Status of the response; an is-ready answer reports `Success` only when ready.
    pub fn status(&self) -> Status {
        match self {
            Self::Register { status, .. }
            | Self::LookupPubByTopic { status, .. }
            | Self::LookupAllPubs { status, .. }
            | Self::LookupBroker { status, .. }
            | Self::Unknown { status } => *status,
            Self::IsReady { ready: true } => Status::Success,
            Self::IsReady { ready: false } => Status::Failure,
        }
    }

    /// Failure response of the given kind.
    pub fn failure(kind: MessageKind, reason: impl Into<String>) -> Self {
        match kind {
            MessageKind::Register => Self::Register {
                status: Status::Failure,
                reason: reason.into(),
            },
            MessageKind::IsReady => Self::IsReady { ready: false },
            MessageKind::LookupPubByTopic => Self::LookupPubByTopic {
                status: Status::Failure,
                matched: Vec::new(),
            },
            MessageKind::LookupAllPubs => Self::LookupAllPubs {
                status: Status::Failure,
                matched: Vec::new(),
            },
            MessageKind::LookupBroker => Self::LookupBroker {
                status: Status::Failure,
                broker: None,
            },
            MessageKind::Unknown => Self::unknown(),
        }
    }

    /// Answer to a request kind the server does not understand.
    pub fn unknown() -> Self {
        Self::Unknown {
            status: Status::Failure,
        }
    }
}

/// Protocol error types.
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum ProtocolError {
    #[error("Invalid role: {0}")]
    InvalidRole(String),

    #[error("Invalid message: {0}")]
    InvalidMessage(String),
}
