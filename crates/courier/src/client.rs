// SPDX-License-Identifier: Apache-2.0 OR MIT
// Copyright (c) 2025-2026 naskel.com

//! Discovery service client.
//!
//! One request is in flight at a time; each call writes a request frame and
//! waits for the matching response on the same connection.

use crate::connection::{Connection, ConnectionError, DEFAULT_MAX_FRAME_SIZE};
use crate::protocol::{
    BrokerInfo, DiscoveryRequest, DiscoveryResponse, MessageKind, RegistrantInfo, Role, Status,
};
use crate::stop::StopHandle;
use std::time::Duration;
use thiserror::Error;
use tokio::io::{AsyncRead, AsyncWrite};
use tokio::net::TcpStream;
use tracing::{debug, info};

/// Delay between two readiness checks while the system is not ready.
pub const READY_POLL_INTERVAL: Duration = Duration::from_secs(5);

/// Client errors.
#[derive(Debug, Error)]
pub enum ClientError {
    #[error("Connection error: {0}")]
    Connection(#[from] ConnectionError),

    #[error("Discovery service closed the connection")]
    Closed,

    #[error("Registration rejected: {reason}")]
    Rejected { reason: String },

    #[error("{0} lookup failed")]
    NotFound(MessageKind),

    #[error("Unexpected response: expected {expected}, got {got}")]
    UnexpectedResponse {
        expected: MessageKind,
        got: MessageKind,
    },
}

/// Client side of the control protocol.
pub struct DiscoveryClient<S = TcpStream> {
    conn: Connection<S>,
    poll_interval: Duration,
}

impl DiscoveryClient<TcpStream> {
    /// Connect to the discovery service at `endpoint` (`host:port`).
    pub async fn connect(endpoint: &str) -> Result<Self, ClientError> {
        let conn = Connection::connect(endpoint, DEFAULT_MAX_FRAME_SIZE).await?;
        debug!("Connected to discovery service at {}", endpoint);
        Ok(Self::from_connection(conn))
    }
}

impl<S> DiscoveryClient<S>
where
    S: AsyncRead + AsyncWrite + Unpin,
{
    pub fn from_connection(conn: Connection<S>) -> Self {
        Self {
            conn,
            poll_interval: READY_POLL_INTERVAL,
        }
    }

    /// Override the readiness backoff delay.
    pub fn with_poll_interval(mut self, poll_interval: Duration) -> Self {
        self.poll_interval = poll_interval;
        self
    }

    pub fn poll_interval(&self) -> Duration {
        self.poll_interval
    }

    /// Send one request and wait for its response.
    pub async fn request(
        &mut self,
        request: &DiscoveryRequest,
    ) -> Result<DiscoveryResponse, ClientError> {
        self.conn.write_frame(request).await?;
        self.conn
            .read_frame::<DiscoveryResponse>()
            .await?
            .ok_or(ClientError::Closed)
    }

    async fn expect(
        &mut self,
        request: &DiscoveryRequest,
    ) -> Result<DiscoveryResponse, ClientError> {
        let expected = request.kind();
        let response = self.request(request).await?;
        if response.kind() != expected {
            return Err(ClientError::UnexpectedResponse {
                expected,
                got: response.kind(),
            });
        }
        Ok(response)
    }

    /// Register under `role`. A FAILURE status is returned as [`ClientError::Rejected`].
    pub async fn register(
        &mut self,
        role: Role,
        info: RegistrantInfo,
        topics: &[String],
    ) -> Result<(), ClientError> {
        let request = DiscoveryRequest::register(role, info, topics);
        match self.expect(&request).await? {
            DiscoveryResponse::Register {
                status: Status::Success,
                ..
            } => Ok(()),
            DiscoveryResponse::Register { reason, .. } => Err(ClientError::Rejected { reason }),
            other => Err(ClientError::UnexpectedResponse {
                expected: MessageKind::Register,
                got: other.kind(),
            }),
        }
    }

    pub async fn is_ready(&mut self) -> Result<bool, ClientError> {
        let response = self.expect(&DiscoveryRequest::IsReady).await?;
        Ok(response.status().is_success())
    }

    /// Poll readiness, waiting the backoff delay after every "not ready".
    ///
    /// Returns `Ok(false)` if `stop` fires before the system becomes ready.
    pub async fn wait_until_ready(&mut self, stop: &StopHandle) -> Result<bool, ClientError> {
        loop {
            if stop.is_stopped() {
                return Ok(false);
            }
            if self.is_ready().await? {
                info!("Discovery service reports ready");
                return Ok(true);
            }

            debug!(
                "Discovery service not ready, retrying in {:?}",
                self.poll_interval
            );
            tokio::select! {
                _ = tokio::time::sleep(self.poll_interval) => {}
                _ = stop.stopped() => return Ok(false),
            }
        }
    }

    /// Find data sources for `topics`.
    pub async fn lookup_pub_by_topic(
        &mut self,
        topics: &[String],
    ) -> Result<Vec<RegistrantInfo>, ClientError> {
        let request = DiscoveryRequest::LookupPubByTopic {
            topics: topics.to_vec(),
        };
        match self.expect(&request).await? {
            DiscoveryResponse::LookupPubByTopic {
                status: Status::Success,
                matched,
            } => Ok(matched),
            _ => Err(ClientError::NotFound(MessageKind::LookupPubByTopic)),
        }
    }

    /// List every registered publisher.
    pub async fn lookup_all_publishers(&mut self) -> Result<Vec<RegistrantInfo>, ClientError> {
        match self.expect(&DiscoveryRequest::LookupAllPubs).await? {
            DiscoveryResponse::LookupAllPubs {
                status: Status::Success,
                matched,
            } => Ok(matched),
            _ => Err(ClientError::NotFound(MessageKind::LookupAllPubs)),
        }
    }

    pub async fn lookup_broker(&mut self) -> Result<BrokerInfo, ClientError> {
        match self.expect(&DiscoveryRequest::LookupBroker).await? {
            DiscoveryResponse::LookupBroker {
                status: Status::Success,
                broker: Some(broker),
            } => Ok(broker),
            _ => Err(ClientError::NotFound(MessageKind::LookupBroker)),
        }
    }
}
