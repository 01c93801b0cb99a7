// SPDX-License-Identifier: Apache-2.0 OR MIT
// Copyright (c) 2025-2026 naskel.com

//! Discovery Server core implementation.
//!
//! Connection tasks decode request frames and forward them to the single
//! service task that owns the registry; responses come back on a one-shot
//! channel and are written to the requesting connection.

use crate::config::ServerConfig;
use courier::{Connection, ConnectionError, DiscoveryRequest, DiscoveryResponse, StopHandle};
use std::net::SocketAddr;
use std::sync::Arc;
use thiserror::Error;
use tokio::net::{TcpListener, TcpStream};
use tokio::sync::{mpsc, oneshot};
use tracing::{debug, error, info, warn};

pub mod registry;
pub mod service;

pub use registry::{
    BrokerRecord, PublisherRecord, ReadinessThreshold, Registration, RegistrationError, Registry,
    SubscriberRecord,
};
pub use service::{DiscoveryService, ServiceRequest, ServiceStats, ServiceStatsSnapshot};

/// Lifecycle of the discovery server.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ServerState {
    Initialize,
    /// Registry allocated and listener bound.
    Configure,
    Running,
}

/// Discovery Server - single authoritative registry for a Courier topology.
pub struct DiscoveryServer {
    config: Arc<ServerConfig>,
    listener: TcpListener,
    local_addr: SocketAddr,
    service: DiscoveryService,
    requests_rx: mpsc::Receiver<ServiceRequest>,
    handle: ServerHandle,
    state: ServerState,
}

/// Cloneable handle to a discovery server.
#[derive(Clone)]
pub struct ServerHandle {
    requests: mpsc::Sender<ServiceRequest>,
    stats: Arc<ServiceStats>,
    shutdown: StopHandle,
    local_addr: SocketAddr,
}

impl ServerHandle {
    /// Submit a request in-process, exactly as a connection would.
    pub async fn request(
        &self,
        request: DiscoveryRequest,
    ) -> Result<DiscoveryResponse, ServerError> {
        forward(&self.requests, request).await
    }

    /// Address the server is listening on.
    pub fn local_addr(&self) -> SocketAddr {
        self.local_addr
    }

    pub fn stats(&self) -> ServiceStatsSnapshot {
        self.stats.snapshot()
    }

    /// Signal the server to shutdown.
    pub fn shutdown(&self) {
        self.shutdown.stop();
    }
}

impl DiscoveryServer {
    /// Validate `config`, allocate the registry and bind the listener.
    pub async fn bind(config: ServerConfig) -> Result<Self, ServerError> {
        config
            .validate()
            .map_err(|e| ServerError::Config(e.to_string()))?;

        let stats = Arc::new(ServiceStats::default());
        let service = DiscoveryService::with_stats(&config, stats.clone());

        let addr = SocketAddr::new(config.bind_address, config.port);
        let listener = TcpListener::bind(addr)
            .await
            .map_err(|e| ServerError::Bind(e.to_string()))?;
        let local_addr = listener.local_addr()?;

        let (requests_tx, requests_rx) = mpsc::channel(config.request_queue_depth);
        let handle = ServerHandle {
            requests: requests_tx,
            stats,
            shutdown: StopHandle::new(),
            local_addr,
        };

        Ok(Self {
            config: Arc::new(config),
            listener,
            local_addr,
            service,
            requests_rx,
            handle,
            state: ServerState::Configure,
        })
    }

    pub fn local_addr(&self) -> SocketAddr {
        self.local_addr
    }

    pub fn handle(&self) -> ServerHandle {
        self.handle.clone()
    }

    pub fn state(&self) -> ServerState {
        self.state
    }

    /// Run until [`ServerHandle::shutdown`] is called.
    ///
    /// Returns the service so the final registry can be inspected.
    pub async fn run(mut self) -> Result<DiscoveryService, ServerError> {
        self.state = ServerState::Running;
        let shutdown = self.handle.shutdown.clone();

        let service_task = tokio::spawn(self.service.run(self.requests_rx, shutdown.clone()));
        info!("Discovery server listening on {}", self.local_addr);

        loop {
            tokio::select! {
                result = self.listener.accept() => {
                    match result {
                        Ok((stream, peer_addr)) => {
                            info!("New connection from {}", peer_addr);

                            let requests = self.handle.requests.clone();
                            let config = self.config.clone();
                            let shutdown = shutdown.clone();

                            tokio::spawn(async move {
                                if let Err(e) = Self::handle_connection(
                                    stream,
                                    peer_addr,
                                    requests,
                                    config,
                                    shutdown,
                                ).await {
                                    warn!("Connection error from {}: {}", peer_addr, e);
                                }
                            });
                        }
                        Err(e) => {
                            error!("Accept error: {}", e);
                        }
                    }
                }
                _ = shutdown.stopped() => {
                    info!("Shutdown signal received");
                    break;
                }
            }
        }

        let service = service_task
            .await
            .map_err(|e| ServerError::ServiceUnavailable(e.to_string()))?;
        let stats = self.handle.stats();
        info!(
            requests = stats.requests,
            registrations = stats.registrations,
            lookups = stats.lookups,
            failures = stats.failures,
            "Discovery server stopped"
        );
        Ok(service)
    }

    /// Handle a client connection: one response per request, in order.
    async fn handle_connection(
        stream: TcpStream,
        peer_addr: SocketAddr,
        requests: mpsc::Sender<ServiceRequest>,
        config: Arc<ServerConfig>,
        shutdown: StopHandle,
    ) -> Result<(), ServerError> {
        stream.set_nodelay(true)?;
        let mut conn = Connection::new(stream, config.max_message_size);

        loop {
            tokio::select! {
                result = conn.read_frame::<DiscoveryRequest>() => {
                    match result {
                        Ok(Some(request)) => {
                            debug!("{} request from {}", request.kind(), peer_addr);
                            let response = forward(&requests, request).await?;
                            conn.write_frame(&response).await?;
                        }
                        Ok(None) => {
                            info!("Connection closed: {}", peer_addr);
                            break;
                        }
                        Err(e) if e.is_recoverable() => {
                            warn!("Undecodable request from {}: {}", peer_addr, e);
                            conn.write_frame(&DiscoveryResponse::unknown()).await?;
                        }
                        Err(e) => {
                            warn!("Read error from {}: {}", peer_addr, e);
                            break;
                        }
                    }
                }
                _ = shutdown.stopped() => {
                    debug!("Connection handler shutting down: {}", peer_addr);
                    break;
                }
            }
        }

        Ok(())
    }
}

/// Hand a request to the service task and wait for its answer.
async fn forward(
    requests: &mpsc::Sender<ServiceRequest>,
    request: DiscoveryRequest,
) -> Result<DiscoveryResponse, ServerError> {
    let (reply, response) = oneshot::channel();
    requests
        .send(ServiceRequest { request, reply })
        .await
        .map_err(|_| ServerError::ServiceUnavailable("request queue closed".into()))?;
    response
        .await
        .map_err(|_| ServerError::ServiceUnavailable("no response from service".into()))
}

/// Server error types.
#[derive(Debug, Error)]
pub enum ServerError {
    #[error("Configuration error: {0}")]
    Config(String),

    #[error("Bind error: {0}")]
    Bind(String),

    #[error("I/O error: {0}")]
    Io(#[from] std::io::Error),

    #[error("Connection error: {0}")]
    Connection(#[from] ConnectionError),

    #[error("Discovery service unavailable: {0}")]
    ServiceUnavailable(String),
}

#[cfg(test)]
mod tests {
    use super::*;
    use courier::{DiscoveryClient, MessageKind, Status};
    use std::time::Duration;

    fn loopback_config() -> ServerConfig {
        ServerConfig {
            bind_address: "127.0.0.1".parse().unwrap(),
            port: 0,
            ..Default::default()
        }
    }

    #[tokio::test]
    async fn test_bind_reports_state_and_address() {
        let server = DiscoveryServer::bind(loopback_config()).await.unwrap();
        assert_eq!(server.state(), ServerState::Configure);
        assert_ne!(server.local_addr().port(), 0);
        assert_eq!(server.handle().local_addr(), server.local_addr());
    }

    #[tokio::test]
    async fn test_bind_rejects_invalid_config() {
        let config = ServerConfig {
            max_registrations: 0,
            ..loopback_config()
        };
        assert!(matches!(
            DiscoveryServer::bind(config).await,
            Err(ServerError::Config(_))
        ));
    }

    #[tokio::test]
    async fn test_in_process_requests_and_shutdown() {
        let server = DiscoveryServer::bind(loopback_config()).await.unwrap();
        let handle = server.handle();
        let task = tokio::spawn(server.run());

        let resp = handle.request(DiscoveryRequest::LookupBroker).await.unwrap();
        assert_eq!(resp.kind(), MessageKind::LookupBroker);
        assert_eq!(resp.status(), Status::Failure);

        handle.shutdown();
        let service = tokio::time::timeout(Duration::from_secs(5), task)
            .await
            .unwrap()
            .unwrap()
            .unwrap();
        assert_eq!(service.registry().publisher_count(), 0);
        assert_eq!(handle.stats().lookups, 1);
    }

    #[tokio::test]
    async fn test_tcp_client_roundtrip() {
        let server = DiscoveryServer::bind(loopback_config()).await.unwrap();
        let handle = server.handle();
        tokio::spawn(server.run());

        let mut client = DiscoveryClient::connect(&handle.local_addr().to_string())
            .await
            .unwrap();
        assert!(!client.is_ready().await.unwrap());

        handle.shutdown();
    }
}
