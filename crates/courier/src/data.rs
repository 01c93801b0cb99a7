// SPDX-License-Identifier: Apache-2.0 OR MIT
// Copyright (c) 2025-2026 naskel.com

//! Data plane.
//!
//! A [`DataPublisher`] binds a TCP endpoint and fans every published sample
//! out to all connected readers. A [`DataFeed`] connects to any number of such
//! endpoints and merges their samples into one stream.
//!
//! Readers that connect late miss earlier samples; there is no replay.

use crate::connection::{Connection, ConnectionError};
use crate::stop::StopHandle;
use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use std::net::SocketAddr;
use std::sync::Arc;
use std::time::Duration;
use thiserror::Error;
use tokio::net::TcpListener;
use tokio::sync::{broadcast, mpsc};
use tracing::{debug, info, warn};

/// Samples buffered per reader before it starts lagging.
const FANOUT_CAPACITY: usize = 1024;

/// Samples buffered in a feed across all sources.
const FEED_CAPACITY: usize = 1024;

/// Upper bound for a single sample frame (1 MB).
pub const MAX_SAMPLE_SIZE: usize = 1024 * 1024;

/// One published data item.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct DataSample {
    /// Id of the publisher that produced the sample.
    pub publisher: String,
    pub topic: String,
    /// Opaque to the coordination layer.
    pub payload: String,
    pub timestamp: DateTime<Utc>,
}

impl DataSample {
    /// Create a sample stamped with the current time.
    pub fn new(
        publisher: impl Into<String>,
        topic: impl Into<String>,
        payload: impl Into<String>,
    ) -> Self {
        Self {
            publisher: publisher.into(),
            topic: topic.into(),
            payload: payload.into(),
            timestamp: Utc::now(),
        }
    }

    /// Time elapsed since the sample was stamped.
    pub fn age(&self) -> chrono::Duration {
        Utc::now() - self.timestamp
    }
}

/// Data plane errors.
#[derive(Debug, Error)]
pub enum DataError {
    #[error("Bind error: {0}")]
    Bind(std::io::Error),

    #[error("Connect error to {endpoint}: {source}")]
    Connect {
        endpoint: String,
        source: ConnectionError,
    },

    #[error("Feed is sealed, no new sources accepted")]
    Sealed,
}

/// Fan-out endpoint for outgoing samples.
pub struct DataPublisher {
    local_addr: SocketAddr,
    tx: broadcast::Sender<Arc<DataSample>>,
    stop: StopHandle,
}

impl DataPublisher {
    /// Bind to `addr` (`host:port`, port 0 picks a free port) and start accepting readers.
    pub async fn bind(addr: &str) -> Result<Self, DataError> {
        let listener = TcpListener::bind(addr).await.map_err(DataError::Bind)?;
        let local_addr = listener.local_addr().map_err(DataError::Bind)?;
        let (tx, _) = broadcast::channel(FANOUT_CAPACITY);
        let stop = StopHandle::new();

        tokio::spawn(accept_readers(listener, tx.clone(), stop.clone()));
        info!("Data endpoint listening on {}", local_addr);

        Ok(Self {
            local_addr,
            tx,
            stop,
        })
    }

    pub fn local_addr(&self) -> SocketAddr {
        self.local_addr
    }

    /// Number of readers currently connected.
    pub fn reader_count(&self) -> usize {
        self.tx.receiver_count()
    }

    /// Send a sample to every connected reader; returns how many will receive it.
    pub fn publish(&self, sample: DataSample) -> usize {
        self.tx.send(Arc::new(sample)).unwrap_or(0)
    }

    /// Wait until at least `count` readers are connected.
    ///
    /// Returns `false` if `stop` fires first.
    pub async fn wait_for_readers(&self, count: usize, stop: &StopHandle) -> bool {
        while self.reader_count() < count {
            tokio::select! {
                _ = tokio::time::sleep(Duration::from_millis(50)) => {}
                _ = stop.stopped() => return false,
            }
        }
        true
    }
}

impl Drop for DataPublisher {
    fn drop(&mut self) {
        self.stop.stop();
    }
}

async fn accept_readers(
    listener: TcpListener,
    tx: broadcast::Sender<Arc<DataSample>>,
    stop: StopHandle,
) {
    loop {
        tokio::select! {
            result = listener.accept() => match result {
                Ok((stream, peer_addr)) => {
                    info!("Data reader connected from {}", peer_addr);
                    let _ = stream.set_nodelay(true);
                    let rx = tx.subscribe();
                    let conn = Connection::new(stream, MAX_SAMPLE_SIZE);
                    tokio::spawn(serve_reader(conn, rx, peer_addr, stop.clone()));
                }
                Err(e) => warn!("Data accept error: {}", e),
            },
            _ = stop.stopped() => {
                debug!("Data endpoint shutting down");
                break;
            }
        }
    }
}

async fn serve_reader(
    mut conn: Connection,
    mut rx: broadcast::Receiver<Arc<DataSample>>,
    peer_addr: SocketAddr,
    stop: StopHandle,
) {
    loop {
        tokio::select! {
            result = rx.recv() => match result {
                Ok(sample) => {
                    if let Err(e) = conn.write_frame(sample.as_ref()).await {
                        info!("Data reader {} disconnected: {}", peer_addr, e);
                        break;
                    }
                }
                Err(broadcast::error::RecvError::Lagged(skipped)) => {
                    warn!("Data reader {} lagging, skipped {} samples", peer_addr, skipped);
                }
                Err(broadcast::error::RecvError::Closed) => break,
            },
            _ = stop.stopped() => break,
        }
    }
}

/// Merged stream of samples from several data endpoints.
///
/// Once [`DataFeed::seal`] is called the feed ends when its last source closes.
pub struct DataFeed {
    /// Dropped by `seal`; until then the feed never ends on its own.
    tx: Option<mpsc::Sender<DataSample>>,
    rx: mpsc::Receiver<DataSample>,
    sources: Vec<String>,
    stop: StopHandle,
}

impl DataFeed {
    pub fn new() -> Self {
        let (tx, rx) = mpsc::channel(FEED_CAPACITY);
        Self {
            tx: Some(tx),
            rx,
            sources: Vec::new(),
            stop: StopHandle::new(),
        }
    }

    /// Connect to a data endpoint and start forwarding its samples into the feed.
    pub async fn connect(&mut self, endpoint: &str) -> Result<(), DataError> {
        let tx = self.tx.clone().ok_or(DataError::Sealed)?;
        let conn = Connection::connect(endpoint, MAX_SAMPLE_SIZE)
            .await
            .map_err(|source| DataError::Connect {
                endpoint: endpoint.to_string(),
                source,
            })?;

        info!("Connected to data source {}", endpoint);
        tokio::spawn(read_source(conn, endpoint.to_string(), tx, self.stop.clone()));
        self.sources.push(endpoint.to_string());
        Ok(())
    }

    /// Endpoints this feed is connected to.
    pub fn sources(&self) -> &[String] {
        &self.sources
    }

    /// Stop accepting sources.
    pub fn seal(&mut self) {
        self.tx = None;
    }

    /// Next sample from any source.
    ///
    /// Returns `None` once the feed is sealed and every source has closed.
    /// Before that it stays pending while no source produces data; race it
    /// against a stop signal.
    pub async fn recv(&mut self) -> Option<DataSample> {
        self.rx.recv().await
    }
}

impl Default for DataFeed {
    fn default() -> Self {
        Self::new()
    }
}

impl Drop for DataFeed {
    fn drop(&mut self) {
        self.stop.stop();
    }
}

async fn read_source(
    mut conn: Connection,
    endpoint: String,
    tx: mpsc::Sender<DataSample>,
    stop: StopHandle,
) {
    loop {
        tokio::select! {
            result = conn.read_frame::<DataSample>() => match result {
                Ok(Some(sample)) => {
                    if tx.send(sample).await.is_err() {
                        break;
                    }
                }
                Ok(None) => {
                    info!("Data source {} closed", endpoint);
                    break;
                }
                Err(e) if e.is_recoverable() => {
                    warn!("Dropping undecodable sample from {}: {}", endpoint, e);
                }
                Err(e) => {
                    warn!("Data source {} failed: {}", endpoint, e);
                    break;
                }
            },
            _ = stop.stopped() => break,
        }
    }
}
