// SPDX-License-Identifier: Apache-2.0 OR MIT
// Copyright (c) 2025-2026 naskel.com

//! Publisher state machine.

use crate::config::PublisherConfig;
use courier::{
    BrokerInfo, ClientError, ConfigError, DataError, DataPublisher, DataSample, DiscoveryClient,
    DisseminationMode, RegistrantInfo, Role, StopHandle,
};
use std::net::SocketAddr;
use thiserror::Error;
use tracing::{debug, info, warn};

/// Publisher lifecycle. Each state names the step performed next.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum PublisherState {
    Initialize,
    Register,
    IsReady,
    Disseminate,
    Completed,
}

/// Dissemination counters.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct PublishStats {
    /// Rounds fully emitted
    pub rounds: u32,

    pub samples_sent: u64,

    /// Sum over samples of the readers each one reached
    pub deliveries: u64,
}

/// Publisher errors.
#[derive(Debug, Error)]
pub enum PublisherError {
    #[error("Invalid state: expected {expected:?}, found {found:?}")]
    InvalidState {
        expected: PublisherState,
        found: PublisherState,
    },

    #[error("Configuration error: {0}")]
    Config(#[from] ConfigError),

    #[error("Data plane error: {0}")]
    Data(#[from] DataError),

    #[error("Discovery error: {0}")]
    Discovery(#[from] ClientError),

    #[error("Registration failed: {0}")]
    Registration(String),
}

/// A data source for a fixed topic set.
pub struct Publisher {
    config: PublisherConfig,
    state: PublisherState,
    topics: Vec<String>,
    client: Option<DiscoveryClient>,
    endpoint: Option<DataPublisher>,
    stats: PublishStats,
    stop: StopHandle,
}

impl Publisher {
    pub fn new(config: PublisherConfig) -> Self {
        Self {
            config,
            state: PublisherState::Initialize,
            topics: Vec::new(),
            client: None,
            endpoint: None,
            stats: PublishStats::default(),
            stop: StopHandle::new(),
        }
    }

    pub fn state(&self) -> PublisherState {
        self.state
    }

    /// Topics offered, resolved by [`Publisher::configure`].
    pub fn topics(&self) -> &[String] {
        &self.topics
    }

    pub fn stop_handle(&self) -> StopHandle {
        self.stop.clone()
    }

    pub fn stats(&self) -> PublishStats {
        self.stats
    }

    /// Address of the data endpoint, once configured.
    pub fn data_addr(&self) -> Option<SocketAddr> {
        self.endpoint.as_ref().map(DataPublisher::local_addr)
    }

    fn expect_state(&self, expected: PublisherState) -> Result<(), PublisherError> {
        if self.state != expected {
            return Err(PublisherError::InvalidState {
                expected,
                found: self.state,
            });
        }
        Ok(())
    }

    fn client(&mut self) -> Result<&mut DiscoveryClient, PublisherError> {
        let found = self.state;
        self.client.as_mut().ok_or(PublisherError::InvalidState {
            expected: PublisherState::Register,
            found,
        })
    }

    /// Resolve the topic set, bind the data endpoint and connect to discovery.
    pub async fn configure(&mut self) -> Result<(), PublisherError> {
        self.expect_state(PublisherState::Initialize)?;
        self.config.validate()?;

        self.topics = self.config.topic_set();
        let endpoint = DataPublisher::bind(&self.config.data_bind_addr()).await?;
        let client = DiscoveryClient::connect(&self.config.discovery)
            .await?
            .with_poll_interval(self.config.poll_interval());

        info!(
            "Publisher '{}' offering {:?} on {}",
            self.config.name,
            self.topics,
            endpoint.local_addr()
        );
        self.endpoint = Some(endpoint);
        self.client = Some(client);
        self.state = PublisherState::Register;
        Ok(())
    }

    /// Register the full topic set. A rejection is fatal.
    pub async fn register(&mut self) -> Result<(), PublisherError> {
        self.expect_state(PublisherState::Register)?;
        let port = self.data_addr().map_or(self.config.port, |a| a.port());
        let info = RegistrantInfo::new(&self.config.name, &self.config.addr, port);
        let topics = self.topics.clone();

        match self.client()?.register(Role::Publisher, info, &topics).await {
            Ok(()) => {}
            Err(ClientError::Rejected { reason }) => {
                return Err(PublisherError::Registration(reason));
            }
            Err(e) => return Err(e.into()),
        }

        info!("Publisher '{}' registered", self.config.name);
        self.state = PublisherState::IsReady;
        Ok(())
    }

    /// Poll readiness with the configured backoff.
    ///
    /// Returns `false` and completes if stopped before the system is ready.
    pub async fn wait_ready(&mut self) -> Result<bool, PublisherError> {
        self.expect_state(PublisherState::IsReady)?;
        let stop = self.stop.clone();

        if !self.client()?.wait_until_ready(&stop).await? {
            self.state = PublisherState::Completed;
            return Ok(false);
        }
        self.state = PublisherState::Disseminate;
        Ok(true)
    }

    /// Ask discovery for the broker. The answer is only logged.
    pub async fn lookup_broker(&mut self) -> Result<Option<BrokerInfo>, PublisherError> {
        self.expect_state(PublisherState::Disseminate)?;
        match self.client()?.lookup_broker().await {
            Ok(broker) => {
                info!("Broker at {}", broker.endpoint());
                Ok(Some(broker))
            }
            Err(ClientError::NotFound(_)) => {
                warn!("Broker lookup failed");
                Ok(None)
            }
            Err(e) => Err(e.into()),
        }
    }

    /// Emit `iters` rounds of one sample per topic, sleeping one period between rounds.
    pub async fn disseminate(&mut self) -> Result<PublishStats, PublisherError> {
        self.expect_state(PublisherState::Disseminate)?;
        let Some(endpoint) = self.endpoint.as_ref() else {
            return Err(PublisherError::InvalidState {
                expected: PublisherState::Disseminate,
                found: PublisherState::Initialize,
            });
        };
        let period = self.config.period()?;

        if self.config.min_subscribers > 0 {
            info!("Waiting for {} data readers", self.config.min_subscribers);
            if !endpoint
                .wait_for_readers(self.config.min_subscribers, &self.stop)
                .await
            {
                self.state = PublisherState::Completed;
                return Ok(self.stats);
            }
        }

        'rounds: for round in 0..self.config.iters {
            if self.stop.is_stopped() {
                break;
            }
            for topic in &self.topics {
                let mut sample = DataSample::new(&self.config.name, topic, "");
                sample.payload = format!("{} data at {}", topic, sample.timestamp.to_rfc3339());
                debug!("Publishing {}", sample.payload);

                self.stats.deliveries += endpoint.publish(sample) as u64;
                self.stats.samples_sent += 1;
            }
            self.stats.rounds += 1;

            if round + 1 < self.config.iters {
                tokio::select! {
                    _ = tokio::time::sleep(period) => {}
                    _ = self.stop.stopped() => break 'rounds,
                }
            }
        }

        self.state = PublisherState::Completed;
        info!(
            rounds = self.stats.rounds,
            samples = self.stats.samples_sent,
            "Publisher '{}' completed",
            self.config.name
        );
        Ok(self.stats)
    }

    /// Drive the publisher through its whole lifecycle.
    pub async fn run(&mut self) -> Result<PublishStats, PublisherError> {
        self.configure().await?;
        self.register().await?;
        if !self.wait_ready().await? {
            return Ok(self.stats);
        }
        if self.config.dissemination == DisseminationMode::Broker {
            self.lookup_broker().await?;
        }
        self.disseminate().await
    }
}
