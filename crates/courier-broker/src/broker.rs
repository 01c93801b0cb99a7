// SPDX-License-Identifier: Apache-2.0 OR MIT
// Copyright (c) 2025-2026 naskel.com

//! Broker state machine.

use crate::config::BrokerConfig;
use courier::{
    ClientError, ConfigError, DataError, DataFeed, DataPublisher, DataSample, DiscoveryClient,
    RegistrantInfo, Role, StopHandle,
};
use std::net::SocketAddr;
use thiserror::Error;
use tracing::{debug, info, warn};

/// Broker lifecycle. Each state names the step the broker performs next.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum BrokerState {
    Initialize,
    /// Binding the relay endpoint and connecting to discovery.
    Configure,
    Register,
    MatchPubs,
    RelayMessages,
    /// Terminal. Reached only through the stop signal.
    Completed,
}

/// Relay counters.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct RelayStats {
    /// Samples handed to at least one subscriber
    pub messages_relayed: u64,

    /// Payload bytes relayed
    pub bytes_relayed: u64,

    /// Samples received while no subscriber was connected
    pub messages_dropped: u64,
}

/// Broker errors.
#[derive(Debug, Error)]
pub enum BrokerError {
    #[error("Invalid state: expected {expected:?}, found {found:?}")]
    InvalidState {
        expected: BrokerState,
        found: BrokerState,
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

/// Relays samples from every publisher to every subscriber.
pub struct Broker {
    config: BrokerConfig,
    state: BrokerState,
    client: Option<DiscoveryClient>,
    relay: Option<DataPublisher>,
    feed: DataFeed,
    stats: RelayStats,
    stop: StopHandle,
}

impl Broker {
    pub fn new(config: BrokerConfig) -> Self {
        Self {
            config,
            state: BrokerState::Initialize,
            client: None,
            relay: None,
            feed: DataFeed::new(),
            stats: RelayStats::default(),
            stop: StopHandle::new(),
        }
    }

    pub fn state(&self) -> BrokerState {
        self.state
    }

    pub fn config(&self) -> &BrokerConfig {
        &self.config
    }

    /// Handle that stops the broker from another task.
    pub fn stop_handle(&self) -> StopHandle {
        self.stop.clone()
    }

    pub fn stats(&self) -> RelayStats {
        self.stats
    }

    /// Address of the relay endpoint, once configured.
    pub fn relay_addr(&self) -> Option<SocketAddr> {
        self.relay.as_ref().map(DataPublisher::local_addr)
    }

    /// Subscribers currently connected to the relay endpoint.
    pub fn subscriber_count(&self) -> usize {
        self.relay.as_ref().map_or(0, DataPublisher::reader_count)
    }

    /// Publisher endpoints the broker is connected to.
    pub fn sources(&self) -> &[String] {
        self.feed.sources()
    }

    fn expect_state(&self, expected: BrokerState) -> Result<(), BrokerError> {
        if self.state != expected {
            return Err(BrokerError::InvalidState {
                expected,
                found: self.state,
            });
        }
        Ok(())
    }

    /// Bind the relay endpoint and connect to the discovery service.
    pub async fn configure(&mut self) -> Result<(), BrokerError> {
        self.expect_state(BrokerState::Initialize)?;
        self.state = BrokerState::Configure;

        self.config.validate()?;
        let relay = DataPublisher::bind(&self.config.relay_bind_addr()).await?;
        let client = DiscoveryClient::connect(&self.config.discovery)
            .await?
            .with_poll_interval(self.config.poll_interval());

        info!(
            "Broker '{}' relaying on {}, discovery at {}",
            self.config.name,
            relay.local_addr(),
            self.config.discovery
        );
        self.relay = Some(relay);
        self.client = Some(client);
        self.state = BrokerState::Register;
        Ok(())
    }

    /// Register with the discovery service. A rejection is fatal.
    pub async fn register(&mut self) -> Result<(), BrokerError> {
        self.expect_state(BrokerState::Register)?;
        let port = self.relay_addr().map_or(self.config.port, |a| a.port());
        let info = RegistrantInfo::new(&self.config.name, &self.config.addr, port);

        let client = self.client.as_mut().ok_or(BrokerError::InvalidState {
            expected: BrokerState::Register,
            found: BrokerState::Initialize,
        })?;
        match client.register(Role::Broker, info, &[]).await {
            Ok(()) => {}
            Err(ClientError::Rejected { reason }) => {
                return Err(BrokerError::Registration(reason));
            }
            Err(e) => return Err(e.into()),
        }

        info!("Broker registered as {}:{}", self.config.addr, port);
        self.state = BrokerState::MatchPubs;
        Ok(())
    }

    /// Wait for the topology to be ready, then connect to every publisher.
    ///
    /// Returns the number of publishers connected. If the stop signal fires
    /// while waiting, the broker moves straight to [`BrokerState::Completed`].
    pub async fn match_publishers(&mut self) -> Result<usize, BrokerError> {
        self.expect_state(BrokerState::MatchPubs)?;
        let client = self.client.as_mut().ok_or(BrokerError::InvalidState {
            expected: BrokerState::MatchPubs,
            found: BrokerState::Initialize,
        })?;

        if !client.wait_until_ready(&self.stop).await? {
            info!("Broker stopped before the system became ready");
            self.state = BrokerState::Completed;
            return Ok(0);
        }

        let publishers = client.lookup_all_publishers().await?;
        let mut connected = 0;
        for publisher in publishers {
            match self.feed.connect(&publisher.endpoint()).await {
                Ok(()) => {
                    info!(
                        "Connected to publisher {} at {}",
                        publisher.id,
                        publisher.endpoint()
                    );
                    connected += 1;
                }
                Err(e) => warn!("Could not connect to publisher {}: {}", publisher.id, e),
            }
        }

        info!("Broker matched {} publishers", connected);
        self.state = BrokerState::RelayMessages;
        Ok(connected)
    }

    /// Forward every received sample until the stop signal fires.
    pub async fn relay_messages(&mut self) -> Result<RelayStats, BrokerError> {
        self.expect_state(BrokerState::RelayMessages)?;
        info!("Broker relaying messages");

        // The feed is left unsealed, so only the stop signal ends the relay.
        loop {
            tokio::select! {
                Some(sample) = self.feed.recv() => self.forward(sample),
                _ = self.stop.stopped() => break,
            }
        }

        self.state = BrokerState::Completed;
        info!(
            relayed = self.stats.messages_relayed,
            bytes = self.stats.bytes_relayed,
            dropped = self.stats.messages_dropped,
            "Broker completed"
        );
        Ok(self.stats)
    }

    fn forward(&mut self, sample: DataSample) {
        let Some(relay) = self.relay.as_ref() else {
            return;
        };
        let bytes = sample.payload.len() as u64;
        debug!("Relaying {} sample from {}", sample.topic, sample.publisher);

        if relay.publish(sample) == 0 {
            self.stats.messages_dropped += 1;
        } else {
            self.stats.messages_relayed += 1;
            self.stats.bytes_relayed += bytes;
        }
    }

    /// Drive the broker through its whole lifecycle.
    pub async fn run(&mut self) -> Result<RelayStats, BrokerError> {
        self.configure().await?;
        self.register().await?;
        self.match_publishers().await?;
        if self.state == BrokerState::Completed {
            return Ok(self.stats);
        }
        self.relay_messages().await
    }
}
