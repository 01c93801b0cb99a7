// SPDX-License-Identifier: Apache-2.0 OR MIT
// Copyright (c) 2025-2026 naskel.com

//! Subscriber state machine.

use crate::config::SubscriberConfig;
use courier::{
    ClientError, ConfigError, DataFeed, DataSample, DiscoveryClient, DisseminationMode,
    RegistrantInfo, Role, StopHandle,
};
use std::collections::{BTreeMap, HashSet};
use thiserror::Error;
use tracing::{debug, info, warn};

/// Subscriber lifecycle. Each state names the step performed next.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum SubscriberState {
    Initialize,
    Register,
    IsReady,
    /// Looking up data sources (the broker, or publishers in direct mode).
    LookupBroker,
    Listen,
    Completed,
}

/// Receive counters.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct ReceiveStats {
    /// Samples matching the interest set
    pub received: u64,

    /// Samples for topics outside the interest set
    pub filtered_out: u64,

    pub per_topic: BTreeMap<String, u64>,
}

/// Subscriber errors.
#[derive(Debug, Error)]
pub enum SubscriberError {
    #[error("Invalid state: expected {expected:?}, found {found:?}")]
    InvalidState {
        expected: SubscriberState,
        found: SubscriberState,
    },

    #[error("Configuration error: {0}")]
    Config(#[from] ConfigError),

    #[error("Discovery error: {0}")]
    Discovery(#[from] ClientError),

    #[error("Registration failed: {0}")]
    Registration(String),
}

/// A data consumer for a fixed interest set.
pub struct Subscriber {
    config: SubscriberConfig,
    state: SubscriberState,
    topics: Vec<String>,
    client: Option<DiscoveryClient>,
    feed: DataFeed,
    stats: ReceiveStats,
    stop: StopHandle,
}

impl Subscriber {
    pub fn new(config: SubscriberConfig) -> Self {
        Self {
            config,
            state: SubscriberState::Initialize,
            topics: Vec::new(),
            client: None,
            feed: DataFeed::new(),
            stats: ReceiveStats::default(),
            stop: StopHandle::new(),
        }
    }

    pub fn state(&self) -> SubscriberState {
        self.state
    }

    pub fn topics(&self) -> &[String] {
        &self.topics
    }

    pub fn stop_handle(&self) -> StopHandle {
        self.stop.clone()
    }

    pub fn stats(&self) -> &ReceiveStats {
        &self.stats
    }

    /// Data endpoints the subscriber reads from.
    pub fn sources(&self) -> &[String] {
        self.feed.sources()
    }

    fn expect_state(&self, expected: SubscriberState) -> Result<(), SubscriberError> {
        if self.state != expected {
            return Err(SubscriberError::InvalidState {
                expected,
                found: self.state,
            });
        }
        Ok(())
    }

    fn client(&mut self) -> Result<&mut DiscoveryClient, SubscriberError> {
        let found = self.state;
        self.client.as_mut().ok_or(SubscriberError::InvalidState {
            expected: SubscriberState::Register,
            found,
        })
    }

    /// Resolve the interest set and connect to discovery.
    pub async fn configure(&mut self) -> Result<(), SubscriberError> {
        self.expect_state(SubscriberState::Initialize)?;
        self.config.validate()?;

        self.topics = self.config.topic_set();
        let client = DiscoveryClient::connect(&self.config.discovery)
            .await?
            .with_poll_interval(self.config.poll_interval());

        info!(
            "Subscriber '{}' interested in {:?}",
            self.config.name, self.topics
        );
        self.client = Some(client);
        self.state = SubscriberState::Register;
        Ok(())
    }

    /// Register the interest set. A rejection is fatal.
    pub async fn register(&mut self) -> Result<(), SubscriberError> {
        self.expect_state(SubscriberState::Register)?;
        let info = RegistrantInfo::new(&self.config.name, &self.config.addr, self.config.port);
        let topics = self.topics.clone();

        match self.client()?.register(Role::Subscriber, info, &topics).await {
            Ok(()) => {}
            Err(ClientError::Rejected { reason }) => {
                return Err(SubscriberError::Registration(reason));
            }
            Err(e) => return Err(e.into()),
        }

        info!("Subscriber '{}' registered", self.config.name);
        self.state = SubscriberState::IsReady;
        Ok(())
    }

    /// Poll readiness with the configured backoff.
    ///
    /// Returns `false` and completes if stopped before the system is ready.
    pub async fn wait_ready(&mut self) -> Result<bool, SubscriberError> {
        self.expect_state(SubscriberState::IsReady)?;
        let stop = self.stop.clone();

        if !self.client()?.wait_until_ready(&stop).await? {
            self.state = SubscriberState::Completed;
            return Ok(false);
        }
        self.state = SubscriberState::LookupBroker;
        Ok(true)
    }

    /// Look up data sources for the interest set and connect to each.
    ///
    /// A failed lookup, or no reachable source, ends the subscriber; no
    /// fallback discovery is attempted. Returns the number of sources connected.
    pub async fn lookup_broker(&mut self) -> Result<usize, SubscriberError> {
        self.expect_state(SubscriberState::LookupBroker)?;
        let topics = self.topics.clone();

        let matched = match self.client()?.lookup_pub_by_topic(&topics).await {
            Ok(matched) => matched,
            Err(ClientError::NotFound(_)) => {
                match self.config.dissemination {
                    DisseminationMode::Broker => warn!("Broker lookup failed"),
                    DisseminationMode::Direct => warn!("Publisher lookup failed"),
                }
                self.state = SubscriberState::Completed;
                return Ok(0);
            }
            Err(e) => return Err(e.into()),
        };

        let mut connected = 0;
        for source in matched {
            let endpoint = source.endpoint();
            match self.feed.connect(&endpoint).await {
                Ok(()) => {
                    match self.config.dissemination {
                        DisseminationMode::Broker => info!("Connected to Broker at {}", endpoint),
                        DisseminationMode::Direct => {
                            info!("Connected to publisher {} at {}", source.id, endpoint)
                        }
                    }
                    connected += 1;
                }
                Err(e) => warn!("Could not connect to {}: {}", source.id, e),
            }
        }
        self.feed.seal();

        if connected == 0 {
            warn!("No data source reachable for {:?}", self.topics);
            self.state = SubscriberState::Completed;
            return Ok(0);
        }
        self.state = SubscriberState::Listen;
        Ok(connected)
    }

    /// Consume samples until stopped, the configured limit is reached or every
    /// source has closed.
    pub async fn listen(&mut self) -> Result<ReceiveStats, SubscriberError> {
        self.expect_state(SubscriberState::Listen)?;
        let interest: HashSet<String> = self.topics.iter().cloned().collect();

        while !self.limit_reached() {
            tokio::select! {
                sample = self.feed.recv() => match sample {
                    Some(sample) => self.accept(sample, &interest),
                    None => {
                        info!("All data sources closed");
                        break;
                    }
                },
                _ = self.stop.stopped() => break,
            }
        }

        self.state = SubscriberState::Completed;
        info!(
            received = self.stats.received,
            filtered = self.stats.filtered_out,
            "Subscriber '{}' completed",
            self.config.name
        );
        Ok(self.stats.clone())
    }

    fn limit_reached(&self) -> bool {
        self.config
            .max_samples
            .is_some_and(|max| self.stats.received >= max)
    }

    fn accept(&mut self, sample: DataSample, interest: &HashSet<String>) {
        if !interest.contains(&sample.topic) {
            debug!("Ignoring {} sample from {}", sample.topic, sample.publisher);
            self.stats.filtered_out += 1;
            return;
        }

        info!(
            "Received [{}] from {}: {}",
            sample.topic, sample.publisher, sample.payload
        );
        self.stats.received += 1;
        *self.stats.per_topic.entry(sample.topic).or_insert(0) += 1;
    }

    /// Drive the subscriber through its whole lifecycle.
    pub async fn run(&mut self) -> Result<ReceiveStats, SubscriberError> {
        self.configure().await?;
        self.register().await?;
        if !self.wait_ready().await? {
            return Ok(self.stats.clone());
        }
        if self.lookup_broker().await? == 0 {
            return Ok(self.stats.clone());
        }
        self.listen().await
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use courier::testing::FakeDiscovery;
    use courier::{DataPublisher, DiscoveryRequest, DiscoveryResponse, MessageKind, Status};
    use std::time::Duration;

    fn config(discovery: String) -> SubscriberConfig {
        SubscriberConfig {
            name: "sub1".into(),
            addr: "127.0.0.1".into(),
            discovery,
            topics: Some(vec!["weather".into()]),
            poll_interval_ms: 10,
            ..Default::default()
        }
    }

    fn respond(req: &DiscoveryRequest, lookup: &DiscoveryResponse) -> DiscoveryResponse {
        match req {
            DiscoveryRequest::Register(_) => DiscoveryResponse::Register {
                status: Status::Success,
                reason: "Registration successful".into(),
            },
            DiscoveryRequest::IsReady => DiscoveryResponse::IsReady { ready: true },
            DiscoveryRequest::LookupPubByTopic { .. } => lookup.clone(),
            _ => DiscoveryResponse::unknown(),
        }
    }

    async fn wait_for_reader(publisher: &DataPublisher) {
        let stop = StopHandle::new();
        tokio::time::timeout(Duration::from_secs(5), publisher.wait_for_readers(1, &stop))
            .await
            .unwrap();
    }

    #[tokio::test]
    async fn test_listen_before_lookup_is_rejected() {
        let mut subscriber = Subscriber::new(SubscriberConfig::default());
        assert!(matches!(
            subscriber.listen().await,
            Err(SubscriberError::InvalidState {
                expected: SubscriberState::Listen,
                found: SubscriberState::Initialize
            })
        ));
    }

    #[tokio::test]
    async fn test_failed_lookup_ends_without_listening() {
        let lookup = DiscoveryResponse::failure(MessageKind::LookupPubByTopic, "No broker");
        let discovery = FakeDiscovery::start(move |req| respond(req, &lookup)).await;
        let mut subscriber = Subscriber::new(config(discovery.endpoint()));

        let stats = tokio::time::timeout(Duration::from_secs(5), subscriber.run())
            .await
            .unwrap()
            .unwrap();
        assert_eq!(stats, ReceiveStats::default());
        assert_eq!(subscriber.state(), SubscriberState::Completed);
        assert!(subscriber.sources().is_empty());

        drop(subscriber);
        assert_eq!(
            discovery.finish().await,
            vec![
                MessageKind::Register,
                MessageKind::IsReady,
                MessageKind::LookupPubByTopic
            ]
        );
    }

    #[tokio::test]
    async fn test_rejected_registration_is_fatal() {
        let discovery = FakeDiscovery::start(|_| DiscoveryResponse::Register {
            status: Status::Failure,
            reason: "Invalid role".into(),
        })
        .await;
        let mut subscriber = Subscriber::new(config(discovery.endpoint()));

        assert!(matches!(
            subscriber.run().await,
            Err(SubscriberError::Registration(_))
        ));
    }

    #[tokio::test]
    async fn test_reads_from_broker_and_filters_topics() {
        let broker = DataPublisher::bind("127.0.0.1:0").await.unwrap();
        let lookup = DiscoveryResponse::LookupPubByTopic {
            status: Status::Success,
            matched: vec![RegistrantInfo::new(
                "broker",
                "127.0.0.1",
                broker.local_addr().port(),
            )],
        };
        let discovery = FakeDiscovery::start(move |req| respond(req, &lookup)).await;
        let mut subscriber = Subscriber::new(SubscriberConfig {
            max_samples: Some(2),
            ..config(discovery.endpoint())
        });

        subscriber.configure().await.unwrap();
        subscriber.register().await.unwrap();
        assert!(subscriber.wait_ready().await.unwrap());
        assert_eq!(subscriber.lookup_broker().await.unwrap(), 1);
        assert_eq!(subscriber.state(), SubscriberState::Listen);
        wait_for_reader(&broker).await;

        broker.publish(DataSample::new("pub1", "weather", "weather data at 1"));
        broker.publish(DataSample::new("pub2", "sound", "sound data at 1"));
        broker.publish(DataSample::new("pub1", "weather", "weather data at 2"));

        let stats = tokio::time::timeout(Duration::from_secs(5), subscriber.listen())
            .await
            .unwrap()
            .unwrap();
        assert_eq!(stats.received, 2);
        assert_eq!(stats.filtered_out, 1);
        assert_eq!(stats.per_topic.get("weather"), Some(&2));
        assert_eq!(subscriber.state(), SubscriberState::Completed);
    }

    #[tokio::test]
    async fn test_listen_ends_when_every_source_closes() {
        let first = DataPublisher::bind("127.0.0.1:0").await.unwrap();
        let second = DataPublisher::bind("127.0.0.1:0").await.unwrap();
        let lookup = DiscoveryResponse::LookupPubByTopic {
            status: Status::Success,
            matched: vec![
                RegistrantInfo::new("pub1", "127.0.0.1", first.local_addr().port()),
                RegistrantInfo::new("pub2", "127.0.0.1", second.local_addr().port()),
            ],
        };
        let discovery = FakeDiscovery::start(move |req| respond(req, &lookup)).await;
        let mut subscriber = Subscriber::new(SubscriberConfig {
            dissemination: DisseminationMode::Direct,
            ..config(discovery.endpoint())
        });

        subscriber.configure().await.unwrap();
        subscriber.register().await.unwrap();
        subscriber.wait_ready().await.unwrap();
        assert_eq!(subscriber.lookup_broker().await.unwrap(), 2);
        wait_for_reader(&first).await;
        wait_for_reader(&second).await;

        drop(first);
        drop(second);

        // No stop signal and no sample limit: the closed sources end the loop.
        let stats = tokio::time::timeout(Duration::from_secs(5), subscriber.listen())
            .await
            .unwrap()
            .unwrap();
        assert_eq!(stats.received, 0);
        assert_eq!(subscriber.state(), SubscriberState::Completed);
    }

    #[tokio::test]
    async fn test_direct_mode_connects_to_every_match() {
        let first = DataPublisher::bind("127.0.0.1:0").await.unwrap();
        let second = DataPublisher::bind("127.0.0.1:0").await.unwrap();
        let lookup = DiscoveryResponse::LookupPubByTopic {
            status: Status::Success,
            matched: vec![
                RegistrantInfo::new("pub1", "127.0.0.1", first.local_addr().port()),
                RegistrantInfo::new("pub2", "127.0.0.1", second.local_addr().port()),
            ],
        };
        let discovery = FakeDiscovery::start(move |req| respond(req, &lookup)).await;
        let mut subscriber = Subscriber::new(SubscriberConfig {
            dissemination: DisseminationMode::Direct,
            ..config(discovery.endpoint())
        });
        let stop = subscriber.stop_handle();

        subscriber.configure().await.unwrap();
        subscriber.register().await.unwrap();
        subscriber.wait_ready().await.unwrap();
        assert_eq!(subscriber.lookup_broker().await.unwrap(), 2);
        assert_eq!(subscriber.sources().len(), 2);
        wait_for_reader(&first).await;
        wait_for_reader(&second).await;

        let task = tokio::spawn(async move {
            let stats = subscriber.listen().await.unwrap();
            (subscriber, stats)
        });
        first.publish(DataSample::new("pub1", "weather", "a"));
        second.publish(DataSample::new("pub2", "weather", "b"));
        tokio::time::sleep(Duration::from_millis(200)).await;
        stop.stop();

        let (subscriber, stats) = tokio::time::timeout(Duration::from_secs(5), task)
            .await
            .unwrap()
            .unwrap();
        assert_eq!(stats.received, 2);
        assert_eq!(subscriber.state(), SubscriberState::Completed);
    }
}
