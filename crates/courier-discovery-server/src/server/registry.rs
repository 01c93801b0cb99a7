// SPDX-License-Identifier: Apache-2.0 OR MIT
// Copyright (c) 2025-2026 naskel.com

//! Registry of publishers, subscribers and the broker.
//!
//! Owned by the service task; never shared. Records are only ever inserted or
//! overwritten, so readiness cannot regress once reached.

use courier::Role;
use std::collections::{BTreeSet, HashMap};
use thiserror::Error;
use tracing::info;

/// A registered publisher.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct PublisherRecord {
    pub id: String,
    pub addr: String,
    pub port: u16,
    pub topics: BTreeSet<String>,
}

impl PublisherRecord {
    /// Whether the publisher offers any of `topics`.
    pub fn offers_any(&self, topics: &[String]) -> bool {
        topics.iter().any(|t| self.topics.contains(t))
    }
}

/// A registered subscriber.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct SubscriberRecord {
    pub id: String,
    pub topics: BTreeSet<String>,
}

/// The registered broker.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct BrokerRecord {
    pub addr: String,
    pub port: u16,
}

/// Counts required before the system reports ready.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct ReadinessThreshold {
    pub publishers: usize,
    pub subscribers: usize,
}

/// Whether a registration created a new record or replaced an existing one.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Registration {
    Created,
    Replaced,
}

/// Registration failures.
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum RegistrationError {
    #[error("Invalid role")]
    InvalidRole(String),

    #[error("Registry full")]
    RegistryFull { role: Role, limit: usize },

    #[error("Internal error: {0}")]
    Internal(String),
}

/// Registry of all participants.
#[derive(Debug)]
pub struct Registry {
    /// Publishers indexed by id
    publishers: HashMap<String, PublisherRecord>,

    /// Subscribers indexed by id
    subscribers: HashMap<String, SubscriberRecord>,

    broker: Option<BrokerRecord>,

    threshold: ReadinessThreshold,

    /// Maximum distinct ids per role table
    max_registrations: usize,

    /// Set once readiness has been announced
    ready_announced: bool,
}

impl Registry {
    /// Create an empty registry.
    pub fn new(threshold: ReadinessThreshold, max_registrations: usize) -> Self {
        Self {
            publishers: HashMap::new(),
            subscribers: HashMap::new(),
            broker: None,
            threshold,
            max_registrations,
            ready_announced: false,
        }
    }

    /// Add or overwrite a publisher.
    pub fn register_publisher(
        &mut self,
        id: &str,
        addr: &str,
        port: u16,
        topics: &[String],
    ) -> Result<Registration, RegistrationError> {
        if !self.publishers.contains_key(id) && self.publishers.len() >= self.max_registrations {
            return Err(RegistrationError::RegistryFull {
                role: Role::Publisher,
                limit: self.max_registrations,
            });
        }

        let record = PublisherRecord {
            id: id.to_string(),
            addr: addr.to_string(),
            port,
            topics: topics.iter().cloned().collect(),
        };
        let outcome = match self.publishers.insert(id.to_string(), record) {
            Some(_) => Registration::Replaced,
            None => Registration::Created,
        };
        self.refresh_readiness();
        Ok(outcome)
    }

    /// Add or overwrite a subscriber.
    pub fn register_subscriber(
        &mut self,
        id: &str,
        topics: &[String],
    ) -> Result<Registration, RegistrationError> {
        if !self.subscribers.contains_key(id) && self.subscribers.len() >= self.max_registrations
        {
            return Err(RegistrationError::RegistryFull {
                role: Role::Subscriber,
                limit: self.max_registrations,
            });
        }

        let record = SubscriberRecord {
            id: id.to_string(),
            topics: topics.iter().cloned().collect(),
        };
        let outcome = match self.subscribers.insert(id.to_string(), record) {
            Some(_) => Registration::Replaced,
            None => Registration::Created,
        };
        self.refresh_readiness();
        Ok(outcome)
    }

    /// Record the broker, replacing any previous one.
    pub fn register_broker(&mut self, addr: &str, port: u16) -> Registration {
        let record = BrokerRecord {
            addr: addr.to_string(),
            port,
        };
        let outcome = match self.broker.replace(record) {
            Some(_) => Registration::Replaced,
            None => Registration::Created,
        };
        self.refresh_readiness();
        outcome
    }

    /// Recompute readiness; logs the first transition to ready.
    fn refresh_readiness(&mut self) {
        if !self.ready_announced && self.is_ready() {
            self.ready_announced = true;
            info!(
                publishers = self.publishers.len(),
                subscribers = self.subscribers.len(),
                "System is ready for dissemination"
            );
        }
    }

    /// Thresholds reached and a broker registered.
    pub fn is_ready(&self) -> bool {
        self.publishers.len() >= self.threshold.publishers
            && self.subscribers.len() >= self.threshold.subscribers
            && self.broker.is_some()
    }

    pub fn publisher_count(&self) -> usize {
        self.publishers.len()
    }

    pub fn subscriber_count(&self) -> usize {
        self.subscribers.len()
    }

    pub fn broker(&self) -> Option<&BrokerRecord> {
        self.broker.as_ref()
    }

    pub fn publisher(&self, id: &str) -> Option<&PublisherRecord> {
        self.publishers.get(id)
    }

    pub fn subscriber(&self, id: &str) -> Option<&SubscriberRecord> {
        self.subscribers.get(id)
    }

    /// All publishers, ordered by id.
    pub fn publishers(&self) -> Vec<&PublisherRecord> {
        let mut all: Vec<_> = self.publishers.values().collect();
        all.sort_by(|a, b| a.id.cmp(&b.id));
        all
    }

    /// Publishers offering at least one of `topics`, ordered by id.
    pub fn publishers_for_topics(&self, topics: &[String]) -> Vec<&PublisherRecord> {
        self.publishers()
            .into_iter()
            .filter(|p| p.offers_any(topics))
            .collect()
    }
}
