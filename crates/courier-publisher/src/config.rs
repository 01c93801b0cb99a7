// SPDX-License-Identifier: Apache-2.0 OR MIT
// Copyright (c) 2025-2026 naskel.com

//! Publisher configuration.

use courier::config::{self, ConfigError};
use courier::{DisseminationMode, TopicSelector};
use serde::{Deserialize, Serialize};
use std::path::Path;
use std::time::Duration;

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct PublisherConfig {
    /// Registration id
    #[serde(default = "default_name")]
    pub name: String,

    /// Host the data endpoint binds to and advertises
    #[serde(default = "default_addr")]
    pub addr: String,

    /// Data endpoint port (0 picks a free port)
    #[serde(default = "default_port")]
    pub port: u16,

    /// Discovery service endpoint (`host:port`)
    #[serde(default = "default_discovery")]
    pub discovery: String,

    /// Topics drawn from the catalogue when `topics` is not set
    #[serde(default = "default_num_topics")]
    pub num_topics: usize,

    /// Explicit topic set, overrides `num_topics`
    #[serde(default)]
    pub topics: Option<Vec<String>>,

    /// Rounds per second
    #[serde(default = "default_frequency")]
    pub frequency: f64,

    /// Number of rounds
    #[serde(default = "default_iters")]
    pub iters: u32,

    #[serde(default)]
    pub dissemination: DisseminationMode,

    /// Data readers to wait for before the first round
    #[serde(default)]
    pub min_subscribers: usize,

    /// Delay between readiness checks (milliseconds)
    #[serde(default = "default_poll_interval_ms")]
    pub poll_interval_ms: u64,
}

fn default_name() -> String {
    "pub".into()
}

fn default_addr() -> String {
    "localhost".into()
}

fn default_port() -> u16 {
    5577
}

fn default_discovery() -> String {
    "localhost:5555".into()
}

fn default_num_topics() -> usize {
    1
}

fn default_frequency() -> f64 {
    1.0
}

fn default_iters() -> u32 {
    10
}

fn default_poll_interval_ms() -> u64 {
    courier::READY_POLL_INTERVAL.as_millis() as u64
}

impl Default for PublisherConfig {
    fn default() -> Self {
        Self {
            name: default_name(),
            addr: default_addr(),
            port: default_port(),
            discovery: default_discovery(),
            num_topics: default_num_topics(),
            topics: None,
            frequency: default_frequency(),
            iters: default_iters(),
            dissemination: DisseminationMode::default(),
            min_subscribers: 0,
            poll_interval_ms: default_poll_interval_ms(),
        }
    }
}

impl PublisherConfig {
    /// Load configuration from a JSON file.
    pub fn from_file(path: &Path) -> Result<Self, ConfigError> {
        config::from_json_file(path)
    }

    /// Validate configuration.
    pub fn validate(&self) -> Result<(), ConfigError> {
        if self.name.is_empty() {
            return Err(ConfigError::InvalidValue("name cannot be empty".into()));
        }
        if self.addr.is_empty() {
            return Err(ConfigError::InvalidValue("addr cannot be empty".into()));
        }
        self.period()?;
        if self.topic_set().is_empty() {
            return Err(ConfigError::InvalidValue("topic set cannot be empty".into()));
        }
        if self.poll_interval_ms == 0 {
            return Err(ConfigError::InvalidValue(
                "poll_interval_ms cannot be 0".into(),
            ));
        }
        config::validate_endpoint("discovery", &self.discovery)
    }

    /// Topics this publisher offers.
    pub fn topic_set(&self) -> Vec<String> {
        match &self.topics {
            Some(topics) => topics.clone(),
            None => TopicSelector::seeded_by(&self.name).interest(self.num_topics),
        }
    }

    pub fn data_bind_addr(&self) -> String {
        format!("{}:{}", self.addr, self.port)
    }

    /// Sleep between two rounds.
    ///
    /// Fails unless `frequency` is positive and its period fits a [`Duration`].
    pub fn period(&self) -> Result<Duration, ConfigError> {
        if !(self.frequency.is_finite() && self.frequency > 0.0) {
            return Err(ConfigError::InvalidValue(format!(
                "frequency must be positive, got {}",
                self.frequency
            )));
        }
        Duration::try_from_secs_f64(1.0 / self.frequency).map_err(|_| {
            ConfigError::InvalidValue(format!("frequency {} is too low", self.frequency))
        })
    }

    pub fn poll_interval(&self) -> Duration {
        Duration::from_millis(self.poll_interval_ms)
    }
}
