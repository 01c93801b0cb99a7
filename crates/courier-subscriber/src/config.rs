// SPDX-License-Identifier: Apache-2.0 OR MIT
// Copyright (c) 2025-2026 naskel.com

//! Subscriber configuration.

use courier::config::{self, ConfigError};
use courier::{DisseminationMode, TopicSelector};
use serde::{Deserialize, Serialize};
use std::path::Path;
use std::time::Duration;

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct SubscriberConfig {
    /// Registration id
    #[serde(default = "default_name")]
    pub name: String,

    /// Host advertised at registration
    #[serde(default = "default_addr")]
    pub addr: String,

    /// Port advertised at registration (subscribers accept no connections)
    #[serde(default)]
    pub port: u16,

    /// Discovery service endpoint (`host:port`)
    #[serde(default = "default_discovery")]
    pub discovery: String,

    /// Topics drawn from the catalogue when `topics` is not set
    #[serde(default = "default_num_topics")]
    pub num_topics: usize,

    /// Explicit interest set, overrides `num_topics`
    #[serde(default)]
    pub topics: Option<Vec<String>>,

    #[serde(default)]
    pub dissemination: DisseminationMode,

    /// Stop after this many accepted samples (default: run until stopped)
    #[serde(default)]
    pub max_samples: Option<u64>,

    /// Delay between readiness checks (milliseconds)
    #[serde(default = "default_poll_interval_ms")]
    pub poll_interval_ms: u64,
}

fn default_name() -> String {
    "sub".into()
}

fn default_addr() -> String {
    "localhost".into()
}

fn default_discovery() -> String {
    "localhost:5555".into()
}

fn default_num_topics() -> usize {
    2
}

fn default_poll_interval_ms() -> u64 {
    courier::READY_POLL_INTERVAL.as_millis() as u64
}

impl Default for SubscriberConfig {
    fn default() -> Self {
        Self {
            name: default_name(),
            addr: default_addr(),
            port: 0,
            discovery: default_discovery(),
            num_topics: default_num_topics(),
            topics: None,
            dissemination: DisseminationMode::default(),
            max_samples: None,
            poll_interval_ms: default_poll_interval_ms(),
        }
    }
}

impl SubscriberConfig {
    /// Load configuration from a JSON file.
    pub fn from_file(path: &Path) -> Result<Self, ConfigError> {
        config::from_json_file(path)
    }

    /// Validate configuration.
    pub fn validate(&self) -> Result<(), ConfigError> {
        if self.name.is_empty() {
            return Err(ConfigError::InvalidValue("name cannot be empty".into()));
        }
        if self.topic_set().is_empty() {
            return Err(ConfigError::InvalidValue("topic set cannot be empty".into()));
        }
        if self.max_samples == Some(0) {
            return Err(ConfigError::InvalidValue("max_samples cannot be 0".into()));
        }
        if self.poll_interval_ms == 0 {
            return Err(ConfigError::InvalidValue(
                "poll_interval_ms cannot be 0".into(),
            ));
        }
        config::validate_endpoint("discovery", &self.discovery)
    }

    /// Topics this subscriber is interested in.
    pub fn topic_set(&self) -> Vec<String> {
        match &self.topics {
            Some(topics) => topics.clone(),
            None => TopicSelector::seeded_by(&self.name).interest(self.num_topics),
        }
    }

    pub fn poll_interval(&self) -> Duration {
        Duration::from_millis(self.poll_interval_ms)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::io::Write;
    use tempfile::NamedTempFile;

    #[test]
    fn test_default_config() {
        let config = SubscriberConfig::default();
        assert_eq!(config.name, "sub");
        assert_eq!(config.topic_set().len(), 2);
        assert_eq!(config.max_samples, None);
        assert!(config.validate().is_ok());
    }

    #[test]
    fn test_validate_rejects_zero_limit() {
        let config = SubscriberConfig {
            max_samples: Some(0),
            ..Default::default()
        };
        assert!(config.validate().is_err());

        let config = SubscriberConfig {
            topics: Some(Vec::new()),
            ..Default::default()
        };
        assert!(config.validate().is_err());
    }

    #[test]
    fn test_from_file() {
        let mut file = NamedTempFile::new().unwrap();
        writeln!(file, r#"{{"name": "sub3", "max_samples": 5}}"#).unwrap();

        let config = SubscriberConfig::from_file(file.path()).unwrap();
        assert_eq!(config.name, "sub3");
        assert_eq!(config.max_samples, Some(5));
        assert_eq!(config.num_topics, 2);
        assert_eq!(config.discovery, "localhost:5555");
    }
}
