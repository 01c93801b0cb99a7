// SPDX-License-Identifier: Apache-2.0 OR MIT
// Copyright (c) 2025-2026 naskel.com

//! Broker configuration.

use courier::config::{self, ConfigError};
use serde::{Deserialize, Serialize};
use std::path::Path;
use std::time::Duration;

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct BrokerConfig {
    /// Registration id
    #[serde(default = "default_name")]
    pub name: String,

    /// Host the relay endpoint binds to and advertises
    #[serde(default = "default_addr")]
    pub addr: String,

    /// Relay endpoint port (0 picks a free port)
    #[serde(default = "default_port")]
    pub port: u16,

    /// Discovery service endpoint (`host:port`)
    #[serde(default = "default_discovery")]
    pub discovery: String,

    /// Delay between readiness checks (milliseconds)
    #[serde(default = "default_poll_interval_ms")]
    pub poll_interval_ms: u64,
}

fn default_name() -> String {
    "broker".into()
}

fn default_addr() -> String {
    "localhost".into()
}

fn default_port() -> u16 {
    5578
}

fn default_discovery() -> String {
    "localhost:5555".into()
}

fn default_poll_interval_ms() -> u64 {
    courier::READY_POLL_INTERVAL.as_millis() as u64
}

impl Default for BrokerConfig {
    fn default() -> Self {
        Self {
            name: default_name(),
            addr: default_addr(),
            port: default_port(),
            discovery: default_discovery(),
            poll_interval_ms: default_poll_interval_ms(),
        }
    }
}

impl BrokerConfig {
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
        if self.poll_interval_ms == 0 {
            return Err(ConfigError::InvalidValue(
                "poll_interval_ms cannot be 0".into(),
            ));
        }
        config::validate_endpoint("discovery", &self.discovery)
    }

    /// Address the relay endpoint binds to.
    pub fn relay_bind_addr(&self) -> String {
        format!("{}:{}", self.addr, self.port)
    }

    pub fn poll_interval(&self) -> Duration {
        Duration::from_millis(self.poll_interval_ms)
    }
}
