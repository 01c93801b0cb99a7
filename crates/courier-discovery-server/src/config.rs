// SPDX-License-Identifier: Apache-2.0 OR MIT
// Copyright (c) 2025-2026 naskel.com

//! Discovery Server configuration.

use courier::config::{self, ConfigError};
use courier::DisseminationMode;
use serde::{Deserialize, Serialize};
use std::net::IpAddr;
use std::path::Path;

/// Discovery Server configuration.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ServerConfig {
    /// Address to bind to (default: 0.0.0.0)
    #[serde(default = "default_bind_address")]
    pub bind_address: IpAddr,

    /// TCP port to listen on (default: 5555, 0 picks a free port)
    #[serde(default = "default_port")]
    pub port: u16,

    /// Publishers required before the system reports ready
    #[serde(default = "default_count")]
    pub pub_count: usize,

    /// Subscribers required before the system reports ready
    #[serde(default = "default_count")]
    pub sub_count: usize,

    /// Answer topic lookups with the broker or with matching publishers
    #[serde(default)]
    pub dissemination: DisseminationMode,

    /// Maximum number of distinct ids per role
    #[serde(default = "default_max_registrations")]
    pub max_registrations: usize,

    /// Maximum message size (bytes)
    #[serde(default = "default_max_message_size")]
    pub max_message_size: usize,

    /// Requests queued for the service task before connections wait
    #[serde(default = "default_request_queue_depth")]
    pub request_queue_depth: usize,
}

fn default_bind_address() -> IpAddr {
    IpAddr::from([0, 0, 0, 0])
}

fn default_port() -> u16 {
    5555
}

fn default_count() -> usize {
    1
}

fn default_max_registrations() -> usize {
    1000
}

fn default_max_message_size() -> usize {
    courier::DEFAULT_MAX_FRAME_SIZE
}

fn default_request_queue_depth() -> usize {
    100
}

impl Default for ServerConfig {
    fn default() -> Self {
        Self {
            bind_address: default_bind_address(),
            port: default_port(),
            pub_count: default_count(),
            sub_count: default_count(),
            dissemination: DisseminationMode::default(),
            max_registrations: default_max_registrations(),
            max_message_size: default_max_message_size(),
            request_queue_depth: default_request_queue_depth(),
        }
    }
}

impl ServerConfig {
    /// Load configuration from a JSON file.
    pub fn from_file(path: &Path) -> Result<Self, ConfigError> {
        config::from_json_file(path)
    }

    /// Save configuration to a JSON file.
    pub fn to_file(&self, path: &Path) -> Result<(), ConfigError> {
        config::to_json_file(self, path)
    }

    /// Validate configuration.
    pub fn validate(&self) -> Result<(), ConfigError> {
        if self.max_registrations == 0 {
            return Err(ConfigError::InvalidValue(
                "max_registrations cannot be 0".into(),
            ));
        }
        if self.pub_count > self.max_registrations || self.sub_count > self.max_registrations {
            return Err(ConfigError::InvalidValue(
                "pub_count and sub_count cannot exceed max_registrations".into(),
            ));
        }
        if self.max_message_size == 0 {
            return Err(ConfigError::InvalidValue(
                "max_message_size cannot be 0".into(),
            ));
        }
        if self.request_queue_depth == 0 {
            return Err(ConfigError::InvalidValue(
                "request_queue_depth cannot be 0".into(),
            ));
        }
        Ok(())
    }
}
