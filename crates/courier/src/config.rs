// SPDX-License-Identifier: Apache-2.0 OR MIT
// Copyright (c) 2025-2026 naskel.com

//! Configuration helpers shared by every component.

use serde::de::DeserializeOwned;
use serde::{Deserialize, Serialize};
use std::fmt;
use std::path::Path;
use thiserror::Error;

/// How samples travel from publishers to subscribers.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize, clap::ValueEnum)]
#[serde(rename_all = "lowercase")]
pub enum DisseminationMode {
    /// Subscribers connect straight to matching publishers.
    #[value(alias = "Direct")]
    #[serde(alias = "Direct")]
    Direct,
    /// Every sample passes through the broker.
    #[default]
    #[value(alias = "Broker")]
    #[serde(alias = "Broker")]
    Broker,
}

impl fmt::Display for DisseminationMode {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::Direct => f.pad("direct"),
            Self::Broker => f.pad("broker"),
        }
    }
}

/// Configuration errors.
#[derive(Debug, Error)]
pub enum ConfigError {
    #[error("I/O error: {0}")]
    Io(#[from] std::io::Error),

    #[error("Parse error: {0}")]
    Parse(#[from] serde_json::Error),

    #[error("Invalid value: {0}")]
    InvalidValue(String),
}

/// Load a JSON configuration file.
pub fn from_json_file<T: DeserializeOwned>(path: &Path) -> Result<T, ConfigError> {
    let content = std::fs::read_to_string(path)?;
    Ok(serde_json::from_str(&content)?)
}

/// Save a configuration as pretty-printed JSON.
pub fn to_json_file<T: Serialize>(value: &T, path: &Path) -> Result<(), ConfigError> {
    let content = serde_json::to_string_pretty(value)?;
    std::fs::write(path, content)?;
    Ok(())
}

/// Check that `value` looks like `host:port` with a non-zero port.
pub fn validate_endpoint(name: &str, value: &str) -> Result<(), ConfigError> {
    let (host, port) = value
        .rsplit_once(':')
        .ok_or_else(|| ConfigError::InvalidValue(format!("{} must be host:port", name)))?;
    if host.is_empty() {
        return Err(ConfigError::InvalidValue(format!("{} host is empty", name)));
    }
    match port.parse::<u16>() {
        Ok(0) | Err(_) => Err(ConfigError::InvalidValue(format!(
            "{} has an invalid port: {}",
            name, port
        ))),
        Ok(_) => Ok(()),
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[derive(Debug, Serialize, Deserialize, PartialEq)]
    struct Sample {
        mode: DisseminationMode,
        #[serde(default)]
        port: u16,
    }

    #[test]
    fn test_validate_endpoint() {
        assert!(validate_endpoint("discovery", "localhost:5555").is_ok());
        assert!(validate_endpoint("discovery", "localhost").is_err());
        assert!(validate_endpoint("discovery", ":5555").is_err());
        assert!(validate_endpoint("discovery", "localhost:0").is_err());
        assert!(validate_endpoint("discovery", "localhost:http").is_err());
    }

    #[test]
    fn test_json_file_roundtrip() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("sample.json");
        let sample = Sample {
            mode: DisseminationMode::Direct,
            port: 7,
        };

        to_json_file(&sample, &path).unwrap();
        let loaded: Sample = from_json_file(&path).unwrap();
        assert_eq!(loaded, sample);
    }

    #[test]
    fn test_missing_file_is_io_error() {
        let err = from_json_file::<Sample>(Path::new("/nonexistent/courier.json")).unwrap_err();
        assert!(matches!(err, ConfigError::Io(_)));
    }

    #[test]
    fn test_default_mode_is_broker() {
        assert_eq!(DisseminationMode::default(), DisseminationMode::Broker);
        assert_eq!(DisseminationMode::Direct.to_string(), "direct");
    }
}
