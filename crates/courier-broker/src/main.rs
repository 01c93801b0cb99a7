// SPDX-License-Identifier: Apache-2.0 OR MIT
// Copyright (c) 2025-2026 naskel.com

//! Courier Broker
//!
//! # Usage
//!
//! ```bash
//! # Relay on localhost:5578, discovery on localhost:5555
//! courier-broker
//!
//! # Custom relay endpoint and discovery service
//! courier-broker --addr 10.0.0.5 --port 6000 --discovery 10.0.0.1:5555
//! ```

use clap::Parser;
use courier_broker::{Broker, BrokerConfig};
use std::path::PathBuf;
use tracing::info;

/// Courier Broker - relays every publisher to every subscriber
#[derive(Parser, Debug)]
#[command(name = "courier-broker")]
#[command(author, version, about, long_about = None)]
struct Args {
    /// Registration id
    #[arg(short, long, default_value = "broker")]
    name: String,

    /// Host to bind and advertise the relay endpoint on
    #[arg(short, long, default_value = "localhost")]
    addr: String,

    /// Relay endpoint port
    #[arg(short, long, default_value = "5578")]
    port: u16,

    /// Discovery service endpoint (host:port)
    #[arg(short, long, default_value = "localhost:5555")]
    discovery: String,

    /// Configuration file (JSON format)
    #[arg(short, long)]
    config: Option<PathBuf>,

    /// Log level (trace, debug, info, warn, error)
    #[arg(short, long, default_value = "info")]
    log_level: String,
}

#[tokio::main]
async fn main() -> Result<(), Box<dyn std::error::Error>> {
    let args = Args::parse();

    courier::logging::init(&args.log_level).map_err(|e| e.to_string())?;

    let config = if let Some(config_path) = args.config {
        info!("Loading config from {:?}", config_path);
        BrokerConfig::from_file(&config_path)?
    } else {
        BrokerConfig {
            name: args.name,
            addr: args.addr,
            port: args.port,
            discovery: args.discovery,
            ..Default::default()
        }
    };

    let mut broker = Broker::new(config);

    let stop = broker.stop_handle();
    tokio::spawn(async move {
        tokio::signal::ctrl_c().await.ok();
        info!("Shutdown signal received, stopping broker...");
        stop.stop();
    });

    let stats = broker.run().await?;
    info!(
        "Broker finished: {} relayed, {} dropped",
        stats.messages_relayed, stats.messages_dropped
    );
    Ok(())
}
