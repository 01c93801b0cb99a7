// SPDX-License-Identifier: Apache-2.0 OR MIT
// Copyright (c) 2025-2026 naskel.com

//! Courier Discovery Server
//!
//! # Usage
//!
//! ```bash
//! # Start server on default port (5555), ready after 1 publisher + 1 subscriber
//! courier-discovery-server
//!
//! # Wait for 3 publishers and 2 subscribers
//! courier-discovery-server --pub-count 3 --sub-count 2
//!
//! # Direct dissemination: lookups return matching publishers
//! courier-discovery-server --dissemination direct
//! ```

use clap::Parser;
use courier::DisseminationMode;
use courier_discovery_server::{DiscoveryServer, ServerConfig};
use std::path::PathBuf;
use tracing::info;

/// Courier Discovery Server - registry, readiness and lookups
#[derive(Parser, Debug)]
#[command(name = "courier-discovery-server")]
#[command(author, version, about, long_about = None)]
struct Args {
    /// IP address to bind to
    #[arg(short, long, default_value = "0.0.0.0")]
    addr: String,

    /// TCP port to listen on
    #[arg(short, long, default_value = "5555")]
    port: u16,

    /// Number of publishers required before the system is ready
    #[arg(short = 'P', long, default_value = "1")]
    pub_count: usize,

    /// Number of subscribers required before the system is ready
    #[arg(short = 'S', long, default_value = "1")]
    sub_count: usize,

    /// Dissemination mode
    #[arg(long, value_enum, default_value_t = DisseminationMode::Broker)]
    dissemination: DisseminationMode,

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
        ServerConfig::from_file(&config_path)?
    } else {
        ServerConfig {
            bind_address: args.addr.parse()?,
            port: args.port,
            pub_count: args.pub_count,
            sub_count: args.sub_count,
            dissemination: args.dissemination,
            ..Default::default()
        }
    };

    let server = DiscoveryServer::bind(config.clone()).await?;

    info!("+----------------------------------------------------+");
    info!(
        "|       Courier Discovery Server v{}              |",
        env!("CARGO_PKG_VERSION")
    );
    info!("+----------------------------------------------------+");
    info!("|  Bind:          {:34} |", server.local_addr());
    info!("|  Publishers:    {:34} |", config.pub_count);
    info!("|  Subscribers:   {:34} |", config.sub_count);
    info!("|  Dissemination: {:34} |", config.dissemination);
    info!("+----------------------------------------------------+");

    let handle = server.handle();
    tokio::spawn(async move {
        tokio::signal::ctrl_c().await.ok();
        info!("Shutdown signal received, stopping server...");
        handle.shutdown();
    });

    server.run().await?;
    Ok(())
}
