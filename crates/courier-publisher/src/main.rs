// SPDX-License-Identifier: Apache-2.0 OR MIT
// Copyright (c) 2025-2026 naskel.com

//! Courier Publisher
//!
//! # Usage
//!
//! ```bash
//! # One topic, 10 rounds at 1 Hz
//! courier-publisher --name pub1
//!
//! # Three topics at 5 Hz on a custom endpoint
//! courier-publisher --name pub2 --port 6001 --num-topics 3 --frequency 5
//! ```

use clap::Parser;
use courier::DisseminationMode;
use courier_publisher::{Publisher, PublisherConfig};
use std::path::PathBuf;
use tracing::info;

/// Courier Publisher - registers topics and disseminates samples
#[derive(Parser, Debug)]
#[command(name = "courier-publisher")]
#[command(author, version, about, long_about = None)]
struct Args {
    /// Registration id
    #[arg(short, long, default_value = "pub")]
    name: String,

    /// Host to bind and advertise the data endpoint on
    #[arg(short, long, default_value = "localhost")]
    addr: String,

    /// Data endpoint port
    #[arg(short, long, default_value = "5577")]
    port: u16,

    /// Discovery service endpoint (host:port)
    #[arg(short, long, default_value = "localhost:5555")]
    discovery: String,

    /// Number of topics to publish
    #[arg(short = 'T', long, default_value = "1")]
    num_topics: usize,

    /// Explicit topics (repeatable), overrides --num-topics
    #[arg(short, long = "topic")]
    topics: Vec<String>,

    /// Rounds per second
    #[arg(short, long, default_value = "1")]
    frequency: f64,

    /// Number of rounds
    #[arg(short, long, default_value = "10")]
    iters: u32,

    /// Dissemination mode
    #[arg(long, value_enum, default_value_t = DisseminationMode::Broker)]
    dissemination: DisseminationMode,

    /// Data readers to wait for before publishing
    #[arg(long, default_value = "0")]
    min_subscribers: usize,

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
        PublisherConfig::from_file(&config_path)?
    } else {
        PublisherConfig {
            name: args.name,
            addr: args.addr,
            port: args.port,
            discovery: args.discovery,
            num_topics: args.num_topics,
            topics: (!args.topics.is_empty()).then_some(args.topics),
            frequency: args.frequency,
            iters: args.iters,
            dissemination: args.dissemination,
            min_subscribers: args.min_subscribers,
            ..Default::default()
        }
    };

    let mut publisher = Publisher::new(config);

    let stop = publisher.stop_handle();
    tokio::spawn(async move {
        tokio::signal::ctrl_c().await.ok();
        info!("Shutdown signal received, stopping publisher...");
        stop.stop();
    });

    let stats = publisher.run().await?;
    info!(
        "Publisher finished: {} rounds, {} samples",
        stats.rounds, stats.samples_sent
    );
    Ok(())
}
