// SPDX-License-Identifier: Apache-2.0 OR MIT
// Copyright (c) 2025-2026 naskel.com

//! Courier Subscriber
//!
//! # Usage
//!
//! ```bash
//! # Two topics, read through the broker until Ctrl-C
//! courier-subscriber --name sub1
//!
//! # Read weather straight from publishers, stop after 20 samples
//! courier-subscriber --name sub2 --topic weather --dissemination direct --max-samples 20
//! ```

use clap::Parser;
use courier::DisseminationMode;
use courier_subscriber::{Subscriber, SubscriberConfig};
use std::path::PathBuf;
use tracing::info;

/// Courier Subscriber - discovers data sources and consumes samples
#[derive(Parser, Debug)]
#[command(name = "courier-subscriber")]
#[command(author, version, about, long_about = None)]
struct Args {
    /// Registration id
    #[arg(short, long, default_value = "sub")]
    name: String,

    /// Host advertised at registration
    #[arg(short, long, default_value = "localhost")]
    addr: String,

    /// Discovery service endpoint (host:port)
    #[arg(short, long, default_value = "localhost:5555")]
    discovery: String,

    /// Number of topics to subscribe to
    #[arg(short = 'T', long, default_value = "2")]
    num_topics: usize,

    /// Explicit topics (repeatable), overrides --num-topics
    #[arg(short, long = "topic")]
    topics: Vec<String>,

    /// Dissemination mode
    #[arg(long, value_enum, default_value_t = DisseminationMode::Broker)]
    dissemination: DisseminationMode,

    /// Stop after this many samples
    #[arg(short, long)]
    max_samples: Option<u64>,

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
        SubscriberConfig::from_file(&config_path)?
    } else {
        SubscriberConfig {
            name: args.name,
            addr: args.addr,
            discovery: args.discovery,
            num_topics: args.num_topics,
            topics: (!args.topics.is_empty()).then_some(args.topics),
            dissemination: args.dissemination,
            max_samples: args.max_samples,
            ..Default::default()
        }
    };

    let mut subscriber = Subscriber::new(config);

    let stop = subscriber.stop_handle();
    tokio::spawn(async move {
        tokio::signal::ctrl_c().await.ok();
        info!("Shutdown signal received, stopping subscriber...");
        stop.stop();
    });

    let stats = subscriber.run().await?;
    info!(
        "Subscriber finished: {} received, {} filtered out",
        stats.received, stats.filtered_out
    );
    for (topic, count) in &stats.per_topic {
        info!("  {:12} {}", topic, count);
    }
    Ok(())
}
