//! Listen for orderbook datagrams and print each decoded book.

use anyhow::{Context, Result};
use clap::Parser;
use orderbook_feed::{handler_fn, Feed, FeedConfig, OrderBookMessage, PriceLevel, StopHandle};
use std::net::IpAddr;
use std::time::Duration;
use tracing::info;
use tracing_subscriber::EnvFilter;

#[derive(Parser, Debug)]
#[command(name = "orderbook-listen", version, about)]
struct Cli {
    /// Listen address (default from ORDERBOOK_FEED_ADDR or 127.0.0.1)
    #[arg(long)]
    addr: Option<IpAddr>,
    /// Listen port (default from ORDERBOOK_FEED_PORT or 38201)
    #[arg(long)]
    port: Option<u16>,
    /// Largest accepted datagram in bytes
    #[arg(long)]
    max_size: Option<usize>,
    /// Stop-check interval for the blocking receive (ms)
    #[arg(long)]
    poll_ms: Option<u64>,
    /// Exit after this many messages have been dispatched
    #[arg(long)]
    count: Option<u64>,
    /// Drop datagrams that lack the schema file identifier
    #[arg(long, default_value_t = false)]
    require_identifier: bool,
}

fn format_level(level: Option<PriceLevel>) -> String {
    match level {
        Some(l) if !l.is_placeholder() => format!("{:.4}@{:.4}", l.qty, l.price),
        _ => "-".to_string(),
    }
}

fn print_book(msg: &OrderBookMessage<'_>) {
    println!(
        "{}\t{}\tbid {:.4}\task {:.4}\tbest bid {}\tbest ask {}",
        msg.id(),
        msg.pair(),
        msg.bid(),
        msg.ask(),
        format_level(msg.bids().first()),
        format_level(msg.asks().first()),
    );
}

fn main() -> Result<()> {
    tracing_subscriber::fmt()
        .with_env_filter(
            EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("info")),
        )
        .init();

    let cli = Cli::parse();

    let mut config = FeedConfig::from_env().context("reading environment")?;
    if let Some(addr) = cli.addr {
        config.listen_addr = addr;
    }
    if let Some(port) = cli.port {
        config.listen_port = port;
    }
    if let Some(size) = cli.max_size {
        config.max_datagram_size = size;
    }
    if let Some(ms) = cli.poll_ms {
        config.poll_interval = Duration::from_millis(ms);
    }
    if cli.require_identifier {
        config.verify_identifier = true;
    }

    let stop = StopHandle::new();
    let limit = cli.count;
    let mut seen = 0u64;
    let on_book = {
        let stop = stop.clone();
        handler_fn(move |msg| {
            print_book(msg);
            seen += 1;
            if limit.is_some_and(|n| seen >= n) {
                stop.stop();
            }
            Ok(())
        })
    };

    let feed = Feed::bind(&config, on_book)
        .with_context(|| format!("binding {}", config.socket_addr()))?
        .with_stop_handle(stop);
    info!(addr = %feed.local_addr()?, "listening for orderbook updates");

    let stats = feed.run()?;
    stats.log_summary();
    Ok(())
}
