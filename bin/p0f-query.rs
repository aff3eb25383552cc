//! Command-line client for the p0f API
//!
//! Asks a running p0f daemon what it knows about a host and prints the same
//! OS label a mail server would see, optionally followed by everything else
//! p0f reported.

use std::{path::PathBuf, time::Duration};

use anyhow::Context;
use chrono::{DateTime, Utc};
use clap::Parser;
use empath_p0f::{
    Client, Config, TracingSink, interpret, logging,
    protocol::{Query, Response},
};

/// Query a p0f daemon about a host
#[derive(Parser, Debug)]
#[command(name = "p0f-query")]
#[command(about = "Look up a host's OS in a running p0f daemon", long_about = None)]
#[command(version)]
struct Cli {
    /// Configuration file (TOML)
    #[arg(short, long)]
    config: Option<PathBuf>,

    /// Path to the p0f API socket, overriding the configuration
    #[arg(short, long)]
    socket: Option<PathBuf>,

    /// Seconds to wait for each socket operation, overriding the configuration
    #[arg(short, long)]
    timeout: Option<u64>,

    /// Print everything p0f knows about the host
    #[arg(short, long)]
    details: bool,

    /// IPv4 or IPv6 address of the host
    address: String,
}

/// Format a unix timestamp (seconds) as human readable
fn format_timestamp(timestamp: u32) -> String {
    if timestamp == 0 {
        return "never".to_string();
    }

    DateTime::<Utc>::from_timestamp(i64::from(timestamp), 0).map_or_else(
        || "unknown".to_string(),
        |dt| dt.format("%Y-%m-%d %H:%M:%S UTC").to_string(),
    )
}

fn or_none(value: &str) -> &str {
    if value.is_empty() { "???" } else { value }
}

fn print_details(response: &Response) {
    let match_quality = match (response.is_generic(), response.is_fuzzy()) {
        (false, false) => "exact",
        (true, false) => "generic",
        (false, true) => "fuzzy",
        (true, true) => "generic, fuzzy",
    };

    println!("First seen    = {}", format_timestamp(response.first_seen));
    println!("Last update   = {}", format_timestamp(response.last_seen));
    println!("Total conn    = {}", response.total_conn);
    println!(
        "Detected OS   = {} {} ({match_quality})",
        or_none(&response.os_name()),
        response.os_flavor()
    );
    println!(
        "HTTP software = {} {}{}",
        or_none(&response.http_name()),
        response.http_flavor(),
        if response.lies_about_software() {
            " (mismatch)"
        } else {
            ""
        }
    );
    println!("Network link  = {}", or_none(&response.link_type()));
    println!("Language      = {}", or_none(&response.language()));

    match response.distance() {
        Some(hops) => println!("Distance      = {hops}"),
        None => println!("Distance      = unknown"),
    }

    if response.uptime_min > 0 {
        println!(
            "Uptime        = {} days {} hrs {} min (modulo {} days)",
            response.uptime_min / 60 / 24,
            (response.uptime_min / 60) % 24,
            response.uptime_min % 60,
            response.up_mod_days
        );
    }

    println!("Last NAT      = {}", format_timestamp(response.last_nat));
    println!("Last OS chg   = {}", format_timestamp(response.last_chg));
}

fn main() -> anyhow::Result<()> {
    logging::init();

    let cli = Cli::parse();

    let config = match &cli.config {
        Some(path) => Config::load(path)
            .with_context(|| format!("Unable to load configuration from {}", path.display()))?,
        None => Config::default(),
    };

    let socket_path = cli
        .socket
        .or_else(|| config.socket_path.clone())
        .context("No p0f socket given (use --socket or socket_path in the configuration)")?;
    let timeout = cli
        .timeout
        .map_or_else(|| config.timeout(), Duration::from_secs);

    let client = Client::new(socket_path)?.with_timeout(timeout);
    let query = Query::parse(&cli.address)?;

    let runtime = tokio::runtime::Builder::new_current_thread()
        .enable_all()
        .build()?;
    let response = runtime.block_on(client.exchange(&query, &TracingSink))?;

    let lookup = interpret(response.as_ref(), &TracingSink);
    println!("{}", lookup.render(&config.sentinels));

    if cli.details {
        if let Some(response) = response.as_ref().filter(|r| r.has_valid_magic()) {
            print_details(response);
        }
    }

    Ok(())
}
