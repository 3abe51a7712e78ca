// src/main.rs

//! The main entry point for the fake-ctdbd daemon.

use anyhow::Result;
use fake_ctdbd::config::{Config, debug_level_filter};
use fake_ctdbd::server;
use std::env;
use std::path::PathBuf;
use tracing::error;
use tracing_subscriber::{filter::EnvFilter, prelude::*};

const USAGE: &str =
    "Usage: fake_ctdbd [-s SOCKET] [-p PIDFILE] [-d DEBUGLEVEL] [--config FILE] < cluster.txt";

#[tokio::main(flavor = "current_thread")]
async fn main() {
    if let Err(e) = run_app().await {
        error!("fake-ctdbd failed: {:#}", e);
        std::process::exit(1);
    }
}

/// Returns the value following a flag, exiting with a usage error if it is missing.
fn flag_value<'a>(args: &'a [String], short: &str, long: &str) -> Option<&'a str> {
    let index = args.iter().position(|arg| arg == short || arg == long)?;
    match args.get(index + 1) {
        Some(value) => Some(value.as_str()),
        None => {
            eprintln!("{long} flag requires a value\n{USAGE}");
            std::process::exit(1);
        }
    }
}

async fn run_app() -> Result<()> {
    const VERSION: &str = env!("CARGO_PKG_VERSION");

    let args: Vec<String> = env::args().collect();

    if args.contains(&"--version".to_string()) {
        println!("fake-ctdbd version {VERSION}");
        return Ok(());
    }
    if args.iter().any(|arg| arg == "-h" || arg == "--help") {
        println!("{USAGE}");
        return Ok(());
    }

    // An explicit config file is optional; every field has a default.
    let mut config = match flag_value(&args, "-c", "--config") {
        Some(path) => match Config::from_file(path) {
            Ok(cfg) => cfg,
            Err(e) => {
                eprintln!("Failed to load configuration from \"{path}\": {e:#}");
                std::process::exit(1);
            }
        },
        None => Config::default(),
    };

    if let Some(socket) = flag_value(&args, "-s", "--socket") {
        config.socket_path = PathBuf::from(socket);
    }
    if let Some(pidfile) = flag_value(&args, "-p", "--pidfile") {
        config.pidfile = Some(PathBuf::from(pidfile));
    }
    if let Some(level) = flag_value(&args, "-d", "--debug") {
        match debug_level_filter(level) {
            Some(filter) => config.log_level = filter.to_string(),
            None => {
                eprintln!("Invalid debug level \"{level}\"\n{USAGE}");
                std::process::exit(1);
            }
        }
    }
    if let Err(e) = config.validate() {
        eprintln!("{e}\n{USAGE}");
        std::process::exit(1);
    }

    // RUST_LOG wins over both --debug and the config file.
    let log_level = env::var("RUST_LOG").unwrap_or_else(|_| config.log_level.clone());
    tracing_subscriber::registry()
        .with(EnvFilter::try_new(&log_level).unwrap_or_else(|_| EnvFilter::new("error")))
        .with(
            tracing_subscriber::fmt::layer()
                .compact()
                .with_writer(std::io::stderr)
                .with_ansi(false),
        )
        .init();

    let stdin = std::io::stdin().lock();
    server::run(config, stdin).await
}
