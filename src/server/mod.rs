// src/server/mod.rs

use crate::config::Config;
use crate::core::cluster::{ClusterState, SharedCluster, parse_bootstrap};
use anyhow::{Context, Result};
use std::io::BufRead;

mod connection_loop;
mod context;
mod initialization;

/// The daemon startup function: reads the cluster description and serves it.
pub async fn run<R: BufRead>(config: Config, bootstrap: R) -> Result<()> {
    let bootstrap = parse_bootstrap(bootstrap).context("Failed to read cluster description")?;
    let cluster =
        ClusterState::from_bootstrap(bootstrap, config.to_cluster_options()).into_shared();
    serve(config, cluster).await
}

/// Serves an already-built cluster on the configured socket until shutdown.
pub async fn serve(config: Config, cluster: SharedCluster) -> Result<()> {
    // 1. Verify the cluster, bind the listener and write the pid file.
    let Some(server_context) = initialization::setup(&config, cluster)? else {
        return Ok(());
    };

    // 2. Accept clients until a signal or a SHUTDOWN control arrives.
    connection_loop::run(server_context).await
}
