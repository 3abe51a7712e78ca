// src/server/initialization.rs

//! Handles server initialization: verifying the bootstrapped cluster, binding
//! the Unix socket, and writing the pid file.

use super::context::{RuntimeFiles, ServerContext};
use crate::config::Config;
use crate::core::cluster::SharedCluster;
use anyhow::{Context, Result, anyhow};
use std::io::ErrorKind;
use std::os::unix::fs::FileTypeExt;
use std::path::Path;
use tokio::net::UnixListener;
use tokio::sync::broadcast;
use tracing::{info, warn};

/// Initializes all server components before starting the main loop.
///
/// Returns `Ok(None)` when the local node is marked disconnected; such a node
/// has nothing to serve and the daemon exits cleanly.
pub fn setup(config: &Config, cluster: SharedCluster) -> Result<Option<ServerContext>> {
    {
        let state = cluster.lock();
        state
            .node_map
            .verify()
            .context("Invalid node map on stdin")?;
        if state.node_map.current_is_disconnected() {
            info!(
                "Node {} is disconnected, nothing to serve.",
                state.node_map.pnn
            );
            return Ok(None);
        }
        log_startup_info(config, state.node_map.len(), state.generation());
    }

    let (shutdown_tx, _) = broadcast::channel(1);
    let mut runtime_files = RuntimeFiles::default();

    let listener = bind_socket(&config.socket_path)?;
    runtime_files.socket_path = Some(config.socket_path.clone());
    info!("fake-ctdbd listening on {}", config.socket_path.display());

    if let Some(pidfile) = &config.pidfile {
        std::fs::write(pidfile, format!("{}\n", std::process::id()))
            .with_context(|| format!("Failed to create pid file {}", pidfile.display()))?;
        runtime_files.pidfile = Some(pidfile.clone());
    }

    Ok(Some(ServerContext {
        cluster,
        listener,
        shutdown_tx,
        runtime_files,
    }))
}

/// Binds the listening socket. A socket left behind by an earlier run is
/// replaced; anything else at the path is an error and is never touched.
fn bind_socket(path: &Path) -> Result<UnixListener> {
    match std::fs::symlink_metadata(path) {
        Ok(meta) if meta.file_type().is_socket() => {
            warn!("Removing stale socket {}", path.display());
            std::fs::remove_file(path)
                .with_context(|| format!("Failed to remove stale socket {}", path.display()))?;
        }
        Ok(_) => {
            return Err(anyhow!(
                "Failed to bind {}: path exists and is not a socket",
                path.display()
            ));
        }
        Err(e) if e.kind() == ErrorKind::NotFound => {}
        Err(e) => {
            return Err(e).with_context(|| format!("Failed to inspect {}", path.display()));
        }
    }
    UnixListener::bind(path).with_context(|| format!("Failed to bind {}", path.display()))
}

fn log_startup_info(config: &Config, nodes: usize, generation: u32) {
    info!(
        "Starting fake-ctdbd v{} (pid {})",
        env!("CARGO_PKG_VERSION"),
        std::process::id()
    );
    info!(
        "Cluster of {} nodes, generation {}, timeouts {}",
        nodes,
        generation,
        if config.simulate_timeouts {
            "simulated"
        } else {
            "ignored"
        }
    );
}
