// src/server/context.rs

use crate::core::cluster::SharedCluster;
use std::path::PathBuf;
use tokio::net::UnixListener;
use tokio::sync::broadcast;
use tracing::debug;

/// Holds all the initialized state required to run the server's main loop.
pub struct ServerContext {
    pub cluster: SharedCluster,
    pub listener: UnixListener,
    pub shutdown_tx: broadcast::Sender<()>,
    /// Removes the socket and pid file once the context is dropped.
    pub runtime_files: RuntimeFiles,
}

/// Paths created at startup that must not outlive the daemon.
#[derive(Debug, Default)]
pub struct RuntimeFiles {
    pub socket_path: Option<PathBuf>,
    pub pidfile: Option<PathBuf>,
}

impl Drop for RuntimeFiles {
    fn drop(&mut self) {
        for path in [self.socket_path.take(), self.pidfile.take()]
            .into_iter()
            .flatten()
        {
            if let Err(e) = std::fs::remove_file(&path) {
                debug!("Could not remove {}: {}", path.display(), e);
            }
        }
    }
}
