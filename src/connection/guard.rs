// src/connection/guard.rs

//! Defines `ConnectionGuard`, an RAII guard for connection resource management.

use crate::core::cluster::SharedCluster;
use tracing::debug;

/// Counts a client as connected for as long as the guard lives. The count is
/// what `PING` reports.
pub struct ConnectionGuard {
    cluster: SharedCluster,
    session_id: u64,
}

impl ConnectionGuard {
    pub(crate) fn new(cluster: SharedCluster, session_id: u64) -> Self {
        let clients = {
            let mut state = cluster.lock();
            state.client_connected();
            state.num_clients()
        };
        debug!("New client {} ({} connected)", session_id, clients);
        Self {
            cluster,
            session_id,
        }
    }
}

impl Drop for ConnectionGuard {
    fn drop(&mut self) {
        let mut state = self.cluster.lock();
        state.client_disconnected();
        debug!(
            "Client {} done ({} still connected)",
            self.session_id,
            state.num_clients()
        );
    }
}
