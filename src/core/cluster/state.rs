// src/core/cluster/state.rs

//! The in-memory model of the simulated cluster: node map, interfaces, vnn map,
//! recovery timestamps, service-id registrations and connected clients.

use super::iface::InterfaceMap;
use super::node::{Capabilities, Node, NodeFlags, NodeMap, zero_addr};
use super::vnnmap::{RecoveryMode, VnnMap};
use crate::core::FakeCtdbError;
use crate::core::protocol::{
    INVALID_GENERATION, IfaceListData, NodeMapData, UptimeData, VnnMapData,
};
use crate::core::tasks::timer::OneShotTimer;
use chrono::{DateTime, Utc};
use parking_lot::Mutex;
use std::collections::HashMap;
use std::path::PathBuf;
use std::sync::Arc;
use std::time::Duration;
use tracing::{debug, info, warn};

/// The cluster model shared by every session and background task. The lock is
/// only ever taken synchronously and never held across an `.await`.
pub type SharedCluster = Arc<Mutex<ClusterState>>;

/// Runtime knobs that shape how the simulated cluster behaves.
#[derive(Debug, Clone)]
pub struct ClusterOptions {
    /// Fallback nodes file when no `CTDB_NODES*` variable is set.
    pub nodes_file: Option<PathBuf>,
    /// Honour the fake-timeout node flag by not answering `GET_CAPABILITIES`.
    pub simulate_timeouts: bool,
    /// Delay between recovery polls, and before a recovery completes.
    pub recovery_poll_interval: Duration,
}

impl Default for ClusterOptions {
    fn default() -> Self {
        Self {
            nodes_file: None,
            simulate_timeouts: true,
            recovery_poll_interval: Duration::from_secs(1),
        }
    }
}

#[derive(Debug)]
pub struct ClusterState {
    pub node_map: NodeMap,
    pub iface_map: InterfaceMap,
    pub vnn_map: VnnMap,
    /// Service id -> number of outstanding registrations.
    registrations: HashMap<u64, usize>,
    num_clients: u32,
    pub start_time: DateTime<Utc>,
    pub recovery_start_time: DateTime<Utc>,
    pub recovery_end_time: DateTime<Utc>,
    pub options: ClusterOptions,
}

impl ClusterState {
    /// Builds a serving cluster from parsed maps. The recovery mode starts out
    /// NORMAL and an unset generation is replaced with a fresh one.
    pub fn new(
        node_map: NodeMap,
        iface_map: InterfaceMap,
        mut vnn_map: VnnMap,
        options: ClusterOptions,
    ) -> Self {
        let now = Utc::now();
        vnn_map.recmode = RecoveryMode::Normal;
        if vnn_map.generation == INVALID_GENERATION {
            vnn_map.roll_generation();
        }
        Self {
            node_map,
            iface_map,
            vnn_map,
            registrations: HashMap::new(),
            num_clients: 0,
            start_time: now,
            recovery_start_time: now,
            recovery_end_time: now,
            options,
        }
    }

    pub fn into_shared(self) -> SharedCluster {
        Arc::new(Mutex::new(self))
    }

    pub fn pnn(&self) -> u32 {
        self.node_map.pnn
    }

    pub fn generation(&self) -> u32 {
        self.vnn_map.generation
    }

    pub fn get_node(&self, pnn: u32) -> Result<&Node, FakeCtdbError> {
        self.node_map.get(pnn).ok_or(FakeCtdbError::OutOfRange(pnn))
    }

    pub fn get_node_mut(&mut self, pnn: u32) -> Result<&mut Node, FakeCtdbError> {
        self.node_map
            .get_mut(pnn)
            .ok_or(FakeCtdbError::OutOfRange(pnn))
    }

    // --- Recovery ---

    /// Applies a client request to change the recovery mode. Only a switch to
    /// ACTIVE is accepted; the caller is responsible for driving the recovery
    /// that brings the mode back to NORMAL.
    pub fn set_recovery_mode(&mut self, mode: u32) -> Result<(), FakeCtdbError> {
        if mode == RecoveryMode::Normal as u32 {
            return Err(FakeCtdbError::Usage(
                "Client cannot set recmode to NORMAL".into(),
            ));
        }
        self.vnn_map.recmode = RecoveryMode::Active;
        Ok(())
    }

    pub fn recovery_mode(&self) -> RecoveryMode {
        self.vnn_map.recmode
    }

    pub fn begin_recovery(&mut self) {
        self.recovery_start_time = Utc::now();
        debug!("Recovery started");
    }

    /// Ends a recovery cycle: back to NORMAL with a new generation.
    pub fn finish_recovery(&mut self) {
        let old = self.vnn_map.generation;
        self.vnn_map.recmode = RecoveryMode::Normal;
        self.recovery_end_time = Utc::now();
        self.vnn_map.roll_generation();
        info!(
            "Recovery finished, generation {} -> {}",
            old, self.vnn_map.generation
        );
    }

    pub fn any_recovery_disabled(&self) -> bool {
        self.node_map.iter().any(|n| n.recovery_disabled)
    }

    /// Marks recoveries disabled on `pnn` until `timer` fires. A timer already
    /// installed on the node is cancelled.
    pub fn disable_recoveries(
        &mut self,
        pnn: u32,
        timer: OneShotTimer,
    ) -> Result<(), FakeCtdbError> {
        let node = self.get_node_mut(pnn)?;
        node.recovery_disabled = true;
        node.recovery_timer = Some(timer);
        Ok(())
    }

    pub fn enable_recoveries(&mut self, pnn: u32) -> Result<(), FakeCtdbError> {
        let node = self.get_node_mut(pnn)?;
        node.recovery_disabled = false;
        node.recovery_timer = None;
        Ok(())
    }

    /// Called by a disable-recoveries timer when it fires. Does nothing if the
    /// timer has since been replaced or cleared.
    pub fn expire_recovery_disable(&mut self, pnn: u32, token: u64) {
        let Some(node) = self.node_map.get_mut(pnn) else {
            return;
        };
        if node.recovery_timer.as_ref().map(OneShotTimer::token) != Some(token) {
            return;
        }
        if let Some(timer) = node.recovery_timer.take() {
            timer.disarm();
        }
        node.recovery_disabled = false;
        debug!("Recoveries re-enabled on node {} after timeout", pnn);
    }

    // --- Service ids ---

    pub fn register_srvid(&mut self, srvid: u64) {
        *self.registrations.entry(srvid).or_insert(0) += 1;
        debug!("Register srvid 0x{:x}", srvid);
    }

    pub fn deregister_srvid(&mut self, srvid: u64) -> Result<(), FakeCtdbError> {
        let Some(count) = self.registrations.get_mut(&srvid) else {
            return Err(FakeCtdbError::NotRegistered(srvid));
        };
        *count -= 1;
        if *count == 0 {
            self.registrations.remove(&srvid);
        }
        debug!("Deregister srvid 0x{:x}", srvid);
        Ok(())
    }

    pub fn is_registered(&self, srvid: u64) -> bool {
        self.registrations.contains_key(&srvid)
    }

    // --- Clients ---

    pub fn client_connected(&mut self) {
        self.num_clients += 1;
    }

    pub fn client_disconnected(&mut self) {
        self.num_clients = self.num_clients.saturating_sub(1);
    }

    pub fn num_clients(&self) -> u32 {
        self.num_clients
    }

    // --- Node map reload ---

    /// Merges a freshly read nodes file into the node map. Existing nodes are
    /// never removed or renumbered; the map only grows.
    pub fn reload_nodes(&mut self, source: &NodeMapData) -> Result<(), FakeCtdbError> {
        for (i, entry) in source.nodes.iter().enumerate() {
            let pnn = i as u32;
            let deleted = NodeFlags::from_bits_retain(entry.flags).contains(NodeFlags::DELETED);

            if let Some(node) = self.node_map.get_mut(pnn) {
                if node.addr == entry.addr {
                    continue;
                }
                if deleted {
                    node.flags |= NodeFlags::DELETED;
                    node.addr = zero_addr();
                    info!("Node {} deleted", pnn);
                } else if node.is_deleted() {
                    node.flags.remove(NodeFlags::DELETED);
                    node.addr = entry.addr;
                    info!("Node {} re-added at {}", pnn, entry.addr);
                } else {
                    warn!(
                        "Ignoring address change for live node {} ({} -> {})",
                        pnn, node.addr, entry.addr
                    );
                }
                continue;
            }

            self.node_map.nodes.try_reserve(1)?;
            let (addr, flags) = if deleted {
                (zero_addr(), NodeFlags::DELETED)
            } else {
                (entry.addr, NodeFlags::empty())
            };
            self.node_map
                .nodes
                .push(Node::new(pnn, addr, flags, Capabilities::default()));
            info!("Node {} added at {}", pnn, addr);
        }
        Ok(())
    }

    // --- Snapshots ---

    pub fn vnnmap_snapshot(&self) -> VnnMapData {
        self.vnn_map.snapshot()
    }

    pub fn nodemap_snapshot(&self) -> NodeMapData {
        self.node_map.snapshot()
    }

    pub fn iface_snapshot(&self) -> IfaceListData {
        self.iface_map.snapshot()
    }

    pub fn uptime(&self) -> UptimeData {
        UptimeData {
            current_time: Utc::now().into(),
            start_time: self.start_time.into(),
            last_recovery_started: self.recovery_start_time.into(),
            last_recovery_finished: self.recovery_end_time.into(),
        }
    }
}
