// src/core/cluster/mod.rs

//! The simulated cluster: nodes, interfaces, the vnn map and the runtime state
//! that control handlers read and mutate.

pub mod bootstrap;
pub mod iface;
pub mod node;
pub mod nodes_file;
pub mod state;
pub mod vnnmap;

pub use bootstrap::{Bootstrap, parse_bootstrap};
pub use iface::{Interface, InterfaceMap};
pub use node::{CTDB_PORT, Capabilities, Node, NodeFlags, NodeMap};
pub use state::{ClusterOptions, ClusterState, SharedCluster};
pub use vnnmap::{RecoveryMode, VnnMap, next_generation};
