// src/core/cluster/node.rs

//! Nodes and the ordered node map.

use crate::core::FakeCtdbError;
use crate::core::protocol::{NodeAndFlags, NodeMapData, UNKNOWN_PNN};
use crate::core::tasks::timer::OneShotTimer;
use bitflags::bitflags;
use std::net::{IpAddr, Ipv4Addr, SocketAddr};

/// The port a node listens on when its address does not name one.
pub const CTDB_PORT: u16 = 4379;

bitflags! {
    /// State flags of a node, as reported in a node map.
    #[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Default)]
    pub struct NodeFlags: u32 {
        const DISCONNECTED         = 0x0000_0001;
        const UNHEALTHY            = 0x0000_0002;
        const PERMANENTLY_DISABLED = 0x0000_0004;
        const BANNED               = 0x0000_0008;
        const DELETED              = 0x0000_0010;
        const STOPPED              = 0x0000_0020;
        /// Test-only: the node never answers `GET_CAPABILITIES`.
        const FAKE_TIMEOUT         = 0x8000_0000;

        const DISABLED = Self::UNHEALTHY.bits() | Self::PERMANENTLY_DISABLED.bits();
        const INACTIVE = Self::DELETED.bits()
            | Self::DISCONNECTED.bits()
            | Self::BANNED.bits()
            | Self::STOPPED.bits();
    }
}

bitflags! {
    /// Roles a node is able to take.
    #[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
    pub struct Capabilities: u32 {
        const RECMASTER = 0x0000_0001;
        const LMASTER   = 0x0000_0002;
    }
}

impl Default for Capabilities {
    fn default() -> Self {
        Capabilities::RECMASTER | Capabilities::LMASTER
    }
}

/// The address given to deleted nodes.
pub fn zero_addr() -> SocketAddr {
    SocketAddr::new(IpAddr::V4(Ipv4Addr::UNSPECIFIED), CTDB_PORT)
}

/// Parses `ip` or `ip:port`; a bare IP gets the default port.
pub fn parse_node_addr(s: &str) -> Option<SocketAddr> {
    if let Ok(ip) = s.parse::<IpAddr>() {
        return Some(SocketAddr::new(ip, CTDB_PORT));
    }
    s.parse::<SocketAddr>().ok()
}

/// A single cluster member.
#[derive(Debug)]
pub struct Node {
    pub addr: SocketAddr,
    pub pnn: u32,
    pub flags: NodeFlags,
    pub capabilities: Capabilities,
    pub recovery_disabled: bool,
    /// Re-enables recoveries on this node when it fires.
    pub recovery_timer: Option<OneShotTimer>,
}

impl Node {
    pub fn new(pnn: u32, addr: SocketAddr, flags: NodeFlags, capabilities: Capabilities) -> Self {
        Self {
            addr,
            pnn,
            flags,
            capabilities,
            recovery_disabled: false,
            recovery_timer: None,
        }
    }

    pub fn is_disconnected(&self) -> bool {
        self.flags.contains(NodeFlags::DISCONNECTED)
    }

    pub fn is_deleted(&self) -> bool {
        self.flags.contains(NodeFlags::DELETED)
    }

    pub fn fakes_timeout(&self) -> bool {
        self.flags.contains(NodeFlags::FAKE_TIMEOUT)
    }

    pub fn to_wire(&self) -> NodeAndFlags {
        NodeAndFlags {
            pnn: self.pnn,
            flags: self.flags.bits(),
            addr: self.addr,
        }
    }
}

/// The ordered node list. The node at index `i` always has PNN `i`.
#[derive(Debug)]
pub struct NodeMap {
    pub nodes: Vec<Node>,
    /// PNN of the node this daemon pretends to be.
    pub pnn: u32,
    pub recmaster: u32,
}

impl Default for NodeMap {
    fn default() -> Self {
        Self {
            nodes: Vec::new(),
            pnn: UNKNOWN_PNN,
            recmaster: UNKNOWN_PNN,
        }
    }
}

impl NodeMap {
    pub fn len(&self) -> usize {
        self.nodes.len()
    }

    pub fn is_empty(&self) -> bool {
        self.nodes.is_empty()
    }

    pub fn get(&self, pnn: u32) -> Option<&Node> {
        self.nodes.get(pnn as usize)
    }

    pub fn get_mut(&mut self, pnn: u32) -> Option<&mut Node> {
        self.nodes.get_mut(pnn as usize)
    }

    pub fn iter(&self) -> impl Iterator<Item = &Node> {
        self.nodes.iter()
    }

    /// Checks that PNNs run contiguously from zero.
    pub fn verify(&self) -> Result<(), FakeCtdbError> {
        for (i, node) in self.nodes.iter().enumerate() {
            if node.pnn as usize != i {
                return Err(FakeCtdbError::Setup(format!(
                    "Expected node {i}, found {}",
                    node.pnn
                )));
            }
        }
        Ok(())
    }

    /// Whether the node this daemon represents is flagged disconnected.
    pub fn current_is_disconnected(&self) -> bool {
        self.get(self.pnn).is_some_and(Node::is_disconnected)
    }

    pub fn snapshot(&self) -> NodeMapData {
        NodeMapData {
            nodes: self.nodes.iter().map(Node::to_wire).collect(),
        }
    }
}
