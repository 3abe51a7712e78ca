// src/core/cluster/bootstrap.rs

//! Parses the textual cluster description the daemon reads on startup.
//!
//! The input is a sequence of sections, each introduced by a marker line and
//! terminated by a blank line or end of input:
//!
//! ```text
//! NODEMAP
//! 0       192.168.20.41   0x0     CURRENT RECMASTER
//! 1       192.168.20.42   0x0
//! 2       192.168.20.43   0x1     -CTDB_CAP_LMASTER
//!
//! IFACES
//! :Name:LinkStatus:References:
//! :eth2:1:2:
//!
//! VNNMAP
//! 654321
//! 0
//! 1
//! ```

use super::iface::{Interface, InterfaceMap};
use super::node::{Capabilities, Node, NodeFlags, NodeMap, parse_node_addr, zero_addr};
use super::state::{ClusterOptions, ClusterState};
use super::vnnmap::VnnMap;
use crate::core::FakeCtdbError;
use std::io::{self, BufRead};
use tracing::{debug, warn};

const IFACES_HEADER: &str = ":Name:LinkStatus:References:";

/// The maps described by the startup input, before any runtime state is added.
#[derive(Debug, Default)]
pub struct Bootstrap {
    pub node_map: NodeMap,
    pub iface_map: InterfaceMap,
    pub vnn_map: VnnMap,
}

/// Parses an unsigned number the way `strtoul(s, NULL, 0)` does: `0x` prefix
/// for hex, a leading `0` for octal, decimal otherwise.
pub fn parse_c_number(s: &str) -> Option<u32> {
    let s = s.trim();
    if let Some(hex) = s.strip_prefix("0x").or_else(|| s.strip_prefix("0X")) {
        u32::from_str_radix(hex, 16).ok()
    } else if s.len() > 1 && s.starts_with('0') {
        u32::from_str_radix(&s[1..], 8).ok()
    } else {
        s.parse().ok()
    }
}

/// Reads every section from `reader`. An unknown section marker is fatal;
/// malformed lines inside a section are reported and skipped.
pub fn parse_bootstrap<R: BufRead>(reader: R) -> Result<Bootstrap, FakeCtdbError> {
    let mut bootstrap = Bootstrap::default();
    let mut lines = reader.lines();

    while let Some(line) = lines.next() {
        let line = line?;
        match line.trim() {
            "" => continue,
            "NODEMAP" => parse_nodemap(&mut lines, &mut bootstrap.node_map)?,
            "IFACES" => parse_ifaces(&mut lines, &mut bootstrap.iface_map)?,
            "VNNMAP" => parse_vnnmap(&mut lines, &mut bootstrap.vnn_map)?,
            other => {
                return Err(FakeCtdbError::Setup(format!("Unknown line {other}")));
            }
        }
    }

    Ok(bootstrap)
}

/// Yields the lines of the current section, stopping at a blank line.
fn section_lines<I>(lines: &mut I) -> impl Iterator<Item = io::Result<String>> + '_
where
    I: Iterator<Item = io::Result<String>>,
{
    lines.map_while(|line| match line {
        Ok(l) if l.trim().is_empty() => None,
        other => Some(other),
    })
}

fn parse_nodemap<I>(lines: &mut I, node_map: &mut NodeMap) -> Result<(), FakeCtdbError>
where
    I: Iterator<Item = io::Result<String>>,
{
    for line in section_lines(lines) {
        let line = line?;
        let mut tokens = line.split_whitespace();

        let Some(pnn) = tokens.next().and_then(parse_c_number) else {
            warn!("bad line ({}) - missing PNN", line);
            continue;
        };
        let Some(mut addr) = tokens.next().and_then(parse_node_addr) else {
            warn!("bad line ({}) - missing or invalid IP", line);
            continue;
        };
        let Some(raw_flags) = tokens.next().and_then(parse_c_number) else {
            warn!("bad line ({}) - missing flags", line);
            continue;
        };

        let mut flags = NodeFlags::from_bits_retain(raw_flags);
        if flags.contains(NodeFlags::DELETED) {
            addr = zero_addr();
        }
        let mut capabilities = Capabilities::default();

        for token in tokens {
            match token {
                "CURRENT" => node_map.pnn = pnn,
                "RECMASTER" => node_map.recmaster = pnn,
                "-CTDB_CAP_RECMASTER" => capabilities.remove(Capabilities::RECMASTER),
                "-CTDB_CAP_LMASTER" => capabilities.remove(Capabilities::LMASTER),
                "TIMEOUT" => flags |= NodeFlags::FAKE_TIMEOUT,
                other => debug!("Ignoring unknown node token {}", other),
            }
        }

        node_map.nodes.try_reserve(1)?;
        node_map.nodes.push(Node::new(pnn, addr, flags, capabilities));
    }

    debug!("Parsing nodemap done");
    Ok(())
}

fn parse_ifaces<I>(lines: &mut I, iface_map: &mut InterfaceMap) -> Result<(), FakeCtdbError>
where
    I: Iterator<Item = io::Result<String>>,
{
    for line in section_lines(lines) {
        let line = line?;
        if line.trim() == IFACES_HEADER {
            continue;
        }

        let mut fields = line.trim().split(':').filter(|f| !f.is_empty());
        let Some(name) = fields.next() else {
            warn!("bad line ({}) - missing name", line);
            continue;
        };
        let Some(link_state) = fields.next().and_then(parse_c_number) else {
            warn!("bad line ({}) - missing link state", line);
            continue;
        };
        let Some(references) = fields.next().and_then(parse_c_number) else {
            warn!("bad line ({}) - missing references", line);
            continue;
        };

        iface_map.ifaces.try_reserve(1)?;
        iface_map.ifaces.push(Interface {
            name: name.to_string(),
            link_up: link_state as u16 != 0,
            references,
        });
    }

    debug!("Parsing interfaces done");
    Ok(())
}

fn parse_vnnmap<I>(lines: &mut I, vnn_map: &mut VnnMap) -> Result<(), FakeCtdbError>
where
    I: Iterator<Item = io::Result<String>>,
{
    let mut have_generation = false;
    for line in section_lines(lines) {
        let line = line?;
        let Some(n) = parse_c_number(&line) else {
            warn!("bad line ({}) - not a number", line);
            continue;
        };
        if !have_generation {
            vnn_map.generation = n;
            have_generation = true;
            continue;
        }
        vnn_map.map.try_reserve(1)?;
        vnn_map.map.push(n);
    }

    debug!("Parsing vnnmap done");
    Ok(())
}

impl ClusterState {
    pub fn from_bootstrap(bootstrap: Bootstrap, options: ClusterOptions) -> Self {
        ClusterState::new(
            bootstrap.node_map,
            bootstrap.iface_map,
            bootstrap.vnn_map,
            options,
        )
    }
}
