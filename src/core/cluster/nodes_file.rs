// src/core/cluster/nodes_file.rs

//! Reading the nodes file used by `RELOAD_NODES_FILE` and `GET_NODES_FILE`.
//!
//! One address per line. A line starting with `#` is a deleted node and keeps
//! its PNN; blank lines are ignored.

use super::node::{NodeFlags, parse_node_addr, zero_addr};
use crate::core::FakeCtdbError;
use crate::core::protocol::{NodeAndFlags, NodeMapData};
use std::ffi::OsString;
use std::path::{Path, PathBuf};
use tracing::debug;

/// Environment variable naming the nodes file for every node.
pub const NODES_ENV: &str = "CTDB_NODES";

/// Works out which nodes file applies to `pnn`: `CTDB_NODES_<pnn>`, then
/// `CTDB_NODES`, then `fallback`.
pub fn nodes_file_path(pnn: u32, fallback: Option<&Path>) -> Option<PathBuf> {
    resolve_nodes_file_path(pnn, fallback, |key| std::env::var_os(key))
}

/// Same as [`nodes_file_path`] with an injectable environment lookup.
pub fn resolve_nodes_file_path<F>(pnn: u32, fallback: Option<&Path>, lookup: F) -> Option<PathBuf>
where
    F: Fn(&str) -> Option<OsString>,
{
    lookup(&format!("{NODES_ENV}_{pnn}"))
        .or_else(|| lookup(NODES_ENV))
        .map(PathBuf::from)
        .or_else(|| fallback.map(Path::to_path_buf))
}

/// Parses nodes file contents. Any invalid address fails the whole file.
pub fn parse_nodes_file(contents: &str) -> Result<NodeMapData, FakeCtdbError> {
    let mut nodes = Vec::new();
    for line in contents.lines() {
        let entry = line.trim_matches([' ', '\t']);
        if entry.is_empty() {
            continue;
        }

        let (addr, flags) = if entry.starts_with('#') {
            (zero_addr(), NodeFlags::DELETED)
        } else {
            let addr = parse_node_addr(entry).ok_or_else(|| {
                FakeCtdbError::NodesFile(format!("Invalid IP address {entry}"))
            })?;
            (addr, NodeFlags::empty())
        };

        nodes.try_reserve(1)?;
        nodes.push(NodeAndFlags {
            pnn: nodes.len() as u32,
            flags: flags.bits(),
            addr,
        });
    }
    Ok(NodeMapData { nodes })
}

pub fn read_nodes_file(path: &Path) -> Result<NodeMapData, FakeCtdbError> {
    let contents = std::fs::read_to_string(path)
        .map_err(|e| FakeCtdbError::NodesFile(format!("{}: {e}", path.display())))?;
    parse_nodes_file(&contents)
}

/// Reads the nodes file that applies to `pnn`.
pub fn load_nodes_file(pnn: u32, fallback: Option<&Path>) -> Result<NodeMapData, FakeCtdbError> {
    let Some(path) = nodes_file_path(pnn, fallback) else {
        debug!("Nodes file not defined");
        return Err(FakeCtdbError::NodesFile("nodes file not defined".into()));
    };
    read_nodes_file(&path).inspect_err(|e| debug!("{}", e))
}
