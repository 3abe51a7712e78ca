// src/core/handler/router.rs

//! Routes a framed packet to the node or nodes it is addressed to.
//!
//! The `Router` validates the header, resolves the current-node placeholder to
//! the session's PNN and fans broadcasts out one node at a time, in ascending
//! PNN order. The cluster lock is held for the whole packet so a broadcast is
//! handled as a single step.

use super::context::HandlerContext;
use super::{controls, messages};
use crate::connection::SessionState;
use crate::core::FakeCtdbError;
use crate::core::cluster::{ClusterState, SharedCluster};
use crate::core::protocol::{BROADCAST_ALL, BROADCAST_CONNECTED, Operation, ReqHeader};
use bytes::BytesMut;
use tracing::{debug, error};

pub struct Router<'a> {
    cluster: &'a SharedCluster,
    session: &'a mut SessionState,
}

impl<'a> Router<'a> {
    pub fn new(cluster: &'a SharedCluster, session: &'a mut SessionState) -> Self {
        Self { cluster, session }
    }

    /// Handles one complete packet and returns how many deliveries were made.
    /// Packets that fail validation are dropped without a reply.
    pub fn route(&mut self, mut packet: BytesMut) -> usize {
        let mut header = match validate(&packet) {
            Ok(header) => header,
            Err(e) => {
                debug!("Dropping packet: {}", e);
                return 0;
            }
        };
        header.fix_pnn(self.session.pnn);

        let mut cluster = self.cluster.lock();
        let destinations = resolve_destinations(&cluster, header.destnode);

        for pnn in &destinations {
            header.destnode = *pnn;
            if let Err(e) = header.rewrite(&mut packet) {
                debug!("Dropping packet: {}", e);
                return 0;
            }
            let mut ctx = HandlerContext {
                cluster: &mut cluster,
                shared: self.cluster,
                session: self.session,
            };
            dispatch(&mut ctx, &header, &packet);
        }
        destinations.len()
    }
}

/// Decodes the header and checks it against the frame it arrived in.
fn validate(packet: &[u8]) -> Result<ReqHeader, FakeCtdbError> {
    let header = ReqHeader::pull(packet)?;
    if header.length as usize != packet.len() {
        return Err(FakeCtdbError::LengthMismatch {
            declared: header.length as usize,
            actual: packet.len(),
        });
    }
    header.verify(None)?;
    Ok(header)
}

/// The PNNs a packet addressed to `destnode` is delivered to.
pub fn resolve_destinations(cluster: &ClusterState, destnode: u32) -> Vec<u32> {
    let nodes = &cluster.node_map;
    match destnode {
        BROADCAST_ALL => nodes.iter().map(|n| n.pnn).collect(),
        BROADCAST_CONNECTED => nodes
            .iter()
            .filter(|n| !n.is_disconnected())
            .map(|n| n.pnn)
            .collect(),
        pnn => match nodes.get(pnn) {
            None => {
                error!("Invalid destination pnn 0x{:x}", pnn);
                Vec::new()
            }
            Some(node) if node.is_disconnected() => {
                error!("Packet for disconnected node pnn {}", pnn);
                Vec::new()
            }
            Some(_) => vec![pnn],
        },
    }
}

fn dispatch(ctx: &mut HandlerContext<'_>, header: &ReqHeader, packet: &[u8]) {
    match header.operation() {
        Some(Operation::ReqControl) => controls::handle(ctx, packet),
        Some(Operation::ReqMessage) => messages::handle(ctx, packet),
        _ => debug!("Ignoring packet with operation {}", header.operation),
    }
}
