// src/core/handler/context.rs

//! State handed to every control and message handler for one delivery.

use crate::connection::SessionState;
use crate::core::cluster::{ClusterState, SharedCluster};
use crate::core::protocol::{ReplyControl, ReqHeader, ReqMessage};
use tracing::debug;

/// Everything a handler may touch. `cluster` is the locked state; `shared` is
/// the handle that background work (timers, recoveries) captures to lock it
/// again later.
pub struct HandlerContext<'a> {
    pub cluster: &'a mut ClusterState,
    pub shared: &'a SharedCluster,
    pub session: &'a mut SessionState,
}

impl HandlerContext<'_> {
    /// Queues a control reply to the originator of `request`.
    pub fn send_control(&self, request: &ReqHeader, reply: &ReplyControl) {
        let header = request.reply_control(self.cluster.generation());
        debug!("reply opcode = {}", reply.opcode);
        if self.session.outbound.send(reply.push(&header)).is_err() {
            debug!("Dropping reply, session writer has gone away");
        }
    }

    /// Queues a message back to the originator of `request`.
    pub fn send_message(&self, request: &ReqHeader, message: &ReqMessage) {
        let header = request.reply_message(self.cluster.generation());
        debug!("message srvid = 0x{:x}", message.srvid);
        if self.session.outbound.send(message.push(&header)).is_err() {
            debug!("Dropping message, session writer has gone away");
        }
    }
}
