// src/core/handler/controls.rs

//! Control request handlers, looked up by opcode.

use super::context::HandlerContext;
use crate::connection::SessionStatus;
use crate::core::cluster::nodes_file::load_nodes_file;
use crate::core::protocol::{
    ControlData, ControlOpcode, ReplyControl, ReplyData, ReqControl, ReqHeader,
};
use crate::core::tasks::{PendingReply, spawn_recovery};
use once_cell::sync::Lazy;
use std::collections::HashMap;
use tracing::{debug, info, warn};

/// What a handler wants done once it returns.
#[derive(Debug)]
pub enum ControlOutcome {
    Reply(ReplyControl),
    /// Nothing is sent for this request.
    NoReply,
    /// The reply will be sent later by a background task.
    Deferred,
}

type ControlHandler = fn(&mut HandlerContext<'_>, &ReqHeader, &ReqControl) -> ControlOutcome;

static CONTROL_HANDLERS: Lazy<HashMap<ControlOpcode, ControlHandler>> = Lazy::new(|| {
    let mut table: HashMap<ControlOpcode, ControlHandler> = HashMap::new();
    table.insert(ControlOpcode::ProcessExists, process_exists);
    table.insert(ControlOpcode::Ping, ping);
    table.insert(ControlOpcode::GetVnnmap, get_vnnmap);
    table.insert(ControlOpcode::GetRecmode, get_recmode);
    table.insert(ControlOpcode::SetRecmode, set_recmode);
    table.insert(ControlOpcode::RegisterSrvid, register_srvid);
    table.insert(ControlOpcode::DeregisterSrvid, deregister_srvid);
    table.insert(ControlOpcode::GetPid, get_pid);
    table.insert(ControlOpcode::GetRecmaster, get_recmaster);
    table.insert(ControlOpcode::GetPnn, get_pnn);
    table.insert(ControlOpcode::Shutdown, shutdown);
    table.insert(ControlOpcode::Uptime, uptime);
    table.insert(ControlOpcode::ReloadNodesFile, reload_nodes_file);
    table.insert(ControlOpcode::GetCapabilities, get_capabilities);
    table.insert(ControlOpcode::GetNodemap, get_nodemap);
    table.insert(ControlOpcode::GetIfaces, get_ifaces);
    table.insert(ControlOpcode::GetNodesFile, get_nodes_file);
    table
});

/// Decodes and answers one control request already addressed to a single node.
pub fn handle(ctx: &mut HandlerContext<'_>, packet: &[u8]) {
    let (header, request) = match ReqControl::pull(packet) {
        Ok(parsed) => parsed,
        Err(e) => {
            debug!("Dropping malformed control: {}", e);
            return;
        }
    };
    let opcode = ControlOpcode::from_repr(request.opcode);
    match opcode {
        Some(op) => debug!("request opcode = {} ({})", request.opcode, op),
        None => debug!("request opcode = {}", request.opcode),
    }

    let outcome = match opcode.and_then(|op| CONTROL_HANDLERS.get(&op)) {
        Some(handler) => handler(ctx, &header, &request),
        None => not_implemented(&request),
    };

    if let ControlOutcome::Reply(reply) = outcome {
        ctx.send_control(&header, &reply);
    }
}

fn not_implemented(request: &ReqControl) -> ControlOutcome {
    if !request.wants_reply() {
        return ControlOutcome::NoReply;
    }
    ControlOutcome::Reply(ReplyControl::error(request.opcode, -1, "Not implemented"))
}

fn process_exists(_: &mut HandlerContext<'_>, _: &ReqHeader, req: &ReqControl) -> ControlOutcome {
    let status = match req.rdata {
        // SAFETY: signal 0 performs only the existence and permission check.
        ControlData::Pid(pid) => unsafe { libc::kill(pid, 0) },
        _ => -1,
    };
    ControlOutcome::Reply(ReplyControl::ok(req.opcode, status))
}

fn ping(ctx: &mut HandlerContext<'_>, _: &ReqHeader, req: &ReqControl) -> ControlOutcome {
    ControlOutcome::Reply(ReplyControl::ok(
        req.opcode,
        ctx.cluster.num_clients() as i32,
    ))
}

fn get_vnnmap(ctx: &mut HandlerContext<'_>, _: &ReqHeader, req: &ReqControl) -> ControlOutcome {
    ControlOutcome::Reply(ReplyControl::with_data(
        req.opcode,
        ReplyData::VnnMap(ctx.cluster.vnnmap_snapshot()),
    ))
}

fn get_recmode(ctx: &mut HandlerContext<'_>, _: &ReqHeader, req: &ReqControl) -> ControlOutcome {
    ControlOutcome::Reply(ReplyControl::ok(
        req.opcode,
        ctx.cluster.recovery_mode() as i32,
    ))
}

fn set_recmode(
    ctx: &mut HandlerContext<'_>,
    header: &ReqHeader,
    req: &ReqControl,
) -> ControlOutcome {
    let ControlData::Recmode(mode) = req.rdata else {
        return ControlOutcome::Reply(ReplyControl::error(req.opcode, -1, "Missing recmode"));
    };
    if let Err(e) = ctx.cluster.set_recovery_mode(mode) {
        return ControlOutcome::Reply(ReplyControl::from_error(req.opcode, &e));
    }

    info!("Recovery mode set to ACTIVE, starting recovery");
    let pending = PendingReply::new(*header, req.opcode, ctx.session.outbound.clone());
    spawn_recovery(ctx.shared.clone(), pending);
    ControlOutcome::Deferred
}

fn register_srvid(ctx: &mut HandlerContext<'_>, _: &ReqHeader, req: &ReqControl) -> ControlOutcome {
    ctx.cluster.register_srvid(req.srvid);
    ControlOutcome::Reply(ReplyControl::ok(req.opcode, 0))
}

fn deregister_srvid(
    ctx: &mut HandlerContext<'_>,
    _: &ReqHeader,
    req: &ReqControl,
) -> ControlOutcome {
    let reply = match ctx.cluster.deregister_srvid(req.srvid) {
        Ok(()) => ReplyControl::ok(req.opcode, 0),
        Err(e) => ReplyControl::from_error(req.opcode, &e),
    };
    ControlOutcome::Reply(reply)
}

fn get_pid(_: &mut HandlerContext<'_>, _: &ReqHeader, req: &ReqControl) -> ControlOutcome {
    ControlOutcome::Reply(ReplyControl::ok(req.opcode, std::process::id() as i32))
}

fn get_recmaster(ctx: &mut HandlerContext<'_>, _: &ReqHeader, req: &ReqControl) -> ControlOutcome {
    ControlOutcome::Reply(ReplyControl::ok(
        req.opcode,
        ctx.cluster.node_map.recmaster as i32,
    ))
}

fn get_pnn(_: &mut HandlerContext<'_>, header: &ReqHeader, req: &ReqControl) -> ControlOutcome {
    ControlOutcome::Reply(ReplyControl::ok(req.opcode, header.destnode as i32))
}

fn shutdown(ctx: &mut HandlerContext<'_>, _: &ReqHeader, _: &ReqControl) -> ControlOutcome {
    info!("Shutdown requested by client");
    ctx.session.status = SessionStatus::ShutdownRequested;
    ControlOutcome::NoReply
}

fn uptime(ctx: &mut HandlerContext<'_>, _: &ReqHeader, req: &ReqControl) -> ControlOutcome {
    ControlOutcome::Reply(ReplyControl::with_data(
        req.opcode,
        ReplyData::Uptime(ctx.cluster.uptime()),
    ))
}

fn reload_nodes_file(
    ctx: &mut HandlerContext<'_>,
    header: &ReqHeader,
    req: &ReqControl,
) -> ControlOutcome {
    let fallback = ctx.cluster.options.nodes_file.clone();
    let result = load_nodes_file(header.destnode, fallback.as_deref())
        .and_then(|source| ctx.cluster.reload_nodes(&source));
    let reply = match result {
        Ok(()) => ReplyControl::ok(req.opcode, 0),
        Err(e) => {
            warn!("Reloading nodes file failed: {}", e);
            ReplyControl::error(req.opcode, -1, "Memory error")
        }
    };
    ControlOutcome::Reply(reply)
}

fn get_capabilities(
    ctx: &mut HandlerContext<'_>,
    header: &ReqHeader,
    req: &ReqControl,
) -> ControlOutcome {
    let node = match ctx.cluster.get_node(header.destnode) {
        Ok(node) => node,
        Err(e) => return ControlOutcome::Reply(ReplyControl::from_error(req.opcode, &e)),
    };
    if ctx.cluster.options.simulate_timeouts && node.fakes_timeout() {
        debug!("Node {} fakes a timeout, not replying", node.pnn);
        return ControlOutcome::NoReply;
    }
    ControlOutcome::Reply(ReplyControl::with_data(
        req.opcode,
        ReplyData::Capabilities(node.capabilities.bits()),
    ))
}

fn get_nodemap(ctx: &mut HandlerContext<'_>, _: &ReqHeader, req: &ReqControl) -> ControlOutcome {
    ControlOutcome::Reply(ReplyControl::with_data(
        req.opcode,
        ReplyData::NodeMap(ctx.cluster.nodemap_snapshot()),
    ))
}

fn get_ifaces(ctx: &mut HandlerContext<'_>, _: &ReqHeader, req: &ReqControl) -> ControlOutcome {
    ControlOutcome::Reply(ReplyControl::with_data(
        req.opcode,
        ReplyData::IfaceList(ctx.cluster.iface_snapshot()),
    ))
}

fn get_nodes_file(
    ctx: &mut HandlerContext<'_>,
    header: &ReqHeader,
    req: &ReqControl,
) -> ControlOutcome {
    let fallback = ctx.cluster.options.nodes_file.as_deref();
    let reply = match load_nodes_file(header.destnode, fallback) {
        Ok(map) => ReplyControl::with_data(req.opcode, ReplyData::NodeMap(map)),
        Err(e) => {
            debug!("{}", e);
            ReplyControl::error(req.opcode, -1, "Failed to read nodes file")
        }
    };
    ControlOutcome::Reply(reply)
}
