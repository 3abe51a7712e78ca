// src/core/handler/messages.rs

//! Message handlers, looked up by service id. Messages to any other service id
//! are accepted and ignored.

use super::context::HandlerContext;
use crate::core::FakeCtdbError;
use crate::core::protocol::{DisableMessage, ReqHeader, ReqMessage, SRVID_DISABLE_RECOVERIES};
use crate::core::tasks::OneShotTimer;
use once_cell::sync::Lazy;
use std::collections::HashMap;
use std::time::Duration;
use tracing::{debug, info};

type MessageHandler = fn(&mut HandlerContext<'_>, &ReqHeader, &ReqMessage);

static MESSAGE_HANDLERS: Lazy<HashMap<u64, MessageHandler>> = Lazy::new(|| {
    let mut table: HashMap<u64, MessageHandler> = HashMap::new();
    table.insert(SRVID_DISABLE_RECOVERIES, disable_recoveries);
    table
});

pub fn handle(ctx: &mut HandlerContext<'_>, packet: &[u8]) {
    let (header, request) = match ReqMessage::pull(packet) {
        Ok(parsed) => parsed,
        Err(e) => {
            debug!("Dropping malformed message: {}", e);
            return;
        }
    };
    debug!("request srvid = 0x{:x}", request.srvid);

    if let Some(handler) = MESSAGE_HANDLERS.get(&request.srvid) {
        handler(ctx, &header, &request);
    }
}

/// Disables recoveries on the destination node for `timeout` seconds, or
/// re-enables them when `timeout` is zero. Answers with the node's PNN, or -1
/// if the request could not be carried out.
fn disable_recoveries(ctx: &mut HandlerContext<'_>, header: &ReqHeader, request: &ReqMessage) {
    let disable: DisableMessage = match request.payload() {
        Ok(d) => d,
        Err(e) => {
            debug!("Dropping malformed disable message: {}", e);
            return;
        }
    };
    let pnn = header.destnode;

    let result = if disable.timeout == 0 {
        ctx.cluster.enable_recoveries(pnn).inspect(|_| {
            info!("Enabled recoveries on node {}", pnn);
        })
    } else {
        schedule_reenable(ctx, pnn, disable.timeout).inspect(|_| {
            info!(
                "Disabled recoveries for {} seconds on node {}",
                disable.timeout, pnn
            );
        })
    };

    let ret: i32 = match result {
        Ok(()) => pnn as i32,
        Err(e) => {
            debug!("Disable recoveries on node {} failed: {}", pnn, e);
            -1
        }
    };
    ctx.send_message(header, &ReqMessage::encode_payload(disable.srvid, &ret));
}

fn schedule_reenable(
    ctx: &mut HandlerContext<'_>,
    pnn: u32,
    timeout: u32,
) -> Result<(), FakeCtdbError> {
    // Check before arming so a bad PNN never leaves a timer running.
    ctx.cluster.get_node(pnn)?;
    let shared = ctx.shared.clone();
    let timer = OneShotTimer::schedule_after(Duration::from_secs(u64::from(timeout)), move |token| {
        shared.lock().expire_recovery_disable(pnn, token);
    });
    ctx.cluster.disable_recoveries(pnn, timer)
}
