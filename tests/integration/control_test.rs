// tests/integration/control_test.rs

//! End-to-end tests for the individual control handlers.

use super::test_helpers::{THREE_NODES, TestContext};
use fake_ctdbd::core::cluster::ClusterOptions;
use fake_ctdbd::core::protocol::{
    CTRL_FLAG_NOREPLY, ControlData, ControlOpcode, ReplyData, ReqControl,
};
use std::io::Write;
use std::net::SocketAddr;

#[tokio::test]
async fn test_get_pnn_on_each_connected_node() {
    let mut ctx = TestContext::new();
    let (mut client, _task) = ctx.connect();

    for pnn in [0u32, 1] {
        let reqid = client
            .send_control(pnn, ControlOpcode::GetPnn, ControlData::Empty)
            .await;
        let (header, reply) = client.read_reply(ControlOpcode::GetPnn).await;
        assert_eq!(header.reqid, reqid);
        assert_eq!(header.srcnode, pnn);
        assert_eq!(reply.status, pnn as i32);
    }

    // Node 2 is disconnected, so the request is silently dropped.
    client
        .send_control(2, ControlOpcode::GetPnn, ControlData::Empty)
        .await;
    client.assert_no_pending_reply().await;
}

#[tokio::test]
async fn test_get_pid_and_recmaster() {
    let mut ctx = TestContext::new();
    let (mut client, _task) = ctx.connect();

    let reply = client.control(ControlOpcode::GetPid, ControlData::Empty).await;
    assert_eq!(reply.status, std::process::id() as i32);

    let reply = client
        .control(ControlOpcode::GetRecmaster, ControlData::Empty)
        .await;
    assert_eq!(reply.status, 1);
}

#[tokio::test]
async fn test_process_exists() {
    let mut ctx = TestContext::new();
    let (mut client, _task) = ctx.connect();

    let own = std::process::id() as i32;
    let reply = client
        .control(ControlOpcode::ProcessExists, ControlData::Pid(own))
        .await;
    assert_eq!(reply.status, 0);

    let reply = client
        .control(ControlOpcode::ProcessExists, ControlData::Pid(0x7fff_fff0))
        .await;
    assert_eq!(reply.status, -1);
}

#[tokio::test]
async fn test_ping_counts_clients() {
    let mut ctx = TestContext::new();
    let (mut first, _t1) = ctx.connect();
    let reply = first.control(ControlOpcode::Ping, ControlData::Empty).await;
    assert_eq!(reply.status, 1);

    let (mut second, _t2) = ctx.connect();
    let reply = second.control(ControlOpcode::Ping, ControlData::Empty).await;
    assert_eq!(reply.status, 2);
}

#[tokio::test]
async fn test_get_vnnmap_and_recmode() {
    let mut ctx = TestContext::new();
    let (mut client, _task) = ctx.connect();

    let reply = client
        .control(ControlOpcode::GetVnnmap, ControlData::Empty)
        .await;
    let ReplyData::VnnMap(vnnmap) = reply.rdata else {
        panic!("expected a vnnmap, got {:?}", reply.rdata);
    };
    assert_eq!(vnnmap.generation, 654321);
    assert_eq!(vnnmap.map, vec![0, 1]);

    let reply = client
        .control(ControlOpcode::GetRecmode, ControlData::Empty)
        .await;
    assert_eq!(reply.status, 0);
}

#[tokio::test]
async fn test_set_recmode_normal_is_rejected() {
    let mut ctx = TestContext::new();
    let (mut client, _task) = ctx.connect();

    let reply = client
        .control(ControlOpcode::SetRecmode, ControlData::Recmode(0))
        .await;
    assert_eq!(reply.status, -1);
    assert_eq!(
        reply.errmsg.as_deref(),
        Some("Client cannot set recmode to NORMAL")
    );
}

#[tokio::test]
async fn test_register_and_deregister_srvid() {
    let mut ctx = TestContext::new();
    let (mut client, _task) = ctx.connect();

    let mut register = ReqControl::new(ControlOpcode::RegisterSrvid, ControlData::Empty);
    register.srvid = 0xABCD;
    let mut deregister = ReqControl::new(ControlOpcode::DeregisterSrvid, ControlData::Empty);
    deregister.srvid = 0xABCD;

    client
        .send_control_request(fake_ctdbd::core::protocol::CURRENT_NODE, register)
        .await;
    let (_, reply) = client.read_reply(ControlOpcode::RegisterSrvid).await;
    assert_eq!(reply.status, 0);
    assert!(ctx.cluster.lock().is_registered(0xABCD));

    client
        .send_control_request(fake_ctdbd::core::protocol::CURRENT_NODE, deregister.clone())
        .await;
    let (_, reply) = client.read_reply(ControlOpcode::DeregisterSrvid).await;
    assert_eq!(reply.status, 0);

    client
        .send_control_request(fake_ctdbd::core::protocol::CURRENT_NODE, deregister)
        .await;
    let (_, reply) = client.read_reply(ControlOpcode::DeregisterSrvid).await;
    assert_eq!(reply.status, -1);
    assert_eq!(reply.errmsg.as_deref(), Some("srvid not registered"));
}

#[tokio::test]
async fn test_get_nodemap() {
    let mut ctx = TestContext::new();
    let (mut client, _task) = ctx.connect();

    let reply = client
        .control(ControlOpcode::GetNodemap, ControlData::Empty)
        .await;
    let ReplyData::NodeMap(map) = reply.rdata else {
        panic!("expected a nodemap, got {:?}", reply.rdata);
    };
    assert_eq!(map.nodes.len(), 3);
    assert_eq!(map.nodes[2].pnn, 2);
    assert_eq!(map.nodes[2].flags, 0x1);
    assert_eq!(
        map.nodes[2].addr,
        "10.0.0.33:4379".parse::<SocketAddr>().unwrap()
    );
}

#[tokio::test]
async fn test_get_ifaces() {
    let mut ctx = TestContext::new();
    let (mut client, _task) = ctx.connect();

    let reply = client
        .control(ControlOpcode::GetIfaces, ControlData::Empty)
        .await;
    let ReplyData::IfaceList(list) = reply.rdata else {
        panic!("expected interfaces, got {:?}", reply.rdata);
    };
    assert_eq!(list.ifaces.len(), 2);
    assert_eq!(list.ifaces[0].name, "eth0");
    assert_eq!(list.ifaces[0].link_state, 1);
    assert_eq!(list.ifaces[0].references, 2);
    assert_eq!(list.ifaces[1].link_state, 0);
}

#[tokio::test]
async fn test_uptime_reports_start_time() {
    let mut ctx = TestContext::new();
    let (mut client, _task) = ctx.connect();

    let reply = client.control(ControlOpcode::Uptime, ControlData::Empty).await;
    let ReplyData::Uptime(uptime) = reply.rdata else {
        panic!("expected uptime, got {:?}", reply.rdata);
    };
    assert!(uptime.current_time.sec >= uptime.start_time.sec);
    assert_eq!(uptime.start_time, uptime.last_recovery_started);
}

#[tokio::test]
async fn test_get_capabilities_and_fake_timeout() {
    let text = THREE_NODES.replace("0 10.0.0.31 0x0", "0 10.0.0.31 0x0 TIMEOUT -CTDB_CAP_LMASTER");
    let mut ctx = TestContext::with_bootstrap(&text, ClusterOptions::default());
    let (mut client, _task) = ctx.connect();

    let reply = client
        .control(ControlOpcode::GetCapabilities, ControlData::Empty)
        .await;
    assert_eq!(reply.rdata, ReplyData::Capabilities(0x3));

    client
        .send_control(0, ControlOpcode::GetCapabilities, ControlData::Empty)
        .await;
    client.assert_no_pending_reply().await;
}

#[tokio::test]
async fn test_fake_timeout_can_be_disabled() {
    let text = THREE_NODES.replace("0 10.0.0.31 0x0", "0 10.0.0.31 0x0 TIMEOUT -CTDB_CAP_LMASTER");
    let options = ClusterOptions {
        simulate_timeouts: false,
        ..ClusterOptions::default()
    };
    let mut ctx = TestContext::with_bootstrap(&text, options);
    let (mut client, _task) = ctx.connect();

    client
        .send_control(0, ControlOpcode::GetCapabilities, ControlData::Empty)
        .await;
    let (_, reply) = client.read_reply(ControlOpcode::GetCapabilities).await;
    assert_eq!(reply.rdata, ReplyData::Capabilities(0x1));
}

#[tokio::test]
async fn test_unknown_opcode() {
    let mut ctx = TestContext::new();
    let (mut client, _task) = ctx.connect();

    let mut request = ReqControl::new(ControlOpcode::Ping, ControlData::Empty);
    request.opcode = 9999;
    client
        .send_control_request(fake_ctdbd::core::protocol::CURRENT_NODE, request.clone())
        .await;
    let (_, reply) = client.read_reply(ControlOpcode::Ping).await;
    assert_eq!(reply.status, -1);
    assert_eq!(reply.errmsg.as_deref(), Some("Not implemented"));

    request.flags = CTRL_FLAG_NOREPLY;
    client
        .send_control_request(fake_ctdbd::core::protocol::CURRENT_NODE, request)
        .await;
    client.assert_no_pending_reply().await;
}

#[tokio::test]
async fn test_nodes_file_read_and_reload() {
    let mut file = tempfile::NamedTempFile::new().unwrap();
    writeln!(file, "10.0.0.31\n10.0.0.32\n10.0.0.33\n# 10.0.0.34\n10.0.0.35").unwrap();
    let options = ClusterOptions {
        nodes_file: Some(file.path().to_path_buf()),
        ..ClusterOptions::default()
    };
    let mut ctx = TestContext::with_bootstrap(THREE_NODES, options);
    let (mut client, _task) = ctx.connect();

    let reply = client
        .control(ControlOpcode::GetNodesFile, ControlData::Empty)
        .await;
    let ReplyData::NodeMap(map) = reply.rdata else {
        panic!("expected a nodemap, got {:?}", reply.rdata);
    };
    assert_eq!(map.nodes.len(), 5);
    assert_eq!(map.nodes[3].flags, 0x10);

    let reply = client
        .control(ControlOpcode::ReloadNodesFile, ControlData::Empty)
        .await;
    assert_eq!(reply.status, 0);
    let after = ctx.cluster.lock().nodemap_snapshot();
    assert_eq!(after.nodes.len(), 5);
    assert_eq!(after.nodes[3].flags, 0x10);
    assert_eq!(after.nodes[4].addr, "10.0.0.35:4379".parse::<SocketAddr>().unwrap());

    // Reloading the same file again changes nothing.
    let reply = client
        .control(ControlOpcode::ReloadNodesFile, ControlData::Empty)
        .await;
    assert_eq!(reply.status, 0);
    assert_eq!(ctx.cluster.lock().nodemap_snapshot(), after);
}

#[tokio::test]
async fn test_nodes_file_failures() {
    let options = ClusterOptions {
        nodes_file: Some("/nonexistent/ctdb/nodes".into()),
        ..ClusterOptions::default()
    };
    let mut ctx = TestContext::with_bootstrap(THREE_NODES, options);
    let (mut client, _task) = ctx.connect();

    let reply = client
        .control(ControlOpcode::GetNodesFile, ControlData::Empty)
        .await;
    assert_eq!(reply.status, -1);
    assert_eq!(reply.errmsg.as_deref(), Some("Failed to read nodes file"));

    let reply = client
        .control(ControlOpcode::ReloadNodesFile, ControlData::Empty)
        .await;
    assert_eq!(reply.status, -1);
    assert_eq!(reply.errmsg.as_deref(), Some("Memory error"));
}
