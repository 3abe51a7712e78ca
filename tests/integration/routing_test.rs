// tests/integration/routing_test.rs

//! Tests for destination resolution and broadcast fan-out.

use super::test_helpers::TestContext;
use bytes::Bytes;
use fake_ctdbd::core::protocol::{
    BROADCAST_ALL, BROADCAST_CONNECTED, BROADCAST_VNNMAP, CURRENT_NODE, ControlData,
    ControlOpcode, ReqMessage,
};

#[tokio::test]
async fn test_broadcast_all_reaches_every_node() {
    let mut ctx = TestContext::new();
    let (mut client, _task) = ctx.connect();

    let reqid = client
        .send_control(BROADCAST_ALL, ControlOpcode::GetPnn, ControlData::Empty)
        .await;
    let mut answered = Vec::new();
    for _ in 0..3 {
        let (header, reply) = client.read_reply(ControlOpcode::GetPnn).await;
        assert_eq!(header.reqid, reqid);
        answered.push(reply.status);
    }
    assert_eq!(answered, vec![0, 1, 2]);
    client.assert_no_pending_reply().await;
}

#[tokio::test]
async fn test_broadcast_connected_skips_disconnected_nodes() {
    let mut ctx = TestContext::new();
    let (mut client, _task) = ctx.connect();

    client
        .send_control(BROADCAST_CONNECTED, ControlOpcode::GetPnn, ControlData::Empty)
        .await;
    let (_, first) = client.read_reply(ControlOpcode::GetPnn).await;
    let (_, second) = client.read_reply(ControlOpcode::GetPnn).await;
    assert_eq!((first.status, second.status), (0, 1));
    client.assert_no_pending_reply().await;
}

#[tokio::test]
async fn test_invalid_destinations_are_dropped() {
    let mut ctx = TestContext::new();
    let (mut client, _task) = ctx.connect();

    for destnode in [3, 42, BROADCAST_VNNMAP] {
        client
            .send_control(destnode, ControlOpcode::GetPnn, ControlData::Empty)
            .await;
    }
    client.assert_no_pending_reply().await;
}

#[tokio::test]
async fn test_current_node_placeholder_resolves_to_own_pnn() {
    let mut ctx = TestContext::new();
    let (mut client, _task) = ctx.connect();

    let reqid = client
        .send_control(CURRENT_NODE, ControlOpcode::GetPnn, ControlData::Empty)
        .await;
    let (header, reply) = client.read_reply(ControlOpcode::GetPnn).await;
    assert_eq!(header.reqid, reqid);
    assert_eq!(header.srcnode, 1);
    assert_eq!(header.destnode, 1);
    assert_eq!(reply.status, 1);
}

#[tokio::test]
async fn test_reply_carries_current_generation() {
    let mut ctx = TestContext::new();
    let (mut client, _task) = ctx.connect();

    client
        .send_control(CURRENT_NODE, ControlOpcode::Ping, ControlData::Empty)
        .await;
    let (header, _) = client.read_reply(ControlOpcode::Ping).await;
    assert_eq!(header.generation, 654321);
}

#[tokio::test]
async fn test_bad_packets_do_not_close_the_session() {
    let mut ctx = TestContext::new();
    let (mut client, task) = ctx.connect();

    let mut bad_magic = fake_ctdbd::core::protocol::ReqControl::new(
        ControlOpcode::GetPnn,
        ControlData::Empty,
    )
    .push(&fake_ctdbd::core::protocol::ReqHeader::new(
        fake_ctdbd::core::protocol::Operation::ReqControl,
        0,
        CURRENT_NODE,
        CURRENT_NODE,
        99,
    ))
    .to_vec();
    bad_magic[4] = 0;
    client.send_raw(&bad_magic).await;

    // A control whose declared payload runs past the end of the packet.
    let mut truncated = fake_ctdbd::core::protocol::ReqControl::new(
        ControlOpcode::GetPid,
        ControlData::Empty,
    )
    .push(&fake_ctdbd::core::protocol::ReqHeader::new(
        fake_ctdbd::core::protocol::Operation::ReqControl,
        0,
        CURRENT_NODE,
        CURRENT_NODE,
        100,
    ))
    .to_vec();
    let datalen_at = truncated.len() - 4;
    truncated[datalen_at..].copy_from_slice(&64u32.to_le_bytes());
    client.send_raw(&truncated).await;

    client.assert_no_pending_reply().await;
    assert!(!task.is_finished());
}

#[tokio::test]
async fn test_unhandled_message_is_ignored() {
    let mut ctx = TestContext::new();
    let (mut client, _task) = ctx.connect();

    client
        .send_message(CURRENT_NODE, ReqMessage::new(0x1234, Bytes::from_static(b"hi")))
        .await;
    client.assert_no_pending_reply().await;
}
