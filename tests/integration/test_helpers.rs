// tests/integration/test_helpers.rs

//! Test helpers and utilities for integration tests

#![allow(dead_code)]

use fake_ctdbd::config::Config;
use fake_ctdbd::connection::{ConnectionHandler, SessionStatus};
use fake_ctdbd::core::cluster::{ClusterOptions, ClusterState, SharedCluster, parse_bootstrap};
use fake_ctdbd::core::protocol::{
    CURRENT_NODE, ControlData, ControlOpcode, Operation, ReplyControl, ReqControl, ReqHeader,
    ReqMessage,
};
use std::time::Duration;
use tokio::io::{AsyncRead, AsyncReadExt, AsyncWrite, AsyncWriteExt, ReadHalf, WriteHalf};
use tokio::net::UnixStream;
use tokio::sync::broadcast;
use tokio::task::JoinHandle;
use tracing_subscriber::EnvFilter;
use tracing_subscriber::prelude::*;

/// Three nodes: node 1 is this node and the recovery master, node 2 is
/// disconnected.
pub const THREE_NODES: &str = "\
NODEMAP
0 10.0.0.31 0x0
1 10.0.0.32 0x0 CURRENT RECMASTER
2 10.0.0.33 0x1

IFACES
:Name:LinkStatus:References:
:eth0:1:2:
:eth1:0:0:

VNNMAP
654321
0
1
";

/// Sets up minimal tracing for tests, ignoring a subscriber that is already set.
pub fn init_tracing() {
    let _ = tracing_subscriber::registry()
        .with(EnvFilter::new("warn"))
        .with(tracing_subscriber::fmt::layer().with_test_writer())
        .try_init();
}

/// Builds a cluster from a bootstrap description.
pub fn cluster_from(text: &str, options: ClusterOptions) -> SharedCluster {
    let bootstrap = parse_bootstrap(text.as_bytes()).expect("bootstrap should parse");
    ClusterState::from_bootstrap(bootstrap, options).into_shared()
}

/// TestContext drives sessions against an in-process cluster. Clients talk to
/// a real `ConnectionHandler` over an in-memory duplex pipe.
pub struct TestContext {
    pub cluster: SharedCluster,
    pub shutdown_tx: broadcast::Sender<()>,
    next_session: u64,
}

impl TestContext {
    /// Creates a context for the default three-node cluster.
    pub fn new() -> Self {
        Self::with_bootstrap(THREE_NODES, ClusterOptions::default())
    }

    pub fn with_bootstrap(text: &str, options: ClusterOptions) -> Self {
        init_tracing();
        let (shutdown_tx, _) = broadcast::channel(1);
        Self {
            cluster: cluster_from(text, options),
            shutdown_tx,
            next_session: 0,
        }
    }

    /// Opens a new session and returns the client end plus the session task.
    pub fn connect(
        &mut self,
    ) -> (
        TestClient<tokio::io::DuplexStream>,
        JoinHandle<SessionStatus>,
    ) {
        self.next_session += 1;
        let (client, server) = tokio::io::duplex(64 * 1024);
        let handler = ConnectionHandler::new(
            server,
            self.cluster.clone(),
            self.next_session,
            self.shutdown_tx.subscribe(),
        );
        (TestClient::new(client), tokio::spawn(handler.run()))
    }
}

/// A minimal CTDB client speaking the wire protocol.
pub struct TestClient<S> {
    reader: ReadHalf<S>,
    writer: WriteHalf<S>,
    next_reqid: u32,
}

impl<S: AsyncRead + AsyncWrite> TestClient<S> {
    pub fn new(stream: S) -> Self {
        let (reader, writer) = tokio::io::split(stream);
        Self {
            reader,
            writer,
            next_reqid: 0,
        }
    }

    /// Sends a control request and returns its request id.
    pub async fn send_control(
        &mut self,
        destnode: u32,
        opcode: ControlOpcode,
        rdata: ControlData,
    ) -> u32 {
        self.send_control_request(destnode, ReqControl::new(opcode, rdata))
            .await
    }

    pub async fn send_control_request(&mut self, destnode: u32, request: ReqControl) -> u32 {
        self.next_reqid += 1;
        let header = ReqHeader::new(
            Operation::ReqControl,
            0,
            destnode,
            CURRENT_NODE,
            self.next_reqid,
        );
        self.send_raw(&request.push(&header)).await;
        self.next_reqid
    }

    pub async fn send_message(&mut self, destnode: u32, message: ReqMessage) {
        self.next_reqid += 1;
        let header = ReqHeader::new(
            Operation::ReqMessage,
            0,
            destnode,
            CURRENT_NODE,
            self.next_reqid,
        );
        self.send_raw(&message.push(&header)).await;
    }

    pub async fn send_raw(&mut self, bytes: &[u8]) {
        self.writer
            .write_all(bytes)
            .await
            .expect("write to daemon failed");
    }

    /// Reads one complete packet, length prefix included.
    pub async fn read_packet(&mut self) -> Vec<u8> {
        let len = self
            .reader
            .read_u32_le()
            .await
            .expect("daemon closed the connection") as usize;
        let mut buf = vec![0u8; len];
        buf[..4].copy_from_slice(&(len as u32).to_le_bytes());
        self.reader
            .read_exact(&mut buf[4..])
            .await
            .expect("short packet");
        buf
    }

    pub async fn read_reply(&mut self, opcode: ControlOpcode) -> (ReqHeader, ReplyControl) {
        let packet = self.read_packet().await;
        ReplyControl::pull(&packet, opcode as u32).expect("malformed control reply")
    }

    pub async fn read_message(&mut self) -> (ReqHeader, ReqMessage) {
        let packet = self.read_packet().await;
        ReqMessage::pull(&packet).expect("malformed message")
    }

    /// Sends a control to the current node and waits for its reply.
    pub async fn control(&mut self, opcode: ControlOpcode, rdata: ControlData) -> ReplyControl {
        let reqid = self.send_control(CURRENT_NODE, opcode, rdata).await;
        let (header, reply) = self.read_reply(opcode).await;
        assert_eq!(header.reqid, reqid, "reply to the wrong request");
        reply
    }

    /// Asserts nothing is pending by checking that a ping is the next reply.
    pub async fn assert_no_pending_reply(&mut self) {
        let reqid = self
            .send_control(CURRENT_NODE, ControlOpcode::Ping, ControlData::Empty)
            .await;
        let (header, _) = self.read_reply(ControlOpcode::Ping).await;
        assert_eq!(header.reqid, reqid, "unexpected reply before ping");
    }

    /// Returns true if the daemon closed the connection without sending more.
    /// Half-closes the connection; the daemon sees EOF but replies can still
    /// be read.
    pub async fn finish_writing(&mut self) {
        self.writer.shutdown().await.expect("shutdown write half");
    }

    pub async fn is_closed(&mut self) -> bool {
        let mut rest = Vec::new();
        matches!(self.reader.read_to_end(&mut rest).await, Ok(0))
    }
}

/// A daemon serving a cluster on a real Unix socket in a temporary directory.
pub struct TestServer {
    pub config: Config,
    pub cluster: SharedCluster,
    pub task: JoinHandle<anyhow::Result<()>>,
    _dir: tempfile::TempDir,
}

impl TestServer {
    pub async fn start(text: &str) -> Self {
        Self::start_with(text, |_| {}).await
    }

    /// Like `start`, but runs `prepare` against the configuration before the
    /// daemon is spawned.
    pub async fn start_with(text: &str, prepare: impl FnOnce(&Config)) -> Self {
        init_tracing();
        let dir = tempfile::tempdir().expect("tempdir");
        let config = Config {
            socket_path: dir.path().join("ctdbd.socket"),
            pidfile: Some(dir.path().join("ctdbd.pid")),
            ..Config::default()
        };
        prepare(&config);
        let cluster = cluster_from(text, config.to_cluster_options());
        let task = tokio::spawn(fake_ctdbd::server::serve(config.clone(), cluster.clone()));
        Self {
            config,
            cluster,
            task,
            _dir: dir,
        }
    }

    /// Connects to the daemon, retrying until the listener is up.
    pub async fn connect(&self) -> TestClient<UnixStream> {
        for _ in 0..100 {
            if let Ok(stream) = UnixStream::connect(&self.config.socket_path).await {
                return TestClient::new(stream);
            }
            tokio::time::sleep(Duration::from_millis(10)).await;
        }
        panic!(
            "daemon never listened on {}",
            self.config.socket_path.display()
        );
    }
}
