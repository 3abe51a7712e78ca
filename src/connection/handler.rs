// src/connection/handler.rs

//! Defines the `ConnectionHandler` which manages the full lifecycle of a client connection.

use super::guard::ConnectionGuard;
use super::session::{SessionState, SessionStatus};
use crate::core::FakeCtdbError;
use crate::core::cluster::SharedCluster;
use crate::core::handler::Router;
use crate::core::protocol::PacketCodec;
use bytes::Bytes;
use futures::{SinkExt, StreamExt};
use tokio::io::{AsyncRead, AsyncWrite, ReadHalf, WriteHalf};
use tokio::sync::{broadcast, mpsc};
use tokio_util::codec::{FramedRead, FramedWrite};
use tracing::{debug, info, warn};

/// Manages the full lifecycle of a client connection: framing inbound packets,
/// routing them, and writing queued replies back.
pub struct ConnectionHandler<S> {
    reader: FramedRead<ReadHalf<S>, PacketCodec>,
    writer: FramedWrite<WriteHalf<S>, PacketCodec>,
    outbound_rx: mpsc::UnboundedReceiver<Bytes>,
    cluster: SharedCluster,
    session: SessionState,
    shutdown_rx: broadcast::Receiver<()>,
}

impl<S> ConnectionHandler<S>
where
    S: AsyncRead + AsyncWrite,
{
    pub fn new(
        stream: S,
        cluster: SharedCluster,
        session_id: u64,
        shutdown_rx: broadcast::Receiver<()>,
    ) -> Self {
        let pnn = cluster.lock().pnn();
        let (read_half, write_half) = tokio::io::split(stream);
        let (outbound_tx, outbound_rx) = mpsc::unbounded_channel();
        Self {
            reader: FramedRead::new(read_half, PacketCodec),
            writer: FramedWrite::new(write_half, PacketCodec),
            outbound_rx,
            cluster,
            session: SessionState::new(session_id, pnn, outbound_tx),
            shutdown_rx,
        }
    }

    /// The main event loop for the connection. Serves requests until the peer
    /// hangs up, the transport fails, or the daemon shuts down, then returns the
    /// status the session ended with. A `SHUTDOWN` only marks the status; the
    /// requests pipelined behind it are still answered.
    pub async fn run(mut self) -> SessionStatus {
        let _guard = ConnectionGuard::new(self.cluster.clone(), self.session.session_id);
        let session_id = self.session.session_id;

        loop {
            tokio::select! {
                biased;
                _ = self.shutdown_rx.recv() => {
                    info!("Session {} closing for server shutdown.", session_id);
                    break;
                }
                Some(packet) = self.outbound_rx.recv() => {
                    if let Err(e) = self.writer.send(packet).await {
                        log_disconnect(session_id, &e);
                        return self.session.status;
                    }
                }
                result = self.reader.next() => {
                    match result {
                        Some(Ok(packet)) => {
                            Router::new(&self.cluster, &mut self.session).route(packet);
                        }
                        Some(Err(e)) => {
                            log_disconnect(session_id, &e);
                            break;
                        }
                        None => {
                            debug!("Session {} closed by peer.", session_id);
                            break;
                        }
                    }
                }
            }
        }

        self.flush_outbound().await;
        self.session.status
    }

    /// Writes whatever replies are already queued before the session goes away.
    async fn flush_outbound(&mut self) {
        while let Ok(packet) = self.outbound_rx.try_recv() {
            if let Err(e) = self.writer.send(packet).await {
                log_disconnect(self.session.session_id, &e);
                return;
            }
        }
    }
}

fn log_disconnect(session_id: u64, e: &FakeCtdbError) {
    if is_normal_disconnect(e) {
        debug!("Session {} closed by peer: {}", session_id, e);
    } else {
        warn!("Session {} error: {}", session_id, e);
    }
}

/// Helper function to check for non-critical disconnection errors.
fn is_normal_disconnect(e: &FakeCtdbError) -> bool {
    matches!(e, FakeCtdbError::Io(arc_err) if matches!(
        arc_err.kind(),
        std::io::ErrorKind::ConnectionReset
            | std::io::ErrorKind::BrokenPipe
            | std::io::ErrorKind::UnexpectedEof
            | std::io::ErrorKind::ConnectionAborted
    ))
}
