// src/connection/session.rs

//! Defines the state associated with a single client session.

use bytes::Bytes;
use tokio::sync::mpsc;

/// The sending side of a session's reply queue. Encoded packets pushed here are
/// written to the client in order by the session's writer.
pub type Outbound = mpsc::UnboundedSender<Bytes>;

/// How a session ended, as seen by the listener.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum SessionStatus {
    Open,
    /// The client sent `SHUTDOWN`; the daemon stops once this session closes.
    ShutdownRequested,
}

/// Holds the state specific to a single client session.
#[derive(Debug)]
pub struct SessionState {
    pub session_id: u64,
    /// PNN that replaces the current-node placeholder in requests.
    pub pnn: u32,
    pub status: SessionStatus,
    pub outbound: Outbound,
}

impl SessionState {
    pub(crate) fn new(session_id: u64, pnn: u32, outbound: Outbound) -> Self {
        Self {
            session_id,
            pnn,
            status: SessionStatus::Open,
            outbound,
        }
    }
}
