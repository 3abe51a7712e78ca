// src/core/errors.rs

//! Defines the primary error type for the entire daemon.

use std::collections::TryReserveError;
use std::sync::Arc;
use thiserror::Error;

/// The main error enum, representing all possible failures within the daemon.
///
/// The variants fall into the classes the protocol engine treats differently:
/// setup failures abort before serving, wire-format failures are dropped without
/// a reply, and handler failures become a negative status in the control reply.
#[derive(Error, Debug)]
pub enum FakeCtdbError {
    #[error("IO Error: {0}")]
    Io(Arc<std::io::Error>),

    // --- Setup errors ---
    #[error("Setup error: {0}")]
    Setup(String),

    // --- Wire-format errors ---
    #[error("Packet truncated: need {need} bytes, got {got}")]
    Truncated { need: usize, got: usize },

    #[error("Invalid packet magic 0x{0:08x}")]
    BadMagic(u32),

    #[error("Unsupported protocol version {0}")]
    BadVersion(u32),

    #[error("Unexpected operation {0}")]
    BadOperation(u32),

    #[error("Packet length mismatch: header declares {declared}, received {actual}")]
    LengthMismatch { declared: usize, actual: usize },

    #[error("Packet of {0} bytes exceeds the maximum packet size")]
    PacketTooLarge(usize),

    // --- Handler errors ---
    #[error("Node {0} is out of range")]
    OutOfRange(u32),

    #[error("{0}")]
    Usage(String),

    #[error("srvid not registered")]
    NotRegistered(u64),

    #[error("Failed to read nodes file: {0}")]
    NodesFile(String),

    #[error("Memory error")]
    ResourceExhausted,

    #[error("Internal Error: {0}")]
    Internal(String),
}

impl FakeCtdbError {
    /// Returns true for errors raised while decoding a packet. These are dropped
    /// silently by the session instead of being reported to the client.
    pub fn is_protocol_error(&self) -> bool {
        matches!(
            self,
            FakeCtdbError::Truncated { .. }
                | FakeCtdbError::BadMagic(_)
                | FakeCtdbError::BadVersion(_)
                | FakeCtdbError::BadOperation(_)
                | FakeCtdbError::LengthMismatch { .. }
                | FakeCtdbError::PacketTooLarge(_)
        )
    }

    /// The status value placed in a control reply that failed with this error.
    pub fn reply_status(&self) -> i32 {
        match self {
            FakeCtdbError::Io(_) => libc::EIO,
            _ => -1,
        }
    }
}

// Manual implementation of Clone because `std::io::Error` is not cloneable.
impl Clone for FakeCtdbError {
    fn clone(&self) -> Self {
        match self {
            FakeCtdbError::Io(e) => FakeCtdbError::Io(Arc::clone(e)),
            FakeCtdbError::Setup(s) => FakeCtdbError::Setup(s.clone()),
            FakeCtdbError::Truncated { need, got } => FakeCtdbError::Truncated {
                need: *need,
                got: *got,
            },
            FakeCtdbError::BadMagic(m) => FakeCtdbError::BadMagic(*m),
            FakeCtdbError::BadVersion(v) => FakeCtdbError::BadVersion(*v),
            FakeCtdbError::BadOperation(o) => FakeCtdbError::BadOperation(*o),
            FakeCtdbError::LengthMismatch { declared, actual } => FakeCtdbError::LengthMismatch {
                declared: *declared,
                actual: *actual,
            },
            FakeCtdbError::PacketTooLarge(n) => FakeCtdbError::PacketTooLarge(*n),
            FakeCtdbError::OutOfRange(pnn) => FakeCtdbError::OutOfRange(*pnn),
            FakeCtdbError::Usage(s) => FakeCtdbError::Usage(s.clone()),
            FakeCtdbError::NotRegistered(srvid) => FakeCtdbError::NotRegistered(*srvid),
            FakeCtdbError::NodesFile(s) => FakeCtdbError::NodesFile(s.clone()),
            FakeCtdbError::ResourceExhausted => FakeCtdbError::ResourceExhausted,
            FakeCtdbError::Internal(s) => FakeCtdbError::Internal(s.clone()),
        }
    }
}

impl PartialEq for FakeCtdbError {
    fn eq(&self, other: &Self) -> bool {
        match (self, other) {
            (FakeCtdbError::Io(e1), FakeCtdbError::Io(e2)) => e1.to_string() == e2.to_string(),
            (FakeCtdbError::Setup(s1), FakeCtdbError::Setup(s2)) => s1 == s2,
            (
                FakeCtdbError::Truncated { need: n1, got: g1 },
                FakeCtdbError::Truncated { need: n2, got: g2 },
            ) => n1 == n2 && g1 == g2,
            (FakeCtdbError::BadMagic(m1), FakeCtdbError::BadMagic(m2)) => m1 == m2,
            (FakeCtdbError::BadVersion(v1), FakeCtdbError::BadVersion(v2)) => v1 == v2,
            (FakeCtdbError::BadOperation(o1), FakeCtdbError::BadOperation(o2)) => o1 == o2,
            (
                FakeCtdbError::LengthMismatch {
                    declared: d1,
                    actual: a1,
                },
                FakeCtdbError::LengthMismatch {
                    declared: d2,
                    actual: a2,
                },
            ) => d1 == d2 && a1 == a2,
            (FakeCtdbError::PacketTooLarge(n1), FakeCtdbError::PacketTooLarge(n2)) => n1 == n2,
            (FakeCtdbError::OutOfRange(p1), FakeCtdbError::OutOfRange(p2)) => p1 == p2,
            (FakeCtdbError::Usage(s1), FakeCtdbError::Usage(s2)) => s1 == s2,
            (FakeCtdbError::NotRegistered(s1), FakeCtdbError::NotRegistered(s2)) => s1 == s2,
            (FakeCtdbError::NodesFile(s1), FakeCtdbError::NodesFile(s2)) => s1 == s2,
            (FakeCtdbError::Internal(s1), FakeCtdbError::Internal(s2)) => s1 == s2,
            _ => core::mem::discriminant(self) == core::mem::discriminant(other),
        }
    }
}

// --- From trait implementations for easy error conversion ---

impl From<std::io::Error> for FakeCtdbError {
    fn from(e: std::io::Error) -> Self {
        FakeCtdbError::Io(Arc::new(e))
    }
}

impl From<TryReserveError> for FakeCtdbError {
    fn from(_: TryReserveError) -> Self {
        FakeCtdbError::ResourceExhausted
    }
}

impl From<tokio::task::JoinError> for FakeCtdbError {
    fn from(e: tokio::task::JoinError) -> Self {
        FakeCtdbError::Io(Arc::new(std::io::Error::other(e.to_string())))
    }
}
