// src/core/protocol/wire.rs

//! Encoding of the typed payloads carried inside control and message packets.
//!
//! All integers are little-endian and structures are packed. Socket addresses are
//! the exception: they use the `sockaddr_in`/`sockaddr_in6` layout, with the
//! port and IPv6 flow label in network byte order.

use crate::core::FakeCtdbError;
use bytes::{Buf, BufMut};
use chrono::{DateTime, Utc};
use std::net::{Ipv4Addr, Ipv6Addr, SocketAddr, SocketAddrV4, SocketAddrV6};

const AF_INET: u16 = 2;
const AF_INET6: u16 = 10;

/// Maximum interface name length, excluding the terminating NUL.
pub const IFACE_NAME_LEN: usize = 16;
const IFACE_NAME_FIELD: usize = IFACE_NAME_LEN + 2;

/// Fails with `Truncated` if `buf` holds fewer than `need` bytes.
pub(crate) fn ensure_len(buf: &[u8], need: usize) -> Result<(), FakeCtdbError> {
    if buf.len() < need {
        return Err(FakeCtdbError::Truncated {
            need,
            got: buf.len(),
        });
    }
    Ok(())
}

/// A value with a fixed, self-describing wire encoding.
pub trait WireFormat: Sized {
    /// Number of bytes `push` will write.
    fn wire_len(&self) -> usize;
    fn push<B: BufMut>(&self, dst: &mut B);
    /// Decodes a value from the front of `src`, advancing it.
    fn pull(src: &mut &[u8]) -> Result<Self, FakeCtdbError>;
}

impl WireFormat for u32 {
    fn wire_len(&self) -> usize {
        4
    }
    fn push<B: BufMut>(&self, dst: &mut B) {
        dst.put_u32_le(*self);
    }
    fn pull(src: &mut &[u8]) -> Result<Self, FakeCtdbError> {
        ensure_len(src, 4)?;
        Ok(src.get_u32_le())
    }
}

impl WireFormat for i32 {
    fn wire_len(&self) -> usize {
        4
    }
    fn push<B: BufMut>(&self, dst: &mut B) {
        dst.put_i32_le(*self);
    }
    fn pull(src: &mut &[u8]) -> Result<Self, FakeCtdbError> {
        ensure_len(src, 4)?;
        Ok(src.get_i32_le())
    }
}

/// Size of the `sockaddr` union carried on the wire: large enough for a
/// `sockaddr_in6`, with a `sockaddr_in` zero-padded to the same length.
pub const SOCK_ADDR_LEN: usize = 28;

impl WireFormat for SocketAddr {
    fn wire_len(&self) -> usize {
        SOCK_ADDR_LEN
    }

    fn push<B: BufMut>(&self, dst: &mut B) {
        match self {
            SocketAddr::V4(v4) => {
                // sockaddr_in, zero padded to the size of the union.
                dst.put_u16_le(AF_INET);
                dst.put_u16(v4.port());
                dst.put_slice(&v4.ip().octets());
                dst.put_bytes(0, SOCK_ADDR_LEN - 8);
            }
            SocketAddr::V6(v6) => {
                dst.put_u16_le(AF_INET6);
                dst.put_u16(v6.port());
                dst.put_u32(v6.flowinfo());
                dst.put_slice(&v6.ip().octets());
                dst.put_u32_le(v6.scope_id());
            }
        }
    }

    fn pull(src: &mut &[u8]) -> Result<Self, FakeCtdbError> {
        ensure_len(src, SOCK_ADDR_LEN)?;
        let family = src.get_u16_le();
        let port = src.get_u16();
        let addr = match family {
            AF_INET6 => {
                let flowinfo = src.get_u32();
                let mut octets = [0u8; 16];
                src.copy_to_slice(&mut octets);
                let scope_id = src.get_u32_le();
                SocketAddr::V6(SocketAddrV6::new(
                    Ipv6Addr::from(octets),
                    port,
                    flowinfo,
                    scope_id,
                ))
            }
            _ => {
                let mut octets = [0u8; 4];
                src.copy_to_slice(&mut octets);
                src.advance(SOCK_ADDR_LEN - 8);
                SocketAddr::V4(SocketAddrV4::new(Ipv4Addr::from(octets), port))
            }
        };
        Ok(addr)
    }
}

/// The virtual node map as returned by `GETVNNMAP`.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct VnnMapData {
    pub generation: u32,
    pub map: Vec<u32>,
}

impl WireFormat for VnnMapData {
    fn wire_len(&self) -> usize {
        8 + 4 * self.map.len()
    }

    fn push<B: BufMut>(&self, dst: &mut B) {
        dst.put_u32_le(self.generation);
        dst.put_u32_le(self.map.len() as u32);
        for lmaster in &self.map {
            dst.put_u32_le(*lmaster);
        }
    }

    fn pull(src: &mut &[u8]) -> Result<Self, FakeCtdbError> {
        let generation = u32::pull(src)?;
        let size = u32::pull(src)? as usize;
        ensure_len(src, size.saturating_mul(4))?;
        let map = (0..size).map(|_| src.get_u32_le()).collect();
        Ok(Self { generation, map })
    }
}

/// A `struct timeval` equivalent.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub struct Timeval {
    pub sec: i64,
    pub usec: i64,
}

impl From<DateTime<Utc>> for Timeval {
    fn from(t: DateTime<Utc>) -> Self {
        Self {
            sec: t.timestamp(),
            usec: i64::from(t.timestamp_subsec_micros()),
        }
    }
}

impl WireFormat for Timeval {
    fn wire_len(&self) -> usize {
        16
    }
    fn push<B: BufMut>(&self, dst: &mut B) {
        dst.put_i64_le(self.sec);
        dst.put_i64_le(self.usec);
    }
    fn pull(src: &mut &[u8]) -> Result<Self, FakeCtdbError> {
        ensure_len(src, 16)?;
        Ok(Self {
            sec: src.get_i64_le(),
            usec: src.get_i64_le(),
        })
    }
}

/// Daemon and recovery timestamps returned by `UPTIME`.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct UptimeData {
    pub current_time: Timeval,
    pub start_time: Timeval,
    pub last_recovery_started: Timeval,
    pub last_recovery_finished: Timeval,
}

impl WireFormat for UptimeData {
    fn wire_len(&self) -> usize {
        64
    }
    fn push<B: BufMut>(&self, dst: &mut B) {
        self.current_time.push(dst);
        self.start_time.push(dst);
        self.last_recovery_started.push(dst);
        self.last_recovery_finished.push(dst);
    }
    fn pull(src: &mut &[u8]) -> Result<Self, FakeCtdbError> {
        Ok(Self {
            current_time: Timeval::pull(src)?,
            start_time: Timeval::pull(src)?,
            last_recovery_started: Timeval::pull(src)?,
            last_recovery_finished: Timeval::pull(src)?,
        })
    }
}

/// One entry of a node map snapshot.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct NodeAndFlags {
    pub pnn: u32,
    pub flags: u32,
    pub addr: SocketAddr,
}

impl WireFormat for NodeAndFlags {
    fn wire_len(&self) -> usize {
        8 + self.addr.wire_len()
    }
    fn push<B: BufMut>(&self, dst: &mut B) {
        dst.put_u32_le(self.pnn);
        dst.put_u32_le(self.flags);
        self.addr.push(dst);
    }
    fn pull(src: &mut &[u8]) -> Result<Self, FakeCtdbError> {
        Ok(Self {
            pnn: u32::pull(src)?,
            flags: u32::pull(src)?,
            addr: SocketAddr::pull(src)?,
        })
    }
}

/// A node map snapshot, used by `GET_NODEMAP` and `GET_NODES_FILE`.
#[derive(Debug, Clone, PartialEq, Eq, Default)]
pub struct NodeMapData {
    pub nodes: Vec<NodeAndFlags>,
}

impl WireFormat for NodeMapData {
    fn wire_len(&self) -> usize {
        4 + self.nodes.iter().map(WireFormat::wire_len).sum::<usize>()
    }
    fn push<B: BufMut>(&self, dst: &mut B) {
        dst.put_u32_le(self.nodes.len() as u32);
        for node in &self.nodes {
            node.push(dst);
        }
    }
    fn pull(src: &mut &[u8]) -> Result<Self, FakeCtdbError> {
        let num = u32::pull(src)? as usize;
        // pnn, flags and the address; check before allocating.
        ensure_len(src, num.saturating_mul(8 + SOCK_ADDR_LEN))?;
        let mut nodes = Vec::with_capacity(num);
        for _ in 0..num {
            nodes.push(NodeAndFlags::pull(src)?);
        }
        Ok(Self { nodes })
    }
}

/// One network interface as returned by `GET_IFACES`.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct IfaceEntry {
    pub name: String,
    pub link_state: u16,
    pub references: u32,
}

impl WireFormat for IfaceEntry {
    fn wire_len(&self) -> usize {
        IFACE_NAME_FIELD + 2 + 4
    }
    fn push<B: BufMut>(&self, dst: &mut B) {
        let mut name = [0u8; IFACE_NAME_FIELD];
        let bytes = self.name.as_bytes();
        let n = bytes.len().min(IFACE_NAME_LEN);
        name[..n].copy_from_slice(&bytes[..n]);
        dst.put_slice(&name);
        dst.put_u16_le(self.link_state);
        dst.put_u32_le(self.references);
    }
    fn pull(src: &mut &[u8]) -> Result<Self, FakeCtdbError> {
        ensure_len(src, IFACE_NAME_FIELD + 6)?;
        let mut name = [0u8; IFACE_NAME_FIELD];
        src.copy_to_slice(&mut name);
        let end = name.iter().position(|b| *b == 0).unwrap_or(IFACE_NAME_FIELD);
        Ok(Self {
            name: String::from_utf8_lossy(&name[..end]).into_owned(),
            link_state: src.get_u16_le(),
            references: src.get_u32_le(),
        })
    }
}

#[derive(Debug, Clone, PartialEq, Eq, Default)]
pub struct IfaceListData {
    pub ifaces: Vec<IfaceEntry>,
}

impl WireFormat for IfaceListData {
    fn wire_len(&self) -> usize {
        4 + self.ifaces.iter().map(WireFormat::wire_len).sum::<usize>()
    }
    fn push<B: BufMut>(&self, dst: &mut B) {
        dst.put_u32_le(self.ifaces.len() as u32);
        for iface in &self.ifaces {
            iface.push(dst);
        }
    }
    fn pull(src: &mut &[u8]) -> Result<Self, FakeCtdbError> {
        let num = u32::pull(src)? as usize;
        ensure_len(src, num.saturating_mul(IFACE_NAME_FIELD + 6))?;
        let mut ifaces = Vec::with_capacity(num);
        for _ in 0..num {
            ifaces.push(IfaceEntry::pull(src)?);
        }
        Ok(Self { ifaces })
    }
}
