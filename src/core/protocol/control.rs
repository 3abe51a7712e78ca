// src/core/protocol/control.rs

//! Control request and reply packets.

use super::header::{HEADER_LEN, Operation, ReqHeader};
use super::wire::{IfaceListData, NodeMapData, UptimeData, VnnMapData, WireFormat, ensure_len};
use crate::core::FakeCtdbError;
use bytes::{Buf, BufMut, Bytes, BytesMut};
use strum_macros::{Display, EnumIter, FromRepr};

/// Caller does not want a reply to this control.
pub const CTRL_FLAG_NOREPLY: u32 = 0x0000_0001;

const REQ_CONTROL_FIXED_LEN: usize = 28;
const REPLY_CONTROL_FIXED_LEN: usize = 12;

/// The control opcodes this daemon implements.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Display, EnumIter, FromRepr)]
#[strum(serialize_all = "SCREAMING_SNAKE_CASE")]
#[repr(u32)]
pub enum ControlOpcode {
    ProcessExists = 0,
    Ping = 3,
    GetVnnmap = 5,
    GetRecmode = 15,
    SetRecmode = 16,
    RegisterSrvid = 23,
    DeregisterSrvid = 24,
    GetPid = 30,
    GetRecmaster = 31,
    GetPnn = 35,
    Shutdown = 36,
    Uptime = 69,
    ReloadNodesFile = 72,
    GetCapabilities = 80,
    GetNodemap = 91,
    GetIfaces = 124,
    GetNodesFile = 141,
}

/// Typed request payload, decoded according to the opcode.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum ControlData {
    Empty,
    Pid(i32),
    Recmode(u32),
    /// Payload of an opcode this daemon does not interpret.
    Raw(Bytes),
}

impl ControlData {
    fn wire_len(&self) -> usize {
        match self {
            ControlData::Empty => 0,
            ControlData::Pid(_) | ControlData::Recmode(_) => 4,
            ControlData::Raw(b) => b.len(),
        }
    }

    fn push<B: BufMut>(&self, dst: &mut B) {
        match self {
            ControlData::Empty => {}
            ControlData::Pid(pid) => dst.put_i32_le(*pid),
            ControlData::Recmode(mode) => dst.put_u32_le(*mode),
            ControlData::Raw(b) => dst.put_slice(b),
        }
    }

    fn pull(opcode: u32, mut data: &[u8]) -> Result<Self, FakeCtdbError> {
        match ControlOpcode::from_repr(opcode) {
            Some(ControlOpcode::ProcessExists) => Ok(ControlData::Pid(i32::pull(&mut data)?)),
            Some(ControlOpcode::SetRecmode) => Ok(ControlData::Recmode(u32::pull(&mut data)?)),
            _ if data.is_empty() => Ok(ControlData::Empty),
            _ => Ok(ControlData::Raw(Bytes::copy_from_slice(data))),
        }
    }
}

/// A control request.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ReqControl {
    pub opcode: u32,
    pub srvid: u64,
    pub client_id: u32,
    pub flags: u32,
    pub rdata: ControlData,
}

impl ReqControl {
    pub fn new(opcode: ControlOpcode, rdata: ControlData) -> Self {
        Self {
            opcode: opcode as u32,
            srvid: 0,
            client_id: 0,
            flags: 0,
            rdata,
        }
    }

    /// Total encoded length including the header.
    pub fn len(&self) -> usize {
        HEADER_LEN + REQ_CONTROL_FIXED_LEN + self.rdata.wire_len()
    }

    /// Encodes `header` and this request into a freshly allocated packet.
    pub fn push(&self, header: &ReqHeader) -> Bytes {
        let len = self.len();
        let mut buf = allocate_pkt(len);
        let mut header = *header;
        header.length = len as u32;
        header.push(&mut buf);
        buf.put_u32_le(self.opcode);
        buf.put_u32_le(0);
        buf.put_u64_le(self.srvid);
        buf.put_u32_le(self.client_id);
        buf.put_u32_le(self.flags);
        buf.put_u32_le(self.rdata.wire_len() as u32);
        self.rdata.push(&mut buf);
        debug_assert_eq!(buf.len(), len);
        buf.freeze()
    }

    /// Decodes a complete control request packet.
    pub fn pull(packet: &[u8]) -> Result<(ReqHeader, Self), FakeCtdbError> {
        let header = ReqHeader::pull(packet)?;
        header.verify(Some(Operation::ReqControl))?;
        let mut body = &packet[HEADER_LEN..];
        ensure_len(body, REQ_CONTROL_FIXED_LEN)?;
        let opcode = body.get_u32_le();
        let _pad = body.get_u32_le();
        let srvid = body.get_u64_le();
        let client_id = body.get_u32_le();
        let flags = body.get_u32_le();
        let datalen = body.get_u32_le() as usize;
        ensure_len(body, datalen)?;
        let rdata = ControlData::pull(opcode, &body[..datalen])?;
        Ok((
            header,
            Self {
                opcode,
                srvid,
                client_id,
                flags,
                rdata,
            },
        ))
    }

    pub fn wants_reply(&self) -> bool {
        self.flags & CTRL_FLAG_NOREPLY == 0
    }
}

/// Typed reply payload.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum ReplyData {
    None,
    VnnMap(VnnMapData),
    Uptime(UptimeData),
    Capabilities(u32),
    NodeMap(NodeMapData),
    IfaceList(IfaceListData),
}

impl ReplyData {
    fn wire_len(&self) -> usize {
        match self {
            ReplyData::None => 0,
            ReplyData::VnnMap(v) => v.wire_len(),
            ReplyData::Uptime(u) => u.wire_len(),
            ReplyData::Capabilities(c) => c.wire_len(),
            ReplyData::NodeMap(n) => n.wire_len(),
            ReplyData::IfaceList(i) => i.wire_len(),
        }
    }

    fn push<B: BufMut>(&self, dst: &mut B) {
        match self {
            ReplyData::None => {}
            ReplyData::VnnMap(v) => v.push(dst),
            ReplyData::Uptime(u) => u.push(dst),
            ReplyData::Capabilities(c) => c.push(dst),
            ReplyData::NodeMap(n) => n.push(dst),
            ReplyData::IfaceList(i) => i.push(dst),
        }
    }

    fn pull(opcode: u32, mut data: &[u8]) -> Result<Self, FakeCtdbError> {
        if data.is_empty() {
            return Ok(ReplyData::None);
        }
        let src = &mut data;
        Ok(match ControlOpcode::from_repr(opcode) {
            Some(ControlOpcode::GetVnnmap) => ReplyData::VnnMap(VnnMapData::pull(src)?),
            Some(ControlOpcode::Uptime) => ReplyData::Uptime(UptimeData::pull(src)?),
            Some(ControlOpcode::GetCapabilities) => ReplyData::Capabilities(u32::pull(src)?),
            Some(ControlOpcode::GetNodemap) | Some(ControlOpcode::GetNodesFile) => {
                ReplyData::NodeMap(NodeMapData::pull(src)?)
            }
            Some(ControlOpcode::GetIfaces) => ReplyData::IfaceList(IfaceListData::pull(src)?),
            _ => ReplyData::None,
        })
    }
}

/// A control reply. `opcode` is not carried on the wire; it selects how the
/// payload is interpreted.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ReplyControl {
    pub opcode: u32,
    pub status: i32,
    pub rdata: ReplyData,
    pub errmsg: Option<String>,
}

impl ReplyControl {
    pub fn ok(opcode: u32, status: i32) -> Self {
        Self {
            opcode,
            status,
            rdata: ReplyData::None,
            errmsg: None,
        }
    }

    pub fn with_data(opcode: u32, rdata: ReplyData) -> Self {
        Self {
            opcode,
            status: 0,
            rdata,
            errmsg: None,
        }
    }

    pub fn error(opcode: u32, status: i32, errmsg: impl Into<String>) -> Self {
        Self {
            opcode,
            status,
            rdata: ReplyData::None,
            errmsg: Some(errmsg.into()),
        }
    }

    /// A failure reply carrying the status and message of `err`.
    pub fn from_error(opcode: u32, err: &FakeCtdbError) -> Self {
        Self::error(opcode, err.reply_status(), err.to_string())
    }

    fn errmsg_len(&self) -> usize {
        self.errmsg.as_ref().map_or(0, |m| m.len() + 1)
    }

    /// Total encoded length including the header.
    pub fn len(&self) -> usize {
        HEADER_LEN + REPLY_CONTROL_FIXED_LEN + self.rdata.wire_len() + self.errmsg_len()
    }

    /// Encodes `header` and this reply into a freshly allocated packet.
    pub fn push(&self, header: &ReqHeader) -> Bytes {
        let len = self.len();
        let mut buf = allocate_pkt(len);
        let mut header = *header;
        header.length = len as u32;
        header.push(&mut buf);
        buf.put_i32_le(self.status);
        buf.put_u32_le(self.rdata.wire_len() as u32);
        buf.put_u32_le(self.errmsg_len() as u32);
        self.rdata.push(&mut buf);
        if let Some(msg) = &self.errmsg {
            buf.put_slice(msg.as_bytes());
            buf.put_u8(0);
        }
        debug_assert_eq!(buf.len(), len);
        buf.freeze()
    }

    /// Decodes a control reply packet, interpreting the payload for `opcode`.
    pub fn pull(packet: &[u8], opcode: u32) -> Result<(ReqHeader, Self), FakeCtdbError> {
        let header = ReqHeader::pull(packet)?;
        header.verify(Some(Operation::ReplyControl))?;
        let mut body = &packet[HEADER_LEN..];
        ensure_len(body, REPLY_CONTROL_FIXED_LEN)?;
        let status = body.get_i32_le();
        let datalen = body.get_u32_le() as usize;
        let errorlen = body.get_u32_le() as usize;
        ensure_len(body, datalen.saturating_add(errorlen))?;
        let rdata = ReplyData::pull(opcode, &body[..datalen])?;
        let errmsg = (errorlen > 0).then(|| {
            let raw = &body[datalen..datalen + errorlen];
            let end = raw.iter().position(|b| *b == 0).unwrap_or(raw.len());
            String::from_utf8_lossy(&raw[..end]).into_owned()
        });
        Ok((
            header,
            Self {
                opcode,
                status,
                rdata,
                errmsg,
            },
        ))
    }
}

/// Allocates a zero-length buffer with room for exactly `len` bytes. The buffer
/// is owned by the packet being built and released with it on every path.
pub fn allocate_pkt(len: usize) -> BytesMut {
    BytesMut::with_capacity(len)
}
