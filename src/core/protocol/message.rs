// src/core/protocol/message.rs

//! Service-id addressed message packets.

use super::control::allocate_pkt;
use super::header::{HEADER_LEN, Operation, ReqHeader};
use super::wire::{WireFormat, ensure_len};
use crate::core::FakeCtdbError;
use bytes::{Buf, BufMut, Bytes};

/// Service id of the "disable recoveries" request.
pub const SRVID_DISABLE_RECOVERIES: u64 = 0xF120_0000_0000_0000;

const REQ_MESSAGE_FIXED_LEN: usize = 12;

/// A message addressed to a service id.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ReqMessage {
    pub srvid: u64,
    pub data: Bytes,
}

impl ReqMessage {
    pub fn new(srvid: u64, data: Bytes) -> Self {
        Self { srvid, data }
    }

    /// Builds a message whose payload is the encoding of `payload`.
    pub fn encode_payload<T: WireFormat>(srvid: u64, payload: &T) -> Self {
        let mut data = allocate_pkt(payload.wire_len());
        payload.push(&mut data);
        Self::new(srvid, data.freeze())
    }

    pub fn len(&self) -> usize {
        HEADER_LEN + REQ_MESSAGE_FIXED_LEN + self.data.len()
    }

    pub fn push(&self, header: &ReqHeader) -> Bytes {
        let len = self.len();
        let mut buf = allocate_pkt(len);
        let mut header = *header;
        header.length = len as u32;
        header.push(&mut buf);
        buf.put_u64_le(self.srvid);
        buf.put_u32_le(self.data.len() as u32);
        buf.put_slice(&self.data);
        debug_assert_eq!(buf.len(), len);
        buf.freeze()
    }

    pub fn pull(packet: &[u8]) -> Result<(ReqHeader, Self), FakeCtdbError> {
        let header = ReqHeader::pull(packet)?;
        header.verify(Some(Operation::ReqMessage))?;
        let mut body = &packet[HEADER_LEN..];
        ensure_len(body, REQ_MESSAGE_FIXED_LEN)?;
        let srvid = body.get_u64_le();
        let datalen = body.get_u32_le() as usize;
        ensure_len(body, datalen)?;
        Ok((
            header,
            Self {
                srvid,
                data: Bytes::copy_from_slice(&body[..datalen]),
            },
        ))
    }

    /// Decodes the payload as `T`.
    pub fn payload<T: WireFormat>(&self) -> Result<T, FakeCtdbError> {
        let mut data = &self.data[..];
        T::pull(&mut data)
    }
}

/// Payload of a disable-recoveries request. `srvid` is where the reply goes.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct DisableMessage {
    pub pnn: u32,
    pub srvid: u64,
    pub timeout: u32,
}

impl WireFormat for DisableMessage {
    fn wire_len(&self) -> usize {
        20
    }

    fn push<B: BufMut>(&self, dst: &mut B) {
        dst.put_u32_le(self.pnn);
        dst.put_u32_le(0);
        dst.put_u64_le(self.srvid);
        dst.put_u32_le(self.timeout);
    }

    fn pull(src: &mut &[u8]) -> Result<Self, FakeCtdbError> {
        ensure_len(src, 20)?;
        let pnn = src.get_u32_le();
        let _pad = src.get_u32_le();
        Ok(Self {
            pnn,
            srvid: src.get_u64_le(),
            timeout: src.get_u32_le(),
        })
    }
}
