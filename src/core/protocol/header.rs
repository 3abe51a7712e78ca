// src/core/protocol/header.rs

//! The fixed packet header shared by every control and message packet.

use super::wire::ensure_len;
use crate::core::FakeCtdbError;
use bytes::{Buf, BufMut};

/// The magic value at the start of every header ("CTDB").
pub const CTDB_MAGIC: u32 = 0x4354_4442;
/// The only protocol version this daemon speaks.
pub const CTDB_PROTOCOL: u32 = 1;
/// Size of the encoded header in bytes.
pub const HEADER_LEN: usize = 32;

// Destination/source node placeholders.
pub const CURRENT_NODE: u32 = 0xF000_0001;
pub const BROADCAST_ALL: u32 = 0xF000_0002;
pub const BROADCAST_VNNMAP: u32 = 0xF000_0003;
pub const BROADCAST_CONNECTED: u32 = 0xF000_0004;

/// PNN value used when a node is not known (e.g. no recovery master yet).
pub const UNKNOWN_PNN: u32 = 0xFFFF_FFFF;
/// Generation value that never identifies a valid cluster configuration.
pub const INVALID_GENERATION: u32 = 1;

/// The packet kinds this daemon consumes or produces.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
#[repr(u32)]
pub enum Operation {
    ReqMessage = 5,
    ReqControl = 7,
    ReplyControl = 8,
}

impl Operation {
    pub fn from_u32(value: u32) -> Option<Self> {
        match value {
            5 => Some(Operation::ReqMessage),
            7 => Some(Operation::ReqControl),
            8 => Some(Operation::ReplyControl),
            _ => None,
        }
    }
}

/// The decoded packet header. `operation` is kept raw so that packets of kinds
/// this daemon does not handle can still be parsed and ignored.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct ReqHeader {
    pub length: u32,
    pub magic: u32,
    pub version: u32,
    pub generation: u32,
    pub operation: u32,
    pub destnode: u32,
    pub srcnode: u32,
    pub reqid: u32,
}

impl ReqHeader {
    /// Creates a header with the protocol magic and version filled in. The
    /// length is set when the packet is pushed.
    pub fn new(
        operation: Operation,
        generation: u32,
        destnode: u32,
        srcnode: u32,
        reqid: u32,
    ) -> Self {
        Self {
            length: 0,
            magic: CTDB_MAGIC,
            version: CTDB_PROTOCOL,
            generation,
            operation: operation as u32,
            destnode,
            srcnode,
            reqid,
        }
    }

    /// Decodes the header at the start of `buf`.
    pub fn pull(buf: &[u8]) -> Result<Self, FakeCtdbError> {
        ensure_len(buf, HEADER_LEN)?;
        let mut cursor = &buf[..HEADER_LEN];
        Ok(Self {
            length: cursor.get_u32_le(),
            magic: cursor.get_u32_le(),
            version: cursor.get_u32_le(),
            generation: cursor.get_u32_le(),
            operation: cursor.get_u32_le(),
            destnode: cursor.get_u32_le(),
            srcnode: cursor.get_u32_le(),
            reqid: cursor.get_u32_le(),
        })
    }

    /// Encodes the header into `dst`.
    pub fn push<B: BufMut>(&self, dst: &mut B) {
        dst.put_u32_le(self.length);
        dst.put_u32_le(self.magic);
        dst.put_u32_le(self.version);
        dst.put_u32_le(self.generation);
        dst.put_u32_le(self.operation);
        dst.put_u32_le(self.destnode);
        dst.put_u32_le(self.srcnode);
        dst.put_u32_le(self.reqid);
    }

    /// Overwrites the header bytes at the start of an already encoded packet.
    pub fn rewrite(&self, packet: &mut [u8]) -> Result<(), FakeCtdbError> {
        ensure_len(packet, HEADER_LEN)?;
        let mut window = &mut packet[..HEADER_LEN];
        self.push(&mut window);
        Ok(())
    }

    /// Checks the magic and version, and optionally the operation.
    pub fn verify(&self, operation: Option<Operation>) -> Result<(), FakeCtdbError> {
        if self.magic != CTDB_MAGIC {
            return Err(FakeCtdbError::BadMagic(self.magic));
        }
        if self.version != CTDB_PROTOCOL {
            return Err(FakeCtdbError::BadVersion(self.version));
        }
        if let Some(op) = operation
            && self.operation != op as u32
        {
            return Err(FakeCtdbError::BadOperation(self.operation));
        }
        Ok(())
    }

    pub fn operation(&self) -> Option<Operation> {
        Operation::from_u32(self.operation)
    }

    /// Replaces the current-node placeholder in source and destination with `pnn`.
    pub fn fix_pnn(&mut self, pnn: u32) {
        if self.srcnode == CURRENT_NODE {
            self.srcnode = pnn;
        }
        if self.destnode == CURRENT_NODE {
            self.destnode = pnn;
        }
    }

    /// The header of a control reply to this request.
    pub fn reply_control(&self, generation: u32) -> Self {
        Self {
            destnode: self.srcnode,
            srcnode: self.destnode,
            ..Self::new(Operation::ReplyControl, generation, 0, 0, self.reqid)
        }
    }

    /// The header of a message sent back to the originator of this request.
    pub fn reply_message(&self, generation: u32) -> Self {
        Self {
            destnode: self.srcnode,
            srcnode: self.destnode,
            ..Self::new(Operation::ReqMessage, generation, 0, 0, 0)
        }
    }
}
