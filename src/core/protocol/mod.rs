// src/core/protocol/mod.rs

//! The binary wire protocol: packet header, control and message packets, typed
//! payloads, and the stream framing codec.

pub mod control;
pub mod header;
pub mod message;
pub mod packet_codec;
pub mod wire;

pub use control::{
    CTRL_FLAG_NOREPLY, ControlData, ControlOpcode, ReplyControl, ReplyData, ReqControl,
    allocate_pkt,
};
pub use header::{
    BROADCAST_ALL, BROADCAST_CONNECTED, BROADCAST_VNNMAP, CTDB_MAGIC, CTDB_PROTOCOL,
    CURRENT_NODE, HEADER_LEN, INVALID_GENERATION, Operation, ReqHeader, UNKNOWN_PNN,
};
pub use message::{DisableMessage, ReqMessage, SRVID_DISABLE_RECOVERIES};
pub use packet_codec::PacketCodec;
pub use wire::{
    IfaceEntry, IfaceListData, NodeAndFlags, NodeMapData, SOCK_ADDR_LEN, Timeval, UptimeData,
    VnnMapData, WireFormat,
};
