// src/core/protocol/packet_codec.rs

//! A `tokio_util::codec` implementation that splits a byte stream into whole
//! packets using the leading length word of every packet.

use crate::core::FakeCtdbError;
use bytes::{Bytes, BytesMut};
use tokio_util::codec::{Decoder, Encoder};

/// Size of the length word that starts every packet.
const LENGTH_WORD: usize = 4;

/// Upper bound on a single packet, to keep a broken peer from making us buffer
/// without limit.
pub const MAX_PACKET_LEN: usize = 16 * 1024 * 1024;

/// Frames packets without interpreting them. Header validation is left to the
/// session so that malformed packets can be dropped instead of killing the stream.
#[derive(Debug, Default, Clone, Copy)]
pub struct PacketCodec;

impl Decoder for PacketCodec {
    type Item = BytesMut;
    type Error = FakeCtdbError;

    fn decode(&mut self, src: &mut BytesMut) -> Result<Option<Self::Item>, Self::Error> {
        if src.len() < LENGTH_WORD {
            return Ok(None);
        }

        let declared = u32::from_le_bytes([src[0], src[1], src[2], src[3]]) as usize;
        if declared > MAX_PACKET_LEN {
            return Err(FakeCtdbError::PacketTooLarge(declared));
        }

        // A declared length shorter than the length word cannot describe a packet.
        // Consume the word so the stream keeps moving; the session drops it.
        let frame_len = declared.max(LENGTH_WORD);
        if src.len() < frame_len {
            src.reserve(frame_len - src.len());
            return Ok(None);
        }

        Ok(Some(src.split_to(frame_len)))
    }
}

impl Encoder<Bytes> for PacketCodec {
    type Error = FakeCtdbError;

    fn encode(&mut self, item: Bytes, dst: &mut BytesMut) -> Result<(), Self::Error> {
        dst.extend_from_slice(&item);
        Ok(())
    }
}
