// tests/property/wire_test.rs

//! Property-based tests for the wire protocol
//! Tests framing and decoding of arbitrary input

use bytes::BytesMut;
use fake_ctdbd::core::protocol::{
    ControlData, ControlOpcode, Operation, PacketCodec, ReplyControl, ReqControl, ReqHeader,
    ReqMessage,
};
use proptest::prelude::*;
use tokio_util::codec::Decoder;

proptest! {
    #[test]
    fn test_decoders_never_panic(data in prop::collection::vec(any::<u8>(), 0..256)) {
        let _ = ReqHeader::pull(&data);
        let _ = ReqControl::pull(&data);
        let _ = ReqMessage::pull(&data);
        let _ = ReplyControl::pull(&data, ControlOpcode::GetNodemap as u32);
    }

    #[test]
    fn test_codec_splits_back_to_back_packets(
        reqids in prop::collection::vec(any::<u32>(), 1..8),
        split in 0usize..200
    ) {
        let mut stream = Vec::new();
        for reqid in &reqids {
            let header = ReqHeader::new(Operation::ReqControl, 0, 0, 0, *reqid);
            let request = ReqControl::new(ControlOpcode::Ping, ControlData::Empty);
            stream.extend_from_slice(&request.push(&header));
        }

        // Feed the bytes in two chunks to exercise partial reads.
        let split = split.min(stream.len());
        let mut codec = PacketCodec;
        let mut buf = BytesMut::from(&stream[..split]);
        let mut decoded = Vec::new();
        while let Some(packet) = codec.decode(&mut buf).unwrap() {
            decoded.push(packet);
        }
        buf.extend_from_slice(&stream[split..]);
        while let Some(packet) = codec.decode(&mut buf).unwrap() {
            decoded.push(packet);
        }

        prop_assert_eq!(decoded.len(), reqids.len());
        for (packet, reqid) in decoded.iter().zip(&reqids) {
            let (header, request) = ReqControl::pull(packet).unwrap();
            prop_assert_eq!(header.reqid, *reqid);
            prop_assert_eq!(request.opcode, ControlOpcode::Ping as u32);
        }
        prop_assert!(buf.is_empty());
    }
}
