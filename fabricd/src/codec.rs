// Copyright 2025 Accenture.
//
// SPDX-License-Identifier: Apache-2.0

use bytes::{Bytes, BytesMut};
use prost::Message;
use questlink::com::protocol::{FabricPdu, MAX_PDU_SIZE};
use std::io;
use tokio_util::codec::{self, Decoder as _, Encoder as _, LengthDelimitedCodec};

/// A codec for fabric PDUs on a stream. Each PDU is prefixed by its length as a big-endian u32.
#[derive(Debug)]
pub struct FabricCodec {
    inner: LengthDelimitedCodec,
}

impl Default for FabricCodec {
    fn default() -> Self {
        let inner = LengthDelimitedCodec::builder()
            .big_endian()
            .length_field_type::<u32>()
            .max_frame_length(MAX_PDU_SIZE)
            .new_codec();
        Self { inner }
    }
}

impl codec::Decoder for FabricCodec {
    type Item = FabricPdu;
    type Error = io::Error;

    fn decode(&mut self, src: &mut BytesMut) -> Result<Option<Self::Item>, Self::Error> {
        self.inner
            .decode(src)?
            .map(|frame| {
                FabricPdu::decode(frame.freeze())
                    .map_err(|e| io::Error::new(io::ErrorKind::InvalidData, e))
            })
            .transpose()
    }
}

impl codec::Encoder<FabricPdu> for FabricCodec {
    type Error = io::Error;

    fn encode(&mut self, pdu: FabricPdu, dst: &mut BytesMut) -> Result<(), Self::Error> {
        self.inner.encode(Bytes::from(pdu.encode_to_vec()), dst)
    }
}

#[cfg(test)]
mod test {
    use super::FabricCodec;
    use bytes::{Bytes, BytesMut};
    use questlink::com::protocol::{self, FabricPdu, MAX_PDU_SIZE};
    use questlink::timestamp::Timestamp;
    use tokio_util::codec::{Decoder, Encoder};

    #[test]
    fn matches_client_framing() {
        let pdu = FabricPdu::update(
            "QuestNav/frameData",
            Bytes::from_static(b"\x08\x01"),
            Timestamp::from_micros(123),
        );

        let mut server = BytesMut::new();
        FabricCodec::default().encode(pdu.clone(), &mut server).unwrap();
        let mut client = BytesMut::new();
        protocol::encode_frame(&pdu, &mut client).unwrap();
        assert_eq!(server, client);

        assert_eq!(FabricCodec::default().decode(&mut client).unwrap(), Some(pdu));
        assert!(client.is_empty());
    }

    #[test]
    fn rejects_oversized_frames() {
        let mut src = BytesMut::new();
        src.extend_from_slice(&(MAX_PDU_SIZE as u32 + 1).to_be_bytes());
        assert!(FabricCodec::default().decode(&mut src).is_err());
    }

    #[test]
    fn rejects_garbage() {
        let mut src = BytesMut::from(&[0u8, 0, 0, 2, 0xff, 0xff][..]);
        assert!(FabricCodec::default().decode(&mut src).is_err());
    }
}
