// Copyright 2025 Accenture.
//
// SPDX-License-Identifier: Apache-2.0

//! Fabric wire protocol
//!
//! Client and server exchange [FabricPdu]s over a TCP stream. Each PDU is prefixed by its length
//! as a big-endian u32. The messages mirror `proto/fabric.proto`.

use crate::error::Error;
use crate::timestamp::Timestamp;
use bytes::{Buf, BufMut, Bytes, BytesMut};
use prost::Message;
use std::io::ErrorKind;

/// Maximal encoded size of a PDU without its length prefix
pub const MAX_PDU_SIZE: usize = 64 * 1024;

/// Size of the length prefix
pub const LENGTH_PREFIX_SIZE: usize = size_of::<u32>();

#[derive(Clone, PartialEq, ::prost::Message)]
pub struct FabricPdu {
    #[prost(oneof = "fabric_pdu::Kind", tags = "1, 2, 3, 4, 5")]
    pub kind: ::core::option::Option<fabric_pdu::Kind>,
}

pub mod fabric_pdu {
    #[derive(Clone, PartialEq, ::prost::Oneof)]
    pub enum Kind {
        /// Client to server: keep me updated on a topic
        #[prost(message, tag = "1")]
        Subscribe(super::Subscribe),
        /// Client to server: overwrite a topic
        #[prost(message, tag = "2")]
        Publish(super::Publish),
        /// Server to client: current value of a subscribed topic
        #[prost(message, tag = "3")]
        Update(super::Update),
        /// Client to server: clock synchronization request
        #[prost(message, tag = "4")]
        TimeRequest(super::TimeRequest),
        /// Server to client: clock synchronization reply
        #[prost(message, tag = "5")]
        TimeReply(super::TimeReply),
    }
}

#[derive(Clone, PartialEq, ::prost::Message)]
pub struct Subscribe {
    #[prost(string, tag = "1")]
    pub topic: ::prost::alloc::string::String,
}

#[derive(Clone, PartialEq, ::prost::Message)]
pub struct Publish {
    #[prost(string, tag = "1")]
    pub topic: ::prost::alloc::string::String,
    #[prost(bytes = "bytes", tag = "2")]
    pub payload: ::prost::bytes::Bytes,
}

#[derive(Clone, PartialEq, ::prost::Message)]
pub struct Update {
    #[prost(string, tag = "1")]
    pub topic: ::prost::alloc::string::String,
    #[prost(bytes = "bytes", tag = "2")]
    pub payload: ::prost::bytes::Bytes,
    #[prost(uint64, tag = "3")]
    pub server_time_us: u64,
}

#[derive(Clone, Copy, PartialEq, ::prost::Message)]
pub struct TimeRequest {
    #[prost(uint64, tag = "1")]
    pub client_time_us: u64,
}

#[derive(Clone, Copy, PartialEq, ::prost::Message)]
pub struct TimeReply {
    /// Echo of the request's client time
    #[prost(uint64, tag = "1")]
    pub client_time_us: u64,
    #[prost(uint64, tag = "2")]
    pub server_time_us: u64,
}

impl FabricPdu {
    pub fn subscribe(topic: &str) -> Self {
        Self::from(fabric_pdu::Kind::Subscribe(Subscribe {
            topic: topic.to_owned(),
        }))
    }

    pub fn publish(topic: &str, payload: Bytes) -> Self {
        Self::from(fabric_pdu::Kind::Publish(Publish {
            topic: topic.to_owned(),
            payload,
        }))
    }

    pub fn update(topic: &str, payload: Bytes, server_time: Timestamp) -> Self {
        Self::from(fabric_pdu::Kind::Update(Update {
            topic: topic.to_owned(),
            payload,
            server_time_us: server_time.as_micros(),
        }))
    }

    pub fn time_request(client_time: Timestamp) -> Self {
        Self::from(fabric_pdu::Kind::TimeRequest(TimeRequest {
            client_time_us: client_time.as_micros(),
        }))
    }

    pub fn time_reply(client_time_us: u64, server_time: Timestamp) -> Self {
        Self::from(fabric_pdu::Kind::TimeReply(TimeReply {
            client_time_us,
            server_time_us: server_time.as_micros(),
        }))
    }
}

impl From<fabric_pdu::Kind> for FabricPdu {
    fn from(kind: fabric_pdu::Kind) -> Self {
        Self { kind: Some(kind) }
    }
}

/// Check that a publish of `payload` on `topic` can be forwarded to subscribers.
///
/// The server forwards a publish as an update, which adds the server time, so the update is
/// what has to stay within [MAX_PDU_SIZE].
pub fn check_publish_size(topic: &str, payload: &Bytes) -> Result<(), Error> {
    let update = FabricPdu::update(topic, payload.clone(), Timestamp::from_micros(u64::MAX));
    if update.encoded_len() > MAX_PDU_SIZE {
        return Err(Error::Io((
            ErrorKind::InvalidInput.into(),
            "max pdu size exceeded",
        )));
    }
    Ok(())
}

/// Append the length-prefixed encoding of `pdu` to `dst`
pub fn encode_frame(pdu: &FabricPdu, dst: &mut BytesMut) -> Result<(), Error> {
    let len = pdu.encoded_len();
    if len > MAX_PDU_SIZE {
        return Err(Error::Io((
            ErrorKind::InvalidInput.into(),
            "max pdu size exceeded",
        )));
    }
    dst.reserve(LENGTH_PREFIX_SIZE + len);
    // Bounded by MAX_PDU_SIZE above
    dst.put_u32(len as u32);
    pdu.encode(dst)
        .map_err(|_| Error::Io((ErrorKind::OutOfMemory.into(), "pdu buffer too small")))
}

/// Take the next complete PDU off the front of `src`.
///
/// Returns `Ok(None)` if `src` does not hold a complete frame yet.
pub fn decode_frame(src: &mut BytesMut) -> Result<Option<FabricPdu>, Error> {
    if src.len() < LENGTH_PREFIX_SIZE {
        return Ok(None);
    }
    let mut prefix = [0u8; LENGTH_PREFIX_SIZE];
    prefix.copy_from_slice(&src[..LENGTH_PREFIX_SIZE]);
    let len = u32::from_be_bytes(prefix) as usize;
    if len > MAX_PDU_SIZE {
        return Err(Error::Io((
            ErrorKind::InvalidData.into(),
            "max pdu size exceeded",
        )));
    }
    if src.len() < LENGTH_PREFIX_SIZE + len {
        return Ok(None);
    }

    src.advance(LENGTH_PREFIX_SIZE);
    let frame = src.split_to(len).freeze();
    FabricPdu::decode(frame)
        .map(Some)
        .map_err(|e| Error::Decode((e, "invalid fabric pdu")))
}
