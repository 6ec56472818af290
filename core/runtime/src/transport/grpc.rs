// Copyright AGNTCY Contributors (https://github.com/agntcy)
// SPDX-License-Identifier: Apache-2.0

//! Binary framed transport.
//!
//! Message encoding stays behind the codec capability of
//! `cortex_types`; the tonic call itself moves raw bytes through an
//! identity codec. Within one call all metadata precedes the request
//! frame and the response is exactly one message or one status; the
//! channel multiplexes concurrent calls without serializing them.

use std::time::Duration;

use bytes::{Buf, BufMut, Bytes};
use http::uri::PathAndQuery;
use tonic::codec::{DecodeBuf, EncodeBuf};
use tonic::metadata::{
    AsciiMetadataKey, AsciiMetadataValue, BinaryMetadataKey, BinaryMetadataValue, KeyAndValueRef,
    MetadataMap,
};
use tonic::transport::Channel;

use cortex_types::{Metadata, MetadataValue, RequestMessage, ResponseMessage, Result, Status};

use crate::method::MethodDescriptor;
use crate::transport::Reply;

/// Identity codec: the payload bytes are already encoded.
#[derive(Debug, Clone, Default)]
struct BytesCodec;

#[derive(Debug, Clone, Default)]
struct BytesEncoder;

#[derive(Debug, Clone, Default)]
struct BytesDecoder;

impl tonic::codec::Encoder for BytesEncoder {
    type Item = Bytes;
    type Error = tonic::Status;

    fn encode(&mut self, item: Bytes, dst: &mut EncodeBuf<'_>) -> std::result::Result<(), tonic::Status> {
        dst.put(item);
        Ok(())
    }
}

impl tonic::codec::Decoder for BytesDecoder {
    type Item = Bytes;
    type Error = tonic::Status;

    fn decode(
        &mut self,
        src: &mut DecodeBuf<'_>,
    ) -> std::result::Result<Option<Bytes>, tonic::Status> {
        let len = src.remaining();
        Ok(Some(src.copy_to_bytes(len)))
    }
}

impl tonic::codec::Codec for BytesCodec {
    type Encode = Bytes;
    type Decode = Bytes;
    type Encoder = BytesEncoder;
    type Decoder = BytesDecoder;

    fn encoder(&mut self) -> Self::Encoder {
        BytesEncoder
    }

    fn decoder(&mut self) -> Self::Decoder {
        BytesDecoder
    }
}

/// Unary client over a shared tonic channel.
#[derive(Clone)]
pub struct GrpcTransport {
    channel: Channel,
}

impl GrpcTransport {
    pub fn new(channel: Channel) -> Self {
        Self { channel }
    }

    pub async fn unary<Req, Res>(
        &self,
        method: &MethodDescriptor,
        timeout: Option<Duration>,
        metadata: &Metadata,
        request: &Req,
    ) -> Result<Reply<Res>>
    where
        Req: RequestMessage,
        Res: ResponseMessage,
    {
        let path = PathAndQuery::try_from(method.grpc_path())
            .map_err(|e| Status::internal(format!("invalid method path: {}", e)))?;

        let payload: Bytes = request.encode_to_vec()?.into();

        let mut grpc_request = tonic::Request::new(payload);
        *grpc_request.metadata_mut() = to_tonic_metadata(metadata)?;
        if let Some(timeout) = timeout {
            grpc_request.set_timeout(timeout);
        }

        tracing::debug!(method = %method.full_name(), "dispatching unary call");

        let mut grpc = tonic::client::Grpc::new(self.channel.clone());
        grpc.ready()
            .await
            .map_err(|e| Status::unavailable(format!("channel not ready: {}", e)))?;

        let response = grpc
            .unary(grpc_request, path, BytesCodec)
            .await
            .map_err(Status::from)?;

        let (headers, body, _extensions) = response.into_parts();
        let message = Res::decode(&body)?;

        Ok(Reply {
            message,
            metadata: from_tonic_metadata(&headers),
        })
    }
}

fn to_tonic_metadata(metadata: &Metadata) -> Result<MetadataMap> {
    let mut map = MetadataMap::new();
    for (key, value) in metadata.iter() {
        match value {
            MetadataValue::Ascii(s) => {
                let key: AsciiMetadataKey = key
                    .parse()
                    .map_err(|_| Status::internal(format!("invalid metadata key: {}", key)))?;
                let value: AsciiMetadataValue = s
                    .parse()
                    .map_err(|_| Status::internal(format!("invalid metadata value for {}", key)))?;
                map.append(key, value);
            }
            MetadataValue::Binary(bytes) => {
                let key: BinaryMetadataKey = key
                    .parse()
                    .map_err(|_| Status::internal(format!("invalid metadata key: {}", key)))?;
                map.append_bin(key, BinaryMetadataValue::from_bytes(bytes));
            }
        }
    }
    Ok(map)
}

fn from_tonic_metadata(map: &MetadataMap) -> Metadata {
    let mut metadata = Metadata::new();
    for entry in map.iter() {
        match entry {
            KeyAndValueRef::Ascii(key, value) => {
                if let Ok(value) = value.to_str() {
                    metadata.append(key.as_str(), value);
                }
            }
            KeyAndValueRef::Binary(key, value) => {
                if let Ok(bytes) = value.to_bytes() {
                    metadata.insert_bin(key.as_str(), bytes.to_vec());
                }
            }
        }
    }
    metadata
}
