// Copyright AGNTCY Contributors (https://github.com/agntcy)
// SPDX-License-Identifier: Apache-2.0

//! Transport abstraction.
//!
//! Both transports expose the same capability: call one method with a
//! frozen metadata set and an attempt deadline, produce a typed reply or
//! a `Status`. The invoker dispatches on the tagged variant; per-method
//! semantics are identical across the two for well-formed requests and
//! non-error responses.

pub mod grpc;
pub mod rest;

use std::time::Duration;

use cortex_types::{Metadata, RequestMessage, ResponseMessage, Result};

use crate::method::MethodDescriptor;

pub use grpc::GrpcTransport;
pub use rest::RestTransport;

/// A decoded response together with the metadata the server returned.
#[derive(Debug, Clone)]
pub struct Reply<Res> {
    pub message: Res,
    pub metadata: Metadata,
}

/// Transport kind for one client.
#[derive(Clone)]
pub enum Transport {
    Grpc(GrpcTransport),
    Rest(RestTransport),
}

impl Transport {
    /// Dispatch one unary attempt.
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
        match self {
            Transport::Grpc(transport) => transport.unary(method, timeout, metadata, request).await,
            Transport::Rest(transport) => transport.unary(method, timeout, metadata, request).await,
        }
    }
}

impl std::fmt::Debug for Transport {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            Transport::Grpc(_) => f.write_str("Transport::Grpc"),
            Transport::Rest(_) => f.write_str("Transport::Rest"),
        }
    }
}
