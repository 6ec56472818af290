// Copyright AGNTCY Contributors (https://github.com/agntcy)
// SPDX-License-Identifier: Apache-2.0

//! Generic RPC call runtime for generated Cortex clients.
//!
//! Generated service stubs depend on this crate for everything that is
//! not schema-specific: the transport abstraction (binary framed RPC or
//! JSON-over-HTTP), the per-call pipeline (routing headers, retry,
//! deadlines, cancellation, metadata, interceptors), pagination over
//! list methods and long-running-operation futures.

pub mod context;
pub mod fields;
pub mod interceptor;
pub mod invoker;
pub mod lro;
pub mod method;
pub mod paginator;
pub mod retry;
pub mod routing;
pub mod transport;


pub use context::{CallContext, CallOptions};
pub use interceptor::{AnyMessage, Interceptor, InterceptorChain};
pub use invoker::{CallDefaults, Invoker, RequestBuilder};
pub use lro::{
    EncodedPayload, JsonOperation, Operation, OperationDescriptor, OperationState,
    OperationsClient,
};
pub use method::{BodySelector, HttpRule, MethodDescriptor, MethodKind, RoutingParam};
pub use paginator::{PageableRequest, PageableResponse, Paginator};
pub use transport::{Reply, Transport};
