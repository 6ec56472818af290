// Copyright AGNTCY Contributors (https://github.com/agntcy)
// SPDX-License-Identifier: Apache-2.0

//! Per-method call assembly.
//!
//! The invoker composes the whole pipeline for one generated method:
//! request building, routing-header derivation, context construction,
//! credential attachment, interceptor pre-hooks, retrying dispatch
//! through the transport, response wrapping (paginator or LRO future)
//! and interceptor post-hooks.

use std::sync::Arc;
use std::time::Duration;

use serde::de::DeserializeOwned;

use cortex_auth::{Anonymous, Credentials};
use cortex_config::retry::{PollingPolicy, RetryPolicy};
use cortex_types::{Metadata, RequestMessage, ResponseMessage, Result, Status};

use crate::context::{CallContext, CallOptions};
use crate::fields::{get_field, is_default, set_field};
use crate::interceptor::InterceptorChain;
use crate::lro::{Operation, OperationDescriptor, OperationsClient};
use crate::method::MethodDescriptor;
use crate::paginator::{PageableRequest, PageableResponse, Paginator};
use crate::retry;
use crate::routing::{ROUTING_HEADER, routing_header};
use crate::transport::Transport;

/// Client-level defaults merged into every call.
#[derive(Debug, Clone)]
pub struct CallDefaults {
    /// Metadata prepended to every call (client info, static headers).
    pub metadata: Metadata,
    /// Default retry policy for idempotent methods.
    pub retry: Option<RetryPolicy>,
    /// Default overall timeout when the caller sets none.
    pub timeout: Option<Duration>,
    /// Polling schedule for LRO futures.
    pub polling: PollingPolicy,
}

impl Default for CallDefaults {
    fn default() -> Self {
        Self {
            metadata: Metadata::new(),
            retry: None,
            timeout: None,
            polling: PollingPolicy::default(),
        }
    }
}

/// One-construction-path request builder.
///
/// Generated methods accept either a full request message or a few
/// flattened convenience fields; both funnel through here. Supplying a
/// non-default value for a field both ways is a local
/// `INVALID_ARGUMENT`, raised before any network activity.
pub struct RequestBuilder<Req> {
    request: Req,
    overrides: Vec<(String, serde_json::Value)>,
}

impl<Req> RequestBuilder<Req>
where
    Req: RequestMessage + DeserializeOwned + Default,
{
    pub fn new() -> Self {
        Self {
            request: Req::default(),
            overrides: Vec::new(),
        }
    }

    pub fn from_request(request: Req) -> Self {
        Self {
            request,
            overrides: Vec::new(),
        }
    }

    /// Record a flattened field override (snake_case, dot-separated).
    pub fn set(mut self, field: &str, value: impl Into<serde_json::Value>) -> Self {
        self.overrides.push((field.to_string(), value.into()));
        self
    }

    pub fn build(self) -> Result<Req> {
        if self.overrides.is_empty() {
            return Ok(self.request);
        }

        let mut value = serde_json::to_value(&self.request)
            .map_err(|e| Status::internal(format!("request serialization failed: {}", e)))?;

        for (field, new) in &self.overrides {
            // Default-valued flattened arguments are no-ops.
            if is_default(new) {
                continue;
            }
            if let Some(existing) = get_field(&value, field) {
                if !is_default(existing) {
                    return Err(Status::invalid_argument(format!(
                        "field {} is set in both the request and the flattened arguments",
                        field
                    )));
                }
            }
            set_field(&mut value, field, new.clone())?;
        }

        serde_json::from_value(value)
            .map_err(|e| Status::internal(format!("request rebuilding failed: {}", e)))
    }
}

impl<Req> Default for RequestBuilder<Req>
where
    Req: RequestMessage + DeserializeOwned + Default,
{
    fn default() -> Self {
        Self::new()
    }
}

/// Executes calls for one client. Cheap to clone; safe to share across
/// concurrent callers.
#[derive(Clone)]
pub struct Invoker {
    transport: Transport,
    credentials: Arc<dyn Credentials>,
    interceptors: Arc<InterceptorChain>,
    defaults: CallDefaults,
}

impl Invoker {
    pub fn new(transport: Transport) -> Self {
        Self {
            transport,
            credentials: Arc::new(Anonymous),
            interceptors: Arc::new(InterceptorChain::new()),
            defaults: CallDefaults::default(),
        }
    }

    pub fn with_credentials(self, credentials: Arc<dyn Credentials>) -> Self {
        Self {
            credentials,
            ..self
        }
    }

    pub fn with_interceptors(self, interceptors: InterceptorChain) -> Self {
        Self {
            interceptors: Arc::new(interceptors),
            ..self
        }
    }

    pub fn with_defaults(self, defaults: CallDefaults) -> Self {
        Self { defaults, ..self }
    }

    /// Build the per-call context. Non-idempotent methods drop the
    /// default retry policy; an explicit per-call policy still applies.
    pub(crate) fn context(&self, method: &MethodDescriptor, mut options: CallOptions) -> CallContext {
        let default_retry = if method.idempotent {
            self.defaults.retry.clone()
        } else {
            None
        };
        if options.timeout.is_none() {
            options.timeout = self.defaults.timeout;
        }
        CallContext::new(
            options,
            self.defaults.metadata.clone(),
            default_retry,
            self.interceptors.clone(),
        )
    }

    /// Execute one unary method.
    pub async fn unary<Req, Res>(
        &self,
        method: &MethodDescriptor,
        request: Req,
        options: CallOptions,
    ) -> Result<Res>
    where
        Req: RequestMessage + 'static,
        Res: ResponseMessage + 'static,
    {
        let mut ctx = self.context(method, options);
        ctx.check_cancelled()?;

        self.credentials
            .apply(ctx.metadata_mut())
            .await
            .map_err(|e| Status::unauthenticated(e.to_string()))?;

        let mut request = request;
        if !method.routing.is_empty() {
            let value = serde_json::to_value(&request)
                .map_err(|e| Status::internal(format!("request serialization failed: {}", e)))?;
            if let Some(header) = routing_header(&value, &method.routing) {
                ctx.metadata_mut().insert(ROUTING_HEADER, header);
            }
        }

        let interceptors = ctx.interceptors().clone();
        interceptors.pre(method, &mut request, ctx.metadata_mut())?;

        // Metadata is frozen from here on.
        let metadata = ctx.metadata().clone();
        let transport = &self.transport;
        let request_ref = &request;
        let metadata_ref = &metadata;

        let reply = retry::retry(&ctx, move |attempt| async move {
            transport
                .unary::<Req, Res>(method, attempt.timeout, metadata_ref, request_ref)
                .await
        })
        .await?;

        let mut message = reply.message;
        interceptors.post(method, &mut message)?;
        Ok(message)
    }

    /// Execute a list method, wrapping it in a pagination driver. Each
    /// page fetch is a full call: retry, deadline, cancellation and
    /// metadata all apply per page.
    pub fn paged<Req, Res>(
        &self,
        method: Arc<MethodDescriptor>,
        request: Req,
        options: CallOptions,
    ) -> Paginator<Req, Res>
    where
        Req: RequestMessage + PageableRequest + DeserializeOwned + Clone + 'static,
        Res: ResponseMessage + PageableResponse + 'static,
    {
        let invoker = self.clone();
        Paginator::new(request, move |page_request: Req| {
            let invoker = invoker.clone();
            let method = method.clone();
            let options = options.clone();
            Box::pin(async move { invoker.unary::<Req, Res>(&method, page_request, options).await })
        })
    }

    /// Execute a long-running method, wrapping the returned operation in
    /// a typed future polled through the operations sub-surface.
    pub async fn long_running<Req, WireOp, R, M>(
        &self,
        method: &MethodDescriptor,
        request: Req,
        options: CallOptions,
        operations: Arc<dyn OperationsClient>,
    ) -> Result<Operation<R, M>>
    where
        Req: RequestMessage + 'static,
        WireOp: ResponseMessage + Into<OperationDescriptor> + 'static,
        R: ResponseMessage,
        M: ResponseMessage,
    {
        let cancel = options.cancel.clone();
        let wire: WireOp = self.unary(method, request, options).await?;
        let descriptor: OperationDescriptor = wire.into();
        tracing::debug!(operation = %descriptor.name, done = descriptor.done, "operation started");

        let mut operation = Operation::new(descriptor, operations, self.defaults.polling.clone());
        if let Some(token) = cancel {
            operation = operation.with_cancellation(token);
        }
        Ok(operation)
    }
}

impl std::fmt::Debug for Invoker {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("Invoker")
            .field("transport", &self.transport)
            .field("interceptors", &self.interceptors)
            .finish()
    }
}
