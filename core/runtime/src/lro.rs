// Copyright AGNTCY Contributors (https://github.com/agntcy)
// SPDX-License-Identifier: Apache-2.0

//! Long-running-operation futures.
//!
//! A long-running method returns an operation descriptor naming a
//! server-side job. `Operation` wraps that descriptor and polls the
//! operations sub-surface until the job is terminal. The cached
//! descriptor is monotonic in `done`: once a poll observes completion,
//! no later observation can revert it, and no further RPCs are issued.

use std::marker::PhantomData;
use std::sync::{Arc, Mutex};
use std::time::Duration;

use async_trait::async_trait;
use serde::Deserialize;
use tokio::time::Instant;
use tokio_util::sync::CancellationToken;

use cortex_config::retry::PollingPolicy;
use cortex_types::{Code, ResponseMessage, Result, Status};

/// Response or metadata payload in the transport's encoding, decoded
/// lazily on accessor calls.
#[derive(Debug, Clone, PartialEq)]
pub enum EncodedPayload {
    /// Canonical JSON form (REST transport).
    Json(serde_json::Value),
    /// Binary message bytes (framed transport).
    Binary(Vec<u8>),
}

impl EncodedPayload {
    pub fn decode<T: ResponseMessage>(&self) -> Result<T> {
        match self {
            EncodedPayload::Json(value) => serde_json::from_value(value.clone())
                .map_err(|e| Status::internal(format!("payload decoding failed: {}", e))),
            EncodedPayload::Binary(bytes) => T::decode(bytes),
        }
    }
}

/// Observable state of an operation.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum OperationState {
    /// Not done; no poll has observed progress yet.
    Pending,
    /// Not done; at least one poll has come back.
    Running,
    Succeeded,
    Failed,
    Cancelled,
}

impl OperationState {
    pub fn is_terminal(&self) -> bool {
        matches!(
            self,
            OperationState::Succeeded | OperationState::Failed | OperationState::Cancelled
        )
    }
}

/// Server-side view of one operation.
///
/// When `done` is true, exactly one of `error` and `response` is set.
#[derive(Debug, Clone)]
pub struct OperationDescriptor {
    pub name: String,
    pub done: bool,
    pub error: Option<Status>,
    pub response: Option<EncodedPayload>,
    pub metadata: Option<EncodedPayload>,
}

impl OperationDescriptor {
    pub fn pending(name: impl Into<String>) -> Self {
        Self {
            name: name.into(),
            done: false,
            error: None,
            response: None,
            metadata: None,
        }
    }

    pub fn succeeded(name: impl Into<String>, response: EncodedPayload) -> Self {
        Self {
            name: name.into(),
            done: true,
            error: None,
            response: Some(response),
            metadata: None,
        }
    }

    pub fn failed(name: impl Into<String>, error: Status) -> Self {
        Self {
            name: name.into(),
            done: true,
            error: Some(error),
            response: None,
            metadata: None,
        }
    }

    pub fn with_metadata(mut self, metadata: EncodedPayload) -> Self {
        self.metadata = Some(metadata);
        self
    }
}

/// Canonical JSON wire form of an operation, as the REST transport
/// returns it. Generated binary stubs provide their own wire type; both
/// convert into [`OperationDescriptor`].
#[derive(Debug, Clone, Default, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct JsonOperation {
    #[serde(default)]
    pub name: String,
    #[serde(default)]
    pub done: bool,
    #[serde(default)]
    pub error: Option<JsonOperationError>,
    #[serde(default)]
    pub response: Option<serde_json::Value>,
    #[serde(default)]
    pub metadata: Option<serde_json::Value>,
}

#[derive(Debug, Clone, Default, Deserialize)]
pub struct JsonOperationError {
    #[serde(default)]
    pub code: i32,
    #[serde(default)]
    pub message: String,
    #[serde(default)]
    pub details: Vec<serde_json::Value>,
}

impl cortex_types::Decoder for JsonOperation {
    fn decode(buf: &[u8]) -> Result<Self> {
        serde_json::from_slice(buf)
            .map_err(|e| Status::internal(format!("operation decoding failed: {}", e)))
    }
}

impl From<JsonOperation> for OperationDescriptor {
    fn from(op: JsonOperation) -> Self {
        let error = op.error.map(|e| {
            let code = Code::from_i32(e.code).unwrap_or(Code::Internal);
            Status::new(code, e.message).with_details(e.details)
        });
        OperationDescriptor {
            name: op.name,
            done: op.done,
            error,
            response: op.response.map(EncodedPayload::Json),
            metadata: op.metadata.map(EncodedPayload::Json),
        }
    }
}

/// The operations sub-surface: every service exposes it alongside its
/// own methods, and the generated stub adapts it to this trait so the
/// future can poll through the same transport.
#[async_trait]
pub trait OperationsClient: Send + Sync {
    /// Fetch the latest descriptor by name.
    async fn get(&self, name: &str) -> Result<OperationDescriptor>;

    /// Request server-side cancellation; completion is not guaranteed on
    /// return.
    async fn cancel(&self, name: &str) -> Result<()>;

    /// Remove the server record of a terminal operation.
    async fn delete(&self, name: &str) -> Result<()>;

    /// List operations matching the filter, one page at a time.
    async fn list(
        &self,
        filter: &str,
        page_token: &str,
    ) -> Result<(Vec<OperationDescriptor>, String)>;
}

struct OperationInner {
    latest: OperationDescriptor,
    polled: bool,
}

/// Typed future over one server-side operation.
///
/// `R` is the response type the method declared, `M` its metadata type;
/// decoding happens lazily on accessor calls.
pub struct Operation<R, M> {
    name: String,
    client: Arc<dyn OperationsClient>,
    polling: PollingPolicy,
    cancel: CancellationToken,
    inner: Mutex<OperationInner>,
    _types: PhantomData<fn() -> (R, M)>,
}

impl<R, M> Operation<R, M>
where
    R: ResponseMessage,
    M: ResponseMessage,
{
    /// Wrap an initial descriptor returned by a long-running method.
    pub fn new(
        descriptor: OperationDescriptor,
        client: Arc<dyn OperationsClient>,
        polling: PollingPolicy,
    ) -> Self {
        Self {
            name: descriptor.name.clone(),
            client,
            polling,
            cancel: CancellationToken::new(),
            inner: Mutex::new(OperationInner {
                latest: descriptor,
                polled: false,
            }),
            _types: PhantomData,
        }
    }

    pub fn with_cancellation(mut self, cancel: CancellationToken) -> Self {
        self.cancel = cancel;
        self
    }

    pub fn name(&self) -> &str {
        &self.name
    }

    pub fn done(&self) -> bool {
        self.inner.lock().unwrap().latest.done
    }

    pub fn state(&self) -> OperationState {
        let inner = self.inner.lock().unwrap();
        if !inner.latest.done {
            return if inner.polled {
                OperationState::Running
            } else {
                OperationState::Pending
            };
        }
        match &inner.latest.error {
            Some(error) if error.code() == Code::Cancelled => OperationState::Cancelled,
            Some(_) => OperationState::Failed,
            None => OperationState::Succeeded,
        }
    }

    /// Latest cached descriptor.
    pub fn descriptor(&self) -> OperationDescriptor {
        self.inner.lock().unwrap().latest.clone()
    }

    /// Fetch the latest descriptor from the server. Once the cached
    /// descriptor is terminal this is a no-op returning the cache.
    pub async fn poll(&self) -> Result<OperationDescriptor> {
        if self.done() {
            return Ok(self.descriptor());
        }

        let descriptor = self.client.get(&self.name).await?;
        let mut inner = self.inner.lock().unwrap();
        inner.polled = true;
        // done is monotonic: a stale not-done read never overwrites a
        // terminal descriptor.
        if !(inner.latest.done && !descriptor.done) {
            inner.latest = descriptor;
        }
        Ok(inner.latest.clone())
    }

    /// Poll on the policy's backoff schedule until the operation is
    /// terminal or `timeout` has elapsed. Expiry raises
    /// `DEADLINE_EXCEEDED` without touching server state.
    pub async fn wait(&self, timeout: Duration) -> Result<OperationDescriptor> {
        let deadline = Instant::now() + timeout;
        let mut poll_index = 0u32;

        loop {
            if self.done() {
                return Ok(self.descriptor());
            }

            let delay = self.polling.delay_for(poll_index);
            if Instant::now() + delay > deadline {
                return Err(Status::deadline_exceeded(format!(
                    "operation {} did not complete within {:?}",
                    self.name, timeout
                )));
            }

            tokio::select! {
                _ = self.cancel.cancelled() => {
                    return Err(Status::cancelled("wait cancelled"));
                }
                _ = tokio::time::sleep(delay) => {}
            }

            tracing::debug!(operation = %self.name, poll = poll_index, "polling operation");
            self.poll().await?;
            poll_index += 1;
        }
    }

    /// Resolve the typed response: wait until terminal (bounded by
    /// `timeout`), then decode the result or raise the stored status.
    /// Idempotent after the first terminal observation.
    pub async fn result(&self, timeout: Duration) -> Result<R> {
        let descriptor = self.wait(timeout).await?;

        if let Some(error) = descriptor.error {
            return Err(error);
        }
        let payload = descriptor.response.ok_or_else(|| {
            Status::internal(format!(
                "operation {} completed without response or error",
                self.name
            ))
        })?;
        payload.decode()
    }

    /// Decode the latest metadata, if the server attached any. The value
    /// may change across polls.
    pub fn metadata(&self) -> Result<Option<M>> {
        let inner = self.inner.lock().unwrap();
        match &inner.latest.metadata {
            Some(payload) => Ok(Some(payload.decode()?)),
            None => Ok(None),
        }
    }

    /// Ask the server to cancel the operation. The operation may still
    /// complete; observe the state through further polls.
    pub async fn cancel(&self) -> Result<()> {
        self.client.cancel(&self.name).await
    }

    /// Delete the server record of the terminal operation.
    pub async fn delete(&self) -> Result<()> {
        self.client.delete(&self.name).await
    }
}

impl<R, M> std::fmt::Debug for Operation<R, M> {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("Operation")
            .field("name", &self.name)
            .field("done", &self.inner.lock().unwrap().latest.done)
            .finish()
    }
}
