// Copyright AGNTCY Contributors (https://github.com/agntcy)
// SPDX-License-Identifier: Apache-2.0

//! Per-method call descriptors.
//!
//! Generated clients build one descriptor per method at construction
//! time; the invoker and both transports dispatch on it. The operations
//! sub-surface reuses the same mechanism with its own descriptors, so no
//! client ever holds a reference to another client.

use http::Method as HttpMethod;

use cortex_path::{PathTemplate, TemplateError};

/// What the invoker wraps the response in.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum MethodKind {
    /// Plain request/response.
    Unary,
    /// List method driven through a paginator.
    Paged,
    /// Returns an operation polled through an LRO future.
    LongRunning,
}

/// Which part of the request becomes the HTTP body.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum BodySelector {
    /// No body; POST/PUT/PATCH send an empty payload.
    None,
    /// The entire request minus path-bound and query fields.
    All,
    /// A single request field (snake_case name).
    Field(String),
}

/// HTTP binding of one method: verb, URI template, body and query rules.
#[derive(Debug, Clone)]
pub struct HttpRule {
    pub verb: HttpMethod,
    pub template: PathTemplate,
    pub body: BodySelector,
    pub query_fields: Vec<String>,
}

impl HttpRule {
    pub fn new(verb: HttpMethod, template: &str) -> Result<Self, TemplateError> {
        Ok(Self {
            verb,
            template: PathTemplate::new(template)?,
            body: BodySelector::None,
            query_fields: Vec::new(),
        })
    }

    pub fn with_body(self, field: &str) -> Self {
        let body = if field == "*" {
            BodySelector::All
        } else {
            BodySelector::Field(field.to_string())
        };
        Self { body, ..self }
    }

    pub fn with_query_fields(self, fields: &[&str]) -> Self {
        Self {
            query_fields: fields.iter().map(|f| f.to_string()).collect(),
            ..self
        }
    }
}

/// Field whose value feeds the routing header.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct RoutingParam {
    /// Request field path (snake_case, dot-separated).
    pub field: String,
}

impl RoutingParam {
    pub fn new(field: &str) -> Self {
        Self {
            field: field.to_string(),
        }
    }
}

/// Everything the runtime needs to know about one method.
#[derive(Debug, Clone)]
pub struct MethodDescriptor {
    /// Fully qualified service name, e.g. `cortex.pipeline.v1.PipelineService`.
    pub service: String,
    /// Method name, e.g. `CreatePipelineJob`.
    pub method: String,
    pub kind: MethodKind,
    /// Non-idempotent methods are never retried unless the call carries
    /// an explicit retry policy.
    pub idempotent: bool,
    pub http: Option<HttpRule>,
    pub routing: Vec<RoutingParam>,
}

impl MethodDescriptor {
    pub fn new(service: &str, method: &str, kind: MethodKind) -> Self {
        Self {
            service: service.to_string(),
            method: method.to_string(),
            kind,
            idempotent: false,
            http: None,
            routing: Vec::new(),
        }
    }

    pub fn idempotent(self) -> Self {
        Self {
            idempotent: true,
            ..self
        }
    }

    pub fn with_http(self, http: HttpRule) -> Self {
        Self {
            http: Some(http),
            ..self
        }
    }

    pub fn with_routing(self, routing: Vec<RoutingParam>) -> Self {
        Self { routing, ..self }
    }

    /// Path of the framed unary call, `/{service}/{method}`.
    pub fn grpc_path(&self) -> String {
        format!("/{}/{}", self.service, self.method)
    }

    /// Human-readable identity used in logs and errors.
    pub fn full_name(&self) -> String {
        format!("{}.{}", self.service, self.method)
    }
}
