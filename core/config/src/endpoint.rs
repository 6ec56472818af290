// Copyright AGNTCY Contributors (https://github.com/agntcy)
// SPDX-License-Identifier: Apache-2.0

//! Endpoint selection between the default and the mutual-TLS endpoint.
//!
//! The tri-state policy mirrors the environment contract consumed by
//! client constructors: `always` and `never` force the choice, `auto`
//! selects the mTLS endpoint exactly when a client certificate is
//! available.

use schemars::JsonSchema;
use serde::{Deserialize, Serialize};
use thiserror::Error;

use crate::component::Configuration;
use crate::tls::TlsClientConfig;

#[derive(Error, Debug, PartialEq)]
pub enum EndpointError {
    #[error("missing endpoint")]
    MissingEndpoint,
    #[error("mTLS required but no client certificate is configured")]
    MissingClientCert,
}

/// When to use the mutual-TLS endpoint.
#[derive(Debug, Serialize, Deserialize, Clone, Copy, PartialEq, Eq, Default, JsonSchema)]
#[serde(rename_all = "snake_case")]
pub enum MtlsPolicy {
    /// Always connect to the mTLS endpoint.
    Always,
    /// Never connect to the mTLS endpoint.
    Never,
    /// Use mTLS when a client certificate is available.
    #[default]
    Auto,
}

/// Resolved endpoint selection.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ResolvedEndpoint {
    pub endpoint: String,
    pub use_mtls: bool,
}

/// Endpoint configuration for one client.
#[derive(Debug, Serialize, Deserialize, Clone, PartialEq, JsonSchema)]
#[serde(default)]
pub struct EndpointConfig {
    /// The default service endpoint.
    pub endpoint: String,

    /// The mutual-TLS service endpoint.
    #[serde(skip_serializing_if = "Option::is_none")]
    pub mtls_endpoint: Option<String>,

    /// Tri-state mTLS policy.
    pub mtls_policy: MtlsPolicy,

    /// Whether the client certificate (if configured) may be used.
    pub use_client_cert: bool,
}

impl Default for EndpointConfig {
    fn default() -> Self {
        EndpointConfig {
            endpoint: String::new(),
            mtls_endpoint: None,
            mtls_policy: MtlsPolicy::default(),
            use_client_cert: false,
        }
    }
}

impl Configuration for EndpointConfig {
    type Error = EndpointError;

    fn validate(&self) -> Result<(), Self::Error> {
        if self.endpoint.is_empty() {
            return Err(EndpointError::MissingEndpoint);
        }
        Ok(())
    }
}

impl EndpointConfig {
    pub fn new(endpoint: &str) -> Self {
        EndpointConfig {
            endpoint: endpoint.to_string(),
            ..Default::default()
        }
    }

    pub fn with_mtls_endpoint(self, mtls_endpoint: &str) -> Self {
        Self {
            mtls_endpoint: Some(mtls_endpoint.to_string()),
            ..self
        }
    }

    pub fn with_mtls_policy(self, mtls_policy: MtlsPolicy) -> Self {
        Self {
            mtls_policy,
            ..self
        }
    }

    pub fn with_use_client_cert(self, use_client_cert: bool) -> Self {
        Self {
            use_client_cert,
            ..self
        }
    }

    /// Pick the endpoint to connect to given the TLS settings.
    pub fn resolve(&self, tls: &TlsClientConfig) -> Result<ResolvedEndpoint, EndpointError> {
        self.validate()?;
        let cert_available = self.use_client_cert && tls.has_client_cert();

        let use_mtls = match self.mtls_policy {
            MtlsPolicy::Always => {
                if !cert_available {
                    return Err(EndpointError::MissingClientCert);
                }
                true
            }
            MtlsPolicy::Never => false,
            MtlsPolicy::Auto => cert_available,
        };

        let endpoint = if use_mtls {
            self.mtls_endpoint
                .clone()
                .unwrap_or_else(|| self.endpoint.clone())
        } else {
            self.endpoint.clone()
        };

        Ok(ResolvedEndpoint { endpoint, use_mtls })
    }
}
