// Copyright AGNTCY Contributors (https://github.com/agntcy)
// SPDX-License-Identifier: Apache-2.0

//! REST-transport client configuration.
//!
//! Produces the `reqwest` client used by the JSON transport, sharing the
//! TLS settings with the binary transport so both resolve the same way.

use duration_string::DurationString;
use http::header::{HeaderMap, HeaderName, HeaderValue};
use schemars::JsonSchema;
use serde::{Deserialize, Serialize};
use std::collections::HashMap;
use std::str::FromStr;
use std::time::Duration;

use crate::component::Configuration;
use crate::grpc::errors::ConfigError;
use crate::tls::{TlsClientConfig, initialize_crypto_provider};

fn default_connect_timeout() -> DurationString {
    Duration::from_secs(0).into()
}

fn default_request_timeout() -> DurationString {
    Duration::from_secs(0).into()
}

/// Configuration for the REST transport of one client.
#[derive(Debug, Serialize, Deserialize, Clone, PartialEq, JsonSchema)]
pub struct HttpClientConfig {
    /// Base URL of the REST endpoint, e.g. `https://api.cortex.example.com`.
    pub endpoint: String,

    /// TLS client configuration.
    #[serde(default, rename = "tls")]
    pub tls_setting: TlsClientConfig,

    /// Timeout for the connection.
    #[serde(default = "default_connect_timeout")]
    #[schemars(with = "String")]
    pub connect_timeout: DurationString,

    /// Timeout per request; per-call deadlines below this still apply.
    #[serde(default = "default_request_timeout")]
    #[schemars(with = "String")]
    pub request_timeout: DurationString,

    /// Static headers attached to every request.
    #[serde(default)]
    pub headers: HashMap<String, String>,
}

impl Default for HttpClientConfig {
    fn default() -> Self {
        HttpClientConfig {
            endpoint: String::new(),
            tls_setting: TlsClientConfig::default(),
            connect_timeout: default_connect_timeout(),
            request_timeout: default_request_timeout(),
            headers: HashMap::new(),
        }
    }
}

impl Configuration for HttpClientConfig {
    type Error = ConfigError;

    fn validate(&self) -> Result<(), Self::Error> {
        if self.endpoint.is_empty() {
            return Err(ConfigError::MissingEndpoint);
        }
        self.tls_setting.validate()?;
        Ok(())
    }
}

impl HttpClientConfig {
    pub fn with_endpoint(endpoint: &str) -> Self {
        Self {
            endpoint: endpoint.to_string(),
            ..Self::default()
        }
    }

    pub fn with_tls_setting(self, tls_setting: TlsClientConfig) -> Self {
        Self {
            tls_setting,
            ..self
        }
    }

    pub fn with_connect_timeout(self, connect_timeout: Duration) -> Self {
        Self {
            connect_timeout: connect_timeout.into(),
            ..self
        }
    }

    pub fn with_request_timeout(self, request_timeout: Duration) -> Self {
        Self {
            request_timeout: request_timeout.into(),
            ..self
        }
    }

    pub fn with_headers(self, headers: HashMap<String, String>) -> Self {
        Self { headers, ..self }
    }

    fn header_map(&self) -> Result<HeaderMap, ConfigError> {
        let mut header_map = HeaderMap::new();
        for (key, value) in &self.headers {
            let name = HeaderName::from_str(key)?;
            let value = HeaderValue::from_str(value)?;
            header_map.insert(name, value);
        }
        Ok(header_map)
    }

    /// Builds the `reqwest` client for this configuration.
    pub fn to_client(&self) -> Result<reqwest::Client, ConfigError> {
        self.validate()?;
        initialize_crypto_provider();

        let mut builder = reqwest::Client::builder().default_headers(self.header_map()?);

        let connect_timeout: Duration = self.connect_timeout.into();
        if connect_timeout.as_secs() > 0 {
            builder = builder.connect_timeout(connect_timeout);
        }
        let request_timeout: Duration = self.request_timeout.into();
        if request_timeout.as_secs() > 0 {
            builder = builder.timeout(request_timeout);
        }

        if let Some(tls) = self.tls_setting.load_rustls_config()? {
            builder = builder.use_preconfigured_tls(tls);
        }

        Ok(builder.build()?)
    }
}
