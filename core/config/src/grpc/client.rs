// Copyright AGNTCY Contributors (https://github.com/agntcy)
// SPDX-License-Identifier: Apache-2.0

//! Binary-transport client configuration.
//!
//! Turns the declarative settings into a connected `tonic` channel:
//! endpoint parsing, keepalive, connect/request timeouts, rustls TLS
//! with optional SNI override, and connection retry under the
//! configured backoff.

use duration_string::DurationString;
use rustls_pki_types::ServerName;
use schemars::JsonSchema;
use serde::{Deserialize, Serialize};
use std::collections::HashMap;
use std::str::FromStr;
use std::time::Duration;
use tokio_retry::RetryIf;
use tonic::transport::{Channel, Uri};

use hyper_util::client::legacy::connect::HttpConnector;

use crate::backoff::{BackoffConfig, Strategy};
use crate::component::Configuration;
use crate::grpc::errors::ConfigError;
use crate::tls::TlsClientConfig;

/// Keepalive settings for TCP and HTTP/2.
#[derive(Debug, Serialize, Deserialize, PartialEq, Clone, JsonSchema)]
pub struct KeepaliveConfig {
    /// The duration of the keepalive time for TCP
    #[serde(default = "default_tcp_keepalive")]
    #[schemars(with = "String")]
    pub tcp_keepalive: DurationString,

    /// The duration of the keepalive time for HTTP2
    #[serde(default = "default_http2_keepalive")]
    #[schemars(with = "String")]
    pub http2_keepalive: DurationString,

    /// The timeout duration for the keepalive
    #[serde(default = "default_keepalive_timeout")]
    #[schemars(with = "String")]
    pub timeout: DurationString,

    /// Whether to permit keepalive without an active stream
    #[serde(default)]
    pub keep_alive_while_idle: bool,
}

impl Default for KeepaliveConfig {
    fn default() -> Self {
        KeepaliveConfig {
            tcp_keepalive: default_tcp_keepalive(),
            http2_keepalive: default_http2_keepalive(),
            timeout: default_keepalive_timeout(),
            keep_alive_while_idle: false,
        }
    }
}

fn default_tcp_keepalive() -> DurationString {
    Duration::from_secs(60).into()
}

fn default_http2_keepalive() -> DurationString {
    Duration::from_secs(60).into()
}

fn default_keepalive_timeout() -> DurationString {
    Duration::from_secs(10).into()
}

fn default_connect_timeout() -> DurationString {
    Duration::from_secs(0).into()
}

fn default_request_timeout() -> DurationString {
    Duration::from_secs(0).into()
}

/// Configuration for the binary transport of one client.
#[derive(Debug, Serialize, Deserialize, Clone, PartialEq, JsonSchema)]
pub struct ClientConfig {
    /// The target the client will connect to.
    pub endpoint: String,

    /// Origin (HTTP Host authority override) for the client.
    pub origin: Option<String>,

    /// Optional TLS SNI server name override. If set, this value is used
    /// for TLS server name verification instead of the endpoint host.
    pub server_name: Option<String>,

    /// TLS client configuration.
    #[serde(default, rename = "tls")]
    pub tls_setting: TlsClientConfig,

    /// Keepalive parameters.
    pub keepalive: Option<KeepaliveConfig>,

    /// Timeout for the connection.
    #[serde(default = "default_connect_timeout")]
    #[schemars(with = "String")]
    pub connect_timeout: DurationString,

    /// Timeout per request.
    #[serde(default = "default_request_timeout")]
    #[schemars(with = "String")]
    pub request_timeout: DurationString,

    /// ReadBufferSize.
    pub buffer_size: Option<usize>,

    /// Static headers attached to every call as default metadata.
    #[serde(default)]
    pub headers: HashMap<String, String>,

    /// Backoff applied while establishing the connection.
    #[serde(default)]
    pub backoff: BackoffConfig,
}

impl Default for ClientConfig {
    fn default() -> Self {
        ClientConfig {
            endpoint: String::new(),
            origin: None,
            server_name: None,
            tls_setting: TlsClientConfig::default(),
            keepalive: None,
            connect_timeout: default_connect_timeout(),
            request_timeout: default_request_timeout(),
            buffer_size: None,
            headers: HashMap::new(),
            backoff: BackoffConfig::default(),
        }
    }
}

impl Configuration for ClientConfig {
    type Error = ConfigError;

    fn validate(&self) -> Result<(), Self::Error> {
        if self.endpoint.is_empty() {
            return Err(ConfigError::MissingEndpoint);
        }
        self.tls_setting.validate()?;
        Ok(())
    }
}

impl ClientConfig {
    /// Creates a new client configuration with the given endpoint and
    /// all other fields set to default.
    pub fn with_endpoint(endpoint: &str) -> Self {
        Self {
            endpoint: endpoint.to_string(),
            ..Self::default()
        }
    }

    pub fn with_origin(self, origin: &str) -> Self {
        Self {
            origin: Some(origin.to_string()),
            ..self
        }
    }

    pub fn with_server_name(self, server_name: &str) -> Self {
        Self {
            server_name: Some(server_name.to_string()),
            ..self
        }
    }

    pub fn with_tls_setting(self, tls_setting: TlsClientConfig) -> Self {
        Self {
            tls_setting,
            ..self
        }
    }

    pub fn with_keepalive(self, keepalive: KeepaliveConfig) -> Self {
        Self {
            keepalive: Some(keepalive),
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

    pub fn with_buffer_size(self, buffer_size: usize) -> Self {
        Self {
            buffer_size: Some(buffer_size),
            ..self
        }
    }

    pub fn with_headers(self, headers: HashMap<String, String>) -> Self {
        Self { headers, ..self }
    }

    pub fn with_backoff(self, backoff: BackoffConfig) -> Self {
        Self { backoff, ..self }
    }

    /// Connects and returns the channel, retrying transport errors under
    /// the configured backoff.
    pub async fn to_channel(&self) -> Result<Channel, ConfigError> {
        self.connect(false).await
    }

    /// Builds the channel lazily; the connection is only established on
    /// the first call. Useful for tests and for callers that tolerate a
    /// first-call connect.
    pub async fn to_channel_lazy(&self) -> Result<Channel, ConfigError> {
        self.connect(true).await
    }

    async fn connect(&self, lazy: bool) -> Result<Channel, ConfigError> {
        self.validate()?;

        let uri = Uri::from_str(&self.endpoint)?;
        if !matches!(uri.scheme_str(), Some("http") | Some("https")) {
            return Err(ConfigError::InvalidEndpointScheme);
        }

        let builder = self.channel_builder(uri.clone())?;
        let http_connector = self.http_connector();
        let tls_config = self.tls_setting.load_rustls_config()?;

        if lazy {
            return Ok(match tls_config {
                Some(tls) => builder.connect_with_connector_lazy(self.https_connector(
                    http_connector,
                    &tls,
                )),
                None => builder.connect_with_connector_lazy(http_connector),
            });
        }

        let backoff = self.backoff.delays();
        RetryIf::spawn(
            backoff,
            || {
                let builder = builder.clone();
                let http_connector = http_connector.clone();
                let tls_config = tls_config.clone();
                async move {
                    tracing::debug!(uri = %self.endpoint, "attempting to create channel");
                    match tls_config {
                        Some(tls) => {
                            builder
                                .connect_with_connector(
                                    self.https_connector(http_connector, &tls),
                                )
                                .await
                        }
                        None => builder.connect_with_connector(http_connector).await,
                    }
                    .map_err(ConfigError::from)
                }
            },
            |e: &ConfigError| match e {
                ConfigError::TransportError(err) => {
                    tracing::warn!(error = %err, "transport error encountered, retrying");
                    true
                }
                _ => {
                    tracing::error!(error = %e, "non-retryable error encountered");
                    false
                }
            },
        )
        .await
    }

    fn http_connector(&self) -> HttpConnector {
        let mut http = HttpConnector::new();
        http.enforce_http(false);
        http.set_nodelay(false);

        let connect_timeout: Duration = self.connect_timeout.into();
        match connect_timeout.as_secs() {
            0 => http.set_connect_timeout(None),
            _ => http.set_connect_timeout(Some(connect_timeout)),
        }

        if let Some(keepalive) = &self.keepalive {
            http.set_keepalive(Some(keepalive.tcp_keepalive.into()));
        }

        http
    }

    fn https_connector(
        &self,
        http: HttpConnector,
        tls: &rustls::ClientConfig,
    ) -> hyper_rustls::HttpsConnector<HttpConnector> {
        let mut builder = hyper_rustls::HttpsConnectorBuilder::new()
            .with_tls_config(tls.clone())
            .https_or_http();

        if let Some(server_name) = &self.server_name {
            let server_name = server_name.clone();
            builder = builder
                .with_server_name_resolver(move |_: &_| ServerName::try_from(server_name.clone()));
        }

        builder.enable_http2().wrap_connector(http)
    }

    fn channel_builder(&self, uri: Uri) -> Result<tonic::transport::Endpoint, ConfigError> {
        let mut builder = Channel::builder(uri);

        if let Some(size) = self.buffer_size {
            builder = builder.buffer_size(size);
        }

        if let Some(keepalive) = &self.keepalive {
            builder = builder
                .keep_alive_timeout(keepalive.timeout.into())
                .keep_alive_while_idle(keepalive.keep_alive_while_idle)
                .http2_keep_alive_interval(keepalive.http2_keepalive.into());
        }

        if let Some(origin) = &self.origin {
            let origin_uri = Uri::from_str(origin.as_str())?;
            builder = builder.origin(origin_uri);
        }

        let request_timeout: Duration = self.request_timeout.into();
        if request_timeout.as_secs() > 0 {
            builder = builder.timeout(request_timeout);
        }

        let connect_timeout: Duration = self.connect_timeout.into();
        if connect_timeout.as_secs() > 0 {
            builder = builder.connect_timeout(connect_timeout);
        }

        Ok(builder)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use tracing_test::traced_test;

    #[test]
    fn test_default_client_config() {
        let client = ClientConfig::default();
        assert_eq!(client.endpoint, String::new());
        assert_eq!(client.origin, None);
        assert_eq!(client.server_name, None);
        assert_eq!(client.tls_setting, TlsClientConfig::default());
        assert_eq!(client.keepalive, None);
        assert_eq!(Duration::from(client.connect_timeout), Duration::ZERO);
        assert_eq!(Duration::from(client.request_timeout), Duration::ZERO);
        assert_eq!(client.buffer_size, None);
        assert!(client.headers.is_empty());
    }

    #[test]
    fn test_default_keepalive_config() {
        let keepalive = KeepaliveConfig::default();
        assert_eq!(
            Duration::from(keepalive.tcp_keepalive),
            Duration::from_secs(60)
        );
        assert_eq!(
            Duration::from(keepalive.http2_keepalive),
            Duration::from_secs(60)
        );
        assert_eq!(Duration::from(keepalive.timeout), Duration::from_secs(10));
        assert!(!keepalive.keep_alive_while_idle);
    }

    #[test]
    fn test_missing_endpoint_fails_validation() {
        let client = ClientConfig::default();
        assert!(matches!(
            client.validate(),
            Err(ConfigError::MissingEndpoint)
        ));
    }

    #[tokio::test]
    async fn test_invalid_scheme_rejected() {
        let mut client = ClientConfig::with_endpoint("ftp://localhost:1234");
        client.tls_setting.insecure = true;
        let err = client.to_channel_lazy().await.unwrap_err();
        assert!(matches!(err, ConfigError::InvalidEndpointScheme));
    }

    #[tokio::test]
    #[traced_test]
    async fn test_to_channel_lazy() {
        let mut client = ClientConfig::with_endpoint("http://localhost:8080");
        client.tls_setting.insecure = true;
        assert!(client.to_channel_lazy().await.is_ok());

        // Keepalive, timeouts, origin and buffer settings are accepted.
        let client = ClientConfig::with_endpoint("http://localhost:8080")
            .with_tls_setting(TlsClientConfig::insecure())
            .with_keepalive(KeepaliveConfig::default())
            .with_request_timeout(Duration::from_secs(10))
            .with_connect_timeout(Duration::from_millis(250))
            .with_buffer_size(1024)
            .with_origin("http://example.com");
        assert!(client.to_channel_lazy().await.is_ok());
    }

    #[tokio::test]
    async fn test_connect_error_after_retries() {
        let mut client = ClientConfig::with_endpoint("http://127.0.0.1:0")
            .with_connect_timeout(Duration::from_millis(50));
        client.tls_setting.insecure = true;
        client.backoff = BackoffConfig::new_fixed_interval(Duration::from_millis(0), 1);

        let err = client.to_channel().await.unwrap_err();
        assert!(matches!(err, ConfigError::TransportError(_)));
    }

    #[test]
    fn test_duration_strings_deserialize() {
        let json = r#"{
            "endpoint": "http://localhost:1234",
            "connect_timeout": "1m30s",
            "request_timeout": "250ms"
        }"#;
        let cfg: ClientConfig = serde_json::from_str(json).expect("deserialize");
        assert_eq!(Duration::from(cfg.connect_timeout), Duration::from_secs(90));
        assert_eq!(
            Duration::from(cfg.request_timeout),
            Duration::from_millis(250)
        );
    }

    #[test]
    fn test_invalid_duration_strings_fail() {
        let json = r#"{ "endpoint": "http://localhost:1234", "connect_timeout": "abc" }"#;
        let res: Result<ClientConfig, _> = serde_json::from_str(json);
        assert!(res.is_err());
    }

    #[test]
    fn test_config_roundtrip() {
        let cfg = ClientConfig::with_endpoint("http://localhost:9999")
            .with_connect_timeout(Duration::from_secs(90))
            .with_request_timeout(Duration::from_millis(750))
            .with_keepalive(KeepaliveConfig::default());
        let serialized = serde_json::to_string(&cfg).expect("serialize");
        let deserialized: ClientConfig = serde_json::from_str(&serialized).expect("deserialize");
        assert_eq!(deserialized, cfg);
    }
}
