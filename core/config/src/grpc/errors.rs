// Copyright AGNTCY Contributors (https://github.com/agntcy)
// SPDX-License-Identifier: Apache-2.0

use thiserror::Error;

use crate::endpoint::EndpointError;
use crate::tls::TlsConfigError;

/// Errors raised while turning a client configuration into a live
/// transport.
#[derive(Error, Debug)]
pub enum ConfigError {
    #[error("missing endpoint")]
    MissingEndpoint,
    #[error("unsupported endpoint scheme")]
    InvalidEndpointScheme,
    #[error("URI parse error: {0}")]
    UriParse(#[from] http::uri::InvalidUri),
    #[error("header name parse error: {0}")]
    HeaderNameParse(#[from] http::header::InvalidHeaderName),
    #[error("header value parse error: {0}")]
    HeaderValueParse(#[from] http::header::InvalidHeaderValue),
    #[error("transport error: {0}")]
    TransportError(#[from] tonic::transport::Error),
    #[error("TLS config error: {0}")]
    TlsConfig(#[from] TlsConfigError),
    #[error("endpoint error: {0}")]
    Endpoint(#[from] EndpointError),
    #[error("HTTP client build error: {0}")]
    HttpClientBuild(#[from] reqwest::Error),
}
