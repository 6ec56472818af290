// Copyright AGNTCY Contributors (https://github.com/agntcy)
// SPDX-License-Identifier: Apache-2.0

//! Client-side TLS configuration.
//!
//! Sources for the CA bundle and the optional client certificate (mTLS)
//! can be files or in-memory PEM. `load_rustls_config` assembles the
//! rustls client config consumed by the transport connectors.

use rustls::{ClientConfig as RustlsClientConfig, RootCertStore};
use rustls_pki_types::pem::PemObject;
use rustls_pki_types::{CertificateDer, PrivateKeyDer};
use schemars::JsonSchema;
use serde::{Deserialize, Serialize};
use std::sync::Once;
use thiserror::Error;

use crate::component::Configuration;

#[derive(Error, Debug)]
pub enum TlsConfigError {
    #[error("invalid pem: {0}")]
    InvalidPem(String),
    #[error("invalid file: {0}")]
    InvalidFile(String),
    #[error("cannot load system root certificates: {0}")]
    SystemRoots(String),
    #[error("client certificate and key must be set together")]
    IncompleteClientCert,
    #[error("unsupported TLS version: {0}")]
    UnsupportedTlsVersion(String),
    #[error("rustls error: {0}")]
    Rustls(#[from] rustls::Error),
}

/// Install the process-wide rustls crypto provider. Safe to call from
/// every client constructor; only the first call has an effect.
pub fn initialize_crypto_provider() {
    static INIT: Once = Once::new();
    INIT.call_once(|| {
        let _ = rustls::crypto::aws_lc_rs::default_provider().install_default();
    });
}

/// PEM sources supplied in-line.
#[derive(Debug, Serialize, Deserialize, PartialEq, Clone, Default, JsonSchema)]
pub struct PemSources {
    /// PEM encoded CA bundle
    #[serde(skip_serializing_if = "Option::is_none")]
    pub ca: Option<String>,
    /// PEM encoded end-entity certificate
    #[serde(skip_serializing_if = "Option::is_none")]
    pub cert: Option<String>,
    /// PEM encoded private key
    #[serde(skip_serializing_if = "Option::is_none")]
    pub key: Option<String>,
}

/// PEM sources loaded from disk.
#[derive(Debug, Serialize, Deserialize, PartialEq, Clone, Default, JsonSchema)]
pub struct FileSources {
    /// Path to CA bundle
    #[serde(skip_serializing_if = "Option::is_none")]
    pub ca: Option<String>,
    /// Path to certificate
    #[serde(skip_serializing_if = "Option::is_none")]
    pub cert: Option<String>,
    /// Path to private key
    #[serde(skip_serializing_if = "Option::is_none")]
    pub key: Option<String>,
}

fn default_include_system_ca_certs_pool() -> bool {
    true
}

fn default_tls_version() -> String {
    "tls1.3".to_string()
}

/// TLS settings for outgoing connections.
#[derive(Debug, Serialize, Deserialize, PartialEq, Clone, JsonSchema)]
#[serde(default)]
pub struct TlsClientConfig {
    /// Disable TLS entirely (plaintext endpoint).
    pub insecure: bool,

    /// In-memory PEM sources.
    #[serde(skip_serializing_if = "Option::is_none")]
    pub pem: Option<PemSources>,

    /// File-based PEM sources.
    #[serde(skip_serializing_if = "Option::is_none")]
    pub file: Option<FileSources>,

    /// If true, also load system root CA certificates
    pub include_system_ca_certs_pool: bool,

    /// TLS protocol version ("tls1.2" or "tls1.3")
    pub tls_version: String,
}

impl Default for TlsClientConfig {
    fn default() -> Self {
        TlsClientConfig {
            insecure: false,
            pem: None,
            file: None,
            include_system_ca_certs_pool: default_include_system_ca_certs_pool(),
            tls_version: default_tls_version(),
        }
    }
}

impl Configuration for TlsClientConfig {
    type Error = TlsConfigError;

    fn validate(&self) -> Result<(), Self::Error> {
        self.protocol_versions()?;
        let (cert, key) = self.client_cert_sources();
        if cert.is_some() != key.is_some() {
            return Err(TlsConfigError::IncompleteClientCert);
        }
        Ok(())
    }
}

impl TlsClientConfig {
    pub fn insecure() -> Self {
        TlsClientConfig {
            insecure: true,
            ..Default::default()
        }
    }

    pub fn with_ca_file(mut self, path: &str) -> Self {
        self.file.get_or_insert_with(FileSources::default).ca = Some(path.to_string());
        self
    }

    pub fn with_ca_pem(mut self, pem: &str) -> Self {
        self.pem.get_or_insert_with(PemSources::default).ca = Some(pem.to_string());
        self
    }

    pub fn with_client_cert_file(mut self, cert: &str, key: &str) -> Self {
        let file = self.file.get_or_insert_with(FileSources::default);
        file.cert = Some(cert.to_string());
        file.key = Some(key.to_string());
        self
    }

    pub fn with_client_cert_pem(mut self, cert: &str, key: &str) -> Self {
        let pem = self.pem.get_or_insert_with(PemSources::default);
        pem.cert = Some(cert.to_string());
        pem.key = Some(key.to_string());
        self
    }

    /// True when a client certificate is configured (mTLS possible).
    pub fn has_client_cert(&self) -> bool {
        let (cert, key) = self.client_cert_sources();
        cert.is_some() && key.is_some()
    }

    fn client_cert_sources(&self) -> (Option<ClientCertSource>, Option<ClientCertSource>) {
        let cert = self
            .pem
            .as_ref()
            .and_then(|p| p.cert.clone())
            .map(ClientCertSource::Pem)
            .or_else(|| {
                self.file
                    .as_ref()
                    .and_then(|f| f.cert.clone())
                    .map(ClientCertSource::File)
            });
        let key = self
            .pem
            .as_ref()
            .and_then(|p| p.key.clone())
            .map(ClientCertSource::Pem)
            .or_else(|| {
                self.file
                    .as_ref()
                    .and_then(|f| f.key.clone())
                    .map(ClientCertSource::File)
            });
        (cert, key)
    }

    fn protocol_versions(
        &self,
    ) -> Result<&'static [&'static rustls::SupportedProtocolVersion], TlsConfigError> {
        static TLS12: &[&rustls::SupportedProtocolVersion] = &[&rustls::version::TLS12];
        static TLS13: &[&rustls::SupportedProtocolVersion] = &[&rustls::version::TLS13];
        match self.tls_version.as_str() {
            "tls1.2" => Ok(TLS12),
            "tls1.3" => Ok(TLS13),
            other => Err(TlsConfigError::UnsupportedTlsVersion(other.to_string())),
        }
    }

    fn root_store(&self) -> Result<RootCertStore, TlsConfigError> {
        let mut roots = RootCertStore::empty();

        if self.include_system_ca_certs_pool {
            let result = rustls_native_certs::load_native_certs();
            if !result.errors.is_empty() {
                return Err(TlsConfigError::SystemRoots(format!(
                    "{:?}",
                    result.errors
                )));
            }
            for cert in result.certs {
                roots
                    .add(cert)
                    .map_err(|e| TlsConfigError::SystemRoots(e.to_string()))?;
            }
        }

        if let Some(ca_pem) = self.pem.as_ref().and_then(|p| p.ca.as_deref()) {
            for cert in CertificateDer::pem_slice_iter(ca_pem.as_bytes()) {
                let cert = cert.map_err(|e| TlsConfigError::InvalidPem(format!("{:?}", e)))?;
                roots.add(cert)?;
            }
        }

        if let Some(ca_file) = self.file.as_ref().and_then(|f| f.ca.as_deref()) {
            for cert in CertificateDer::pem_file_iter(ca_file)
                .map_err(|e| TlsConfigError::InvalidFile(format!("{:?}", e)))?
            {
                let cert = cert.map_err(|e| TlsConfigError::InvalidFile(format!("{:?}", e)))?;
                roots.add(cert)?;
            }
        }

        Ok(roots)
    }

    fn load_client_cert(
        &self,
    ) -> Result<Option<(Vec<CertificateDer<'static>>, PrivateKeyDer<'static>)>, TlsConfigError>
    {
        let (cert, key) = self.client_cert_sources();
        let (cert, key) = match (cert, key) {
            (Some(cert), Some(key)) => (cert, key),
            (None, None) => return Ok(None),
            _ => return Err(TlsConfigError::IncompleteClientCert),
        };

        let certs: Vec<CertificateDer<'static>> = match &cert {
            ClientCertSource::Pem(pem) => CertificateDer::pem_slice_iter(pem.as_bytes())
                .collect::<Result<_, _>>()
                .map_err(|e| TlsConfigError::InvalidPem(format!("{:?}", e)))?,
            ClientCertSource::File(path) => CertificateDer::pem_file_iter(path)
                .map_err(|e| TlsConfigError::InvalidFile(format!("{:?}", e)))?
                .collect::<Result<_, _>>()
                .map_err(|e| TlsConfigError::InvalidFile(format!("{:?}", e)))?,
        };
        let key = match &key {
            ClientCertSource::Pem(pem) => PrivateKeyDer::from_pem_slice(pem.as_bytes())
                .map_err(|e| TlsConfigError::InvalidPem(format!("{:?}", e)))?,
            ClientCertSource::File(path) => PrivateKeyDer::from_pem_file(path)
                .map_err(|e| TlsConfigError::InvalidFile(format!("{:?}", e)))?,
        };

        Ok(Some((certs, key)))
    }

    /// Assemble the rustls client config, or `None` when `insecure`.
    pub fn load_rustls_config(&self) -> Result<Option<RustlsClientConfig>, TlsConfigError> {
        if self.insecure {
            return Ok(None);
        }
        initialize_crypto_provider();

        let versions = self.protocol_versions()?;
        let roots = self.root_store()?;
        let builder = RustlsClientConfig::builder_with_protocol_versions(versions)
            .with_root_certificates(roots);

        let config = match self.load_client_cert()? {
            Some((certs, key)) => builder.with_client_auth_cert(certs, key)?,
            None => builder.with_no_client_auth(),
        };

        Ok(Some(config))
    }
}

enum ClientCertSource {
    Pem(String),
    File(String),
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_default_config_validates() {
        let config = TlsClientConfig::default();
        assert!(config.validate().is_ok());
        assert!(!config.has_client_cert());
    }

    #[test]
    fn test_insecure_loads_no_tls() {
        let config = TlsClientConfig::insecure();
        assert!(config.load_rustls_config().unwrap().is_none());
    }

    #[test]
    fn test_unsupported_version_rejected() {
        let config = TlsClientConfig {
            tls_version: "ssl3".to_string(),
            ..Default::default()
        };
        assert!(matches!(
            config.validate(),
            Err(TlsConfigError::UnsupportedTlsVersion(_))
        ));
    }

    #[test]
    fn test_cert_without_key_rejected() {
        let config = TlsClientConfig::default().with_ca_pem("---").with_client_cert_pem("c", "k");
        assert!(config.has_client_cert());

        let mut incomplete = TlsClientConfig::default();
        incomplete.pem = Some(PemSources {
            cert: Some("c".to_string()),
            ..Default::default()
        });
        assert!(matches!(
            incomplete.validate(),
            Err(TlsConfigError::IncompleteClientCert)
        ));
    }

    #[test]
    fn test_serde_defaults() {
        let config: TlsClientConfig = serde_json::from_str("{}").unwrap();
        assert!(!config.insecure);
        assert!(config.include_system_ca_certs_pool);
        assert_eq!(config.tls_version, "tls1.3");
    }
}
