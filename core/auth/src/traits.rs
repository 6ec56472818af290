// Copyright AGNTCY Contributors (https://github.com/agntcy)
// SPDX-License-Identifier: Apache-2.0

//! Common traits for credential mechanisms.

use async_trait::async_trait;
use cortex_types::Metadata;

use crate::errors::AuthError;

/// Metadata key carrying the authorization value.
pub const AUTHORIZATION_KEY: &str = "authorization";

/// A credential that can authorize outgoing calls.
///
/// Implementations attach whatever entries they need to the call
/// metadata; the runtime invokes this once per call, before the
/// interceptor pre-hooks run.
#[async_trait]
pub trait Credentials: Send + Sync {
    /// Attach authorization to the outgoing metadata.
    async fn apply(&self, metadata: &mut Metadata) -> Result<(), AuthError>;
}

/// No-op credential for unauthenticated endpoints (emulators, tests).
#[derive(Debug, Clone, Default)]
pub struct Anonymous;

#[async_trait]
impl Credentials for Anonymous {
    async fn apply(&self, _metadata: &mut Metadata) -> Result<(), AuthError> {
        Ok(())
    }
}
