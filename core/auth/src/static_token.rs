// Copyright AGNTCY Contributors (https://github.com/agntcy)
// SPDX-License-Identifier: Apache-2.0

//! Bearer-token credential with a fixed token.

use async_trait::async_trait;
use cortex_types::Metadata;

use crate::errors::AuthError;
use crate::traits::{AUTHORIZATION_KEY, Credentials};

/// A pre-acquired bearer token attached verbatim to every call.
#[derive(Clone)]
pub struct StaticToken {
    token: String,
}

impl StaticToken {
    pub fn new(token: impl Into<String>) -> Result<Self, AuthError> {
        let token = token.into();
        if token.is_empty() {
            return Err(AuthError::InvalidToken("empty token".to_string()));
        }
        if !token.chars().all(|c| c.is_ascii_graphic()) {
            return Err(AuthError::InvalidToken(
                "token must be printable ASCII".to_string(),
            ));
        }
        Ok(Self { token })
    }
}

// Keep the token out of debug output.
impl std::fmt::Debug for StaticToken {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("StaticToken").field("token", &"***").finish()
    }
}

#[async_trait]
impl Credentials for StaticToken {
    async fn apply(&self, metadata: &mut Metadata) -> Result<(), AuthError> {
        metadata.insert(AUTHORIZATION_KEY, format!("Bearer {}", self.token));
        Ok(())
    }
}
