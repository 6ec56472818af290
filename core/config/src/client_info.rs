// Copyright AGNTCY Contributors (https://github.com/agntcy)
// SPDX-License-Identifier: Apache-2.0

//! Process-wide client identification defaults.
//!
//! User-agent and api-client header values default to the crate's own
//! product token. A process may override the defaults once, explicitly,
//! before constructing clients; individual clients can still override
//! per instance.

use std::sync::OnceLock;

use schemars::JsonSchema;
use serde::{Deserialize, Serialize};

pub const USER_AGENT_KEY: &str = "user-agent";
pub const API_CLIENT_KEY: &str = "x-cortex-api-client";

static DEFAULT_CLIENT_INFO: OnceLock<ClientInfo> = OnceLock::new();

/// Product tokens identifying this client on the wire.
#[derive(Debug, Serialize, Deserialize, Clone, PartialEq, Eq, JsonSchema)]
pub struct ClientInfo {
    /// Value of the `user-agent` header.
    pub user_agent: String,
    /// Value of the api-client header.
    pub api_client: String,
}

impl Default for ClientInfo {
    fn default() -> Self {
        let product = format!("cortex-rust/{}", env!("CARGO_PKG_VERSION"));
        ClientInfo {
            user_agent: product.clone(),
            api_client: product,
        }
    }
}

impl ClientInfo {
    pub fn new(user_agent: impl Into<String>, api_client: impl Into<String>) -> Self {
        ClientInfo {
            user_agent: user_agent.into(),
            api_client: api_client.into(),
        }
    }

    /// Prepend an application product token to the user agent.
    pub fn with_application(mut self, application: &str) -> Self {
        self.user_agent = format!("{} {}", application, self.user_agent);
        self
    }
}

/// Set the process-wide defaults. Returns the rejected value when the
/// defaults were already set (first writer wins).
pub fn init_default_client_info(info: ClientInfo) -> Result<(), ClientInfo> {
    DEFAULT_CLIENT_INFO.set(info)
}

/// The process-wide defaults, falling back to the built-in tokens.
pub fn default_client_info() -> ClientInfo {
    DEFAULT_CLIENT_INFO.get().cloned().unwrap_or_default()
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_builtin_defaults_carry_version() {
        let info = ClientInfo::default();
        assert!(info.user_agent.starts_with("cortex-rust/"));
        assert_eq!(info.user_agent, info.api_client);
    }

    #[test]
    fn test_with_application_prepends() {
        let info = ClientInfo::default().with_application("trainer/2.1");
        assert!(info.user_agent.starts_with("trainer/2.1 cortex-rust/"));
    }
}
