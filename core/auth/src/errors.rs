// Copyright AGNTCY Contributors (https://github.com/agntcy)
// SPDX-License-Identifier: Apache-2.0

use thiserror::Error;

#[derive(Error, Debug)]
pub enum AuthError {
    #[error("invalid token: {0}")]
    InvalidToken(String),
    #[error("token acquisition failed: {0}")]
    TokenAcquisition(String),
    #[error("configuration error: {0}")]
    ConfigError(String),
}
