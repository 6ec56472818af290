// Copyright AGNTCY Contributors (https://github.com/agntcy)
// SPDX-License-Identifier: Apache-2.0

use thiserror::Error;

#[derive(Error, Debug, PartialEq)]
pub enum TemplateError {
    #[error("invalid template: {0}")]
    InvalidTemplate(String),
    #[error("missing binding: {0}")]
    MissingBinding(String),
    #[error("empty value for binding: {0}")]
    EmptyBinding(String),
    #[error("value for binding {name} must not contain '/': {value}")]
    SlashInBinding { name: String, value: String },
    #[error("template has an unbound wildcard, cannot format")]
    UnboundWildcard,
    #[error("path does not match template {template}: {path}")]
    Mismatch { template: String, path: String },
}

pub type Result<T> = std::result::Result<T, TemplateError>;
