// Copyright AGNTCY Contributors (https://github.com/agntcy)
// SPDX-License-Identifier: Apache-2.0

//! Routing-header derivation.
//!
//! Services shard requests on selected request fields; the header value
//! is computed deterministically from the request so equal requests
//! always land on the same shard.

use serde_json::Value;

use crate::fields::{get_field, is_default, render_scalar};
use crate::method::RoutingParam;

/// Metadata key carrying the routing parameters.
pub const ROUTING_HEADER: &str = "x-cortex-request-params";

/// Derive the routing-header value from the request's canonical JSON
/// form. Fields that are absent or default are skipped; when nothing
/// remains, no header is emitted.
pub fn routing_header(request: &Value, params: &[RoutingParam]) -> Option<String> {
    let mut pairs = Vec::new();
    for param in params {
        let Some(value) = get_field(request, &param.field) else {
            continue;
        };
        if is_default(value) {
            continue;
        }
        let Some(rendered) = render_scalar(value) else {
            continue;
        };
        let encoded: String =
            url::form_urlencoded::byte_serialize(rendered.as_bytes()).collect();
        pairs.push(format!("{}={}", param.field, encoded));
    }
    if pairs.is_empty() {
        return None;
    }
    Some(pairs.join("&"))
}
