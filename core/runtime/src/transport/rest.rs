// Copyright AGNTCY Contributors (https://github.com/agntcy)
// SPDX-License-Identifier: Apache-2.0

//! JSON-over-HTTP transport.
//!
//! Requests are transcoded through the method's HTTP rule: path-bound
//! fields render the URI via the path template, one field (or the whole
//! remainder) becomes the JSON body, declared query fields flatten into
//! the query string. HTTP statuses map onto the closed error-kind set;
//! the JSON error envelope refines the mapping when present.

use std::time::Duration;

use http::header::{HeaderMap, HeaderName, HeaderValue};
use serde_json::Value;
use url::Url;

use cortex_path::Bindings;
use cortex_types::{Code, Metadata, RequestMessage, ResponseMessage, Result, Status};

use crate::fields::{is_default, render_scalar, take_field};
use crate::method::{BodySelector, HttpRule, MethodDescriptor};
use crate::transport::Reply;

/// Unary client over a shared HTTP connection pool.
#[derive(Clone)]
pub struct RestTransport {
    client: reqwest::Client,
    base: Url,
}

/// Outcome of transcoding one request against an HTTP rule.
#[derive(Debug, PartialEq)]
struct TranscodedRequest {
    path: String,
    query: Vec<(String, String)>,
    body: Option<Value>,
}

impl RestTransport {
    pub fn new(client: reqwest::Client, endpoint: &str) -> Result<Self> {
        let base = Url::parse(endpoint)
            .map_err(|e| Status::invalid_argument(format!("invalid endpoint: {}", e)))?;
        if !matches!(base.scheme(), "http" | "https") {
            return Err(Status::invalid_argument(format!(
                "unsupported endpoint scheme: {}",
                base.scheme()
            )));
        }
        Ok(Self { client, base })
    }

    pub async fn unary<Req, Res>(
        &self,
        method: &MethodDescriptor,
        timeout: Option<Duration>,
        metadata: &Metadata,
        request: &Req,
    ) -> Result<Reply<Res>>
    where
        Req: RequestMessage,
        Res: ResponseMessage,
    {
        let rule = method.http.as_ref().ok_or_else(|| {
            Status::unimplemented(format!("{} has no HTTP binding", method.full_name()))
        })?;

        let value = serde_json::to_value(request)
            .map_err(|e| Status::internal(format!("request serialization failed: {}", e)))?;
        let transcoded = transcode(rule, value)?;

        let mut url = self
            .base
            .join(&transcoded.path)
            .map_err(|e| Status::internal(format!("invalid request URI: {}", e)))?;
        if !transcoded.query.is_empty() {
            let mut pairs = url.query_pairs_mut();
            for (key, value) in &transcoded.query {
                pairs.append_pair(key, value);
            }
        }

        tracing::debug!(method = %method.full_name(), %url, verb = %rule.verb, "dispatching REST call");

        let mut http_request = self
            .client
            .request(rule.verb.clone(), url)
            .headers(to_headers(metadata)?);
        if let Some(timeout) = timeout {
            http_request = http_request.timeout(timeout);
        }
        if let Some(body) = &transcoded.body {
            http_request = http_request
                .header(http::header::CONTENT_TYPE, "application/json")
                .body(serde_json::to_vec(body).map_err(|e| {
                    Status::internal(format!("body serialization failed: {}", e))
                })?);
        } else if matches!(
            rule.verb,
            http::Method::POST | http::Method::PUT | http::Method::PATCH
        ) {
            // Empty payload, but still a JSON request.
            http_request = http_request
                .header(http::header::CONTENT_TYPE, "application/json")
                .body(Vec::new());
        }

        let response = http_request.send().await.map_err(map_reqwest_error)?;
        let http_status = response.status();
        let headers = response.headers().clone();
        let bytes = response.bytes().await.map_err(map_reqwest_error)?;

        if http_status.as_u16() >= 400 {
            return Err(parse_error(http_status.as_u16(), &bytes));
        }

        let message: Res = if bytes.is_empty() {
            serde_json::from_value(Value::Object(Default::default()))
                .map_err(|e| Status::internal(format!("response decoding failed: {}", e)))?
        } else {
            serde_json::from_slice(&bytes)
                .map_err(|e| Status::internal(format!("response decoding failed: {}", e)))?
        };

        Ok(Reply {
            message,
            metadata: from_headers(&headers),
        })
    }
}

/// Apply the HTTP rule to the request's canonical JSON form.
fn transcode(rule: &HttpRule, mut value: Value) -> Result<TranscodedRequest> {
    // 1. Path-bound fields; every bound field must be present and
    //    non-empty. Bound fields never appear in body or query.
    let mut bindings = Bindings::new();
    for name in rule.template.var_names() {
        let field_value = take_field(&mut value, name).ok_or_else(|| {
            Status::invalid_argument(format!("missing required path field: {}", name))
        })?;
        let rendered = render_scalar(&field_value).filter(|s| !s.is_empty()).ok_or_else(|| {
            Status::invalid_argument(format!("path field {} must be a non-empty scalar", name))
        })?;
        bindings.insert(name, rendered);
    }
    let path = rule
        .template
        .format(&bindings)
        .map_err(|e| Status::invalid_argument(e.to_string()))?;

    // 2. Declared query fields, removed from the remainder before the
    //    body is formed. Default values are omitted.
    let mut query = Vec::new();
    for field in &rule.query_fields {
        let Some(field_value) = take_field(&mut value, field) else {
            continue;
        };
        if is_default(&field_value) {
            continue;
        }
        match &field_value {
            Value::Array(items) => {
                for item in items {
                    if let Some(rendered) = render_scalar(item) {
                        query.push((field.clone(), rendered));
                    }
                }
            }
            other => {
                if let Some(rendered) = render_scalar(other) {
                    query.push((field.clone(), rendered));
                }
            }
        }
    }

    // 3. Body selection.
    let body = match &rule.body {
        BodySelector::None => None,
        BodySelector::All => Some(value),
        BodySelector::Field(field) => {
            Some(take_field(&mut value, field).unwrap_or(Value::Object(Default::default())))
        }
    };

    Ok(TranscodedRequest { path, query, body })
}

fn to_headers(metadata: &Metadata) -> Result<HeaderMap> {
    let mut headers = HeaderMap::new();
    for (key, value) in metadata.iter() {
        let name = HeaderName::try_from(key)
            .map_err(|_| Status::internal(format!("invalid metadata key: {}", key)))?;
        let value = HeaderValue::try_from(value.to_header_value())
            .map_err(|_| Status::internal(format!("invalid metadata value for {}", key)))?;
        headers.append(name, value);
    }
    Ok(headers)
}

fn from_headers(headers: &HeaderMap) -> Metadata {
    use base64::{Engine as _, engine::general_purpose::STANDARD as BASE64};

    let mut metadata = Metadata::new();
    for (name, value) in headers {
        let key = name.as_str();
        if Metadata::is_binary_key(key) {
            if let Ok(decoded) = BASE64.decode(value.as_bytes()) {
                metadata.insert_bin(key, decoded);
            }
            continue;
        }
        if let Ok(value) = value.to_str() {
            metadata.append(key, value);
        }
    }
    metadata
}

fn map_reqwest_error(error: reqwest::Error) -> Status {
    if error.is_timeout() {
        return Status::deadline_exceeded(format!("request timed out: {}", error));
    }
    if error.is_connect() {
        return Status::unavailable(format!("connection failed: {}", error));
    }
    Status::unavailable(format!("transport error: {}", error))
}

#[derive(serde::Deserialize)]
struct ErrorEnvelope {
    error: ErrorBody,
}

#[derive(serde::Deserialize, Default)]
struct ErrorBody {
    #[serde(default)]
    message: Option<String>,
    #[serde(default)]
    status: Option<String>,
    #[serde(default)]
    details: Option<Vec<Value>>,
}

/// Map an HTTP error response onto a `Status`, preferring the JSON
/// error envelope's verdict over the raw status-code mapping.
fn parse_error(http_status: u16, body: &[u8]) -> Status {
    let envelope: Option<ErrorBody> = serde_json::from_slice::<ErrorEnvelope>(body)
        .ok()
        .map(|e| e.error);

    let fallback_code = Code::from_http(http_status);
    let (code, message, details) = match envelope {
        Some(body) => {
            let code = body
                .status
                .as_deref()
                .and_then(Code::from_str_name)
                .filter(|c| *c != Code::Ok)
                .unwrap_or(fallback_code);
            let message = body
                .message
                .unwrap_or_else(|| format!("HTTP {}", http_status));
            (code, message, body.details.unwrap_or_default())
        }
        None => (fallback_code, format!("HTTP {}", http_status), Vec::new()),
    };

    Status::new(code, message).with_details(details)
}

#[cfg(test)]
mod tests {
    use super::*;
    use http::Method as HttpMethod;
    use serde_json::json;

    fn create_rule() -> HttpRule {
        HttpRule::new(
            HttpMethod::POST,
            "/v1/{parent=projects/*/locations/*}/pipelineJobs",
        )
        .unwrap()
        .with_body("pipeline_job")
        .with_query_fields(&["pipeline_job_id"])
    }

    #[test]
    fn test_transcode_create_pipeline_job() {
        let request = json!({
            "parent": "projects/p/locations/us-central1",
            "pipelineJobId": "id-1",
            "pipelineJob": {"displayName": "d"},
        });
        let transcoded = transcode(&create_rule(), request).unwrap();
        assert_eq!(
            transcoded,
            TranscodedRequest {
                path: "/v1/projects/p/locations/us-central1/pipelineJobs".to_string(),
                query: vec![("pipeline_job_id".to_string(), "id-1".to_string())],
                body: Some(json!({"displayName": "d"})),
            }
        );
    }

    #[test]
    fn test_transcode_missing_path_field() {
        let request = json!({"pipelineJob": {"displayName": "d"}});
        let err = transcode(&create_rule(), request).unwrap_err();
        assert_eq!(err.code(), Code::InvalidArgument);
    }

    #[test]
    fn test_transcode_empty_path_field() {
        let request = json!({"parent": ""});
        let err = transcode(&create_rule(), request).unwrap_err();
        assert_eq!(err.code(), Code::InvalidArgument);
    }

    #[test]
    fn test_transcode_default_query_omitted() {
        let request = json!({
            "parent": "projects/p/locations/l",
            "pipelineJobId": "",
        });
        let transcoded = transcode(&create_rule(), request).unwrap();
        assert!(transcoded.query.is_empty());
    }

    #[test]
    fn test_transcode_repeated_query_field() {
        let rule = HttpRule::new(HttpMethod::GET, "/v1/{parent=projects/*}/jobs")
            .unwrap()
            .with_query_fields(&["view", "labels"]);
        let request = json!({
            "parent": "projects/p",
            "view": "FULL",
            "labels": ["a", "b"],
        });
        let transcoded = transcode(&rule, request).unwrap();
        assert_eq!(
            transcoded.query,
            vec![
                ("view".to_string(), "FULL".to_string()),
                ("labels".to_string(), "a".to_string()),
                ("labels".to_string(), "b".to_string()),
            ]
        );
        assert_eq!(transcoded.body, None);
    }

    #[test]
    fn test_transcode_wildcard_body_excludes_bound_fields() {
        let rule = HttpRule::new(HttpMethod::PATCH, "/v1/{name=projects/*/models/*}")
            .unwrap()
            .with_body("*")
            .with_query_fields(&["update_mask"]);
        let request = json!({
            "name": "projects/p/models/m",
            "updateMask": "displayName",
            "displayName": "new",
            "labels": {"env": "prod"},
        });
        let transcoded = transcode(&rule, request).unwrap();
        assert_eq!(transcoded.path, "/v1/projects/p/models/m");
        assert_eq!(
            transcoded.query,
            vec![("update_mask".to_string(), "displayName".to_string())]
        );
        assert_eq!(
            transcoded.body,
            Some(json!({"displayName": "new", "labels": {"env": "prod"}}))
        );
    }

    #[test]
    fn test_parse_error_with_envelope() {
        let body = serde_json::to_vec(&json!({
            "error": {
                "code": 409,
                "message": "resource exists",
                "status": "ALREADY_EXISTS",
            }
        }))
        .unwrap();
        let status = parse_error(409, &body);
        assert_eq!(status.code(), Code::AlreadyExists);
        assert_eq!(status.message(), "resource exists");
    }

    #[test]
    fn test_parse_error_409_without_detail_is_aborted() {
        let status = parse_error(409, b"");
        assert_eq!(status.code(), Code::Aborted);
    }

    #[test]
    fn test_parse_error_maps_status_codes() {
        assert_eq!(parse_error(404, b"").code(), Code::NotFound);
        assert_eq!(parse_error(429, b"").code(), Code::ResourceExhausted);
        assert_eq!(parse_error(503, b"").code(), Code::Unavailable);
        assert_eq!(parse_error(504, b"").code(), Code::DeadlineExceeded);
        assert_eq!(parse_error(418, b"").code(), Code::FailedPrecondition);
        assert_eq!(parse_error(502, b"").code(), Code::Internal);
    }

    #[test]
    fn test_parse_error_keeps_details() {
        let body = serde_json::to_vec(&json!({
            "error": {
                "message": "quota exceeded",
                "status": "RESOURCE_EXHAUSTED",
                "details": [{"reason": "RATE_LIMIT"}],
            }
        }))
        .unwrap();
        let status = parse_error(429, &body);
        assert_eq!(status.details().len(), 1);
    }

    #[test]
    fn test_rest_transport_rejects_bad_endpoint() {
        cortex_config::tls::initialize_crypto_provider();
        let client = reqwest::Client::new();
        assert!(RestTransport::new(client.clone(), "not a url").is_err());
        assert!(RestTransport::new(client, "ftp://host").is_err());
    }
}
