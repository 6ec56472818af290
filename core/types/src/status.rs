// Copyright AGNTCY Contributors (https://github.com/agntcy)
// SPDX-License-Identifier: Apache-2.0

//! RPC status codes and the error type carried by every failed call.
//!
//! The code set is closed: transports map wire-level failures onto it and
//! never invent new kinds. REST responses carry the same codes through the
//! HTTP status mapping in [`Code::from_http`].

use serde::{Deserialize, Serialize};

/// Canonical RPC error kinds.
///
/// `Ok` exists for wire interop (code 0 in trailers and error envelopes);
/// a `Status` returned to a caller never carries it.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "SCREAMING_SNAKE_CASE")]
pub enum Code {
    Ok,
    Cancelled,
    InvalidArgument,
    DeadlineExceeded,
    NotFound,
    AlreadyExists,
    PermissionDenied,
    Unauthenticated,
    ResourceExhausted,
    FailedPrecondition,
    Aborted,
    OutOfRange,
    Unimplemented,
    Internal,
    Unavailable,
    DataLoss,
}

impl Code {
    /// Numeric value used by the binary transport's status trailer.
    pub fn as_i32(&self) -> i32 {
        match self {
            Code::Ok => 0,
            Code::Cancelled => 1,
            Code::InvalidArgument => 3,
            Code::DeadlineExceeded => 4,
            Code::NotFound => 5,
            Code::AlreadyExists => 6,
            Code::PermissionDenied => 7,
            Code::ResourceExhausted => 8,
            Code::FailedPrecondition => 9,
            Code::Aborted => 10,
            Code::OutOfRange => 11,
            Code::Unimplemented => 12,
            Code::Internal => 13,
            Code::Unavailable => 14,
            Code::DataLoss => 15,
            Code::Unauthenticated => 16,
        }
    }

    pub fn from_i32(value: i32) -> Option<Code> {
        let code = match value {
            0 => Code::Ok,
            1 => Code::Cancelled,
            3 => Code::InvalidArgument,
            4 => Code::DeadlineExceeded,
            5 => Code::NotFound,
            6 => Code::AlreadyExists,
            7 => Code::PermissionDenied,
            8 => Code::ResourceExhausted,
            9 => Code::FailedPrecondition,
            10 => Code::Aborted,
            11 => Code::OutOfRange,
            12 => Code::Unimplemented,
            13 => Code::Internal,
            14 => Code::Unavailable,
            15 => Code::DataLoss,
            16 => Code::Unauthenticated,
            _ => return None,
        };
        Some(code)
    }

    /// Screaming-snake name as it appears in REST error envelopes.
    pub fn as_str_name(&self) -> &'static str {
        match self {
            Code::Ok => "OK",
            Code::Cancelled => "CANCELLED",
            Code::InvalidArgument => "INVALID_ARGUMENT",
            Code::DeadlineExceeded => "DEADLINE_EXCEEDED",
            Code::NotFound => "NOT_FOUND",
            Code::AlreadyExists => "ALREADY_EXISTS",
            Code::PermissionDenied => "PERMISSION_DENIED",
            Code::Unauthenticated => "UNAUTHENTICATED",
            Code::ResourceExhausted => "RESOURCE_EXHAUSTED",
            Code::FailedPrecondition => "FAILED_PRECONDITION",
            Code::Aborted => "ABORTED",
            Code::OutOfRange => "OUT_OF_RANGE",
            Code::Unimplemented => "UNIMPLEMENTED",
            Code::Internal => "INTERNAL",
            Code::Unavailable => "UNAVAILABLE",
            Code::DataLoss => "DATA_LOSS",
        }
    }

    pub fn from_str_name(name: &str) -> Option<Code> {
        let code = match name {
            "OK" => Code::Ok,
            "CANCELLED" => Code::Cancelled,
            "INVALID_ARGUMENT" => Code::InvalidArgument,
            "DEADLINE_EXCEEDED" => Code::DeadlineExceeded,
            "NOT_FOUND" => Code::NotFound,
            "ALREADY_EXISTS" => Code::AlreadyExists,
            "PERMISSION_DENIED" => Code::PermissionDenied,
            "UNAUTHENTICATED" => Code::Unauthenticated,
            "RESOURCE_EXHAUSTED" => Code::ResourceExhausted,
            "FAILED_PRECONDITION" => Code::FailedPrecondition,
            "ABORTED" => Code::Aborted,
            "OUT_OF_RANGE" => Code::OutOfRange,
            "UNIMPLEMENTED" => Code::Unimplemented,
            "INTERNAL" => Code::Internal,
            "UNAVAILABLE" => Code::Unavailable,
            "DATA_LOSS" => Code::DataLoss,
            _ => return None,
        };
        Some(code)
    }

    /// Maps an HTTP status to an error kind.
    ///
    /// 409 maps to `Aborted` here; the REST transport upgrades it to
    /// `AlreadyExists` when the error envelope says so.
    pub fn from_http(status: u16) -> Code {
        match status {
            400 => Code::InvalidArgument,
            401 => Code::Unauthenticated,
            403 => Code::PermissionDenied,
            404 => Code::NotFound,
            409 => Code::Aborted,
            429 => Code::ResourceExhausted,
            499 => Code::Cancelled,
            500 => Code::Internal,
            501 => Code::Unimplemented,
            503 => Code::Unavailable,
            504 => Code::DeadlineExceeded,
            s if (400..500).contains(&s) => Code::FailedPrecondition,
            _ => Code::Internal,
        }
    }
}

impl std::fmt::Display for Code {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(self.as_str_name())
    }
}

/// Error carried by every failed RPC: kind, human message, optional
/// structured details.
#[derive(Debug, Clone, PartialEq, thiserror::Error)]
#[error("{code}: {message}")]
pub struct Status {
    code: Code,
    message: String,
    details: Vec<serde_json::Value>,
}

impl Status {
    pub fn new(code: Code, message: impl Into<String>) -> Self {
        Self {
            code,
            message: message.into(),
            details: Vec::new(),
        }
    }

    pub fn with_details(mut self, details: Vec<serde_json::Value>) -> Self {
        self.details = details;
        self
    }

    pub fn code(&self) -> Code {
        self.code
    }

    pub fn message(&self) -> &str {
        &self.message
    }

    pub fn details(&self) -> &[serde_json::Value] {
        &self.details
    }
}

macro_rules! status_constructors {
    ($(($name:ident, $code:ident)),* $(,)?) => {
        impl Status {
            $(
                pub fn $name(message: impl Into<String>) -> Self {
                    Status::new(Code::$code, message)
                }
            )*
        }
    };
}

status_constructors!(
    (cancelled, Cancelled),
    (invalid_argument, InvalidArgument),
    (deadline_exceeded, DeadlineExceeded),
    (not_found, NotFound),
    (already_exists, AlreadyExists),
    (permission_denied, PermissionDenied),
    (unauthenticated, Unauthenticated),
    (resource_exhausted, ResourceExhausted),
    (failed_precondition, FailedPrecondition),
    (aborted, Aborted),
    (out_of_range, OutOfRange),
    (unimplemented, Unimplemented),
    (internal, Internal),
    (unavailable, Unavailable),
    (data_loss, DataLoss),
);

impl From<tonic::Status> for Status {
    fn from(status: tonic::Status) -> Self {
        let code = Code::from_i32(status.code() as i32).unwrap_or(Code::Internal);
        // The closed set has no "unknown"; fold it into internal.
        let code = if code == Code::Ok {
            Code::Internal
        } else {
            code
        };
        Status::new(code, status.message())
    }
}
