// Copyright AGNTCY Contributors (https://github.com/agntcy)
// SPDX-License-Identifier: Apache-2.0

pub mod backoff;
pub mod client_info;
pub mod component;
pub mod endpoint;
pub mod grpc;
pub mod http;
pub mod retry;
pub mod tls;
