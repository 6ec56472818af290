// Copyright AGNTCY Contributors (https://github.com/agntcy)
// SPDX-License-Identifier: Apache-2.0

pub mod codec;
pub mod metadata;
pub mod status;

pub use codec::{Codec, Decoder, Encoder, RequestMessage, ResponseMessage};
pub use metadata::{Metadata, MetadataValue};
pub use status::{Code, Status};

/// Result alias used by all functions wrapping RPCs.
pub type Result<T> = std::result::Result<T, Status>;
