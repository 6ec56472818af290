// Copyright AGNTCY Contributors (https://github.com/agntcy)
// SPDX-License-Identifier: Apache-2.0

//! Path-template engine.
//!
//! One compiled representation serves both resource-name handling
//! (`projects/{project}/locations/{location}/pipelineJobs/{pipeline_job}`)
//! and REST URI transcoding (`/v1/{name=projects/*/locations/*/operations/*}:cancel`),
//! including the reverse URI-to-fields binding used to route incoming URIs
//! to method bindings.

pub mod errors;
pub mod router;
pub mod template;

pub use errors::TemplateError;
pub use router::TemplateSet;
pub use template::{Bindings, PathTemplate};
