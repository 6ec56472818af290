// Copyright AGNTCY Contributors (https://github.com/agntcy)
// SPDX-License-Identifier: Apache-2.0

/// Trait implemented by every configuration struct that can be checked
/// for internal consistency before use.
pub trait Configuration {
    type Error;

    fn validate(&self) -> Result<(), Self::Error>;
}
