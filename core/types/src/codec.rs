// Copyright AGNTCY Contributors (https://github.com/agntcy)
// SPDX-License-Identifier: Apache-2.0

//! Codec traits for message serialization and deserialization
//!
//! The runtime treats service messages as opaque values behind these
//! capabilities. Generated message crates implement [`Encoder`] and
//! [`Decoder`] for the binary wire format and derive `serde` traits for
//! the canonical JSON mapping used by the REST transport.

use crate::Status;

/// Trait for encoding messages to bytes
pub trait Encoder {
    /// Encode the message into the buffer
    fn encode(&self, buf: &mut Vec<u8>) -> Result<(), Status>;

    /// Size of the encoded message in bytes
    fn encoded_len(&self) -> usize;

    /// Encode into a fresh buffer
    fn encode_to_vec(&self) -> Result<Vec<u8>, Status> {
        let mut buf = Vec::with_capacity(self.encoded_len());
        self.encode(&mut buf)?;
        Ok(buf)
    }
}

/// Trait for decoding messages from bytes
pub trait Decoder: Default + Sized {
    /// Decode a message from bytes
    fn decode(buf: &[u8]) -> Result<Self, Status>;
}

/// Combined codec trait for types that can be both encoded and decoded
pub trait Codec: Encoder + Decoder {}

// Blanket implementation
impl<T: Encoder + Decoder> Codec for T {}

/// Bounds a request message must satisfy to travel on either transport:
/// binary encoding plus the canonical JSON mapping.
pub trait RequestMessage: Encoder + serde::Serialize + Send + Sync {}

impl<T: Encoder + serde::Serialize + Send + Sync> RequestMessage for T {}

/// Bounds a response message must satisfy on either transport.
pub trait ResponseMessage: Decoder + serde::de::DeserializeOwned + Send {}

impl<T: Decoder + serde::de::DeserializeOwned + Send> ResponseMessage for T {}

#[cfg(test)]
mod tests {
    use super::*;

    #[derive(Debug, Clone, Default, PartialEq)]
    struct TestMessage {
        data: Vec<u8>,
    }

    impl Encoder for TestMessage {
        fn encode(&self, buf: &mut Vec<u8>) -> Result<(), Status> {
            buf.extend_from_slice(&self.data);
            Ok(())
        }

        fn encoded_len(&self) -> usize {
            self.data.len()
        }
    }

    impl Decoder for TestMessage {
        fn decode(buf: &[u8]) -> Result<Self, Status> {
            Ok(TestMessage { data: buf.to_vec() })
        }
    }

    #[test]
    fn test_encode_to_vec() {
        let msg = TestMessage {
            data: vec![1, 2, 3, 4],
        };
        assert_eq!(msg.encode_to_vec().unwrap(), vec![1, 2, 3, 4]);
    }

    #[test]
    fn test_decode() {
        let msg = TestMessage::decode(&[1, 2, 3, 4]).unwrap();
        assert_eq!(msg.data, vec![1, 2, 3, 4]);
    }
}
