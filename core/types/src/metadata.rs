// Copyright AGNTCY Contributors (https://github.com/agntcy)
// SPDX-License-Identifier: Apache-2.0

//! Ordered call metadata.
//!
//! Keys are case-insensitive ASCII and stored lowercased. Keys ending in
//! `-bin` carry opaque bytes; they travel base64-encoded on the HTTP wire
//! and as binary metadata on the framed transport. Entry order is
//! preserved so repeated keys reach the server in insertion order.

use base64::{Engine as _, engine::general_purpose::STANDARD as BASE64};

pub const BINARY_SUFFIX: &str = "-bin";

/// A single metadata value: printable ASCII or opaque bytes.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum MetadataValue {
    Ascii(String),
    Binary(Vec<u8>),
}

impl MetadataValue {
    pub fn as_ascii(&self) -> Option<&str> {
        match self {
            MetadataValue::Ascii(s) => Some(s),
            MetadataValue::Binary(_) => None,
        }
    }

    pub fn as_binary(&self) -> Option<&[u8]> {
        match self {
            MetadataValue::Ascii(_) => None,
            MetadataValue::Binary(b) => Some(b),
        }
    }

    /// Wire form for header-based transports: binary values are base64.
    pub fn to_header_value(&self) -> String {
        match self {
            MetadataValue::Ascii(s) => s.clone(),
            MetadataValue::Binary(b) => BASE64.encode(b),
        }
    }
}

/// Ordered key/value metadata attached to one call.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct Metadata {
    entries: Vec<(String, MetadataValue)>,
}

impl Metadata {
    pub fn new() -> Self {
        Self::default()
    }

    /// True when the key designates a binary entry.
    pub fn is_binary_key(key: &str) -> bool {
        key.ends_with(BINARY_SUFFIX)
    }

    fn normalize(key: &str) -> String {
        key.to_ascii_lowercase()
    }

    /// Insert an ASCII entry, replacing any existing entries for the key.
    pub fn insert(&mut self, key: &str, value: impl Into<String>) {
        let key = Self::normalize(key);
        debug_assert!(!Self::is_binary_key(&key), "use insert_bin for -bin keys");
        self.entries.retain(|(k, _)| *k != key);
        self.entries.push((key, MetadataValue::Ascii(value.into())));
    }

    /// Insert a binary entry under a `-bin` key, replacing existing ones.
    pub fn insert_bin(&mut self, key: &str, value: impl Into<Vec<u8>>) {
        let key = Self::normalize(key);
        debug_assert!(Self::is_binary_key(&key), "binary keys must end in -bin");
        self.entries.retain(|(k, _)| *k != key);
        self.entries.push((key, MetadataValue::Binary(value.into())));
    }

    /// Append an ASCII entry without removing previous values for the key.
    pub fn append(&mut self, key: &str, value: impl Into<String>) {
        let key = Self::normalize(key);
        debug_assert!(!Self::is_binary_key(&key), "use insert_bin for -bin keys");
        self.entries.push((key, MetadataValue::Ascii(value.into())));
    }

    /// First value for the key, if any.
    pub fn get(&self, key: &str) -> Option<&MetadataValue> {
        let key = Self::normalize(key);
        self.entries.iter().find(|(k, _)| *k == key).map(|(_, v)| v)
    }

    /// All values for the key, in insertion order.
    pub fn get_all<'a>(&'a self, key: &str) -> impl Iterator<Item = &'a MetadataValue> {
        let key = Self::normalize(key);
        self.entries
            .iter()
            .filter(move |(k, _)| *k == key)
            .map(|(_, v)| v)
    }

    pub fn remove(&mut self, key: &str) {
        let key = Self::normalize(key);
        self.entries.retain(|(k, _)| *k != key);
    }

    pub fn contains_key(&self, key: &str) -> bool {
        self.get(key).is_some()
    }

    /// Merge another metadata set into this one; `other`'s entries are
    /// appended after the existing ones.
    pub fn merge(&mut self, other: Metadata) {
        self.entries.extend(other.entries);
    }

    pub fn iter(&self) -> impl Iterator<Item = (&str, &MetadataValue)> {
        self.entries.iter().map(|(k, v)| (k.as_str(), v))
    }

    pub fn len(&self) -> usize {
        self.entries.len()
    }

    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }
}

impl<const N: usize> From<[(&str, &str); N]> for Metadata {
    fn from(pairs: [(&str, &str); N]) -> Self {
        let mut metadata = Metadata::new();
        for (k, v) in pairs {
            metadata.append(k, v);
        }
        metadata
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_keys_are_lowercased() {
        let mut md = Metadata::new();
        md.insert("X-Request-Id", "abc");
        assert_eq!(
            md.get("x-request-id").and_then(|v| v.as_ascii()),
            Some("abc")
        );
        assert_eq!(md.get("X-REQUEST-ID").and_then(|v| v.as_ascii()), Some("abc"));
    }

    #[test]
    fn test_insert_replaces_append_accumulates() {
        let mut md = Metadata::new();
        md.append("k", "one");
        md.append("k", "two");
        assert_eq!(md.get_all("k").count(), 2);

        md.insert("k", "three");
        assert_eq!(md.get_all("k").count(), 1);
        assert_eq!(md.get("k").and_then(|v| v.as_ascii()), Some("three"));
    }

    #[test]
    fn test_binary_entries() {
        let mut md = Metadata::new();
        md.insert_bin("trace-bin", vec![0x01, 0x02, 0xff]);
        let value = md.get("trace-bin").expect("entry present");
        assert_eq!(value.as_binary(), Some(&[0x01, 0x02, 0xff][..]));
        assert_eq!(value.to_header_value(), "AQL/");
    }

    #[test]
    fn test_merge_preserves_order() {
        let mut a = Metadata::from([("first", "1")]);
        let b = Metadata::from([("second", "2"), ("third", "3")]);
        a.merge(b);
        let keys: Vec<_> = a.iter().map(|(k, _)| k.to_string()).collect();
        assert_eq!(keys, vec!["first", "second", "third"]);
    }
}
