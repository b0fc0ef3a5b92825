// Copyright (C) 2025 SyncMyOrders Sp. z o.o.
// SPDX-License-Identifier: AGPL-3.0-or-later
//! Transport metadata delivered by the broker alongside a request.
//!
//! Headers are stored verbatim, in delivery order and with their original
//! case. Lookups are case-insensitive; when two stored keys collide under
//! case folding, the one delivered first wins.

use base64::Engine;
use bytes::Bytes;
use serde::{Serialize, Serializer};
use sha2::{Digest, Sha256};

/// Header key/value pairs in insertion order.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize)]
#[serde(transparent)]
pub struct Headers {
    entries: Vec<(String, String)>,
}

impl Headers {
    /// Create an empty header collection.
    pub fn new() -> Self {
        Self::default()
    }

    /// Append a header. Duplicate keys are kept as delivered.
    pub fn append(&mut self, key: impl Into<String>, value: impl Into<String>) {
        self.entries.push((key.into(), value.into()));
    }

    /// ASCII case-insensitive lookup; first match in insertion order.
    pub fn get(&self, key: &str) -> Option<&str> {
        self.entries
            .iter()
            .find(|(k, _)| k.eq_ignore_ascii_case(key))
            .map(|(_, v)| v.as_str())
    }

    /// Pairs as delivered.
    pub fn iter(&self) -> impl Iterator<Item = (&str, &str)> {
        self.entries.iter().map(|(k, v)| (k.as_str(), v.as_str()))
    }

    /// Number of stored pairs, duplicates included.
    pub fn len(&self) -> usize {
        self.entries.len()
    }

    /// Whether no headers were delivered.
    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }
}

impl<K: Into<String>, V: Into<String>> FromIterator<(K, V)> for Headers {
    fn from_iter<I: IntoIterator<Item = (K, V)>>(iter: I) -> Self {
        Self {
            entries: iter
                .into_iter()
                .map(|(k, v)| (k.into(), v.into()))
                .collect(),
        }
    }
}

/// Broker metadata and raw framing for one request.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize)]
pub struct TransportMetadata {
    headers: Headers,
    #[serde(serialize_with = "serialize_body")]
    body: Bytes,
    #[serde(skip_serializing_if = "Option::is_none")]
    correlation_id: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    reply_to: Option<String>,
}

impl TransportMetadata {
    /// Create metadata from delivered headers and the raw message body.
    pub fn new(headers: Headers, body: impl Into<Bytes>) -> Self {
        Self {
            headers,
            body: body.into(),
            correlation_id: None,
            reply_to: None,
        }
    }

    /// Set the broker correlation id used to match the reply.
    pub fn with_correlation_id(mut self, correlation_id: impl Into<String>) -> Self {
        self.correlation_id = Some(correlation_id.into());
        self
    }

    /// Set the destination the reply must be published to.
    pub fn with_reply_to(mut self, reply_to: impl Into<String>) -> Self {
        self.reply_to = Some(reply_to.into());
        self
    }

    /// Case-insensitive header lookup.
    pub fn header(&self, key: &str) -> Option<&str> {
        self.headers.get(key)
    }

    /// All headers, unmodified.
    pub fn headers(&self) -> &Headers {
        &self.headers
    }

    /// Raw message body.
    pub fn body(&self) -> &Bytes {
        &self.body
    }

    /// Broker correlation id.
    pub fn correlation_id(&self) -> Option<&str> {
        self.correlation_id.as_deref()
    }

    /// Reply destination.
    pub fn reply_to(&self) -> Option<&str> {
        self.reply_to.as_deref()
    }

    /// Hex-encoded SHA-256 of the body, for logging in place of the body itself.
    pub fn body_digest(&self) -> String {
        format!("{:x}", Sha256::digest(&self.body))
    }
}

fn serialize_body<S: Serializer>(body: &Bytes, serializer: S) -> Result<S::Ok, S::Error> {
    serializer.serialize_str(&base64::engine::general_purpose::STANDARD.encode(body))
}

#[cfg(test)]
mod tests {
    use super::*;

    fn metadata() -> TransportMetadata {
        let headers: Headers = [
            ("Content-Type", "application/json"),
            ("X-Request-Id", "req-1"),
        ]
        .into_iter()
        .collect();
        TransportMetadata::new(headers, &b"{}"[..])
    }

    #[test]
    fn test_header_lookup_is_case_insensitive() {
        let meta = metadata();
        assert_eq!(meta.header("Content-Type"), Some("application/json"));
        assert_eq!(meta.header("content-type"), Some("application/json"));
        assert_eq!(meta.header("CONTENT-TYPE"), Some("application/json"));
    }

    #[test]
    fn test_header_lookup_folds_ascii_only() {
        let mut headers = Headers::new();
        headers.append("X-Straße", "unicode");
        headers.append("X-Kelvin-\u{212A}", "kelvin");
        let meta = TransportMetadata::new(headers, Bytes::new());

        assert_eq!(meta.header("x-straße"), Some("unicode"));
        assert_eq!(meta.header("X-STRASSE"), None);
        assert_eq!(meta.header("x-kelvin-k"), None);
    }

    #[test]
    fn test_header_absent() {
        let meta = metadata();
        assert_eq!(meta.header("content"), None);
        assert_eq!(meta.header("Content-Type-Extra"), None);
        assert_eq!(meta.header(""), None);
    }

    #[test]
    fn test_duplicate_keys_first_wins() {
        let mut headers = Headers::new();
        headers.append("x-tenant", "first");
        headers.append("X-Tenant", "second");
        let meta = TransportMetadata::new(headers, Bytes::new());

        assert_eq!(meta.header("X-TENANT"), Some("first"));
        assert_eq!(meta.headers().len(), 2);
    }

    #[test]
    fn test_headers_are_unmodified() {
        let meta = metadata();
        let pairs: Vec<_> = meta.headers().iter().collect();
        assert_eq!(
            pairs,
            vec![("Content-Type", "application/json"), ("X-Request-Id", "req-1")]
        );
    }

    #[test]
    fn test_body_digest() {
        let meta = TransportMetadata::new(Headers::new(), Bytes::new());
        assert_eq!(
            meta.body_digest(),
            "e3b0c44298fc1c149afbf4c8996fb92427ae41e4649b934ca495991b7852b855"
        );
    }

    #[test]
    fn test_serialize_encodes_body() {
        let meta = metadata().with_correlation_id("corr-9");
        let json = serde_json::to_value(&meta).unwrap();
        assert_eq!(json["body"], "e30=");
        assert_eq!(json["correlation_id"], "corr-9");
        assert!(json.get("reply_to").is_none());
        assert_eq!(json["headers"][0][0], "Content-Type");
    }
}
