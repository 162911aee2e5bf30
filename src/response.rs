//! Normalized result of one logical fetch.

use std::collections::BTreeMap;

use bytes::Bytes;
use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use sha2::{Digest, Sha256};

use crate::error::{Error, Result};
use crate::target::Target;

/// One or more values received under the same (lower-cased) header name.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(untagged)]
pub enum HeaderValue {
    Single(String),
    Multiple(Vec<String>),
}

impl HeaderValue {
    pub fn first(&self) -> Option<&str> {
        match self {
            Self::Single(v) => Some(v),
            Self::Multiple(vs) => vs.first().map(String::as_str),
        }
    }

    pub fn iter(&self) -> impl Iterator<Item = &str> {
        let values: &[String] = match self {
            Self::Single(v) => std::slice::from_ref(v),
            Self::Multiple(vs) => vs,
        };
        values.iter().map(String::as_str)
    }

    fn push(&mut self, value: String) {
        match self {
            Self::Single(existing) => {
                let first = std::mem::take(existing);
                *self = Self::Multiple(vec![first, value]);
            }
            Self::Multiple(vs) => vs.push(value),
        }
    }
}

/// Response headers keyed by lower-cased name.
pub type ResponseHeaders = BTreeMap<String, HeaderValue>;

/// Fold raw `(name, value)` pairs into [`ResponseHeaders`].
///
/// Names are lower-cased. A name seen more than once keeps every value in
/// arrival order.
pub fn fold_headers<'a, I>(raw: I) -> ResponseHeaders
where
    I: IntoIterator<Item = (&'a str, &'a str)>,
{
    let mut headers = ResponseHeaders::new();
    for (name, value) in raw {
        let key = name.to_ascii_lowercase();
        match headers.get_mut(&key) {
            Some(existing) => existing.push(value.to_string()),
            None => {
                headers.insert(key, HeaderValue::Single(value.to_string()));
            }
        }
    }
    headers
}

/// The outcome of a fetch, after redirects and decompression.
#[derive(Debug, Clone, PartialEq)]
pub struct Response {
    /// The caller's target, untouched by redirects.
    pub url: Target,
    pub status_code: u16,
    pub headers: ResponseHeaders,
    /// `"1.1"` style version string.
    pub http_version: String,
    /// Start of the first hop.
    pub fetch_start: Option<DateTime<Utc>>,
    /// Resolution of the last hop.
    pub fetch_end: Option<DateTime<Utc>>,
    /// Absolute URL of the last hop, set only when a redirect was followed.
    pub effective_url: Option<String>,
    pub body: Bytes,
}

impl Response {
    pub fn new(
        url: Target,
        status_code: u16,
        headers: ResponseHeaders,
        http_version: impl Into<String>,
        body: Bytes,
    ) -> Self {
        Self {
            url,
            status_code,
            headers,
            http_version: http_version.into(),
            fetch_start: None,
            fetch_end: None,
            effective_url: None,
            body,
        }
    }

    pub fn body(&self) -> &Bytes {
        &self.body
    }

    pub fn is_success(&self) -> bool {
        (200..300).contains(&self.status_code)
    }

    pub fn is_redirect(&self) -> bool {
        (300..400).contains(&self.status_code)
    }

    /// First value of a header, case-insensitively.
    pub fn header(&self, name: &str) -> Option<&str> {
        self.headers
            .get(&name.to_ascii_lowercase())
            .and_then(HeaderValue::first)
    }

    /// Every value of a header, case-insensitively.
    pub fn header_all(&self, name: &str) -> Vec<&str> {
        self.headers
            .get(&name.to_ascii_lowercase())
            .map(|v| v.iter().collect())
            .unwrap_or_default()
    }

    pub fn content_type(&self) -> Option<&str> {
        self.header("content-type")
    }

    pub fn content_encoding(&self) -> Option<&str> {
        self.header("content-encoding")
    }

    /// Length of the (decoded) body in bytes.
    pub fn content_length(&self) -> usize {
        self.body.len()
    }

    /// Hex SHA-256 of the body.
    pub fn content_hash(&self) -> String {
        hex::encode(Sha256::digest(&self.body))
    }

    pub fn text(&self) -> Result<String> {
        String::from_utf8(self.body.to_vec())
            .map_err(|e| Error::parse(format!("UTF-8 decode error: {}", e)))
    }

    /// Parse the body as JSON.
    pub fn json<T: serde::de::DeserializeOwned>(&self) -> Result<T> {
        serde_json::from_slice(&self.body).map_err(|e| Error::parse(format!("invalid JSON body: {}", e)))
    }
}
