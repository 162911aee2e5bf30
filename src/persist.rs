//! On-disk response records.
//!
//! A record is a single-line JSON head, one `\n` byte, then the body:
//!
//! ```text
//! {"url":...,"statusCode":200,...,"_encoding":"gzip"}\n<body bytes>
//! ```
//!
//! JSON never emits a raw newline, so the first `\n` in the file is always
//! the separator. When `_encoding` is `"gzip"` the body bytes are one gzip
//! member holding the whole body.

use std::path::Path;

use bytes::Bytes;
use chrono::{DateTime, SecondsFormat, Utc};
use serde::{Deserialize, Serialize};

use crate::error::{Error, Result};
use crate::inflate::{decode_gzip, encode_gzip};
use crate::response::{Response, ResponseHeaders};
use crate::target::Target;

const SEPARATOR: u8 = b'\n';
const GZIP: &str = "gzip";

/// How [`Response::save`] writes a record.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct SaveOptions {
    /// Gzip the body. Only honoured for non-empty `text` or `json` bodies.
    pub compress: bool,
    /// Write only the (possibly compressed) body, without head or separator.
    pub body_only: bool,
}

impl SaveOptions {
    pub fn compressed() -> Self {
        Self {
            compress: true,
            body_only: false,
        }
    }

    pub fn body_only(mut self, body_only: bool) -> Self {
        self.body_only = body_only;
        self
    }

    pub fn compress(mut self, compress: bool) -> Self {
        self.compress = compress;
        self
    }
}

#[derive(Debug, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
struct RecordHead {
    url: Target,
    status_code: u16,
    headers: ResponseHeaders,
    http_version: String,
    #[serde(with = "millis", default)]
    fetch_start: Option<DateTime<Utc>>,
    #[serde(with = "millis", default)]
    fetch_end: Option<DateTime<Utc>>,
    #[serde(default)]
    effective_url: Option<String>,
    #[serde(rename = "_encoding", default)]
    encoding: Option<String>,
}

impl Response {
    /// Write this response to `path`.
    pub async fn save(&self, path: impl AsRef<Path>, options: SaveOptions) -> Result<()> {
        let data = self.to_record(options)?;
        tokio::fs::write(path, data).await?;
        Ok(())
    }

    /// Read a record written by [`Response::save`] without `body_only`.
    pub async fn load(path: impl AsRef<Path>) -> Result<Response> {
        let data = tokio::fs::read(path).await?;
        Self::from_record(&data)
    }

    /// Serialize to the record format in memory.
    pub fn to_record(&self, options: SaveOptions) -> Result<Vec<u8>> {
        let compress = options.compress && !self.body.is_empty() && self.is_textual();
        let body = if compress {
            encode_gzip(&self.body)?
        } else {
            self.body.to_vec()
        };
        if options.body_only {
            return Ok(body);
        }

        let head = RecordHead {
            url: self.url.clone(),
            status_code: self.status_code,
            headers: self.headers.clone(),
            http_version: self.http_version.clone(),
            fetch_start: self.fetch_start,
            fetch_end: self.fetch_end,
            effective_url: self.effective_url.clone(),
            encoding: compress.then(|| GZIP.to_string()),
        };
        let mut data = serde_json::to_vec(&head)?;
        data.reserve(body.len() + 1);
        data.push(SEPARATOR);
        data.extend_from_slice(&body);
        Ok(data)
    }

    /// Parse a record held in memory.
    pub fn from_record(data: &[u8]) -> Result<Response> {
        let split = data
            .iter()
            .position(|&b| b == SEPARATOR)
            .ok_or_else(|| Error::parse("record has no head separator"))?;
        let head: RecordHead = serde_json::from_slice(&data[..split])
            .map_err(|e| Error::parse(format!("record head: {}", e)))?;
        let raw_body = &data[split + 1..];

        let body = match head.encoding.as_deref() {
            Some(GZIP) if !raw_body.is_empty() => {
                decode_gzip(raw_body).map_err(|e| Error::parse(format!("record body: {}", e)))?
            }
            _ => Bytes::copy_from_slice(raw_body),
        };

        Ok(Response {
            url: head.url,
            status_code: head.status_code,
            headers: head.headers,
            http_version: head.http_version,
            fetch_start: head.fetch_start,
            fetch_end: head.fetch_end,
            effective_url: head.effective_url,
            body,
        })
    }

    /// Content-Type mentions the word `text` or `json`.
    fn is_textual(&self) -> bool {
        self.content_type().is_some_and(|ct| {
            ct.split(|c: char| !(c.is_ascii_alphanumeric() || c == '_'))
                .any(|word| word.eq_ignore_ascii_case("text") || word.eq_ignore_ascii_case("json"))
        })
    }
}

/// Timestamps as ISO 8601 UTC with millisecond precision.
mod millis {
    use super::*;
    use serde::{Deserializer, Serializer};

    pub fn serialize<S: Serializer>(value: &Option<DateTime<Utc>>, s: S) -> std::result::Result<S::Ok, S::Error> {
        match value {
            Some(dt) => s.serialize_str(&dt.to_rfc3339_opts(SecondsFormat::Millis, true)),
            None => s.serialize_none(),
        }
    }

    pub fn deserialize<'de, D: Deserializer<'de>>(d: D) -> std::result::Result<Option<DateTime<Utc>>, D::Error> {
        let raw: Option<String> = Option::deserialize(d)?;
        raw.map(|s| {
            DateTime::parse_from_rfc3339(&s)
                .map(|dt| dt.with_timezone(&Utc))
                .map_err(serde::de::Error::custom)
        })
        .transpose()
    }
}
