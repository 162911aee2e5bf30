//! Request targets and URL normalization.

use serde::{Deserialize, Serialize};
use serde_json::{Map, Value};
use url::Url;

use crate::error::{Error, Result};

/// What the caller asked to fetch.
///
/// `WithContext` carries caller metadata (an id, a job reference...) that is
/// handed back untouched in [`Response::url`](crate::Response::url).
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(untagged)]
pub enum Target {
    Direct(String),
    WithContext {
        url: String,
        #[serde(flatten)]
        context: Map<String, Value>,
    },
}

impl Target {
    pub fn direct(url: impl Into<String>) -> Self {
        Self::Direct(url.into())
    }

    pub fn with_context(url: impl Into<String>, context: Map<String, Value>) -> Self {
        Self::WithContext {
            url: url.into(),
            context,
        }
    }

    /// The URL string as given by the caller, before normalization.
    pub fn href(&self) -> &str {
        match self {
            Self::Direct(url) => url,
            Self::WithContext { url, .. } => url,
        }
    }

    /// Caller metadata, if any.
    pub fn context(&self) -> Option<&Map<String, Value>> {
        match self {
            Self::Direct(_) => None,
            Self::WithContext { context, .. } => Some(context),
        }
    }

    /// Normalized absolute URL for this target.
    pub fn to_url(&self) -> Result<Url> {
        parse_url(self.href())
    }
}

impl From<&str> for Target {
    fn from(url: &str) -> Self {
        Self::Direct(url.to_string())
    }
}

impl From<String> for Target {
    fn from(url: String) -> Self {
        Self::Direct(url)
    }
}

impl From<&String> for Target {
    fn from(url: &String) -> Self {
        Self::Direct(url.clone())
    }
}

impl From<Url> for Target {
    fn from(url: Url) -> Self {
        Self::Direct(url.into())
    }
}

impl TryFrom<Value> for Target {
    type Error = Error;

    /// Accepts a JSON string, or an object with a string `url` field whose
    /// other fields become the context.
    fn try_from(value: Value) -> Result<Self> {
        match value {
            Value::String(url) => Ok(Self::Direct(url)),
            Value::Object(mut map) => match map.remove("url") {
                Some(Value::String(url)) => Ok(Self::WithContext { url, context: map }),
                _ => Err(Error::invalid_url("target record has no string `url` field")),
            },
            other => Err(Error::invalid_url(format!("unusable target: {}", other))),
        }
    }
}

/// Coerce a bare host or scheme-relative reference into an absolute one.
///
/// `example.com/a` becomes `http://example.com/a` and `//example.com`
/// becomes `http://example.com`. Anything that already starts with a
/// `word:` scheme is returned unchanged.
pub fn rewrite(url: &str) -> String {
    if has_scheme(url) {
        url.to_string()
    } else if url.starts_with("//") {
        format!("http:{}", url)
    } else {
        format!("http://{}", url)
    }
}

/// Rewrite then parse, requiring a host.
pub fn parse_url(url: &str) -> Result<Url> {
    let parsed = Url::parse(&rewrite(url.trim()))?;
    if parsed.host_str().map_or(true, str::is_empty) {
        return Err(Error::invalid_url(format!("no host in {:?}", url)));
    }
    Ok(parsed)
}

fn has_scheme(url: &str) -> bool {
    match url.find(':') {
        Some(0) | None => false,
        Some(i) => url[..i]
            .bytes()
            .all(|b| b.is_ascii_alphanumeric() || b == b'_'),
    }
}
