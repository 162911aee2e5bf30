//! Cookie hand-off between fetches.
//!
//! The orchestrator only talks to a [`CookieStore`]: it asks for the `Cookie`
//! header of each hop and forwards every `Set-Cookie` value it receives.
//! [`CookieJar`] is a small in-memory store covering domain, path, secure and
//! expiry matching; callers needing full RFC 6265 semantics plug in their own.

use std::collections::HashMap;
use std::fmt;
use std::sync::Mutex;

use chrono::{DateTime, Duration as ChronoDuration, TimeZone, Utc};
use url::Url;

use crate::error::{Error, Result};

/// Synchronous cookie store collaborator.
pub trait CookieStore: Send + Sync {
    /// `Cookie` header value for a request to `url`, if any cookie applies.
    fn cookie_string(&self, url: &str) -> Option<String>;

    /// Record one raw `Set-Cookie` value received from `url`.
    fn set_cookie(&self, cookie: &str, url: &str);
}

/// A cookie parsed from a `Set-Cookie` header.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Cookie {
    pub name: String,
    pub value: String,
    pub domain: String,
    /// True when the cookie was set without a Domain attribute.
    pub host_only: bool,
    pub path: String,
    pub secure: bool,
    pub http_only: bool,
    pub expires: Option<DateTime<Utc>>,
}

impl Cookie {
    pub fn parse(header: &str, request_url: &str) -> Result<Self> {
        let url = Url::parse(request_url).map_err(|e| Error::parse(format!("cookie url: {}", e)))?;
        let host = url
            .host_str()
            .ok_or_else(|| Error::parse("cookie url has no host"))?
            .to_ascii_lowercase();

        let mut parts = header.split(';').map(str::trim);
        let (name, value) = parts
            .next()
            .and_then(|pair| pair.split_once('='))
            .ok_or_else(|| Error::parse(format!("no = in cookie {:?}", header)))?;
        let name = name.trim();
        if name.is_empty() {
            return Err(Error::parse("empty cookie name"));
        }

        let mut cookie = Cookie {
            name: name.to_string(),
            value: value.trim().to_string(),
            domain: host.clone(),
            host_only: true,
            path: default_path(&url),
            secure: false,
            http_only: false,
            expires: None,
        };

        let mut max_age = None;
        for attr in parts {
            let (key, val) = attr.split_once('=').unwrap_or((attr, ""));
            let val = val.trim();
            match key.trim().to_ascii_lowercase().as_str() {
                "secure" => cookie.secure = true,
                "httponly" => cookie.http_only = true,
                "domain" if !val.is_empty() => {
                    let domain = val.trim_start_matches('.').to_ascii_lowercase();
                    if host != domain && !host.ends_with(&format!(".{}", domain)) {
                        return Err(Error::parse(format!(
                            "cookie domain {} does not match {}",
                            domain, host
                        )));
                    }
                    cookie.domain = domain;
                    cookie.host_only = false;
                }
                "path" if val.starts_with('/') => cookie.path = val.to_string(),
                "expires" => cookie.expires = parse_cookie_date(val),
                "max-age" => max_age = val.parse::<i64>().ok(),
                _ => {}
            }
        }
        // Max-Age wins over Expires.
        if let Some(secs) = max_age {
            cookie.expires =
                ChronoDuration::try_seconds(secs).and_then(|d| Utc::now().checked_add_signed(d));
        }
        Ok(cookie)
    }

    pub fn is_expired(&self) -> bool {
        self.expires.is_some_and(|at| at <= Utc::now())
    }

    pub fn matches(&self, url: &Url) -> bool {
        let Some(host) = url.host_str().map(str::to_ascii_lowercase) else {
            return false;
        };
        if self.secure && url.scheme() != "https" {
            return false;
        }
        if self.is_expired() {
            return false;
        }
        let domain_ok = if self.host_only {
            host == self.domain
        } else {
            host == self.domain || host.ends_with(&format!(".{}", self.domain))
        };
        if !domain_ok {
            return false;
        }
        let path = url.path();
        path == self.path
            || (path.starts_with(&self.path)
                && (self.path.ends_with('/') || path[self.path.len()..].starts_with('/')))
    }
}

impl fmt::Display for Cookie {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}={}", self.name, self.value)
    }
}

/// In-memory cookie store keyed by (domain, path, name).
#[derive(Debug, Default)]
pub struct CookieJar {
    cookies: Mutex<HashMap<(String, String, String), Cookie>>,
}

impl CookieJar {
    pub fn new() -> Self {
        Self::default()
    }

    /// Insert or replace; an already expired cookie deletes its match.
    pub fn store(&self, cookie: Cookie) {
        let key = (cookie.domain.clone(), cookie.path.clone(), cookie.name.clone());
        let mut cookies = self.lock();
        if cookie.is_expired() {
            cookies.remove(&key);
        } else {
            cookies.insert(key, cookie);
        }
    }

    pub fn cookies_for_url(&self, url: &str) -> Vec<Cookie> {
        let Ok(url) = Url::parse(url) else {
            return Vec::new();
        };
        let mut matching: Vec<Cookie> = self
            .lock()
            .values()
            .filter(|c| c.matches(&url))
            .cloned()
            .collect();
        // Longer paths first, then name, for a stable header.
        matching.sort_by(|a, b| b.path.len().cmp(&a.path.len()).then_with(|| a.name.cmp(&b.name)));
        matching
    }

    pub fn get(&self, domain: &str, name: &str) -> Option<Cookie> {
        let domain = domain.trim_start_matches('.').to_ascii_lowercase();
        self.lock()
            .values()
            .find(|c| c.domain == domain && c.name == name)
            .cloned()
    }

    pub fn clear(&self) {
        self.lock().clear();
    }

    pub fn len(&self) -> usize {
        self.lock().len()
    }

    pub fn is_empty(&self) -> bool {
        self.lock().is_empty()
    }

    fn lock(&self) -> std::sync::MutexGuard<'_, HashMap<(String, String, String), Cookie>> {
        // A panic while holding the lock cannot leave the map half-written.
        self.cookies.lock().unwrap_or_else(|poisoned| poisoned.into_inner())
    }
}

impl CookieStore for CookieJar {
    fn cookie_string(&self, url: &str) -> Option<String> {
        let cookies = self.cookies_for_url(url);
        if cookies.is_empty() {
            return None;
        }
        Some(
            cookies
                .iter()
                .map(ToString::to_string)
                .collect::<Vec<_>>()
                .join("; "),
        )
    }

    fn set_cookie(&self, cookie: &str, url: &str) {
        match Cookie::parse(cookie, url) {
            Ok(cookie) => self.store(cookie),
            Err(e) => tracing::debug!("Ignoring cookie from {}: {}", url, e),
        }
    }
}

fn default_path(url: &Url) -> String {
    let path = url.path();
    match path.rfind('/') {
        Some(0) | None => "/".to_string(),
        Some(i) => path[..i].to_string(),
    }
}

fn parse_cookie_date(date_str: &str) -> Option<DateTime<Utc>> {
    const FORMATS: [&str; 4] = [
        "%a, %d %b %Y %H:%M:%S GMT",
        "%a, %d-%b-%Y %H:%M:%S GMT",
        "%a, %d-%b-%y %H:%M:%S GMT",
        "%a %b %e %H:%M:%S %Y",
    ];
    for fmt in FORMATS {
        if let Ok(dt) = chrono::NaiveDateTime::parse_from_str(date_str, fmt) {
            return Some(Utc.from_utc_datetime(&dt));
        }
    }
    None
}
