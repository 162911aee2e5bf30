//! Per-call request options.

use std::fmt;
use std::sync::Arc;
use std::time::Duration;

use bytes::Bytes;
use http::Method;
use tokio::io::AsyncRead;

use crate::auth::Authorisation;
use crate::cookie::CookieStore;
use crate::timeouts::Timeouts;
use crate::transport::connector::TlsConfig;

/// Default redirect bound when following `Location`.
pub const DEFAULT_MAX_REDIRECT: u32 = 50;

/// Asks the cookie store for the `Cookie` header of a URL.
pub type GetCookie = Arc<dyn Fn(&str) -> Option<String> + Send + Sync>;

/// Hands one raw `Set-Cookie` value and the URL it came from to the store.
pub type SetCookie = Arc<dyn Fn(&str, &str) + Send + Sync>;

/// Streaming request body source.
pub type BodyStream = Box<dyn AsyncRead + Send + Unpin>;

/// Request body.
pub enum Body {
    Text(String),
    Bytes(Bytes),
    /// Serialized with `serde_json` and sent as `application/json`.
    Json(serde_json::Value),
    /// Sent with chunked transfer encoding, on the first hop only.
    Stream(BodyStream),
}

impl Body {
    pub fn stream<R>(reader: R) -> Self
    where
        R: AsyncRead + Send + Unpin + 'static,
    {
        Self::Stream(Box::new(reader))
    }

    pub fn is_json(&self) -> bool {
        matches!(self, Self::Json(_))
    }
}

impl fmt::Debug for Body {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::Text(s) => f.debug_tuple("Text").field(s).finish(),
            Self::Bytes(b) => f.debug_tuple("Bytes").field(&b.len()).finish(),
            Self::Json(v) => f.debug_tuple("Json").field(v).finish(),
            Self::Stream(_) => f.write_str("Stream(..)"),
        }
    }
}

impl From<&str> for Body {
    fn from(s: &str) -> Self {
        Self::Text(s.to_string())
    }
}

impl From<String> for Body {
    fn from(s: String) -> Self {
        Self::Text(s)
    }
}

impl From<Vec<u8>> for Body {
    fn from(b: Vec<u8>) -> Self {
        Self::Bytes(Bytes::from(b))
    }
}

impl From<Bytes> for Body {
    fn from(b: Bytes) -> Self {
        Self::Bytes(b)
    }
}

impl From<serde_json::Value> for Body {
    fn from(v: serde_json::Value) -> Self {
        Self::Json(v)
    }
}

/// Caller-supplied headers. Either form replaces the default headers.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum HeaderInput {
    /// Sent exactly in this order, duplicates included.
    List(Vec<(String, String)>),
    /// Upserted one by one, so the result is de-duplicated and name-sorted.
    Map(Vec<(String, String)>),
}

/// Options for one logical fetch.
pub struct Options {
    pub data: Option<Body>,
    pub method: Option<Method>,
    pub headers: Option<HeaderInput>,
    pub timeouts: Timeouts,
    /// Inject a `Host` header. Default true.
    pub set_host: bool,
    /// Follow 3xx responses carrying `Location`. Default false.
    pub follow_location: bool,
    pub max_redirect: u32,
    pub proxy: Option<String>,
    pub get_cookie: Option<GetCookie>,
    pub set_cookie: Option<SetCookie>,
    /// Decode gzip/deflate/br bodies. Default true.
    pub inflate: bool,
    pub authorisation: Option<Authorisation>,
    pub tls: TlsConfig,
}

impl Default for Options {
    fn default() -> Self {
        Self {
            data: None,
            method: None,
            headers: None,
            timeouts: Timeouts::default(),
            set_host: true,
            follow_location: false,
            max_redirect: DEFAULT_MAX_REDIRECT,
            proxy: None,
            get_cookie: None,
            set_cookie: None,
            inflate: true,
            authorisation: None,
            tls: TlsConfig::default(),
        }
    }
}

impl fmt::Debug for Options {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("Options")
            .field("data", &self.data)
            .field("method", &self.method)
            .field("headers", &self.headers)
            .field("timeouts", &self.timeouts)
            .field("set_host", &self.set_host)
            .field("follow_location", &self.follow_location)
            .field("max_redirect", &self.max_redirect)
            .field("proxy", &self.proxy)
            .field("get_cookie", &self.get_cookie.is_some())
            .field("set_cookie", &self.set_cookie.is_some())
            .field("inflate", &self.inflate)
            .field("authorisation", &self.authorisation.as_ref().map(|a| &a.scheme))
            .field("tls", &self.tls)
            .finish()
    }
}

impl Options {
    pub fn new() -> Self {
        Self::default()
    }

    /// Set the request body. Implies `POST` unless a method is set.
    pub fn data(mut self, body: impl Into<Body>) -> Self {
        self.data = Some(body.into());
        self
    }

    /// Serialize `value` as the JSON request body.
    pub fn json<T: serde::Serialize>(mut self, value: &T) -> crate::Result<Self> {
        self.data = Some(Body::Json(serde_json::to_value(value)?));
        Ok(self)
    }

    pub fn method(mut self, method: Method) -> Self {
        self.method = Some(method);
        self
    }

    /// Replace the defaults with an ordered header list, sent as given.
    pub fn headers<I, K, V>(mut self, headers: I) -> Self
    where
        I: IntoIterator<Item = (K, V)>,
        K: Into<String>,
        V: Into<String>,
    {
        let list = headers.into_iter().map(|(k, v)| (k.into(), v.into())).collect();
        self.headers = Some(HeaderInput::List(list));
        self
    }

    /// Replace the defaults with a header mapping, upserted in order.
    pub fn headers_map<I, K, V>(mut self, headers: I) -> Self
    where
        I: IntoIterator<Item = (K, V)>,
        K: Into<String>,
        V: Into<String>,
    {
        let map = headers.into_iter().map(|(k, v)| (k.into(), v.into())).collect();
        self.headers = Some(HeaderInput::Map(map));
        self
    }

    /// Add one header to the caller headers (mapping form unless a list was set).
    pub fn header(mut self, name: impl Into<String>, value: impl Into<String>) -> Self {
        let entry = (name.into(), value.into());
        match &mut self.headers {
            Some(HeaderInput::List(list)) | Some(HeaderInput::Map(list)) => list.push(entry),
            None => self.headers = Some(HeaderInput::Map(vec![entry])),
        }
        self
    }

    /// Socket idle timeout for each hop.
    pub fn timeout(mut self, timeout: Duration) -> Self {
        self.timeouts.idle = timeout;
        self
    }

    /// Deadline for an HTTP proxy to accept `CONNECT`.
    pub fn tunnel_timeout(mut self, timeout: Duration) -> Self {
        self.timeouts.tunnel = timeout;
        self
    }

    pub fn timeouts(mut self, timeouts: Timeouts) -> Self {
        self.timeouts = timeouts;
        self
    }

    pub fn set_host(mut self, set_host: bool) -> Self {
        self.set_host = set_host;
        self
    }

    pub fn follow_location(mut self, follow: bool) -> Self {
        self.follow_location = follow;
        self
    }

    pub fn max_redirect(mut self, max: u32) -> Self {
        self.max_redirect = max;
        self
    }

    /// Route through an HTTP(S) or `socks*://` proxy.
    pub fn proxy(mut self, proxy: impl Into<String>) -> Self {
        self.proxy = Some(proxy.into());
        self
    }

    pub fn get_cookie<F>(mut self, f: F) -> Self
    where
        F: Fn(&str) -> Option<String> + Send + Sync + 'static,
    {
        self.get_cookie = Some(Arc::new(f));
        self
    }

    pub fn set_cookie<F>(mut self, f: F) -> Self
    where
        F: Fn(&str, &str) + Send + Sync + 'static,
    {
        self.set_cookie = Some(Arc::new(f));
        self
    }

    /// Install both cookie callbacks from one store.
    pub fn cookie_store<S>(mut self, store: Arc<S>) -> Self
    where
        S: CookieStore + 'static,
    {
        let reader = Arc::clone(&store);
        self.get_cookie = Some(Arc::new(move |url: &str| reader.cookie_string(url)));
        self.set_cookie = Some(Arc::new(move |cookie: &str, url: &str| store.set_cookie(cookie, url)));
        self
    }

    pub fn inflate(mut self, inflate: bool) -> Self {
        self.inflate = inflate;
        self
    }

    pub fn authorisation(mut self, authorisation: Authorisation) -> Self {
        self.authorisation = Some(authorisation);
        self
    }

    /// Trust an extra root certificate (DER or PEM).
    pub fn add_root_certificate(mut self, cert: impl Into<Vec<u8>>) -> Self {
        self.tls.root_certs.push(cert.into());
        self
    }

    /// Skip certificate and hostname verification. Off by default.
    pub fn danger_accept_invalid_certs(mut self, accept: bool) -> Self {
        self.tls.accept_invalid_certs = accept;
        self
    }
}
