//! Request builder: normalized URL + options -> request descriptor.

use std::fmt;
use std::time::Duration;

use http::Method;
use url::Url;

use crate::error::{Error, Result};
use crate::headers::HeaderList;
use crate::options::{HeaderInput, Options};
use crate::proxy::apply_proxy;
use crate::transport::connector::{Connector, TlsConfig};
use crate::transport::url_credentials;

/// Wire protocol of the hop's first connection.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Protocol {
    Http,
    Https,
}

impl Protocol {
    pub fn from_scheme(scheme: &str) -> Result<Self> {
        match scheme {
            "http" => Ok(Self::Http),
            "https" => Ok(Self::Https),
            other => Err(Error::invalid_url(format!("unsupported scheme {:?}", other))),
        }
    }

    pub fn is_tls(self) -> bool {
        self == Self::Https
    }

    pub fn default_port(self) -> u16 {
        match self {
            Self::Http => 80,
            Self::Https => 443,
        }
    }

    pub fn as_str(self) -> &'static str {
        match self {
            Self::Http => "http",
            Self::Https => "https",
        }
    }
}

impl fmt::Display for Protocol {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// Everything the executor needs for one hop.
#[derive(Debug, Clone)]
pub struct RequestDescriptor {
    pub protocol: Protocol,
    /// Host to connect to (the proxy's for a forward proxy).
    pub host: String,
    /// Set only when explicit in the URL or forced by proxy routing.
    pub port: Option<u16>,
    /// Origin-form path and query, or the absolute URL for a forward proxy.
    pub path: String,
    pub method: Method,
    pub headers: HeaderList,
    /// Decoded `user:pass` from the URL.
    pub auth: Option<String>,
    pub connector: Connector,
    pub tls: TlsConfig,
    /// Socket idle timeout.
    pub timeout: Duration,
}

impl RequestDescriptor {
    pub fn effective_port(&self) -> u16 {
        self.port.unwrap_or_else(|| self.protocol.default_port())
    }
}

/// Build the descriptor for one hop to `url`.
pub fn build_request(url: &Url, options: &Options) -> Result<RequestDescriptor> {
    let protocol = Protocol::from_scheme(url.scheme())?;
    let host = url
        .host_str()
        .ok_or_else(|| Error::invalid_url(format!("no host in {}", url)))?
        .to_string();

    let mut path = url.path().to_string();
    if let Some(query) = url.query() {
        path.push('?');
        path.push_str(query);
    }

    let method = match (&options.method, &options.data) {
        (Some(method), _) => method.clone(),
        (None, Some(_)) => Method::POST,
        (None, None) => Method::GET,
    };

    let mut headers = match &options.headers {
        None => HeaderList::defaults(),
        Some(HeaderInput::List(list)) => list.iter().map(|(k, v)| (k.as_str(), v.as_str())).collect(),
        Some(HeaderInput::Map(map)) => {
            let mut headers = HeaderList::new();
            for (name, value) in map {
                headers.upsert(name.as_str(), value.as_str());
            }
            headers
        }
    };

    if options.data.as_ref().is_some_and(|d| d.is_json()) && !headers.contains("content-type") {
        headers.upsert("Content-Type", "application/json");
    }

    if options.set_host {
        let value = match url.port() {
            Some(port) => format!("{}:{}", host, port),
            None => host.clone(),
        };
        headers.upsert("Host", value);
    }

    if let Some(authorisation) = &options.authorisation {
        headers.upsert("Authorization", authorisation.header_value()?);
    }

    let mut descriptor = RequestDescriptor {
        protocol,
        host,
        port: url.port(),
        path,
        method,
        headers,
        auth: url_credentials(url),
        connector: Connector::Direct,
        tls: options.tls.clone(),
        timeout: options.timeouts.idle,
    };

    if let Some(proxy) = &options.proxy {
        apply_proxy(&mut descriptor, proxy, url, &options.timeouts)?;
    }

    if let Some(get_cookie) = &options.get_cookie {
        if let Some(cookie) = get_cookie(url.as_str()).filter(|c| !c.is_empty()) {
            tracing::trace!("Attaching cookies for {}", url);
            descriptor.headers.upsert("Cookie", cookie);
        }
    }

    Ok(descriptor)
}
