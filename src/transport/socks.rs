//! SOCKS4/5 proxy connections.

use tokio::net::TcpStream;
use tokio_socks::tcp::{Socks4Stream, Socks5Stream};
use url::Url;

use crate::error::{Error, Result};
use crate::transport::connector::bare_host;

const DEFAULT_SOCKS_PORT: u16 = 1080;

/// Protocol version, from the proxy URL scheme.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum SocksVersion {
    /// `socks4://` and `socks4a://`
    V4,
    /// `socks://`, `socks5://` and `socks5h://`
    V5,
}

/// Connection factory for targets behind a SOCKS proxy.
///
/// The proxy resolves the target hostname.
#[derive(Debug, Clone)]
pub struct SocksAgent {
    proxy_host: String,
    proxy_port: u16,
    version: SocksVersion,
    credentials: Option<(String, String)>,
}

impl SocksAgent {
    pub fn new(proxy: &Url) -> Result<Self> {
        let version = match proxy.scheme() {
            "socks4" | "socks4a" => SocksVersion::V4,
            _ => SocksVersion::V5,
        };
        let proxy_host = proxy
            .host_str()
            .ok_or_else(|| Error::invalid_url(format!("proxy {} has no host", proxy)))?
            .to_string();
        let credentials = super::url_credentials(proxy).map(|joined| match joined.split_once(':') {
            Some((user, pass)) => (user.to_string(), pass.to_string()),
            None => (joined, String::new()),
        });

        Ok(Self {
            proxy_host,
            proxy_port: proxy.port().unwrap_or(DEFAULT_SOCKS_PORT),
            version,
            credentials,
        })
    }

    pub fn version(&self) -> SocksVersion {
        self.version
    }

    pub fn proxy_addr(&self) -> (&str, u16) {
        (&self.proxy_host, self.proxy_port)
    }

    /// Open a TCP stream to `host:port` through the proxy.
    pub async fn connect(&self, host: &str, port: u16) -> Result<TcpStream> {
        let proxy = (bare_host(&self.proxy_host), self.proxy_port);
        let target = (bare_host(host), port);
        tracing::debug!(
            "SOCKS {:?} connect to {}:{} via {}:{}",
            self.version,
            host,
            port,
            self.proxy_host,
            self.proxy_port
        );

        let stream = match (self.version, &self.credentials) {
            (SocksVersion::V4, Some((user, _))) => Socks4Stream::connect_with_userid(proxy, target, user)
                .await
                .map(Socks4Stream::into_inner),
            (SocksVersion::V4, None) => Socks4Stream::connect(proxy, target)
                .await
                .map(Socks4Stream::into_inner),
            (SocksVersion::V5, Some((user, pass))) => {
                Socks5Stream::connect_with_password(proxy, target, user, pass)
                    .await
                    .map(Socks5Stream::into_inner)
            }
            (SocksVersion::V5, None) => Socks5Stream::connect(proxy, target)
                .await
                .map(Socks5Stream::into_inner),
        };

        stream.map_err(|e| {
            Error::transport(format!(
                "SOCKS proxy {}:{} failed to reach {}:{}: {}",
                self.proxy_host, self.proxy_port, host, port, e
            ))
        })
    }
}
