//! HTTPS through an HTTP proxy via `CONNECT`.
//!
//! The agent opens a plain TCP connection to the proxy, asks it to
//! `CONNECT host:port`, and once the proxy answers 2xx negotiates TLS with
//! the origin over that same socket. The proxy only ever sees ciphertext.

use std::time::Duration;

use tokio::io::{AsyncReadExt, AsyncWriteExt};
use tokio::net::TcpStream;
use tokio_boring::SslStream;
use url::Url;

use crate::auth::basic_auth_raw;
use crate::error::{Error, Result};
use crate::timeouts::{with_idle, DEFAULT_TUNNEL};
use crate::transport::connector::{connect_tcp, TlsConfig};

/// Upper bound on the proxy's CONNECT response head.
const MAX_CONNECT_HEAD: usize = 16 * 1024;

/// Connection factory for TLS targets behind an HTTP proxy.
#[derive(Debug, Clone)]
pub struct TunnelAgent {
    proxy_host: String,
    proxy_port: u16,
    /// `user:pass` from the proxy URL, sent as `Proxy-Authorization`.
    proxy_auth: Option<String>,
    timeout: Duration,
    tls: TlsConfig,
}

impl TunnelAgent {
    pub fn new(proxy: &Url, tls: TlsConfig) -> Result<Self> {
        let proxy_host = proxy
            .host_str()
            .ok_or_else(|| Error::invalid_url(format!("proxy {} has no host", proxy)))?
            .to_string();
        let proxy_port = proxy
            .port_or_known_default()
            .ok_or_else(|| Error::invalid_url(format!("proxy {} has no port", proxy)))?;
        Ok(Self {
            proxy_host,
            proxy_port,
            proxy_auth: super::url_credentials(proxy),
            timeout: DEFAULT_TUNNEL,
            tls,
        })
    }

    /// Deadline for the proxy to accept the CONNECT.
    pub fn with_timeout(mut self, timeout: Duration) -> Self {
        self.timeout = timeout;
        self
    }

    pub fn proxy_addr(&self) -> (&str, u16) {
        (&self.proxy_host, self.proxy_port)
    }

    /// Tunnel to `host:port` and return a TLS stream to the origin.
    ///
    /// The CONNECT exchange runs under the tunnel timeout and the handshake
    /// that follows under `idle`.
    pub async fn connect(&self, host: &str, port: u16, idle: Duration) -> Result<SslStream<TcpStream>> {
        // Dropping the future on expiry closes the half-open socket.
        let socket = tokio::time::timeout(self.timeout, self.open(host, port))
            .await
            .map_err(|_| {
                tracing::warn!(
                    "Proxy {}:{} did not accept CONNECT {}:{} within {:?}",
                    self.proxy_host,
                    self.proxy_port,
                    host,
                    port,
                    self.timeout
                );
                Error::TunnelTimeout(self.timeout)
            })??;

        tracing::debug!("Tunnel to {}:{} established, starting TLS", host, port);
        with_idle(idle, self.tls.handshake(socket, host)).await
    }

    /// Connect to the proxy and complete the CONNECT exchange.
    async fn open(&self, host: &str, port: u16) -> Result<TcpStream> {
        let mut stream = connect_tcp(&self.proxy_host, self.proxy_port).await?;

        let authority = format!("{}:{}", host, port);
        let mut request = format!("CONNECT {} HTTP/1.1\r\nHost: {}\r\n", authority, authority);
        if let Some(credentials) = &self.proxy_auth {
            request.push_str(&format!("Proxy-Authorization: {}\r\n", basic_auth_raw(credentials)));
        }
        request.push_str("\r\n");

        stream
            .write_all(request.as_bytes())
            .await
            .map_err(|e| Error::transport(format!("Failed to send CONNECT: {}", e)))?;

        let head = read_connect_head(&mut stream).await?;
        let status = parse_connect_status(&head)?;
        if !(200..300).contains(&status) {
            tracing::warn!("Proxy refused CONNECT {} with {}", authority, status);
            return Err(Error::transport(format!(
                "Proxy refused CONNECT {} with status {}",
                authority, status
            )));
        }
        Ok(stream)
    }
}

/// Read the proxy's response head one byte at a time.
///
/// Anything after the blank line belongs to the TLS session, so nothing past
/// it may be consumed.
async fn read_connect_head(stream: &mut TcpStream) -> Result<Vec<u8>> {
    let mut head = Vec::with_capacity(256);
    let mut byte = [0u8; 1];
    while !head.ends_with(b"\r\n\r\n") {
        if head.len() >= MAX_CONNECT_HEAD {
            return Err(Error::http_protocol("CONNECT response head too large"));
        }
        let n = stream
            .read(&mut byte)
            .await
            .map_err(|e| Error::transport(format!("Failed to read CONNECT response: {}", e)))?;
        if n == 0 {
            return Err(Error::transport("Proxy closed the connection during CONNECT"));
        }
        head.push(byte[0]);
    }
    Ok(head)
}

fn parse_connect_status(head: &[u8]) -> Result<u16> {
    let mut headers = [httparse::EMPTY_HEADER; 64];
    let mut response = httparse::Response::new(&mut headers);
    match response.parse(head) {
        Ok(httparse::Status::Complete(_)) => response
            .code
            .ok_or_else(|| Error::http_protocol("CONNECT response without status")),
        Ok(httparse::Status::Partial) => Err(Error::http_protocol("Incomplete CONNECT response")),
        Err(e) => Err(Error::http_protocol(format!("Malformed CONNECT response: {}", e))),
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_new_uses_known_default_port() {
        let agent = TunnelAgent::new(&Url::parse("http://proxy.test").unwrap(), TlsConfig::default()).unwrap();
        assert_eq!(agent.proxy_addr(), ("proxy.test", 80));
        assert!(agent.proxy_auth.is_none());

        let agent = TunnelAgent::new(
            &Url::parse("https://u:p@proxy.test:3128").unwrap(),
            TlsConfig::default(),
        )
        .unwrap();
        assert_eq!(agent.proxy_addr(), ("proxy.test", 3128));
        assert_eq!(agent.proxy_auth.as_deref(), Some("u:p"));
    }

    #[test]
    fn test_parse_connect_status() {
        assert_eq!(
            parse_connect_status(b"HTTP/1.1 200 Connection established\r\n\r\n").unwrap(),
            200
        );
        assert_eq!(
            parse_connect_status(b"HTTP/1.0 407 Proxy Authentication Required\r\nProxy-Authenticate: Basic\r\n\r\n")
                .unwrap(),
            407
        );
        assert!(parse_connect_status(b"garbage\r\n\r\n").is_err());
    }
}
