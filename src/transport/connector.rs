//! Connection strategies and the BoringSSL TLS layer.

use std::io;
use std::pin::Pin;
use std::task::{Context, Poll};
use std::time::Duration;

use boring::ssl::{SslConnector, SslMethod, SslVerifyMode, SslVersion};
use boring::x509::X509;
use tokio::io::{AsyncRead, AsyncWrite, ReadBuf};
use tokio::net::TcpStream;
use tokio_boring::SslStream;

use crate::error::{Error, Result};
use crate::timeouts::with_idle;
use crate::transport::socks::SocksAgent;
use crate::transport::tunnel::TunnelAgent;

/// TLS settings shared by every strategy.
///
/// Certificates are verified against the system roots plus `root_certs`.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct TlsConfig {
    /// Extra trusted roots, DER or PEM.
    pub root_certs: Vec<Vec<u8>>,
    /// Disable certificate and hostname verification.
    pub accept_invalid_certs: bool,
}

impl TlsConfig {
    fn connector(&self) -> Result<SslConnector> {
        let mut builder = SslConnector::builder(SslMethod::tls_client())
            .map_err(|e| Error::tls(format!("Failed to create SSL connector: {}", e)))?;

        for cert_bytes in &self.root_certs {
            let cert = X509::from_der(cert_bytes)
                .or_else(|_| X509::from_pem(cert_bytes))
                .map_err(|e| Error::tls(format!("Invalid root certificate: {}", e)))?;
            builder
                .cert_store_mut()
                .add_cert(cert)
                .map_err(|e| Error::tls(format!("Failed to add root certificate: {}", e)))?;
        }

        if self.accept_invalid_certs {
            builder.set_verify(SslVerifyMode::NONE);
        }

        builder
            .set_min_proto_version(Some(SslVersion::TLS1_2))
            .map_err(|e| Error::tls(format!("Failed to set min TLS version: {}", e)))?;
        builder
            .set_alpn_protos(b"\x08http/1.1")
            .map_err(|e| Error::tls(format!("Failed to set ALPN: {}", e)))?;

        Ok(builder.build())
    }

    /// Negotiate TLS over an already connected socket.
    ///
    /// `domain` is used for SNI and certificate name matching.
    pub async fn handshake(&self, stream: TcpStream, domain: &str) -> Result<SslStream<TcpStream>> {
        let mut config = self
            .connector()?
            .configure()
            .map_err(|e| Error::tls(format!("Failed to configure SSL: {}", e)))?;
        if self.accept_invalid_certs {
            config.set_verify_hostname(false);
        }

        tokio_boring::connect(config, bare_host(domain), stream)
            .await
            .map_err(|e| Error::tls(format!("TLS handshake with {} failed: {}", domain, e)))
    }
}

/// Stream that can be either HTTP (plain TCP) or HTTPS (TLS).
#[derive(Debug)]
pub enum MaybeHttpsStream {
    /// Plain TCP stream for HTTP.
    Http(TcpStream),
    /// TLS-wrapped stream for HTTPS.
    Https(SslStream<TcpStream>),
}

impl MaybeHttpsStream {
    pub fn is_tls(&self) -> bool {
        matches!(self, Self::Https(_))
    }
}

impl AsyncRead for MaybeHttpsStream {
    fn poll_read(
        mut self: Pin<&mut Self>,
        cx: &mut Context<'_>,
        buf: &mut ReadBuf<'_>,
    ) -> Poll<io::Result<()>> {
        match &mut *self {
            MaybeHttpsStream::Http(stream) => Pin::new(stream).poll_read(cx, buf),
            MaybeHttpsStream::Https(stream) => Pin::new(stream).poll_read(cx, buf),
        }
    }
}

impl AsyncWrite for MaybeHttpsStream {
    fn poll_write(
        mut self: Pin<&mut Self>,
        cx: &mut Context<'_>,
        buf: &[u8],
    ) -> Poll<io::Result<usize>> {
        match &mut *self {
            MaybeHttpsStream::Http(stream) => Pin::new(stream).poll_write(cx, buf),
            MaybeHttpsStream::Https(stream) => Pin::new(stream).poll_write(cx, buf),
        }
    }

    fn poll_flush(mut self: Pin<&mut Self>, cx: &mut Context<'_>) -> Poll<io::Result<()>> {
        match &mut *self {
            MaybeHttpsStream::Http(stream) => Pin::new(stream).poll_flush(cx),
            MaybeHttpsStream::Https(stream) => Pin::new(stream).poll_flush(cx),
        }
    }

    fn poll_shutdown(mut self: Pin<&mut Self>, cx: &mut Context<'_>) -> Poll<io::Result<()>> {
        match &mut *self {
            MaybeHttpsStream::Http(stream) => Pin::new(stream).poll_shutdown(cx),
            MaybeHttpsStream::Https(stream) => Pin::new(stream).poll_shutdown(cx),
        }
    }
}

/// How a hop reaches its origin. Chosen by proxy routing.
#[derive(Debug, Clone, Default)]
pub enum Connector {
    /// Straight TCP to the descriptor's host and port (which may be a
    /// forwarding proxy).
    #[default]
    Direct,
    /// `CONNECT` through an HTTP proxy, then TLS end to end.
    Tunnel(TunnelAgent),
    /// Through a SOCKS proxy, TLS on top for https targets.
    Socks(SocksAgent),
}

impl Connector {
    /// Open a stream to `host:port`, negotiating TLS when `tls` is set.
    ///
    /// Socket setup and TLS run under the idle timeout except for the
    /// tunnel's CONNECT phase, which has its own deadline.
    pub async fn connect(
        &self,
        host: &str,
        port: u16,
        tls: bool,
        tls_config: &TlsConfig,
        idle: Duration,
    ) -> Result<MaybeHttpsStream> {
        let tcp = match self {
            Connector::Direct => with_idle(idle, connect_tcp(host, port)).await?,
            Connector::Socks(agent) => with_idle(idle, agent.connect(host, port)).await?,
            Connector::Tunnel(agent) => {
                let stream = agent.connect(host, port, idle).await?;
                return Ok(MaybeHttpsStream::Https(stream));
            }
        };

        if tls {
            let stream = with_idle(idle, tls_config.handshake(tcp, host)).await?;
            Ok(MaybeHttpsStream::Https(stream))
        } else {
            Ok(MaybeHttpsStream::Http(tcp))
        }
    }
}

/// Resolve and connect, surfacing failures as transport errors.
pub(crate) async fn connect_tcp(host: &str, port: u16) -> Result<TcpStream> {
    let host = bare_host(host);
    TcpStream::connect((host, port))
        .await
        .map_err(|e| Error::transport(format!("Failed to connect to {}:{}: {}", host, port, e)))
}

/// Strip IPv6 brackets, which `url` keeps in `host_str()`.
pub(crate) fn bare_host(host: &str) -> &str {
    host.strip_prefix('[')
        .and_then(|h| h.strip_suffix(']'))
        .unwrap_or(host)
}
