use std::sync::{Arc, Mutex};
use std::time::Duration;

use boring::ssl::SslAcceptor;
use tokio::io::{AsyncRead, AsyncReadExt, AsyncWrite, AsyncWriteExt};
use tokio::net::TcpListener;
use tokio::time::timeout;

/// A request as seen by the mock server, body de-chunked.
#[derive(Debug, Clone)]
pub struct RecordedRequest {
    pub method: String,
    pub target: String,
    pub headers: Vec<(String, String)>,
    pub body: Vec<u8>,
}

impl RecordedRequest {
    pub fn header(&self, name: &str) -> Option<&str> {
        self.headers
            .iter()
            .find(|(n, _)| n.eq_ignore_ascii_case(name))
            .map(|(_, v)| v.as_str())
    }

    pub fn header_names(&self) -> Vec<&str> {
        self.headers.iter().map(|(n, _)| n.as_str()).collect()
    }
}

pub type Requests = Arc<Mutex<Vec<RecordedRequest>>>;

/// Single-exchange-per-connection HTTP/1.1 mock server.
///
/// Every request is recorded, then answered with whatever the handler
/// returns; the connection is closed afterwards.
pub struct MockHttpServer {
    listener: TcpListener,
    port: u16,
    requests: Requests,
}

impl MockHttpServer {
    /// Create a new mock server bound to a random port.
    pub async fn new() -> std::io::Result<Self> {
        let listener = TcpListener::bind("127.0.0.1:0").await?;
        let port = listener.local_addr()?.port();
        Ok(Self {
            listener,
            port,
            requests: Arc::default(),
        })
    }

    pub fn port(&self) -> u16 {
        self.port
    }

    pub fn url(&self) -> String {
        format!("http://127.0.0.1:{}", self.port)
    }

    pub fn url_tls(&self) -> String {
        format!("https://127.0.0.1:{}", self.port)
    }

    /// Shared log of received requests.
    pub fn requests(&self) -> Requests {
        Arc::clone(&self.requests)
    }

    /// Serve plain HTTP in a background task.
    pub fn start<F>(self, handler: F) -> tokio::task::JoinHandle<()>
    where
        F: Fn(&RecordedRequest) -> Vec<u8> + Send + Sync + 'static,
    {
        let handler = Arc::new(handler);
        tokio::spawn(async move {
            while let Ok((stream, _)) = self.listener.accept().await {
                tokio::spawn(serve(stream, Arc::clone(&handler), Arc::clone(&self.requests)));
            }
        })
    }

    /// Serve HTTPS in a background task.
    pub fn start_tls<F>(self, acceptor: SslAcceptor, handler: F) -> tokio::task::JoinHandle<()>
    where
        F: Fn(&RecordedRequest) -> Vec<u8> + Send + Sync + 'static,
    {
        let handler = Arc::new(handler);
        let acceptor = Arc::new(acceptor);
        tokio::spawn(async move {
            while let Ok((stream, _)) = self.listener.accept().await {
                let acceptor = Arc::clone(&acceptor);
                let handler = Arc::clone(&handler);
                let requests = Arc::clone(&self.requests);
                tokio::spawn(async move {
                    match tokio_boring::accept(&acceptor, stream).await {
                        Ok(tls) => serve(tls, handler, requests).await,
                        Err(e) => tracing::warn!("TLS accept failed: {}", e),
                    }
                });
            }
        })
    }
}

async fn serve<S, F>(mut stream: S, handler: Arc<F>, requests: Requests)
where
    S: AsyncRead + AsyncWrite + Unpin,
    F: Fn(&RecordedRequest) -> Vec<u8>,
{
    let request = match timeout(Duration::from_secs(5), read_request(&mut stream)).await {
        Ok(Ok(Some(request))) => request,
        Ok(Ok(None)) | Err(_) => return,
        Ok(Err(e)) => {
            tracing::error!("Read error: {}", e);
            return;
        }
    };

    let response = handler(&request);
    requests.lock().unwrap().push(request);
    let _ = stream.write_all(&response).await;
    let _ = stream.flush().await;
    let _ = stream.shutdown().await;
}

/// Read one request head and its body (Content-Length or chunked).
pub async fn read_request<S>(stream: &mut S) -> std::io::Result<Option<RecordedRequest>>
where
    S: AsyncRead + Unpin,
{
    let mut buffer = Vec::new();
    let head_len = loop {
        if let Some(end) = buffer.windows(4).position(|w| w == b"\r\n\r\n") {
            break end + 4;
        }
        if !fill(stream, &mut buffer).await? {
            return Ok(None);
        }
    };

    let mut headers = [httparse::EMPTY_HEADER; 64];
    let mut parsed = httparse::Request::new(&mut headers);
    parsed
        .parse(&buffer[..head_len])
        .map_err(|e| std::io::Error::new(std::io::ErrorKind::InvalidData, e))?;

    let mut request = RecordedRequest {
        method: parsed.method.unwrap_or_default().to_string(),
        target: parsed.path.unwrap_or_default().to_string(),
        headers: parsed
            .headers
            .iter()
            .map(|h| (h.name.to_string(), String::from_utf8_lossy(h.value).into_owned()))
            .collect(),
        body: Vec::new(),
    };

    let mut rest = buffer.split_off(head_len);
    let chunked = request
        .header("transfer-encoding")
        .is_some_and(|te| te.eq_ignore_ascii_case("chunked"));
    if chunked {
        request.body = read_chunked(stream, &mut rest).await?;
    } else if let Some(len) = request.header("content-length").and_then(|v| v.parse::<usize>().ok()) {
        while rest.len() < len {
            if !fill(stream, &mut rest).await? {
                break;
            }
        }
        rest.truncate(len);
        request.body = rest;
    }
    Ok(Some(request))
}

async fn read_chunked<S>(stream: &mut S, buffer: &mut Vec<u8>) -> std::io::Result<Vec<u8>>
where
    S: AsyncRead + Unpin,
{
    let mut body = Vec::new();
    loop {
        let line_end = loop {
            if let Some(i) = buffer.windows(2).position(|w| w == b"\r\n") {
                break i;
            }
            if !fill(stream, buffer).await? {
                return Ok(body);
            }
        };
        let size_line = String::from_utf8_lossy(&buffer[..line_end]).to_string();
        let size = usize::from_str_radix(size_line.split(';').next().unwrap_or("0").trim(), 16)
            .map_err(|e| std::io::Error::new(std::io::ErrorKind::InvalidData, e))?;
        buffer.drain(..line_end + 2);

        // data + CRLF, or just the final CRLF after the last chunk
        while buffer.len() < size + 2 {
            if !fill(stream, buffer).await? {
                return Ok(body);
            }
        }
        if size == 0 {
            return Ok(body);
        }
        body.extend_from_slice(&buffer[..size]);
        buffer.drain(..size + 2);
    }
}

async fn fill<S>(stream: &mut S, buffer: &mut Vec<u8>) -> std::io::Result<bool>
where
    S: AsyncRead + Unpin,
{
    let mut chunk = [0u8; 4096];
    let n = stream.read(&mut chunk).await?;
    buffer.extend_from_slice(&chunk[..n]);
    Ok(n > 0)
}

/// Serialize a close-delimited response with a Content-Length.
pub fn response(status: u16, headers: &[(&str, &str)], body: &[u8]) -> Vec<u8> {
    let mut out = format!("HTTP/1.1 {} {}\r\n", status, reason(status));
    for (name, value) in headers {
        out.push_str(&format!("{}: {}\r\n", name, value));
    }
    out.push_str(&format!("Content-Length: {}\r\nConnection: close\r\n\r\n", body.len()));
    let mut bytes = out.into_bytes();
    bytes.extend_from_slice(body);
    bytes
}

fn reason(status: u16) -> &'static str {
    match status {
        200 => "OK",
        301 => "Moved Permanently",
        302 => "Found",
        303 => "See Other",
        404 => "Not Found",
        _ => "Status",
    }
}
