//! HTTP/1.1 request executor.
//!
//! Uses httparse for response parsing and raw I/O for full control over
//! request formatting and header order. Every socket operation runs under
//! the descriptor's idle timeout.

use bytes::Bytes;
use http::Method;
use tokio::io::{AsyncReadExt, AsyncWriteExt};

use crate::error::{Error, Result};
use crate::options::{Body, BodyStream};
use crate::request::RequestDescriptor;
use crate::timeouts::with_idle;
use crate::transport::connector::MaybeHttpsStream;

/// Maximum response header size (64KB).
const MAX_HEADERS_SIZE: usize = 64 * 1024;

/// Maximum number of headers to parse.
const MAX_HEADERS_COUNT: usize = 100;

const READ_CHUNK: usize = 8192;

/// Upper bound on body capacity reserved from a declared `Content-Length`.
const MAX_BODY_PREALLOC: usize = 1024 * 1024;

/// Request body as handed to one hop.
pub enum Payload {
    Empty,
    /// Written in one piece with a `Content-Length`.
    Buffered(Bytes),
    /// Written with chunked transfer encoding.
    Stream(BodyStream),
}

impl Payload {
    /// Payload for the next hop of `data`.
    ///
    /// Buffered bodies are cloned so every hop resends them. A stream can be
    /// read only once, so it is taken and an empty body left in its place.
    pub fn next_hop(data: &mut Option<Body>) -> Result<Self> {
        let payload = match data {
            None => Payload::Empty,
            Some(Body::Text(text)) => Payload::Buffered(Bytes::from(text.clone())),
            Some(Body::Bytes(bytes)) => Payload::Buffered(bytes.clone()),
            Some(Body::Json(value)) => Payload::Buffered(Bytes::from(serde_json::to_vec(value)?)),
            Some(Body::Stream(_)) => match data.replace(Body::Bytes(Bytes::new())) {
                Some(Body::Stream(stream)) => Payload::Stream(stream),
                _ => Payload::Empty,
            },
        };
        Ok(payload)
    }
}

/// Response of a single exchange, before decompression.
#[derive(Debug, Clone)]
pub struct RawResponse {
    pub status: u16,
    /// `"1.1"` style.
    pub http_version: String,
    /// Raw header lines in arrival order.
    pub headers: Vec<(String, String)>,
    pub body: Bytes,
}

impl RawResponse {
    /// First header value by name (case-insensitive).
    pub fn header(&self, name: &str) -> Option<&str> {
        find_header_value(&self.headers, name)
    }

    /// Every value of a header, in arrival order.
    pub fn header_all<'a>(&'a self, name: &'a str) -> impl Iterator<Item = &'a str> + 'a {
        self.headers
            .iter()
            .filter(move |(n, _)| n.eq_ignore_ascii_case(name))
            .map(|(_, v)| v.as_str())
    }
}

/// Connect with the descriptor's strategy and run one exchange.
pub async fn execute(descriptor: &RequestDescriptor, payload: Payload) -> Result<RawResponse> {
    let port = descriptor.effective_port();
    let stream = descriptor
        .connector
        .connect(
            &descriptor.host,
            port,
            descriptor.protocol.is_tls(),
            &descriptor.tls,
            descriptor.timeout,
        )
        .await?;

    let mut conn = H1Connection::new(stream, descriptor.timeout);
    conn.send_request(descriptor, payload).await
}

/// HTTP/1.1 connection for a single exchange.
pub struct H1Connection {
    stream: MaybeHttpsStream,
    idle: std::time::Duration,
}

impl H1Connection {
    pub fn new(stream: MaybeHttpsStream, idle: std::time::Duration) -> Self {
        Self { stream, idle }
    }

    /// Send the request and read the complete response.
    pub async fn send_request(
        &mut self,
        descriptor: &RequestDescriptor,
        payload: Payload,
    ) -> Result<RawResponse> {
        let head = build_request_head(descriptor, &payload)?;
        self.write_all(&head).await?;

        match payload {
            Payload::Empty => {}
            Payload::Buffered(body) => {
                if !body.is_empty() {
                    self.write_all(&body).await?;
                }
            }
            Payload::Stream(mut source) => self.write_chunked(&mut source).await?,
        }

        let idle = self.idle;
        let stream = &mut self.stream;
        with_idle(idle, async {
            stream
                .flush()
                .await
                .map_err(|e| Error::transport(format!("Failed to flush: {}", e)))
        })
        .await?;

        self.read_response(&descriptor.method).await
    }

    async fn write_all(&mut self, data: &[u8]) -> Result<()> {
        let stream = &mut self.stream;
        with_idle(self.idle, async {
            stream
                .write_all(data)
                .await
                .map_err(|e| Error::transport(format!("Failed to write request: {}", e)))
        })
        .await
    }

    /// Read whatever is available, bounded by the idle timeout.
    async fn read_some(&mut self, buf: &mut [u8]) -> Result<usize> {
        let stream = &mut self.stream;
        with_idle(self.idle, async {
            stream
                .read(buf)
                .await
                .map_err(|e| Error::transport(format!("Failed to read response: {}", e)))
        })
        .await
    }

    /// Copy `source` to the socket as a chunked body.
    async fn write_chunked(&mut self, source: &mut BodyStream) -> Result<()> {
        let mut buf = vec![0u8; READ_CHUNK];
        loop {
            let n = source.read(&mut buf).await?;
            if n == 0 {
                break;
            }
            let mut chunk = Vec::with_capacity(n + 16);
            chunk.extend_from_slice(format!("{:x}\r\n", n).as_bytes());
            chunk.extend_from_slice(&buf[..n]);
            chunk.extend_from_slice(b"\r\n");
            self.write_all(&chunk).await?;
        }
        self.write_all(b"0\r\n\r\n").await
    }

    /// Read and parse an HTTP/1.1 response.
    ///
    /// 1xx informational responses are consumed until a final response
    /// arrives.
    async fn read_response(&mut self, method: &Method) -> Result<RawResponse> {
        // Bytes after a 1xx head may already hold the final response.
        let mut buffer = Vec::with_capacity(READ_CHUNK);
        let mut read_buf = vec![0u8; READ_CHUNK];

        loop {
            while find_header_end(&buffer).is_none() {
                if buffer.len() >= MAX_HEADERS_SIZE {
                    return Err(Error::http_protocol("Response headers too large"));
                }
                let n = self.read_some(&mut read_buf).await?;
                if n == 0 {
                    return Err(Error::http_protocol(
                        "Connection closed before response complete",
                    ));
                }
                buffer.extend_from_slice(&read_buf[..n]);
            }

            let (response, consumed) = self.parse_response(&buffer, method).await?;
            buffer.drain(..consumed);

            if (100..200).contains(&response.status) {
                tracing::trace!("Skipping informational {} response", response.status);
                continue;
            }
            return Ok(response);
        }
    }

    /// Parse head and body, returning the response and bytes of `buffer` used.
    async fn parse_response(
        &mut self,
        buffer: &[u8],
        request_method: &Method,
    ) -> Result<(RawResponse, usize)> {
        let mut headers = [httparse::EMPTY_HEADER; MAX_HEADERS_COUNT];
        let mut response = httparse::Response::new(&mut headers);

        let headers_len = match response
            .parse(buffer)
            .map_err(|e| Error::http_protocol(format!("Failed to parse response: {}", e)))?
        {
            httparse::Status::Complete(len) => len,
            httparse::Status::Partial => {
                return Err(Error::http_protocol("Incomplete response headers"));
            }
        };

        let status = response
            .code
            .ok_or_else(|| Error::http_protocol("Missing status code"))?;
        let http_version = format!("1.{}", response.version.unwrap_or(1));
        let response_headers: Vec<(String, String)> = response
            .headers
            .iter()
            .filter(|h| !h.name.is_empty())
            .map(|h| (h.name.to_string(), String::from_utf8_lossy(h.value).into_owned()))
            .collect();

        let has_body = !matches!(status, 100..=199 | 204 | 304) && *request_method != Method::HEAD;
        if !has_body {
            let raw = RawResponse {
                status,
                http_version,
                headers: response_headers,
                body: Bytes::new(),
            };
            return Ok((raw, headers_len));
        }

        // Transfer-Encoding overrides Content-Length.
        let transfer_encoding = find_header_value(&response_headers, "transfer-encoding");
        let is_chunked = transfer_encoding
            .and_then(|v| v.split(',').next_back())
            .is_some_and(|last| last.trim().eq_ignore_ascii_case("chunked"));
        let content_length = match (transfer_encoding, find_header_value(&response_headers, "content-length")) {
            (None, Some(cl)) => Some(parse_content_length(cl)?),
            _ => None,
        };

        let body_start = &buffer[headers_len..];
        let (body, consumed) = if is_chunked {
            (self.read_chunked_body(body_start.to_vec()).await?, buffer.len())
        } else if let Some(len) = content_length {
            let body = self.read_fixed_body(body_start, len).await?;
            (body, headers_len + body_start.len().min(len))
        } else {
            (self.read_until_close(body_start).await?, buffer.len())
        };

        let raw = RawResponse {
            status,
            http_version,
            headers: response_headers,
            body,
        };
        Ok((raw, consumed))
    }

    /// Read body until connection close (EOF).
    async fn read_until_close(&mut self, initial: &[u8]) -> Result<Bytes> {
        let mut body = initial.to_vec();
        let mut read_buf = vec![0u8; READ_CHUNK];
        loop {
            let n = self.read_some(&mut read_buf).await?;
            if n == 0 {
                break;
            }
            body.extend_from_slice(&read_buf[..n]);
        }
        Ok(Bytes::from(body))
    }

    /// Read a fixed-length body. EOF before `content_length` bytes is an error.
    async fn read_fixed_body(&mut self, initial: &[u8], content_length: usize) -> Result<Bytes> {
        let initial_len = initial.len().min(content_length);
        let mut body = Vec::with_capacity(content_length.min(MAX_BODY_PREALLOC));
        body.extend_from_slice(&initial[..initial_len]);

        let mut chunk = vec![0u8; READ_CHUNK];
        while body.len() < content_length {
            let want = (content_length - body.len()).min(READ_CHUNK);
            let n = self.read_some(&mut chunk[..want]).await?;
            if n == 0 {
                return Err(Error::http_protocol(format!(
                    "Connection closed before receiving full body (got {} of {} bytes)",
                    body.len(),
                    content_length
                )));
            }
            body.extend_from_slice(&chunk[..n]);
        }

        Ok(Bytes::from(body))
    }

    /// Read a chunked transfer-encoded body, discarding trailers.
    async fn read_chunked_body(&mut self, initial: Vec<u8>) -> Result<Bytes> {
        let mut body = Vec::new();
        let mut buffer = initial;
        let mut read_buf = vec![0u8; READ_CHUNK];

        loop {
            let (chunk_size, line_end) = loop {
                if let Some(found) = find_chunk_size(&buffer) {
                    break found;
                }
                if find_crlf(&buffer).is_some() {
                    return Err(Error::http_protocol("Invalid chunk size line"));
                }
                let n = self.read_some(&mut read_buf).await?;
                if n == 0 {
                    return Err(Error::http_protocol("Connection closed while reading chunk size"));
                }
                buffer.extend_from_slice(&read_buf[..n]);
            };
            buffer.drain(..line_end);

            if chunk_size == 0 {
                self.consume_trailers(&mut buffer).await?;
                break;
            }

            // data + CRLF
            let chunk_end = chunk_size
                .checked_add(2)
                .ok_or_else(|| Error::http_protocol(format!("Chunk size {:#x} too large", chunk_size)))?;
            while buffer.len() < chunk_end {
                let n = self.read_some(&mut read_buf).await?;
                if n == 0 {
                    return Err(Error::http_protocol("Connection closed while reading chunk data"));
                }
                buffer.extend_from_slice(&read_buf[..n]);
            }

            body.extend_from_slice(&buffer[..chunk_size]);
            buffer.drain(..chunk_end);
        }

        Ok(Bytes::from(body))
    }

    /// Skip trailer lines up to the terminating empty line.
    async fn consume_trailers(&mut self, buffer: &mut Vec<u8>) -> Result<()> {
        let mut read_buf = vec![0u8; 4096];
        loop {
            if let Some(pos) = find_crlf(buffer) {
                buffer.drain(..pos + 2);
                if pos == 0 {
                    return Ok(());
                }
                continue;
            }
            let n = self.read_some(&mut read_buf).await?;
            if n == 0 {
                // Missing final CRLF is tolerated.
                return Ok(());
            }
            buffer.extend_from_slice(&read_buf[..n]);
        }
    }
}

/// Serialize the request line and headers.
///
/// Headers go out in list order. `Authorization` from URL credentials is
/// appended when the list has none; framing headers are appended per
/// payload unless the caller supplied them.
fn build_request_head(descriptor: &RequestDescriptor, payload: &Payload) -> Result<Vec<u8>> {
    let headers = &descriptor.headers;
    for (name, value) in headers.iter() {
        validate_header_name(name)?;
        validate_header_value(value)?;
    }
    validate_request_target(&descriptor.path)?;

    let mut request = Vec::with_capacity(1024);
    request.extend_from_slice(descriptor.method.as_str().as_bytes());
    request.push(b' ');
    request.extend_from_slice(descriptor.path.as_bytes());
    request.extend_from_slice(b" HTTP/1.1\r\n");

    let mut push_header = |name: &str, value: &str| {
        request.extend_from_slice(name.as_bytes());
        request.extend_from_slice(b": ");
        request.extend_from_slice(value.as_bytes());
        request.extend_from_slice(b"\r\n");
    };

    for (name, value) in headers.iter() {
        push_header(name, value);
    }

    if let Some(credentials) = &descriptor.auth {
        if !headers.contains("authorization") {
            let value = crate::auth::basic_auth_raw(credentials);
            validate_header_value(&value)?;
            push_header("Authorization", &value);
        }
    }

    let has_transfer_encoding = headers.contains("transfer-encoding");
    match payload {
        Payload::Empty => {}
        Payload::Buffered(body) => {
            if !has_transfer_encoding && !headers.contains("content-length") {
                push_header("Content-Length", &body.len().to_string());
            }
        }
        Payload::Stream(_) => {
            if !has_transfer_encoding {
                push_header("Transfer-Encoding", "chunked");
            }
        }
    }

    request.extend_from_slice(b"\r\n");
    Ok(request)
}

/// Find the end of HTTP headers (\r\n\r\n).
fn find_header_end(buffer: &[u8]) -> Option<usize> {
    buffer.windows(4).position(|w| w == b"\r\n\r\n").map(|i| i + 4)
}

/// Find a header value by name (case-insensitive).
fn find_header_value<'a>(headers: &'a [(String, String)], name: &str) -> Option<&'a str> {
    headers
        .iter()
        .find(|(n, _)| n.eq_ignore_ascii_case(name))
        .map(|(_, v)| v.as_str())
}

/// Parse a chunk size from the buffer, returning (size, end_of_line_position).
fn find_chunk_size(buffer: &[u8]) -> Option<(usize, usize)> {
    let i = find_crlf(buffer)?;
    let line = std::str::from_utf8(&buffer[..i]).ok()?;
    // Chunk extensions after ';' are ignored.
    let size_part = line.split(';').next()?;
    let size = usize::from_str_radix(size_part.trim(), 16).ok()?;
    Some((size, i + 2))
}

/// Find the first CRLF in a buffer, returning its position.
fn find_crlf(buffer: &[u8]) -> Option<usize> {
    buffer.windows(2).position(|w| w == b"\r\n")
}

/// Header names must be RFC 9110 tokens.
fn validate_header_name(name: &str) -> Result<()> {
    if name.is_empty() {
        return Err(Error::http_protocol("Empty header name"));
    }
    if !name.bytes().all(is_tchar) {
        return Err(Error::http_protocol(format!(
            "Invalid character in header name: {:?}",
            name
        )));
    }
    Ok(())
}

fn is_tchar(b: u8) -> bool {
    matches!(b,
        b'!' | b'#' | b'$' | b'%' | b'&' | b'\'' | b'*' | b'+' | b'-' | b'.' |
        b'^' | b'_' | b'`' | b'|' | b'~' | b'0'..=b'9' | b'A'..=b'Z' | b'a'..=b'z'
    )
}

/// Header values must not contain NUL, CR, or LF.
fn validate_header_value(value: &str) -> Result<()> {
    if value.bytes().any(|b| b == 0 || b == b'\r' || b == b'\n') {
        return Err(Error::http_protocol(
            "Invalid character in header value (CR/LF/NUL not allowed)",
        ));
    }
    Ok(())
}

fn validate_request_target(path: &str) -> Result<()> {
    if path.is_empty() || path.bytes().any(|b| b <= b' ' || b == 0x7f) {
        return Err(Error::http_protocol(format!("Invalid request target: {:?}", path)));
    }
    Ok(())
}

/// Content-Length must be a non-negative integer; repeated values must agree.
fn parse_content_length(value: &str) -> Result<usize> {
    let mut parts = value.split(',').map(str::trim);
    let invalid = || Error::http_protocol(format!("Invalid Content-Length: {}", value));

    let first = parts
        .next()
        .and_then(|p| p.parse::<usize>().ok())
        .ok_or_else(invalid)?;
    for part in parts {
        let other = part.parse::<usize>().map_err(|_| invalid())?;
        if other != first {
            return Err(Error::http_protocol(format!(
                "Conflicting Content-Length values: {}",
                value
            )));
        }
    }
    Ok(first)
}
