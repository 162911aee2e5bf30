//! Connection strategies and the HTTP/1.1 executor.
//!
//! - `connector`: direct, tunneled and SOCKS connections plus TLS via tokio-boring
//! - `tunnel`: HTTP `CONNECT` proxy agent
//! - `socks`: SOCKS4/5 proxy agent
//! - `h1`: one request/response exchange over an established stream

use percent_encoding::percent_decode_str;
use url::Url;

pub mod connector;
pub mod h1;
pub mod socks;
pub mod tunnel;

/// Percent-decoded `user:pass` from a URL's userinfo, if any.
pub(crate) fn url_credentials(url: &Url) -> Option<String> {
    if url.username().is_empty() && url.password().is_none() {
        return None;
    }
    let user = percent_decode_str(url.username()).decode_utf8_lossy();
    let pass = url
        .password()
        .map(|p| percent_decode_str(p).decode_utf8_lossy())
        .unwrap_or_default();
    Some(format!("{}:{}", user, pass))
}
