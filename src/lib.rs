//! # Hopper
//!
//! HTTP request orchestration on tokio and BoringSSL.
//!
//! Hopper builds and runs HTTP/1.1 exchanges, following redirects, routing
//! through forward, CONNECT-tunnel or SOCKS proxies, handing cookies to a
//! store, inflating compressed bodies and persisting the final response in
//! a compact JSON-head + body record.
//!
//! ```no_run
//! # async fn run() -> hopper::Result<()> {
//! use hopper::{Options, SaveOptions};
//!
//! let response = hopper::get(
//!     "example.com/",
//!     Options::new().follow_location(true),
//! )
//! .await?;
//! response.save("example.rec", SaveOptions::compressed()).await?;
//! # Ok(())
//! # }
//! ```

pub mod auth;
pub mod client;
pub mod cookie;
pub mod error;
pub mod headers;
pub mod inflate;
pub mod options;
pub mod persist;
pub mod proxy;
pub mod request;
pub mod response;
pub mod target;
pub mod timeouts;
pub mod transport;

// Re-exports
pub use auth::Authorisation;
pub use client::{get, post, request};
pub use cookie::{CookieJar, CookieStore};
pub use error::{Error, Result};
pub use headers::HeaderList;
pub use options::{Body, Options};
pub use persist::SaveOptions;
pub use response::{HeaderValue, Response};
pub use target::Target;
pub use timeouts::Timeouts;
pub use transport::connector::TlsConfig;
