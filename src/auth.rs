//! RFC 7617 (Basic) authentication.

use base64::{engine::general_purpose::STANDARD as BASE64, Engine as _};

use crate::error::{Error, Result};

/// Credentials to send with every hop of a request.
///
/// Only the `basic` scheme is understood; building a request with any other
/// scheme fails with [`Error::UnsupportedAuthorisation`].
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Authorisation {
    pub scheme: String,
    pub username: String,
    pub password: String,
}

impl Authorisation {
    pub fn basic(username: impl Into<String>, password: impl Into<String>) -> Self {
        Self {
            scheme: "basic".to_string(),
            username: username.into(),
            password: password.into(),
        }
    }

    /// Value for the `Authorization` header.
    pub fn header_value(&self) -> Result<String> {
        if self.scheme.eq_ignore_ascii_case("basic") {
            Ok(basic_auth(&self.username, &self.password))
        } else {
            Err(Error::UnsupportedAuthorisation(self.scheme.clone()))
        }
    }
}

/// Generate Basic Auth header value (RFC 7617).
///
/// "Basic " followed by base64-encoded `username:password`.
pub fn basic_auth(username: &str, password: &str) -> String {
    basic_auth_raw(&format!("{}:{}", username, password))
}

/// Basic Auth header value for an already joined `user:pass` string.
pub fn basic_auth_raw(credentials: &str) -> String {
    format!("Basic {}", BASE64.encode(credentials))
}
