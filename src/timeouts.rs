//! Timeout configuration for a fetch.
//!
//! - **idle**: socket inactivity limit for every connect, write and read of a
//!   hop. Resets whenever bytes move. Expiry fails the call with
//!   [`Error::RequestTimeout`](crate::Error::RequestTimeout).
//! - **tunnel**: deadline for reaching an accepted `CONNECT` through an HTTP
//!   proxy. Does NOT reset. Expiry fails with
//!   [`Error::TunnelTimeout`](crate::Error::TunnelTimeout).

use std::future::Future;
use std::time::Duration;

use crate::error::{Error, Result};

/// Default socket idle timeout.
pub const DEFAULT_IDLE: Duration = Duration::from_secs(30);

/// Default CONNECT phase timeout.
pub const DEFAULT_TUNNEL: Duration = Duration::from_secs(5);

/// Per-hop timeouts.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub struct Timeouts {
    pub idle: Duration,
    pub tunnel: Duration,
}

impl Default for Timeouts {
    fn default() -> Self {
        Self {
            idle: DEFAULT_IDLE,
            tunnel: DEFAULT_TUNNEL,
        }
    }
}

impl Timeouts {
    pub fn new() -> Self {
        Self::default()
    }

    /// Set socket idle timeout.
    pub fn idle(mut self, timeout: Duration) -> Self {
        self.idle = timeout;
        self
    }

    /// Set CONNECT phase timeout.
    pub fn tunnel(mut self, timeout: Duration) -> Self {
        self.tunnel = timeout;
        self
    }
}

/// Run one socket operation under the idle timeout.
///
/// The future is dropped on expiry, which closes whatever socket it owns.
pub(crate) async fn with_idle<T, F>(idle: Duration, fut: F) -> Result<T>
where
    F: Future<Output = Result<T>>,
{
    tokio::time::timeout(idle, fut)
        .await
        .map_err(|_| Error::RequestTimeout(idle))?
}
