//! Timeout helpers for connect, reconnect and authentication steps.

use std::future::Future;
use std::time::Duration;

use crate::error::{ProtocolError, Result};

/// Default wait for an initial connection
pub const DEFAULT_TIMEOUT: Duration = Duration::from_millis(13_000);

/// Default wait for a reconnect to the same endpoint
pub const RECONNECT_TIMEOUT: Duration = Duration::from_millis(10_000);

/// Default wait for each authentication step
pub const AUTH_TIMEOUT: Duration = Duration::from_secs(5);

/// Await `future` for at most `duration`, mapping expiry to [`ProtocolError::Timeout`].
///
/// On expiry the future is dropped, which closes any socket it was still connecting.
pub async fn with_timeout_error<F, T>(future: F, duration: Duration) -> Result<T>
where
    F: Future<Output = Result<T>>,
{
    match tokio::time::timeout(duration, future).await {
        Ok(result) => result,
        Err(_) => Err(ProtocolError::Timeout),
    }
}
