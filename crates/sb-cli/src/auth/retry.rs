//! Re-authentication retry for REST calls
//!
//! A call answered with `401` triggers one interactive re-login and, if that
//! succeeds, one replay of the call. The replay builds a fresh request, so it
//! carries the token the re-login just stored.

use std::future::Future;

use async_trait::async_trait;

use sb_core::BridgeError;

use crate::api::ApiError;

/// Something able to obtain a fresh token
#[async_trait]
pub trait Reauthenticate: Send + Sync {
    async fn reauthenticate(&self) -> Result<(), BridgeError>;
}

/// Retries an operation at most once after re-authenticating
pub struct RetryPolicy<'a> {
    auth: &'a dyn Reauthenticate,
}

impl<'a> RetryPolicy<'a> {
    /// Maximum number of re-logins per logical operation
    pub const MAX_REAUTH: usize = 1;

    pub fn new(auth: &'a dyn Reauthenticate) -> Self {
        Self { auth }
    }

    /// Run `op`, re-authenticating once on `401`.
    ///
    /// A failed re-login is returned as-is; a `401` on the replay is surfaced
    /// without another attempt. Other errors propagate immediately.
    pub async fn run<T, F, Fut>(&self, mut op: F) -> Result<T, BridgeError>
    where
        F: FnMut() -> Fut,
        Fut: Future<Output = Result<T, ApiError>>,
    {
        let mut reauths = 0;
        loop {
            match op().await {
                Ok(value) => return Ok(value),
                Err(err) if err.is_unauthorized() && reauths < Self::MAX_REAUTH => {
                    reauths += 1;
                    tracing::warn!("Session expired or invalid token, re-authenticating");
                    self.auth.reauthenticate().await?;
                    tracing::debug!("Re-authenticated, replaying request");
                }
                Err(err) => return Err(err.into()),
            }
        }
    }
}
