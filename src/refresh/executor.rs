//! One refresh attempt.

use std::sync::Arc;

use chrono::{DateTime, TimeDelta, Utc};

use super::invalid::InvalidTokenCache;
use super::options::{OnRefreshingChange, RefreshOptions};
use crate::auth::{IdentityProvider, InitiateAuthRequest, StoredTokens, TokenSet, TokenStore};
use crate::config::RefreshConfig;
use crate::error::{RefreshError, Result};
use crate::util::clock::Clock;

/// Performs a single, undeduplicated refresh attempt.
///
/// Most callers want [`TokenRefresher::refresh_tokens`](super::TokenRefresher::refresh_tokens),
/// which runs this behind the single-flight guard.
#[derive(Clone)]
pub struct RefreshExecutor {
    store: Arc<dyn TokenStore>,
    provider: Arc<dyn IdentityProvider>,
    invalid: Arc<InvalidTokenCache>,
    clock: Arc<dyn Clock>,
    config: Arc<RefreshConfig>,
}

impl RefreshExecutor {
    pub fn new(
        store: Arc<dyn TokenStore>,
        provider: Arc<dyn IdentityProvider>,
        invalid: Arc<InvalidTokenCache>,
        clock: Arc<dyn Clock>,
        config: Arc<RefreshConfig>,
    ) -> Self {
        Self {
            store,
            provider,
            invalid,
            clock,
            config,
        }
    }

    /// Exchange the refresh token for new tokens.
    ///
    /// Fails without contacting the provider when the snapshot lacks a
    /// refresh token or username, or when the refresh token failed before.
    /// A provider failure marks the refresh token as invalid for good.
    pub async fn execute(&self, options: RefreshOptions) -> Result<TokenSet> {
        let RefreshOptions {
            cancel,
            on_tokens,
            on_refreshing_change,
            tokens,
        } = options;
        let _refreshing = RefreshingGuard::acquire(on_refreshing_change);

        let tokens = match tokens {
            Some(tokens) => Some(tokens),
            None => self.store.retrieve_tokens().await?,
        };
        let StoredTokens {
            refresh_token,
            username,
            ..
        } = tokens.unwrap_or_default();
        let (Some(refresh_token), Some(username)) = (non_empty(refresh_token), non_empty(username))
        else {
            return Err(RefreshError::Configuration(
                "Cannot refresh without refresh token and username".to_string(),
            ));
        };
        if self.invalid.contains(&refresh_token) {
            return Err(RefreshError::PreviouslyFailed { refresh_token });
        }

        self.config.debug("Refreshing tokens using refresh token ...");
        let request = InitiateAuthRequest::refresh(refresh_token.clone(), cancel);
        let result = match self.provider.initiate_auth(request).await {
            Ok(result) => result,
            Err(err) => {
                self.invalid.add(refresh_token);
                tracing::warn!(username = %username, error = %err, "refresh token rejected, not retrying it");
                return Err(err.into());
            }
        };

        let refreshed = TokenSet {
            access_token: result.access_token,
            id_token: result.id_token,
            expire_at: expiry_after(self.clock.now(), result.expires_in_secs),
            refresh_token,
            username,
        };
        if let Some(on_tokens) = &on_tokens {
            on_tokens
                .call(refreshed.clone())
                .await
                .map_err(|err| RefreshError::Callback(err.to_string()))?;
        }
        Ok(refreshed)
    }
}

/// Signals `true` on creation and `false` on drop, so the pair holds on
/// every exit path including cancellation of the surrounding task.
struct RefreshingGuard(Option<OnRefreshingChange>);

impl RefreshingGuard {
    fn acquire(callback: Option<OnRefreshingChange>) -> Self {
        if let Some(callback) = &callback {
            callback.call(true);
        }
        Self(callback)
    }
}

impl Drop for RefreshingGuard {
    fn drop(&mut self) {
        if let Some(callback) = self.0.take() {
            callback.call(false);
        }
    }
}

fn non_empty(value: Option<String>) -> Option<String> {
    value.filter(|v| !v.is_empty())
}

fn expiry_after(now: DateTime<Utc>, expires_in_secs: u64) -> DateTime<Utc> {
    i64::try_from(expires_in_secs)
        .ok()
        .and_then(TimeDelta::try_seconds)
        .and_then(|lifetime| now.checked_add_signed(lifetime))
        .unwrap_or(DateTime::<Utc>::MAX_UTC)
}
