//! Caller-supplied options and callbacks.

use std::fmt;
use std::future::Future;
use std::sync::Arc;

use bon::Builder;
use futures::future::{BoxFuture, FutureExt};
use tokio_util::sync::CancellationToken;

use crate::auth::{StoredTokens, TokenSet};

/// Error type a token callback may fail with.
pub type CallbackError = Box<dyn std::error::Error + Send + Sync>;

type TokensFn = dyn Fn(TokenSet) -> BoxFuture<'static, Result<(), CallbackError>> + Send + Sync;

/// Receives every freshly refreshed [`TokenSet`].
///
/// May be synchronous or asynchronous. An asynchronous callback is awaited
/// before the refresh completes, and its failure fails the refresh.
///
/// # Example
/// ```
/// use renewal::refresh::{CallbackError, OnTokens};
///
/// let persist = OnTokens::new(|tokens| async move {
///     println!("new access token for {}", tokens.username);
///     Ok::<_, CallbackError>(())
/// });
/// let log_only = OnTokens::sync(|tokens| println!("expires {}", tokens.expire_at));
/// # drop((persist, log_only));
/// ```
#[derive(Clone)]
pub struct OnTokens(Arc<TokensFn>);

impl OnTokens {
    pub fn new<F, Fut>(callback: F) -> Self
    where
        F: Fn(TokenSet) -> Fut + Send + Sync + 'static,
        Fut: Future<Output = Result<(), CallbackError>> + Send + 'static,
    {
        Self(Arc::new(move |tokens| callback(tokens).boxed()))
    }

    /// Infallible, synchronous callback.
    pub fn sync<F>(callback: F) -> Self
    where
        F: Fn(TokenSet) + Send + Sync + 'static,
    {
        Self(Arc::new(move |tokens| {
            callback(tokens);
            futures::future::ready(Ok::<(), CallbackError>(())).boxed()
        }))
    }

    pub async fn call(&self, tokens: TokenSet) -> Result<(), CallbackError> {
        (self.0)(tokens).await
    }
}

impl fmt::Debug for OnTokens {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str("OnTokens(..)")
    }
}

/// Told `true` when a refresh starts and `false` when it ends.
///
/// Synchronous; every `true` is followed by exactly one `false`, also when
/// the refresh fails.
#[derive(Clone)]
pub struct OnRefreshingChange(Arc<dyn Fn(bool) + Send + Sync>);

impl OnRefreshingChange {
    pub fn new<F>(callback: F) -> Self
    where
        F: Fn(bool) + Send + Sync + 'static,
    {
        Self(Arc::new(callback))
    }

    pub fn call(&self, refreshing: bool) {
        (self.0)(refreshing)
    }
}

impl fmt::Debug for OnRefreshingChange {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str("OnRefreshingChange(..)")
    }
}

/// Options for [`TokenRefresher::schedule_refresh`](super::TokenRefresher::schedule_refresh).
///
/// # Example
/// ```
/// use renewal::refresh::{OnRefreshingChange, ScheduleOptions};
/// use tokio_util::sync::CancellationToken;
///
/// let options = ScheduleOptions::builder()
///     .cancel(CancellationToken::new())
///     .on_refreshing_change(OnRefreshingChange::new(|busy| println!("refreshing: {busy}")))
///     .build();
/// assert!(options.on_tokens.is_none());
/// ```
#[derive(Debug, Clone, Default, Builder)]
pub struct ScheduleOptions {
    /// Cancels the armed timer; also handed to the provider call.
    pub cancel: Option<CancellationToken>,
    pub on_tokens: Option<OnTokens>,
    pub on_refreshing_change: Option<OnRefreshingChange>,
}

impl ScheduleOptions {
    /// Options for the refresh this schedule eventually triggers.
    pub fn to_refresh_options(&self, tokens: Option<StoredTokens>) -> RefreshOptions {
        RefreshOptions {
            cancel: self.cancel.clone(),
            on_tokens: self.on_tokens.clone(),
            on_refreshing_change: self.on_refreshing_change.clone(),
            tokens,
        }
    }
}

/// Options for [`TokenRefresher::refresh_tokens`](super::TokenRefresher::refresh_tokens).
#[derive(Debug, Clone, Default, Builder)]
pub struct RefreshOptions {
    /// Passed through to the identity provider.
    pub cancel: Option<CancellationToken>,
    pub on_tokens: Option<OnTokens>,
    pub on_refreshing_change: Option<OnRefreshingChange>,
    /// Snapshot to refresh from; read from storage when absent.
    pub tokens: Option<StoredTokens>,
}
