//! Deduplicated, wall-clock scheduled token refresh.
//!
//! [`TokenRefresher`] is the entry point. It owns one single-flight slot per
//! operation family (scheduling, refreshing), the pending timer and the
//! invalid-token cache, so independent instances never share state.

pub mod delay;
pub mod executor;
pub mod invalid;
pub mod options;
pub mod timer;

pub use delay::{DelayCalculator, RefreshDelay};
pub use executor::RefreshExecutor;
pub use invalid::InvalidTokenCache;
pub use options::{CallbackError, OnRefreshingChange, OnTokens, RefreshOptions, ScheduleOptions};
pub use timer::{TimerHandle, TimerManager, TimerState};

use std::future::Future;
use std::sync::Arc;
use std::time::Duration;

use bon::Builder;
use chrono::{DateTime, TimeDelta, Utc};
use tokio_util::sync::CancellationToken;

use crate::auth::{IdentityProvider, TokenSet, TokenStore};
use crate::config::RefreshConfig;
use crate::error::Result;
use crate::util::clock::{default_clock, Clock};
use crate::util::single_flight::{SharedOutcome, SingleFlight};

const SCHEDULING: &str = "scheduling";
const REFRESHING: &str = "refreshing";

/// Keeps session tokens fresh ahead of expiry.
///
/// Cloning is cheap and clones share all state.
///
/// # Example
/// ```no_run
/// use std::sync::Arc;
/// use renewal::auth::{AuthenticationResult, IdentityProvider, InitiateAuthRequest, MemoryTokenStore};
/// use renewal::error::ProviderError;
/// use renewal::refresh::{OnTokens, ScheduleOptions, TokenRefresher};
///
/// struct Provider;
///
/// #[async_trait::async_trait]
/// impl IdentityProvider for Provider {
///     async fn initiate_auth(
///         &self,
///         _request: InitiateAuthRequest,
///     ) -> Result<AuthenticationResult, ProviderError> {
///         Err(ProviderError::Network("offline".into()))
///     }
/// }
///
/// # async fn example() -> renewal::error::Result<()> {
/// let refresher = TokenRefresher::builder()
///     .store(Arc::new(MemoryTokenStore::new()))
///     .provider(Arc::new(Provider))
///     .build();
/// let options = ScheduleOptions::builder()
///     .on_tokens(OnTokens::sync(|tokens| println!("refreshed {}", tokens.username)))
///     .build();
/// refresher.schedule_refresh(options).await?;
/// # Ok(())
/// # }
/// ```
#[derive(Clone, Builder)]
pub struct TokenRefresher {
    store: Arc<dyn TokenStore>,
    provider: Arc<dyn IdentityProvider>,
    #[builder(default, into)]
    config: Arc<RefreshConfig>,
    #[builder(default = default_clock())]
    clock: Arc<dyn Clock>,
    #[builder(skip)]
    state: Arc<RefresherState>,
}

struct RefresherState {
    invalid: Arc<InvalidTokenCache>,
    timers: TimerManager,
    scheduling: SingleFlight<Option<TimerHandle>>,
    refreshing: SingleFlight<TokenSet>,
}

impl Default for RefresherState {
    fn default() -> Self {
        Self {
            invalid: Arc::new(InvalidTokenCache::new()),
            timers: TimerManager::new(),
            scheduling: SingleFlight::new(SCHEDULING),
            refreshing: SingleFlight::new(REFRESHING),
        }
    }
}

impl TokenRefresher {
    /// Refresher with default config and the system clock.
    pub fn new(store: Arc<dyn TokenStore>, provider: Arc<dyn IdentityProvider>) -> Self {
        Self::builder().store(store).provider(provider).build()
    }

    /// Arrange for the tokens to be refreshed shortly before they expire.
    ///
    /// Reads the stored tokens, then either arms a wall-clock timer (returned)
    /// or, when the refresh is due within a second, starts it right away
    /// (returns `None`). Scheduled refresh failures are only logged.
    ///
    /// While a scheduling pass is in flight, further calls join it: they get
    /// its result and **their own options are ignored**, callbacks and
    /// cancellation token included. Consumers racing to schedule for the same
    /// credentials may therefore have their callbacks silently dropped.
    pub async fn schedule_refresh(&self, options: ScheduleOptions) -> Result<Option<TimerHandle>> {
        let refresher = self.clone();
        self.state
            .scheduling
            .run(move || async move { refresher.schedule_pass(options).await })
            .await
    }

    /// Refresh the tokens now.
    ///
    /// While a refresh is in flight, further calls join it and receive the
    /// same outcome; their own options are ignored.
    pub async fn refresh_tokens(&self, options: RefreshOptions) -> Result<TokenSet> {
        self.start_refresh(options).await
    }

    /// Cancel the armed timer, if any.
    pub fn cancel_scheduled_refresh(&self) -> bool {
        self.state.timers.cancel_current()
    }

    pub fn pending_timer(&self) -> Option<TimerHandle> {
        self.state.timers.current()
    }

    pub fn is_refreshing(&self) -> bool {
        self.state.refreshing.is_in_flight()
    }

    pub fn is_scheduling(&self) -> bool {
        self.state.scheduling.is_in_flight()
    }

    pub fn invalid_tokens(&self) -> &InvalidTokenCache {
        &self.state.invalid
    }

    pub fn config(&self) -> &RefreshConfig {
        &self.config
    }

    /// The undeduplicated executor this refresher runs behind its guard.
    pub fn executor(&self) -> RefreshExecutor {
        RefreshExecutor::new(
            Arc::clone(&self.store),
            Arc::clone(&self.provider),
            Arc::clone(&self.state.invalid),
            Arc::clone(&self.clock),
            Arc::clone(&self.config),
        )
    }

    fn start_refresh(&self, options: RefreshOptions) -> SharedOutcome<TokenSet> {
        let executor = self.executor();
        self.state
            .refreshing
            .run(move || async move { executor.execute(options).await })
    }

    /// Start a refresh nobody waits for; failures go to the debug log.
    fn refresh_unattended(
        &self,
        options: RefreshOptions,
    ) -> impl Future<Output = ()> + Send + 'static {
        let outcome = self.start_refresh(options);
        let config = Arc::clone(&self.config);
        async move {
            if let Err(err) = outcome.await {
                config.debug(format_args!("Failed to refresh tokens: {err}"));
            }
        }
    }

    async fn schedule_pass(&self, options: ScheduleOptions) -> Result<Option<TimerHandle>> {
        self.state.timers.cancel_current();
        let tokens = self.store.retrieve_tokens().await?;
        if options
            .cancel
            .as_ref()
            .is_some_and(CancellationToken::is_cancelled)
        {
            self.config.debug("Scheduling cancelled, no refresh armed");
            return Ok(None);
        }

        let now = self.clock.now();
        let expire_at = tokens.as_ref().and_then(|tokens| tokens.expire_at);
        let refresh_options = options.to_refresh_options(tokens);
        match DelayCalculator::new(&self.config).compute(expire_at, now) {
            RefreshDelay::Immediate => {
                self.config.debug("Tokens due for refresh, refreshing now");
                tokio::spawn(self.refresh_unattended(refresh_options));
                Ok(None)
            }
            RefreshDelay::After(delay) => {
                self.config.debug(format_args!(
                    "Scheduling refresh of tokens in {:.1} seconds",
                    delay.as_secs_f64()
                ));
                let refresher = self.clone();
                let handle = self.state.timers.arm(
                    Arc::clone(&self.clock),
                    deadline_after(now, delay),
                    self.config.wall_clock_tick(),
                    options.cancel.as_ref(),
                    move || refresher.refresh_unattended(refresh_options),
                );
                Ok(Some(handle))
            }
        }
    }
}

fn deadline_after(now: DateTime<Utc>, delay: Duration) -> DateTime<Utc> {
    TimeDelta::from_std(delay)
        .ok()
        .and_then(|delay| now.checked_add_signed(delay))
        .unwrap_or(DateTime::<Utc>::MAX_UTC)
}
