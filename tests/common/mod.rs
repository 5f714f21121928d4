//! Shared test helpers: scripted identity provider, tokio-driven wall clock,
//! callback recorders.
#![allow(dead_code)]

use std::sync::atomic::{AtomicUsize, Ordering};
use std::sync::{Arc, Mutex};
use std::time::Duration;

use async_trait::async_trait;
use chrono::{DateTime, TimeDelta, Utc};
use tokio::time::Instant;
use tokio_util::sync::CancellationToken;

use renewal::auth::{
    AuthenticationResult, IdentityProvider, InitiateAuthRequest, MemoryTokenStore, StoredTokens,
    TokenSet, TokenStore,
};
use renewal::config::RefreshConfig;
use renewal::error::{ProviderError, RefreshError};
use renewal::refresh::{OnRefreshingChange, OnTokens, TokenRefresher};
use renewal::util::clock::Clock;

/// Identity provider answering from a script, after an optional latency.
pub struct MockProvider {
    calls: AtomicUsize,
    requests: Mutex<Vec<String>>,
    cancels: Mutex<Vec<Option<CancellationToken>>>,
    latency: Duration,
    rejected: Mutex<Vec<String>>,
    expires_in_secs: u64,
}

impl MockProvider {
    pub fn new() -> Self {
        Self {
            calls: AtomicUsize::new(0),
            requests: Mutex::new(Vec::new()),
            cancels: Mutex::new(Vec::new()),
            latency: Duration::ZERO,
            rejected: Mutex::new(Vec::new()),
            expires_in_secs: 3600,
        }
    }

    pub fn with_latency(mut self, latency: Duration) -> Self {
        self.latency = latency;
        self
    }

    /// Reject any exchange of `refresh_token`.
    pub fn reject(self, refresh_token: &str) -> Self {
        self.rejected.lock().unwrap().push(refresh_token.to_string());
        self
    }

    pub fn calls(&self) -> usize {
        self.calls.load(Ordering::SeqCst)
    }

    pub fn requests(&self) -> Vec<String> {
        self.requests.lock().unwrap().clone()
    }

    /// Cancellation token handed over with each request, in call order.
    pub fn cancels(&self) -> Vec<Option<CancellationToken>> {
        self.cancels.lock().unwrap().clone()
    }
}

#[async_trait]
impl IdentityProvider for MockProvider {
    async fn initiate_auth(
        &self,
        request: InitiateAuthRequest,
    ) -> Result<AuthenticationResult, ProviderError> {
        let call = self.calls.fetch_add(1, Ordering::SeqCst) + 1;
        self.requests
            .lock()
            .unwrap()
            .push(request.refresh_token.clone());
        self.cancels.lock().unwrap().push(request.cancel.clone());
        if !self.latency.is_zero() {
            tokio::time::sleep(self.latency).await;
        }
        if self.rejected.lock().unwrap().contains(&request.refresh_token) {
            return Err(ProviderError::Rejected(
                "Refresh Token has been revoked".to_string(),
            ));
        }
        Ok(AuthenticationResult {
            access_token: format!("access-{call}"),
            id_token: format!("id-{call}"),
            expires_in_secs: self.expires_in_secs,
        })
    }
}

/// Store whose reads always fail.
pub struct BrokenStore;

#[async_trait]
impl TokenStore for BrokenStore {
    async fn retrieve_tokens(&self) -> Result<Option<StoredTokens>, RefreshError> {
        Err(RefreshError::Storage("keychain locked".to_string()))
    }
}

/// Wall clock that advances with tokio's paused time and can jump ahead.
pub struct TestClock {
    base: DateTime<Utc>,
    start: Instant,
    jumped: Mutex<TimeDelta>,
}

impl TestClock {
    pub fn new() -> Self {
        Self {
            base: Utc::now(),
            start: Instant::now(),
            jumped: Mutex::new(TimeDelta::zero()),
        }
    }

    pub fn jump(&self, by: TimeDelta) {
        *self.jumped.lock().unwrap() += by;
    }

    pub fn after(&self, ms: i64) -> DateTime<Utc> {
        self.now() + TimeDelta::milliseconds(ms)
    }
}

impl Clock for TestClock {
    fn now(&self) -> DateTime<Utc> {
        let elapsed = TimeDelta::from_std(self.start.elapsed()).unwrap();
        self.base + elapsed + *self.jumped.lock().unwrap()
    }
}

/// Records every value a callback receives.
#[derive(Clone)]
pub struct Recorder<T>(Arc<Mutex<Vec<T>>>);

impl<T: Clone + Send + 'static> Recorder<T> {
    pub fn new() -> Self {
        Self(Arc::new(Mutex::new(Vec::new())))
    }

    pub fn push(&self, value: T) {
        self.0.lock().unwrap().push(value);
    }

    pub fn values(&self) -> Vec<T> {
        self.0.lock().unwrap().clone()
    }

    pub fn len(&self) -> usize {
        self.0.lock().unwrap().len()
    }
}

impl Recorder<TokenSet> {
    pub fn on_tokens(&self) -> OnTokens {
        let recorder = self.clone();
        OnTokens::sync(move |tokens| recorder.push(tokens))
    }
}

impl Recorder<bool> {
    pub fn on_refreshing_change(&self) -> OnRefreshingChange {
        let recorder = self.clone();
        OnRefreshingChange::new(move |refreshing| recorder.push(refreshing))
    }
}

pub struct Harness {
    pub refresher: TokenRefresher,
    pub store: Arc<MemoryTokenStore>,
    pub provider: Arc<MockProvider>,
    pub clock: Arc<TestClock>,
    pub debug: Recorder<String>,
}

impl Harness {
    pub fn new(provider: MockProvider) -> Self {
        Self::with_config(provider, RefreshConfig::default())
    }

    pub fn with_config(provider: MockProvider, config: RefreshConfig) -> Self {
        let store = Arc::new(MemoryTokenStore::new());
        let provider = Arc::new(provider);
        let clock = Arc::new(TestClock::new());
        let debug = Recorder::new();
        let sink = debug.clone();
        let config = config.with_debug_sink(Arc::new(move |message: &str| {
            sink.push(message.to_string())
        }));
        let refresher = TokenRefresher::builder()
            .store(store.clone())
            .provider(provider.clone())
            .clock(clock.clone())
            .config(config)
            .build();
        Self {
            refresher,
            store,
            provider,
            clock,
            debug,
        }
    }

    /// Seed storage with tokens expiring `expire_in_ms` from now.
    pub fn seed(&self, refresh_token: &str, username: &str, expire_in_ms: i64) {
        self.store.seed(StoredTokens::new(
            refresh_token,
            username,
            self.clock.after(expire_in_ms),
        ));
    }
}

/// Let every spawned task run until the runtime goes idle.
pub async fn settle() {
    tokio::time::sleep(Duration::from_millis(1)).await;
}
