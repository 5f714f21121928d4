//! Convenience re-exports for common use.

pub use crate::auth::{
    AuthFlow, AuthenticationResult, IdentityProvider, InitiateAuthRequest, MemoryTokenStore,
    StoredTokens, TokenSet, TokenStore,
};
pub use crate::config::RefreshConfig;
pub use crate::error::{ProviderError, RefreshError, Result};
pub use crate::refresh::{
    OnRefreshingChange, OnTokens, RefreshOptions, ScheduleOptions, TimerHandle, TimerState,
    TokenRefresher,
};
pub use crate::util::clock::{Clock, SystemClock};
