//! Renewal: keep short-lived session tokens fresh.
//!
//! Schedules a refresh shortly before the stored tokens expire, exchanges the
//! refresh token with an identity provider, and hands the new tokens to the
//! caller. Concurrent requests to schedule or refresh share one in-flight
//! operation, and refresh tokens the provider rejected are never retried.
//!
//! # Quick Start
//!
//! ```no_run
//! use std::sync::Arc;
//! use renewal::prelude::*;
//!
//! # async fn example(provider: Arc<dyn IdentityProvider>) -> renewal::error::Result<()> {
//! let store = Arc::new(MemoryTokenStore::new());
//! let refresher = TokenRefresher::builder()
//!     .store(store)
//!     .provider(provider)
//!     .config(RefreshConfig::default())
//!     .build();
//! refresher.schedule_refresh(ScheduleOptions::default()).await?;
//! # Ok(())
//! # }
//! ```

pub mod auth;
pub mod config;
pub mod error;
pub mod prelude;
pub mod refresh;
pub mod util;
