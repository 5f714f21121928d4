use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

/// Credentials produced by a successful refresh.
///
/// The refresher never keeps a copy: a `TokenSet` only travels through the
/// `on_tokens` callback and the return value of
/// [`TokenRefresher::refresh_tokens`](crate::refresh::TokenRefresher::refresh_tokens).
///
/// # Example
/// ```
/// use renewal::auth::TokenSet;
/// use chrono::{Duration, Utc};
///
/// let tokens = TokenSet {
///     access_token: "access".to_string(),
///     id_token: "id".to_string(),
///     expire_at: Utc::now() + Duration::hours(1),
///     refresh_token: "refresh".to_string(),
///     username: "alice".to_string(),
/// };
/// assert!(tokens.expire_at > Utc::now());
/// ```
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct TokenSet {
    pub access_token: String,
    pub id_token: String,
    pub expire_at: DateTime<Utc>,
    /// The refresh token that was exchanged; still valid for the next refresh.
    pub refresh_token: String,
    pub username: String,
}

/// Partial token snapshot as held by a [`TokenStore`](super::TokenStore).
///
/// Every field is optional; the refresher only requires `refresh_token` and
/// `username` to attempt a refresh. A missing `expire_at` is treated as
/// already expired.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct StoredTokens {
    pub access_token: Option<String>,
    pub id_token: Option<String>,
    pub refresh_token: Option<String>,
    pub expire_at: Option<DateTime<Utc>>,
    pub username: Option<String>,
}

impl StoredTokens {
    pub fn new(
        refresh_token: impl Into<String>,
        username: impl Into<String>,
        expire_at: DateTime<Utc>,
    ) -> Self {
        Self {
            refresh_token: Some(refresh_token.into()),
            username: Some(username.into()),
            expire_at: Some(expire_at),
            ..Self::default()
        }
    }
}
