use async_trait::async_trait;
use serde::{Deserialize, Serialize};
use strum::{Display, EnumString};
use tokio_util::sync::CancellationToken;

use crate::error::ProviderError;

/// Authentication flow requested from the identity provider.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize, Display, EnumString)]
#[serde(rename_all = "SCREAMING_SNAKE_CASE")]
#[strum(serialize_all = "SCREAMING_SNAKE_CASE")]
pub enum AuthFlow {
    RefreshTokenAuth,
}

/// Request handed to [`IdentityProvider::initiate_auth`].
#[derive(Debug, Clone)]
pub struct InitiateAuthRequest {
    pub auth_flow: AuthFlow,
    pub refresh_token: String,
    /// Caller's cancellation token, passed through untouched. Providers should
    /// abandon the request once it fires.
    pub cancel: Option<CancellationToken>,
}

impl InitiateAuthRequest {
    pub fn refresh(refresh_token: impl Into<String>, cancel: Option<CancellationToken>) -> Self {
        Self {
            auth_flow: AuthFlow::RefreshTokenAuth,
            refresh_token: refresh_token.into(),
            cancel,
        }
    }
}

/// Tokens returned by a successful exchange.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct AuthenticationResult {
    pub access_token: String,
    pub id_token: String,
    /// Lifetime of the new access token, in seconds.
    pub expires_in_secs: u64,
}

/// The identity provider's token endpoint.
///
/// Implementations own the wire protocol; the refresher only decides whether
/// and when to call them.
#[async_trait]
pub trait IdentityProvider: Send + Sync {
    async fn initiate_auth(
        &self,
        request: InitiateAuthRequest,
    ) -> Result<AuthenticationResult, ProviderError>;
}
