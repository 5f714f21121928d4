use std::sync::{Mutex, PoisonError};

use async_trait::async_trait;

use super::token::StoredTokens;
use crate::error::RefreshError;

/// Read access to persisted session tokens.
///
/// The refresher never writes tokens back; persisting a refreshed
/// [`TokenSet`](super::TokenSet) is the job of the `on_tokens` callback.
#[async_trait]
pub trait TokenStore: Send + Sync {
    /// Load the current token snapshot, or `None` when nobody is signed in.
    async fn retrieve_tokens(&self) -> Result<Option<StoredTokens>, RefreshError>;
}

/// Token store kept in process memory.
///
/// Useful for embedding callers that already hold tokens elsewhere, and for
/// tests.
///
/// # Example
/// ```
/// use renewal::auth::{MemoryTokenStore, StoredTokens};
/// use chrono::Utc;
///
/// let store = MemoryTokenStore::new();
/// store.seed(StoredTokens::new("refresh", "alice", Utc::now()));
/// assert!(store.get().is_some());
/// ```
#[derive(Debug, Default)]
pub struct MemoryTokenStore {
    tokens: Mutex<Option<StoredTokens>>,
}

impl MemoryTokenStore {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn with_tokens(tokens: StoredTokens) -> Self {
        Self {
            tokens: Mutex::new(Some(tokens)),
        }
    }

    pub fn seed(&self, tokens: StoredTokens) {
        *self.tokens.lock().unwrap_or_else(PoisonError::into_inner) = Some(tokens);
    }

    pub fn get(&self) -> Option<StoredTokens> {
        self.tokens
            .lock()
            .unwrap_or_else(PoisonError::into_inner)
            .clone()
    }

    pub fn clear(&self) {
        self.tokens
            .lock()
            .unwrap_or_else(PoisonError::into_inner)
            .take();
    }
}

#[async_trait]
impl TokenStore for MemoryTokenStore {
    async fn retrieve_tokens(&self) -> Result<Option<StoredTokens>, RefreshError> {
        Ok(self.get())
    }
}
