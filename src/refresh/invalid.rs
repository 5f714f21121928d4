//! Refresh tokens the identity provider has already rejected.

use std::collections::HashSet;
use std::sync::{Mutex, PoisonError};

/// Set of refresh tokens known to fail.
///
/// Membership is permanent for the lifetime of the cache: there is no
/// eviction, so the set grows by one entry per distinct failing token.
#[derive(Debug, Default)]
pub struct InvalidTokenCache {
    tokens: Mutex<HashSet<String>>,
}

impl InvalidTokenCache {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn contains(&self, refresh_token: &str) -> bool {
        self.tokens
            .lock()
            .unwrap_or_else(PoisonError::into_inner)
            .contains(refresh_token)
    }

    /// Returns `true` when the token was not already known.
    pub fn add(&self, refresh_token: impl Into<String>) -> bool {
        self.tokens
            .lock()
            .unwrap_or_else(PoisonError::into_inner)
            .insert(refresh_token.into())
    }

    pub fn len(&self) -> usize {
        self.tokens.lock().unwrap_or_else(PoisonError::into_inner).len()
    }

    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }
}
