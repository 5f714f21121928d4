//! Session token types and the collaborators the refresher depends on.

pub mod provider;
pub mod store;
pub mod token;

pub use provider::{AuthFlow, AuthenticationResult, IdentityProvider, InitiateAuthRequest};
pub use store::{MemoryTokenStore, TokenStore};
pub use token::{StoredTokens, TokenSet};
