//! Access token issuance.
//!
//! Token formats and signing live outside this crate; account operations only
//! need something that turns an account identity into tokens.

use serde::Serialize;

/// Access and refresh tokens handed out on login.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct TokenPair {
    pub access: String,
    pub refresh: String,
}

/// Token issuance failed.
#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
#[error("token issuance failed: {0}")]
pub struct TokenError(pub String);

/// Issues tokens for an account identity (the user's uuid).
pub trait TokenIssuer: Send + Sync {
    /// Issues a fresh access token and a refresh token, after a password login.
    ///
    /// # Errors
    ///
    /// Returns `TokenError` if the tokens cannot be produced.
    fn issue_pair(&self, identity: &str) -> Result<TokenPair, TokenError>;

    /// Issues a non-fresh access token, after a refresh.
    ///
    /// # Errors
    ///
    /// Returns `TokenError` if the token cannot be produced.
    fn issue_access(&self, identity: &str) -> Result<String, TokenError>;
}
