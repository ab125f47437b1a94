use std::time::Duration;

use anyhow::Result;
use async_trait::async_trait;

#[derive(Clone, Debug, PartialEq, Eq)]
pub enum SessionState {
    Anonymous,
    Authenticated(String),
}

/// Server side storage of signed in clients, keyed by session token.
#[async_trait]
pub trait SessionStore: Send + Sync {
    /// How long an entry lives after it is set.
    fn ttl(&self) -> Duration;

    /// Identifier stored for the token, unless missing or expired.
    async fn get(&self, token: &str) -> Result<Option<String>>;

    /// Associates the token with an identifier, replacing any previous one.
    async fn set(&self, token: &str, identifier: &str) -> Result<()>;

    /// Forgets the token. Removing an unknown token is not an error.
    async fn remove(&self, token: &str) -> Result<()>;

    /// Drops expired entries and returns how many were removed.
    async fn sweep(&self) -> Result<usize>;
}
