#[cfg(test)]
#[path = "sessions_test.rs"]
mod tests;

use std::sync::Arc;
use std::time::Duration;

use anyhow::anyhow;
use anyhow::Result;
use async_trait::async_trait;
use base64::engine::general_purpose::URL_SAFE_NO_PAD;
use base64::Engine;
use dashmap::DashMap;
use hmac::Hmac;
use hmac::Mac;
use sha2::Sha256;
use tokio::task::JoinHandle;
use tokio::time::Instant;
use uuid::Uuid;

use crate::domain::models::SessionState;
use crate::domain::models::SessionStore;

type HmacSha256 = Hmac<Sha256>;

/// Lifetime of a session when none is configured.
pub const DEFAULT_SESSION_TTL: Duration = Duration::from_secs(12 * 60 * 60);

/// Sessions held in process memory. Everything is lost on restart. Entries
/// older than the ttl read as missing and are dropped by `sweep`.
pub struct MemorySessionStore {
    entries: DashMap<String, (String, Instant)>,
    ttl: Duration,
}

impl Default for MemorySessionStore {
    fn default() -> MemorySessionStore {
        return MemorySessionStore::new(DEFAULT_SESSION_TTL);
    }
}

impl MemorySessionStore {
    pub fn new(ttl: Duration) -> MemorySessionStore {
        return MemorySessionStore {
            entries: DashMap::new(),
            ttl,
        };
    }

    fn is_expired(&self, issued_at: Instant) -> bool {
        return issued_at.elapsed() >= self.ttl;
    }
}

#[cfg(test)]
impl MemorySessionStore {
    pub fn len(&self) -> usize {
        return self.entries.len();
    }
}

#[async_trait]
impl SessionStore for MemorySessionStore {
    fn ttl(&self) -> Duration {
        return self.ttl;
    }

    async fn get(&self, token: &str) -> Result<Option<String>> {
        let (identifier, issued_at) = match self.entries.get(token) {
            Some(entry) => entry.value().clone(),
            None => return Ok(None),
        };

        if self.is_expired(issued_at) {
            self.entries.remove(token);
            return Ok(None);
        }

        return Ok(Some(identifier));
    }

    async fn set(&self, token: &str, identifier: &str) -> Result<()> {
        self.entries
            .insert(token.to_string(), (identifier.to_string(), Instant::now()));
        return Ok(());
    }

    async fn remove(&self, token: &str) -> Result<()> {
        self.entries.remove(token);
        return Ok(());
    }

    async fn sweep(&self) -> Result<usize> {
        let before = self.entries.len();
        self.entries
            .retain(|_, (_, issued_at)| return !self.is_expired(*issued_at));

        return Ok(before.saturating_sub(self.entries.len()));
    }
}

/// Tracks which clients are signed in. Clients hold a `<token>.<signature>`
/// cookie value, where the signature is an HMAC of the token under the
/// configured secret key. Values with a bad signature are treated as
/// anonymous.
pub struct SessionManager {
    store: Arc<dyn SessionStore>,
    mac: HmacSha256,
}

impl SessionManager {
    pub fn new(store: Arc<dyn SessionStore>, secret_key: &str) -> Result<SessionManager> {
        let mac = HmacSha256::new_from_slice(secret_key.as_bytes())
            .map_err(|_| return anyhow!("Session secret key cannot be used for signing"))?;

        return Ok(SessionManager { store, mac });
    }

    pub fn create_token() -> String {
        return Uuid::new_v4().simple().to_string();
    }

    fn sign(&self, token: &str) -> String {
        let mut mac = self.mac.clone();
        mac.update(token.as_bytes());
        return URL_SAFE_NO_PAD.encode(mac.finalize().into_bytes());
    }

    /// Cookie value for a token.
    pub fn seal(&self, token: &str) -> String {
        return format!("{token}.{sig}", sig = self.sign(token));
    }

    /// Returns the token inside a cookie value if its signature checks out.
    pub fn unseal(&self, value: &str) -> Option<String> {
        let (token, sig) = value.rsplit_once('.')?;
        if token.is_empty() {
            return None;
        }

        let sig_bytes = URL_SAFE_NO_PAD.decode(sig).ok()?;
        let mut mac = self.mac.clone();
        mac.update(token.as_bytes());
        if mac.verify_slice(&sig_bytes).is_err() {
            tracing::debug!("Discarding session cookie with an invalid signature");
            return None;
        }

        return Some(token.to_string());
    }

    pub async fn current(&self, cookie: Option<&str>) -> Result<SessionState> {
        let token = match cookie.and_then(|value| return self.unseal(value)) {
            Some(token) => token,
            None => return Ok(SessionState::Anonymous),
        };

        return match self.store.get(&token).await? {
            Some(identifier) => Ok(SessionState::Authenticated(identifier)),
            None => Ok(SessionState::Anonymous),
        };
    }

    /// Marks the client as signed in as `identifier` and returns the cookie
    /// value it should hold from now on. Every login issues a new token and
    /// forgets the one the client presented.
    pub async fn login(&self, cookie: Option<&str>, identifier: &str) -> Result<String> {
        if let Some(previous) = cookie.and_then(|value| return self.unseal(value)) {
            self.store.remove(&previous).await?;
        }

        let token = SessionManager::create_token();
        self.store.set(&token, identifier).await?;

        return Ok(self.seal(&token));
    }

    /// Signs the client out. Calling this without a session, or twice, is
    /// fine.
    pub async fn logout(&self, cookie: Option<&str>) -> Result<()> {
        if let Some(token) = cookie.and_then(|value| return self.unseal(value)) {
            self.store.remove(&token).await?;
        }

        return Ok(());
    }

    /// How long a cookie value stays valid.
    pub fn ttl(&self) -> Duration {
        return self.store.ttl();
    }

    /// Drops expired sessions from the store every `every` until the runtime
    /// shuts down.
    pub fn spawn_sweeper(&self, every: Duration) -> JoinHandle<()> {
        let store = self.store.clone();

        return tokio::spawn(async move {
            loop {
                tokio::time::sleep(every).await;
                match store.sweep().await {
                    Ok(removed) => {
                        if removed > 0 {
                            tracing::debug!(removed = removed, "Swept expired sessions");
                        }
                    }
                    Err(err) => {
                        tracing::warn!(error = ?err, "Session sweep failed");
                    }
                }
            }
        });
    }
}
