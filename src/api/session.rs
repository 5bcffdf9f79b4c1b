//! Follow-up merge sessions: signed tokens and the state store behind them.

use std::collections::HashMap;
use std::time::{Duration, Instant};

use async_trait::async_trait;
use axum::http::HeaderMap;
use hmac::{Hmac, Mac};
use sha2::Sha256;
use tokio::sync::RwLock;
use tracing::{debug, warn};
use uuid::Uuid;

use super::helpers::SESSION_HEADER;
use crate::core::config::DEFAULT_SESSION_TTL_MINUTES;
use crate::errors::{ReportError, Result};
use crate::vapt::MergeState;

type HmacSha256 = Hmac<Sha256>;

/// Storage for per-session merge state.
#[async_trait]
pub trait MergeStateStore: Send + Sync {
    async fn get(&self, id: Uuid) -> Option<MergeState>;
    async fn put(&self, id: Uuid, state: MergeState);
    async fn remove(&self, id: Uuid) -> Option<MergeState>;
}

/// Process-local store; sessions end with the process or after `ttl`
/// without a write.
#[derive(Debug)]
pub struct InMemoryMergeStore {
    states: RwLock<HashMap<Uuid, (Instant, MergeState)>>,
    ttl: Duration,
}

impl Default for InMemoryMergeStore {
    fn default() -> Self {
        Self::new(Duration::from_secs(DEFAULT_SESSION_TTL_MINUTES * 60))
    }
}

impl InMemoryMergeStore {
    #[must_use]
    pub fn new(ttl: Duration) -> Self {
        Self {
            states: RwLock::new(HashMap::new()),
            ttl,
        }
    }

    pub async fn len(&self) -> usize {
        self.states.read().await.len()
    }

    fn is_live(&self, touched: Instant) -> bool {
        touched.elapsed() < self.ttl
    }
}

#[async_trait]
impl MergeStateStore for InMemoryMergeStore {
    async fn get(&self, id: Uuid) -> Option<MergeState> {
        let states = self.states.read().await;
        let (touched, state) = states.get(&id)?;
        self.is_live(*touched).then(|| state.clone())
    }

    async fn put(&self, id: Uuid, state: MergeState) {
        let mut states = self.states.write().await;
        let before = states.len();
        states.retain(|_, (touched, _)| touched.elapsed() < self.ttl);
        if states.len() < before {
            debug!(expired = before - states.len(), "Dropped expired merge sessions");
        }
        states.insert(id, (Instant::now(), state));
    }

    async fn remove(&self, id: Uuid) -> Option<MergeState> {
        self.states.write().await.remove(&id).map(|(_, state)| state)
    }
}

/// Issues and checks `<uuid>.<hex hmac>` session tokens.
#[derive(Clone)]
pub struct SessionSigner {
    secret: Vec<u8>,
}

impl std::fmt::Debug for SessionSigner {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("SessionSigner").finish_non_exhaustive()
    }
}

impl SessionSigner {
    pub fn new(secret: &str) -> Self {
        Self {
            secret: secret.as_bytes().to_vec(),
        }
    }

    fn mac(&self, id: &str) -> Result<HmacSha256> {
        let mut mac = HmacSha256::new_from_slice(&self.secret)
            .map_err(|e| ReportError::Config(format!("invalid session secret: {}", e)))?;
        mac.update(id.as_bytes());
        Ok(mac)
    }

    /// A token binding `id` to this server's secret.
    pub fn issue(&self, id: Uuid) -> Result<String> {
        let id = id.simple().to_string();
        let signature = hex::encode(self.mac(&id)?.finalize().into_bytes());
        Ok(format!("{}.{}", id, signature))
    }

    /// The session id of a token, when the signature holds.
    ///
    /// # Errors
    ///
    /// [`ReportError::Session`] for a malformed token or a bad signature.
    pub fn verify(&self, token: &str) -> Result<Uuid> {
        let invalid = || ReportError::Session("missing or invalid session token".to_string());
        let Some((id, signature)) = token.trim().split_once('.') else {
            return Err(invalid());
        };
        let uuid = Uuid::parse_str(id).map_err(|_| invalid())?;
        let signature = hex::decode(signature).map_err(|_| invalid())?;
        if self.mac(id)?.verify_slice(&signature).is_err() {
            warn!("Session token signature mismatch");
            return Err(invalid());
        }
        debug!(session = %uuid, "Verified session token");
        Ok(uuid)
    }

    /// Session id carried by the `X-Session-Token` header, if any.
    ///
    /// # Errors
    ///
    /// [`ReportError::Session`] when the header is present but invalid.
    pub fn from_headers(&self, headers: &HeaderMap) -> Result<Option<Uuid>> {
        let Some(value) = headers.get(SESSION_HEADER) else {
            return Ok(None);
        };
        let token = value
            .to_str()
            .map_err(|_| ReportError::Session("missing or invalid session token".to_string()))?;
        self.verify(token).map(Some)
    }

    /// Like [`SessionSigner::from_headers`] but the header is mandatory.
    pub fn require(&self, headers: &HeaderMap) -> Result<Uuid> {
        self.from_headers(headers)?
            .ok_or_else(|| ReportError::Session("missing or invalid session token".to_string()))
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn issued_tokens_verify() {
        let signer = SessionSigner::new("secret");
        let id = Uuid::new_v4();
        let token = signer.issue(id).unwrap();
        assert_eq!(signer.verify(&token).unwrap(), id);
    }

    #[test]
    fn tampered_tokens_are_rejected() {
        let signer = SessionSigner::new("secret");
        let token = signer.issue(Uuid::new_v4()).unwrap();
        let other = Uuid::new_v4().simple().to_string();
        let forged = format!("{}.{}", other, token.split_once('.').unwrap().1);
        assert!(matches!(signer.verify(&forged), Err(ReportError::Session(_))));
        assert!(SessionSigner::new("other").verify(&token).is_err());
        assert!(signer.verify("not-a-token").is_err());
    }

    #[tokio::test]
    async fn store_round_trip() {
        let store = InMemoryMergeStore::default();
        let id = Uuid::new_v4();
        store.put(id, MergeState::default()).await;
        assert!(store.get(id).await.is_some());
        assert_eq!(store.len().await, 1);
        assert!(store.remove(id).await.is_some());
        assert!(store.get(id).await.is_none());
    }

    #[tokio::test]
    async fn expired_sessions_are_gone_and_swept() {
        let store = InMemoryMergeStore::new(Duration::ZERO);
        let stale = Uuid::new_v4();
        store.put(stale, MergeState::default()).await;
        assert!(store.get(stale).await.is_none());

        store.put(Uuid::new_v4(), MergeState::default()).await;
        assert_eq!(store.len().await, 1);
    }
}
