//! crates/research_copilot_core/src/store.rs
//!
//! Typed records on top of the `KeyValueStore` port. Every record is a JSON blob
//! under a prefixed key; a blob that no longer decodes is reported, never guessed at.

use serde::{de::DeserializeOwned, Serialize};
use std::sync::Arc;

use crate::billing::PendingOrder;
use crate::domain::{AuthSession, UserAccount, UserCredentials};
use crate::history::{ChatHistory, RecentQueries};
use crate::ports::{KeyValueStore, PortError, PortResult};

#[derive(Clone)]
pub struct Repository {
    kv: Arc<dyn KeyValueStore>,
}

fn key(prefix: &str, id: &str) -> String {
    format!("{}:{}", prefix, id.trim().to_lowercase())
}

impl Repository {
    pub fn new(kv: Arc<dyn KeyValueStore>) -> Self {
        Self { kv }
    }

    async fn load<T: DeserializeOwned>(&self, key: &str) -> PortResult<Option<T>> {
        match self.kv.get(key).await? {
            Some(raw) => serde_json::from_str(&raw)
                .map(Some)
                .map_err(|e| PortError::Malformed(format!("{}: {}", key, e))),
            None => Ok(None),
        }
    }

    async fn save<T: Serialize>(&self, key: &str, value: &T) -> PortResult<()> {
        let raw = serde_json::to_string(value).map_err(|e| PortError::Unexpected(e.to_string()))?;
        self.kv.set(key, &raw).await
    }

    // --- Accounts ---
    pub async fn account(&self, email: &str) -> PortResult<Option<UserAccount>> {
        self.load(&key("account", email)).await
    }

    pub async fn save_account(&self, account: &UserAccount) -> PortResult<()> {
        self.save(&key("account", &account.email), account).await
    }

    pub async fn credentials(&self, email: &str) -> PortResult<Option<UserCredentials>> {
        self.load(&key("credentials", email)).await
    }

    pub async fn save_credentials(&self, credentials: &UserCredentials) -> PortResult<()> {
        self.save(&key("credentials", &credentials.email), credentials).await
    }

    // --- Auth sessions ---
    pub async fn auth_session(&self, session_id: &str) -> PortResult<Option<AuthSession>> {
        self.load(&key("auth_session", session_id)).await
    }

    pub async fn save_auth_session(&self, session: &AuthSession) -> PortResult<()> {
        self.save(&key("auth_session", &session.id), session).await
    }

    pub async fn delete_auth_session(&self, session_id: &str) -> PortResult<()> {
        self.kv.remove(&key("auth_session", session_id)).await
    }

    // --- History ---
    pub async fn history(&self, email: &str) -> PortResult<ChatHistory> {
        Ok(self.load(&key("history", email)).await?.unwrap_or_default())
    }

    pub async fn save_history(&self, email: &str, history: &ChatHistory) -> PortResult<()> {
        self.save(&key("history", email), history).await
    }

    pub async fn clear_history(&self, email: &str) -> PortResult<()> {
        self.kv.remove(&key("history", email)).await
    }

    pub async fn recent(&self, email: &str) -> PortResult<RecentQueries> {
        Ok(self.load(&key("recent", email)).await?.unwrap_or_default())
    }

    pub async fn save_recent(&self, email: &str, recent: &RecentQueries) -> PortResult<()> {
        self.save(&key("recent", email), recent).await
    }

    // --- Orders ---
    pub async fn pending_order(&self, order_id: &str) -> PortResult<Option<PendingOrder>> {
        self.load(&key("order", order_id)).await
    }

    pub async fn save_pending_order(&self, order: &PendingOrder) -> PortResult<()> {
        self.save(&key("order", &order.order_id), order).await
    }

    pub async fn delete_pending_order(&self, order_id: &str) -> PortResult<()> {
        self.kv.remove(&key("order", order_id)).await
    }
}
