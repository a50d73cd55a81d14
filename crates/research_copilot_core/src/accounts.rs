//! crates/research_copilot_core/src/accounts.rs
//!
//! Account lifecycle: signup, session opening, session lookup and logout.
//! Password hashing stays with the caller; this module only stores the hash.

use chrono::Duration;
use std::sync::Arc;
use tracing::info;
use uuid::Uuid;

use crate::domain::{AuthSession, UserAccount, UserCredentials};
use crate::entitlement;
use crate::ports::{Clock, PortError};
use crate::store::Repository;

#[derive(Debug, thiserror::Error)]
pub enum AccountError {
    #[error("An account already exists for {0}")]
    AlreadyExists(String),
    #[error("No account found for {0}")]
    NotFound(String),
    #[error("Session is missing or expired")]
    InvalidSession,
    #[error(transparent)]
    Port(#[from] PortError),
}

#[derive(Clone)]
pub struct Accounts {
    repo: Repository,
    clock: Arc<dyn Clock>,
    session_ttl: Duration,
}

impl Accounts {
    pub fn new(repo: Repository, clock: Arc<dyn Clock>, session_ttl: Duration) -> Self {
        Self {
            repo,
            clock,
            session_ttl,
        }
    }

    pub fn session_ttl(&self) -> Duration {
        self.session_ttl
    }

    /// Creates a free-tier account. Fails if the email is already registered.
    pub async fn signup(
        &self,
        email: &str,
        display_name: Option<&str>,
        hashed_password: &str,
    ) -> Result<UserAccount, AccountError> {
        let email = email.trim();
        if self.repo.account(email).await?.is_some() {
            return Err(AccountError::AlreadyExists(email.to_string()));
        }

        let account = UserAccount::new(
            email,
            display_name,
            self.clock.local_now().date(),
            self.clock.now(),
        );
        self.repo
            .save_credentials(&UserCredentials {
                user_id: account.id,
                email: account.email.clone(),
                hashed_password: hashed_password.to_string(),
            })
            .await?;
        self.repo.save_account(&account).await?;

        info!(email = %account.email, student = account.is_student, "Account created");
        Ok(account)
    }

    pub async fn credentials(&self, email: &str) -> Result<UserCredentials, AccountError> {
        self.repo
            .credentials(email)
            .await?
            .ok_or_else(|| AccountError::NotFound(email.to_string()))
    }

    /// Starts a login session, committing any pending daily rollover and
    /// dropping a subscription whose period has ended.
    pub async fn open_session(
        &self,
        email: &str,
    ) -> Result<(AuthSession, UserAccount), AccountError> {
        let mut account = self
            .repo
            .account(email)
            .await?
            .ok_or_else(|| AccountError::NotFound(email.to_string()))?;

        let today = self.clock.local_now().date();
        let rolled_over = entitlement::ensure_fresh_period(&mut account, today);
        let lapsed = entitlement::expire_subscription(&mut account, self.clock.now());
        if rolled_over || lapsed {
            self.repo.save_account(&account).await?;
        }

        let session = AuthSession {
            id: Uuid::new_v4().to_string(),
            email: account.email.clone(),
            expires_at: self.clock.now() + self.session_ttl,
        };
        self.repo.save_auth_session(&session).await?;
        Ok((session, account))
    }

    /// Resolves a session id to its account.
    pub async fn session_account(&self, session_id: &str) -> Result<UserAccount, AccountError> {
        let session = self
            .repo
            .auth_session(session_id)
            .await?
            .ok_or(AccountError::InvalidSession)?;

        if session.expires_at <= self.clock.now() {
            self.repo.delete_auth_session(session_id).await?;
            return Err(AccountError::InvalidSession);
        }

        let mut account = self
            .repo
            .account(&session.email)
            .await?
            .ok_or(AccountError::InvalidSession)?;
        if entitlement::expire_subscription(&mut account, self.clock.now()) {
            self.repo.save_account(&account).await?;
        }
        Ok(account)
    }

    pub async fn account(&self, email: &str) -> Result<UserAccount, AccountError> {
        self.repo
            .account(email)
            .await?
            .ok_or_else(|| AccountError::NotFound(email.to_string()))
    }

    /// Ends a session and clears its result history. The account itself is kept.
    pub async fn logout(&self, session_id: &str) -> Result<(), AccountError> {
        if let Some(session) = self.repo.auth_session(session_id).await? {
            self.repo.clear_history(&session.email).await?;
        }
        self.repo.delete_auth_session(session_id).await?;
        Ok(())
    }
}
