//! Identity and credentials
//!
//! User identities attached to a session, the seam to the identity library
//! (sign-in, sign-out, account switching) and the credential providers used
//! to authorize connections.

mod tokens;

pub use tokens::{
    FunctionTokenProvider, InsecureTokenProvider, TokenClaims, TokenError, TokenProvider,
    TokenResponse, TOKEN_LIFETIME_SECS,
};

use async_trait::async_trait;
use serde::{Deserialize, Serialize};
use thiserror::Error;
use tokio::sync::RwLock;
use uuid::Uuid;

/// A collaborator as seen by the document and token services
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct UserIdentity {
    pub id: String,
    pub name: String,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub image: Option<String>,
}

impl UserIdentity {
    pub fn new(id: impl Into<String>, name: impl Into<String>) -> Self {
        Self {
            id: id.into(),
            name: name.into(),
            image: None,
        }
    }

    /// Synthetic identity used against the local development service
    pub fn local_default() -> Self {
        Self::new(Uuid::new_v4().to_string(), "Local developer")
    }

    /// Identity used against the remote service when the caller has none
    pub fn remote_default() -> Self {
        Self::new(Uuid::new_v4().to_string(), "Anonymous collaborator")
    }
}

/// Signed-in account reported by the identity library
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Account {
    pub home_account_id: String,
    /// Usually the sign-in email
    pub username: String,
    #[serde(default)]
    pub name: Option<String>,
}

impl From<&Account> for UserIdentity {
    fn from(account: &Account) -> Self {
        let name = account
            .name
            .clone()
            .filter(|name| !name.is_empty())
            .unwrap_or_else(|| account.username.clone());
        UserIdentity::new(account.home_account_id.clone(), name)
    }
}

/// Error types for account operations
#[derive(Debug, Error)]
pub enum AccountError {
    #[error("No accounts are available to sign in")]
    NoAccounts,
}

/// Interactive identity operations owned by an external library
#[async_trait]
pub trait AccountProvider: Send + Sync {
    /// Sign in interactively and make the account active
    async fn sign_in(&self) -> Result<Account, AccountError>;

    /// Sign out the active account
    async fn sign_out(&self) -> Result<(), AccountError>;

    /// Prompt for a different account and make it active
    async fn switch_account(&self) -> Result<Account, AccountError>;

    /// Currently active account, if any
    async fn active_account(&self) -> Option<Account>;
}

/// Account provider over a fixed list of accounts.
///
/// Sign-in activates the first account, switching cycles through the list.
pub struct StaticAccountProvider {
    accounts: Vec<Account>,
    active: RwLock<Option<usize>>,
}

impl StaticAccountProvider {
    pub fn new(accounts: Vec<Account>) -> Self {
        Self {
            accounts,
            active: RwLock::new(None),
        }
    }
}

#[async_trait]
impl AccountProvider for StaticAccountProvider {
    async fn sign_in(&self) -> Result<Account, AccountError> {
        let account = self.accounts.first().ok_or(AccountError::NoAccounts)?;
        *self.active.write().await = Some(0);
        tracing::info!(username = %account.username, "Signed in");
        Ok(account.clone())
    }

    async fn sign_out(&self) -> Result<(), AccountError> {
        if let Some(index) = self.active.write().await.take() {
            tracing::info!(username = %self.accounts[index].username, "Signed out");
        }
        Ok(())
    }

    async fn switch_account(&self) -> Result<Account, AccountError> {
        if self.accounts.is_empty() {
            return Err(AccountError::NoAccounts);
        }

        let mut active = self.active.write().await;
        let next = match *active {
            Some(index) => (index + 1) % self.accounts.len(),
            None => 0,
        };
        *active = Some(next);
        Ok(self.accounts[next].clone())
    }

    async fn active_account(&self) -> Option<Account> {
        let active = *self.active.read().await;
        active.map(|index| self.accounts[index].clone())
    }
}
