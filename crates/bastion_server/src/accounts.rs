//! # Account Store Boundary
//!
//! The server never touches persistence directly. It talks to two traits:
//!
//! ```text
//! Lobby ──► CredentialStore::authenticate   (login)
//! Lobby ──► ProfileStore::load              (pairing, fresh level)
//! Supervisor ──► ProfileStore::save         (settlement)
//! ```
//!
//! [`MemoryAccounts`] implements both for tests and the simulation binary.

use std::collections::HashMap;
use std::sync::atomic::{AtomicU64, Ordering};

use bastion_rules::LevelState;
use parking_lot::RwLock;
use serde::{Deserialize, Serialize};

use crate::error::{StoreError, StoreResult};

/// Persistent player record.
#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
pub struct PlayerProfile {
    /// Unique username.
    pub username: String,
    /// Level and EXP.
    pub progress: LevelState,
}

impl PlayerProfile {
    /// Fresh level-1 profile.
    #[must_use]
    pub fn new(username: impl Into<String>) -> Self {
        Self { username: username.into(), progress: LevelState::NEW }
    }
}

/// Maps username + secret to a profile.
pub trait CredentialStore: Send + Sync {
    /// Checks credentials.
    ///
    /// # Errors
    ///
    /// `InvalidCredentials` on mismatch.
    fn authenticate(&self, username: &str, secret: &str) -> StoreResult<PlayerProfile>;
}

/// Reads and writes profiles.
pub trait ProfileStore: Send + Sync {
    /// Loads the current profile.
    ///
    /// # Errors
    ///
    /// `UnknownPlayer` if absent.
    fn load(&self, username: &str) -> StoreResult<PlayerProfile>;

    /// Persists a profile.
    ///
    /// # Errors
    ///
    /// `UnknownPlayer` if absent, `Unavailable` on backend failure.
    fn save(&self, profile: &PlayerProfile) -> StoreResult<()>;
}

#[derive(Clone, Debug)]
struct Account {
    secret: String,
    profile: PlayerProfile,
}

/// In-memory accounts.
#[derive(Debug, Default)]
pub struct MemoryAccounts {
    accounts: RwLock<HashMap<String, Account>>,
    saves: AtomicU64,
}

impl MemoryAccounts {
    /// Empty store.
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// Adds or replaces an account.
    pub fn register(&self, username: &str, secret: &str, progress: LevelState) {
        let profile = PlayerProfile { username: username.to_owned(), progress };
        self.accounts
            .write()
            .insert(username.to_owned(), Account { secret: secret.to_owned(), profile });
    }

    /// Builder form of [`Self::register`] at level 1.
    #[must_use]
    pub fn with_account(self, username: &str, secret: &str) -> Self {
        self.register(username, secret, LevelState::NEW);
        self
    }

    /// Number of successful saves so far.
    #[must_use]
    pub fn save_count(&self) -> u64 {
        self.saves.load(Ordering::Relaxed)
    }
}

impl CredentialStore for MemoryAccounts {
    fn authenticate(&self, username: &str, secret: &str) -> StoreResult<PlayerProfile> {
        let accounts = self.accounts.read();
        match accounts.get(username) {
            Some(account) if account.secret == secret => Ok(account.profile.clone()),
            _ => Err(StoreError::InvalidCredentials),
        }
    }
}

impl ProfileStore for MemoryAccounts {
    fn load(&self, username: &str) -> StoreResult<PlayerProfile> {
        self.accounts
            .read()
            .get(username)
            .map(|a| a.profile.clone())
            .ok_or_else(|| StoreError::UnknownPlayer(username.to_owned()))
    }

    fn save(&self, profile: &PlayerProfile) -> StoreResult<()> {
        let mut accounts = self.accounts.write();
        let account = accounts
            .get_mut(&profile.username)
            .ok_or_else(|| StoreError::UnknownPlayer(profile.username.clone()))?;
        account.profile = profile.clone();
        self.saves.fetch_add(1, Ordering::Relaxed);
        Ok(())
    }
}
