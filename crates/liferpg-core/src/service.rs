//! The engine facade handed to the HTTP layer.
//!
//! [`GameService`] owns the injected store, clock, and retry policy. The
//! mutating operations live in [`crate::completion`] and
//! [`crate::redemption`]; this module carries the read paths, account
//! registration, and the ledger audit.

use liferpg_db::{DbError, Store};
use liferpg_ledger::{ReconciliationResult, level_progress, reconcile};
use liferpg_types::{UserAccount, UserId, UserProgress};
use tracing::{info, warn};

use crate::clock::Clock;
use crate::error::GameError;
use crate::retry::RetryPolicy;

/// Longest accepted username, in characters.
const MAX_USERNAME_CHARS: usize = 64;

/// Gamification engines bound to one store and one clock.
#[derive(Debug)]
pub struct GameService<S, C> {
    pub(crate) store: S,
    pub(crate) clock: C,
    pub(crate) retry: RetryPolicy,
}

impl<S: Store, C: Clock> GameService<S, C> {
    /// Create a service with the default retry policy.
    pub fn new(store: S, clock: C) -> Self {
        Self {
            store,
            clock,
            retry: RetryPolicy::default(),
        }
    }

    /// Replace the retry policy.
    #[must_use]
    pub const fn with_retry(mut self, retry: RetryPolicy) -> Self {
        self.retry = retry;
        self
    }

    /// The underlying store.
    pub const fn store(&self) -> &S {
        &self.store
    }

    /// The injected clock.
    pub const fn clock(&self) -> &C {
        &self.clock
    }

    /// Create an account at gold 0, exp 0, level 1.
    ///
    /// # Errors
    ///
    /// - [`GameError::InvalidInput`] for a blank or overlong username
    /// - [`GameError::UsernameTaken`] if the name is registered
    /// - [`GameError::Storage`] on datastore failure
    pub async fn register_user(&self, username: &str) -> Result<UserAccount, GameError> {
        let username = username.trim();
        if username.is_empty() {
            return Err(GameError::InvalidInput("username must not be empty".to_owned()));
        }
        if username.chars().count() > MAX_USERNAME_CHARS {
            return Err(GameError::InvalidInput(format!(
                "username must be at most {MAX_USERNAME_CHARS} characters"
            )));
        }

        let account = UserAccount::new(username.to_owned(), self.clock.now());
        match self.store.create_user(&account).await {
            Ok(()) => {}
            Err(DbError::UniqueViolation(_)) => {
                return Err(GameError::UsernameTaken(username.to_owned()));
            }
            Err(e) => return Err(e.into()),
        }

        info!(user_id = %account.id, username = %account.username, "User registered");
        Ok(account)
    }

    /// Current balances, level, and progress through the level.
    ///
    /// Read-only and outside any transaction.
    ///
    /// # Errors
    ///
    /// [`GameError::NotFound`] for an unknown user, [`GameError::Storage`]
    /// on datastore failure.
    pub async fn user_progress(&self, user_id: UserId) -> Result<UserProgress, GameError> {
        let account = self.load_user(user_id).await?;
        Ok(UserProgress {
            user_id: account.id,
            gold: account.gold,
            exp: account.exp,
            level: account.level,
            progress: level_progress(account.exp),
        })
    }

    /// Check that the user's ledger accounts for their current balances.
    ///
    /// # Errors
    ///
    /// [`GameError::NotFound`] for an unknown user, [`GameError::Storage`]
    /// on datastore failure. A drift is reported in the `Ok` value.
    pub async fn audit_user(&self, user_id: UserId) -> Result<ReconciliationResult, GameError> {
        let account = self.load_user(user_id).await?;
        let entries = self.store.ledger_for_user(user_id).await?;
        let result = reconcile(&account, &entries);
        if result.is_balanced() {
            info!(%user_id, entries = entries.len(), "Ledger audit balanced");
        } else {
            warn!(%user_id, entries = entries.len(), "Ledger audit found drift");
        }
        Ok(result)
    }

    async fn load_user(&self, user_id: UserId) -> Result<UserAccount, GameError> {
        self.store
            .user(user_id)
            .await?
            .ok_or(GameError::NotFound {
                entity: "user",
                id: user_id.into_inner(),
            })
    }
}
