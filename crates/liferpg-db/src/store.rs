//! The storage seam the engines are written against.
//!
//! [`Store`] hands out [`StoreTx`] transactions. A transaction is a scoped
//! acquisition: every mutation made through it becomes visible only when
//! [`StoreTx::commit`] succeeds, and dropping it on any other path (an
//! early `?` return, a panic, a cancelled future) rolls everything back.
//!
//! Row locking is part of the contract. [`StoreTx::lock_user`] and
//! [`StoreTx::lock_reward`] return a freshly read row and hold it until
//! the transaction ends, so concurrent transactions touching the same user
//! or reward are serialized.

use std::future::Future;

use chrono::{DateTime, Utc};
use liferpg_types::{
    CompletionPeriod, CompletionRecord, LedgerEntry, LedgerEntryId, Reward, RewardId, Stock,
    Task, TaskId, UserAccount, UserId,
};

use crate::error::DbError;

/// New balance fields for a user, written in one statement.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct ProgressUpdate {
    /// New gold balance.
    pub gold: i64,
    /// New cumulative exp.
    pub exp: i64,
    /// New level.
    pub level: u32,
    /// Timestamp of the change.
    pub updated_at: DateTime<Utc>,
}

/// A handle to the authoritative datastore.
pub trait Store: Send + Sync {
    /// Transaction type produced by [`Store::begin`].
    type Tx: StoreTx;

    /// Open a new transaction.
    fn begin(&self) -> impl Future<Output = Result<Self::Tx, DbError>> + Send;

    /// Read a user account without locking it.
    fn user(
        &self,
        id: UserId,
    ) -> impl Future<Output = Result<Option<UserAccount>, DbError>> + Send;

    /// All ledger entries of a user, oldest first.
    fn ledger_for_user(
        &self,
        id: UserId,
    ) -> impl Future<Output = Result<Vec<LedgerEntry>, DbError>> + Send;

    /// Persist a newly registered account.
    fn create_user(
        &self,
        account: &UserAccount,
    ) -> impl Future<Output = Result<(), DbError>> + Send;
}

/// One open transaction.
pub trait StoreTx: Send {
    /// Read and lock a user row for the rest of the transaction.
    fn lock_user(
        &mut self,
        id: UserId,
    ) -> impl Future<Output = Result<Option<UserAccount>, DbError>> + Send;

    /// Read a task definition.
    fn task(&mut self, id: TaskId) -> impl Future<Output = Result<Option<Task>, DbError>> + Send;

    /// Whether a completion record already occupies `period`.
    fn has_completion(
        &mut self,
        user_id: UserId,
        task_id: TaskId,
        period: CompletionPeriod,
    ) -> impl Future<Output = Result<bool, DbError>> + Send;

    /// Insert a completion record.
    ///
    /// Fails with [`DbError::UniqueViolation`] if the period is already
    /// occupied for this user and task.
    fn insert_completion(
        &mut self,
        record: &CompletionRecord,
    ) -> impl Future<Output = Result<(), DbError>> + Send;

    /// Overwrite a user's gold, exp and level.
    fn update_user_progress(
        &mut self,
        id: UserId,
        update: ProgressUpdate,
    ) -> impl Future<Output = Result<(), DbError>> + Send;

    /// Read and lock a reward row for the rest of the transaction.
    fn lock_reward(
        &mut self,
        id: RewardId,
    ) -> impl Future<Output = Result<Option<Reward>, DbError>> + Send;

    /// Overwrite a reward's stock.
    fn set_reward_stock(
        &mut self,
        id: RewardId,
        stock: Stock,
    ) -> impl Future<Output = Result<(), DbError>> + Send;

    /// Append an entry to the ledger.
    fn append_ledger(
        &mut self,
        entry: &LedgerEntry,
    ) -> impl Future<Output = Result<LedgerEntryId, DbError>> + Send;

    /// Commit every change made through this transaction.
    fn commit(self) -> impl Future<Output = Result<(), DbError>> + Send;
}
