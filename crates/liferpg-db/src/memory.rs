//! In-memory implementation of [`Store`].
//!
//! Used by the test suites and as a development backend when no database
//! is configured. Transactions are fully serialized: [`MemoryStore::begin`]
//! takes an owned lock over the whole state, mutations apply to a private
//! working copy, and [`StoreTx::commit`] publishes the copy. Dropping a
//! [`MemoryTx`] without committing discards the copy, which gives the same
//! all-or-nothing behavior as a rolled-back database transaction.
//!
//! [`MemoryStore::inject_commit_conflicts`] and
//! [`MemoryStore::set_fail_ledger_appends`] let tests inject commit
//! conflicts and mid-transaction write failures.

use std::collections::BTreeMap;
use std::sync::atomic::{AtomicBool, AtomicU32, Ordering};
use std::sync::Arc;

use liferpg_types::{
    CompletionPeriod, CompletionRecord, LedgerEntry, LedgerEntryId, Reward, RewardId, Stock,
    Task, TaskId, UserAccount, UserId,
};
use tokio::sync::{Mutex, OwnedMutexGuard};

use crate::error::DbError;
use crate::store::{ProgressUpdate, Store, StoreTx};

/// Everything the in-memory store holds.
#[derive(Debug, Clone, Default)]
pub struct MemoryState {
    /// User accounts by id.
    pub users: BTreeMap<UserId, UserAccount>,
    /// Task definitions by id.
    pub tasks: BTreeMap<TaskId, Task>,
    /// Reward definitions by id.
    pub rewards: BTreeMap<RewardId, Reward>,
    /// Completion records in insertion order.
    pub completions: Vec<CompletionRecord>,
    /// Ledger entries in insertion order.
    pub ledger: Vec<LedgerEntry>,
}

/// Failures to inject into upcoming transactions.
#[derive(Debug, Default)]
struct FaultPlan {
    /// Upcoming commits that fail with [`DbError::Conflict`].
    commit_conflicts: AtomicU32,
    /// Every ledger append fails with [`DbError::WriteFailed`] while set.
    fail_ledger_appends: AtomicBool,
}

/// [`Store`] holding its state in process memory.
#[derive(Debug, Clone, Default)]
pub struct MemoryStore {
    state: Arc<Mutex<MemoryState>>,
    faults: Arc<FaultPlan>,
}

impl MemoryStore {
    /// Create an empty store.
    pub fn new() -> Self {
        Self::default()
    }

    /// Make the next `count` commits fail with a conflict.
    pub fn inject_commit_conflicts(&self, count: u32) {
        self.faults.commit_conflicts.store(count, Ordering::SeqCst);
    }

    /// Make ledger appends fail until cleared.
    pub fn set_fail_ledger_appends(&self, fail: bool) {
        self.faults.fail_ledger_appends.store(fail, Ordering::SeqCst);
    }

    /// Insert or replace a task definition.
    pub async fn put_task(&self, task: Task) {
        self.state.lock().await.tasks.insert(task.id, task);
    }

    /// Insert or replace a reward definition.
    pub async fn put_reward(&self, reward: Reward) {
        self.state.lock().await.rewards.insert(reward.id, reward);
    }

    /// Insert or replace a user account as-is.
    pub async fn put_user(&self, account: UserAccount) {
        self.state.lock().await.users.insert(account.id, account);
    }

    /// Read a reward definition.
    pub async fn reward(&self, id: RewardId) -> Option<Reward> {
        self.state.lock().await.rewards.get(&id).cloned()
    }

    /// A copy of the committed state.
    pub async fn snapshot(&self) -> MemoryState {
        self.state.lock().await.clone()
    }
}

impl Store for MemoryStore {
    type Tx = MemoryTx;

    async fn begin(&self) -> Result<MemoryTx, DbError> {
        let guard = Arc::clone(&self.state).lock_owned().await;
        let working = guard.clone();
        Ok(MemoryTx {
            guard,
            working,
            faults: Arc::clone(&self.faults),
        })
    }

    async fn user(&self, id: UserId) -> Result<Option<UserAccount>, DbError> {
        Ok(self.state.lock().await.users.get(&id).cloned())
    }

    async fn ledger_for_user(&self, id: UserId) -> Result<Vec<LedgerEntry>, DbError> {
        let state = self.state.lock().await;
        Ok(state
            .ledger
            .iter()
            .filter(|e| e.user_id == id)
            .cloned()
            .collect())
    }

    async fn create_user(&self, account: &UserAccount) -> Result<(), DbError> {
        let mut state = self.state.lock().await;
        if state.users.values().any(|u| u.username == account.username) {
            return Err(DbError::UniqueViolation(format!(
                "username {} already taken",
                account.username
            )));
        }
        state.users.insert(account.id, account.clone());
        Ok(())
    }
}

/// An open in-memory transaction.
#[derive(Debug)]
pub struct MemoryTx {
    guard: OwnedMutexGuard<MemoryState>,
    working: MemoryState,
    faults: Arc<FaultPlan>,
}

impl StoreTx for MemoryTx {
    async fn lock_user(&mut self, id: UserId) -> Result<Option<UserAccount>, DbError> {
        Ok(self.working.users.get(&id).cloned())
    }

    async fn task(&mut self, id: TaskId) -> Result<Option<Task>, DbError> {
        Ok(self.working.tasks.get(&id).cloned())
    }

    async fn has_completion(
        &mut self,
        user_id: UserId,
        task_id: TaskId,
        period: CompletionPeriod,
    ) -> Result<bool, DbError> {
        Ok(self
            .working
            .completions
            .iter()
            .any(|c| c.user_id == user_id && c.task_id == task_id && c.period == period))
    }

    async fn insert_completion(&mut self, record: &CompletionRecord) -> Result<(), DbError> {
        let occupied = self.working.completions.iter().any(|c| {
            c.user_id == record.user_id && c.task_id == record.task_id && c.period == record.period
        });
        if occupied {
            return Err(DbError::UniqueViolation(format!(
                "completion of task {} by user {} for {}",
                record.task_id,
                record.user_id,
                record.period.key()
            )));
        }
        self.working.completions.push(record.clone());
        Ok(())
    }

    async fn update_user_progress(
        &mut self,
        id: UserId,
        update: ProgressUpdate,
    ) -> Result<(), DbError> {
        let user = self
            .working
            .users
            .get_mut(&id)
            .ok_or_else(|| DbError::NotFound(format!("user {id}")))?;
        user.gold = update.gold;
        user.exp = update.exp;
        user.level = update.level;
        user.updated_at = update.updated_at;
        Ok(())
    }

    async fn lock_reward(&mut self, id: RewardId) -> Result<Option<Reward>, DbError> {
        Ok(self.working.rewards.get(&id).cloned())
    }

    async fn set_reward_stock(&mut self, id: RewardId, stock: Stock) -> Result<(), DbError> {
        let reward = self
            .working
            .rewards
            .get_mut(&id)
            .ok_or_else(|| DbError::NotFound(format!("reward {id}")))?;
        reward.stock = stock;
        Ok(())
    }

    async fn append_ledger(&mut self, entry: &LedgerEntry) -> Result<LedgerEntryId, DbError> {
        if self.faults.fail_ledger_appends.load(Ordering::SeqCst) {
            return Err(DbError::WriteFailed("injected ledger append failure".to_owned()));
        }
        self.working.ledger.push(entry.clone());
        Ok(entry.id)
    }

    async fn commit(mut self) -> Result<(), DbError> {
        let injected = self
            .faults
            .commit_conflicts
            .fetch_update(Ordering::SeqCst, Ordering::SeqCst, |n| n.checked_sub(1));
        if injected.is_ok() {
            return Err(DbError::Conflict("injected commit conflict".to_owned()));
        }

        *self.guard = self.working;
        Ok(())
    }
}

#[cfg(test)]
#[allow(clippy::unwrap_used)]
mod tests {
    use chrono::Utc;
    use liferpg_types::{LedgerEntryKind, RefKind, TaskKind};

    use super::*;

    fn task() -> Task {
        Task {
            id: TaskId::new(),
            title: "Stretch".to_owned(),
            description: String::new(),
            gold_reward: 5,
            exp_reward: 10,
            kind: TaskKind::Once,
            is_active: true,
        }
    }

    fn entry(user_id: UserId) -> LedgerEntry {
        LedgerEntry {
            id: LedgerEntryId::new(),
            user_id,
            kind: LedgerEntryKind::GoldIn,
            amount: 5,
            balance: 5,
            description: "Completed task: Stretch".to_owned(),
            ref_kind: RefKind::Task,
            ref_id: uuid::Uuid::now_v7(),
            created_at: Utc::now(),
        }
    }

    #[tokio::test]
    async fn committed_writes_are_visible() {
        let store = MemoryStore::new();
        let account = UserAccount::new("kai".to_owned(), Utc::now());
        store.create_user(&account).await.unwrap();

        let mut tx = store.begin().await.unwrap();
        tx.append_ledger(&entry(account.id)).await.unwrap();
        tx.commit().await.unwrap();

        assert_eq!(store.ledger_for_user(account.id).await.unwrap().len(), 1);
    }

    #[tokio::test]
    async fn dropped_transaction_rolls_back() {
        let store = MemoryStore::new();
        let account = UserAccount::new("kai".to_owned(), Utc::now());
        store.create_user(&account).await.unwrap();

        {
            let mut tx = store.begin().await.unwrap();
            tx.append_ledger(&entry(account.id)).await.unwrap();
            // Dropped without commit.
        }

        assert!(store.ledger_for_user(account.id).await.unwrap().is_empty());
    }

    #[tokio::test]
    async fn duplicate_completion_period_is_rejected() {
        let store = MemoryStore::new();
        let t = task();
        store.put_task(t.clone()).await;
        let user_id = UserId::new();
        let record = CompletionRecord {
            id: liferpg_types::CompletionId::new(),
            user_id,
            task_id: t.id,
            period: CompletionPeriod::Once,
            completed_at: Utc::now(),
        };

        let mut tx = store.begin().await.unwrap();
        tx.insert_completion(&record).await.unwrap();
        let mut second = record.clone();
        second.id = liferpg_types::CompletionId::new();
        let err = tx.insert_completion(&second).await.unwrap_err();
        assert!(matches!(err, DbError::UniqueViolation(_)));
    }

    #[tokio::test]
    async fn injected_conflict_fails_commit_once() {
        let store = MemoryStore::new();
        store.inject_commit_conflicts(1);

        let tx = store.begin().await.unwrap();
        assert!(tx.commit().await.unwrap_err().is_conflict());

        let tx = store.begin().await.unwrap();
        assert!(tx.commit().await.is_ok());
    }

    #[tokio::test]
    async fn usernames_are_unique() {
        let store = MemoryStore::new();
        let now = Utc::now();
        store
            .create_user(&UserAccount::new("kai".to_owned(), now))
            .await
            .unwrap();
        let err = store
            .create_user(&UserAccount::new("kai".to_owned(), now))
            .await
            .unwrap_err();
        assert!(matches!(err, DbError::UniqueViolation(_)));
    }
}
