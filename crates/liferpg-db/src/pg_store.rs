//! `PostgreSQL` implementation of [`Store`].
//!
//! Transactions run at `READ COMMITTED` with explicit row locks: users and
//! rewards are read with `SELECT ... FOR UPDATE`, so every check that
//! follows a lock sees the latest committed row and no other transaction
//! can change it before commit. The `task_completions` unique index on
//! `(user_id, task_id, period_key)` backs the eligibility gate at the
//! storage level.
//!
//! Each transaction sets `lock_timeout`, so lock waits are bounded and a
//! timeout surfaces as [`DbError::Conflict`].

use liferpg_types::{
    CompletionPeriod, CompletionRecord, LedgerEntry, LedgerEntryId, Reward, RewardId, Stock,
    Task, TaskId, UserAccount, UserId,
};
use sqlx::{Postgres, Transaction};

use crate::error::DbError;
use crate::ledger_store::{insert_entry, LedgerStore};
use crate::postgres::PostgresPool;
use crate::rows::{stock_to_db, RewardRow, TaskRow, UserRow};
use crate::store::{ProgressUpdate, Store, StoreTx};

/// Columns selected for a [`UserRow`].
const USER_COLUMNS: &str = "id, username, gold, exp, level, created_at, updated_at";

/// [`Store`] backed by a `PostgreSQL` pool.
#[derive(Clone)]
pub struct PgStore {
    pool: PostgresPool,
}

impl PgStore {
    /// Wrap a connected pool.
    pub const fn new(pool: PostgresPool) -> Self {
        Self { pool }
    }

    /// The underlying pool.
    pub const fn pool(&self) -> &PostgresPool {
        &self.pool
    }
}

impl Store for PgStore {
    type Tx = PgTx;

    async fn begin(&self) -> Result<PgTx, DbError> {
        let mut tx = self.pool.pool().begin().await?;

        let timeout_ms = u64::try_from(self.pool.lock_timeout().as_millis()).unwrap_or(u64::MAX);
        let statement = format!("SET LOCAL lock_timeout = '{timeout_ms}ms'");
        sqlx::query(&statement).execute(&mut *tx).await?;

        Ok(PgTx { tx })
    }

    async fn user(&self, id: UserId) -> Result<Option<UserAccount>, DbError> {
        let row = sqlx::query_as::<_, UserRow>(&format!(
            "SELECT {USER_COLUMNS} FROM users WHERE id = $1"
        ))
        .bind(id.into_inner())
        .fetch_optional(self.pool.pool())
        .await?;

        row.map(UserAccount::try_from).transpose()
    }

    async fn ledger_for_user(&self, id: UserId) -> Result<Vec<LedgerEntry>, DbError> {
        LedgerStore::new(self.pool.pool()).entries_for_user(id).await
    }

    async fn create_user(&self, account: &UserAccount) -> Result<(), DbError> {
        let level = i32::try_from(account.level)
            .map_err(|e| DbError::CorruptRow(format!("level {}: {e}", account.level)))?;

        sqlx::query(
            r"INSERT INTO users (id, username, gold, exp, level, created_at, updated_at)
              VALUES ($1, $2, $3, $4, $5, $6, $7)",
        )
        .bind(account.id.into_inner())
        .bind(&account.username)
        .bind(account.gold)
        .bind(account.exp)
        .bind(level)
        .bind(account.created_at)
        .bind(account.updated_at)
        .execute(self.pool.pool())
        .await?;

        tracing::debug!(user_id = %account.id, "Created user account");
        Ok(())
    }
}

/// An open `PostgreSQL` transaction.
///
/// Dropping it without calling [`StoreTx::commit`] rolls back.
pub struct PgTx {
    tx: Transaction<'static, Postgres>,
}

impl StoreTx for PgTx {
    async fn lock_user(&mut self, id: UserId) -> Result<Option<UserAccount>, DbError> {
        let row = sqlx::query_as::<_, UserRow>(&format!(
            "SELECT {USER_COLUMNS} FROM users WHERE id = $1 FOR UPDATE"
        ))
        .bind(id.into_inner())
        .fetch_optional(&mut *self.tx)
        .await?;

        row.map(UserAccount::try_from).transpose()
    }

    async fn task(&mut self, id: TaskId) -> Result<Option<Task>, DbError> {
        let row = sqlx::query_as::<_, TaskRow>(
            r"SELECT id, title, description, gold_reward, exp_reward, kind::TEXT as kind, is_active
              FROM tasks
              WHERE id = $1",
        )
        .bind(id.into_inner())
        .fetch_optional(&mut *self.tx)
        .await?;

        row.map(Task::try_from).transpose()
    }

    async fn has_completion(
        &mut self,
        user_id: UserId,
        task_id: TaskId,
        period: CompletionPeriod,
    ) -> Result<bool, DbError> {
        let exists = sqlx::query_scalar::<_, bool>(
            r"SELECT EXISTS (
                  SELECT 1 FROM task_completions
                  WHERE user_id = $1 AND task_id = $2 AND period_key = $3
              )",
        )
        .bind(user_id.into_inner())
        .bind(task_id.into_inner())
        .bind(period.key())
        .fetch_one(&mut *self.tx)
        .await?;

        Ok(exists)
    }

    async fn insert_completion(&mut self, record: &CompletionRecord) -> Result<(), DbError> {
        sqlx::query(
            r"INSERT INTO task_completions (id, user_id, task_id, period_key, completed_at)
              VALUES ($1, $2, $3, $4, $5)",
        )
        .bind(record.id.into_inner())
        .bind(record.user_id.into_inner())
        .bind(record.task_id.into_inner())
        .bind(record.period.key())
        .bind(record.completed_at)
        .execute(&mut *self.tx)
        .await?;

        tracing::debug!(
            user_id = %record.user_id,
            task_id = %record.task_id,
            period = %record.period.key(),
            "Inserted completion record"
        );
        Ok(())
    }

    async fn update_user_progress(
        &mut self,
        id: UserId,
        update: ProgressUpdate,
    ) -> Result<(), DbError> {
        let level = i32::try_from(update.level)
            .map_err(|e| DbError::CorruptRow(format!("level {}: {e}", update.level)))?;

        let result = sqlx::query(
            r"UPDATE users SET gold = $2, exp = $3, level = $4, updated_at = $5
              WHERE id = $1",
        )
        .bind(id.into_inner())
        .bind(update.gold)
        .bind(update.exp)
        .bind(level)
        .bind(update.updated_at)
        .execute(&mut *self.tx)
        .await?;

        if result.rows_affected() == 0 {
            return Err(DbError::NotFound(format!("user {id}")));
        }
        Ok(())
    }

    async fn lock_reward(&mut self, id: RewardId) -> Result<Option<Reward>, DbError> {
        let row = sqlx::query_as::<_, RewardRow>(
            r"SELECT id, title, description, cost, stock, is_active
              FROM rewards
              WHERE id = $1
              FOR UPDATE",
        )
        .bind(id.into_inner())
        .fetch_optional(&mut *self.tx)
        .await?;

        row.map(Reward::try_from).transpose()
    }

    async fn set_reward_stock(&mut self, id: RewardId, stock: Stock) -> Result<(), DbError> {
        let result = sqlx::query("UPDATE rewards SET stock = $2 WHERE id = $1")
            .bind(id.into_inner())
            .bind(stock_to_db(stock)?)
            .execute(&mut *self.tx)
            .await?;

        if result.rows_affected() == 0 {
            return Err(DbError::NotFound(format!("reward {id}")));
        }
        tracing::debug!(reward_id = %id, ?stock, "Updated reward stock");
        Ok(())
    }

    async fn append_ledger(&mut self, entry: &LedgerEntry) -> Result<LedgerEntryId, DbError> {
        insert_entry(&mut self.tx, entry).await
    }

    async fn commit(self) -> Result<(), DbError> {
        self.tx.commit().await?;
        Ok(())
    }
}
