//! Row types read from `PostgreSQL` and their mapping to domain types.
//!
//! `PostgreSQL` enums are selected as `TEXT` and parsed here so the SQL
//! stays free of driver-specific type registration.

use chrono::{DateTime, Utc};
use liferpg_types::{LedgerEntryKind, RefKind, Reward, Stock, Task, TaskKind, UserAccount};
use uuid::Uuid;

use crate::error::DbError;

/// A row from the `users` table.
#[derive(Debug, Clone, sqlx::FromRow)]
pub struct UserRow {
    /// User UUID.
    pub id: Uuid,
    /// Display name.
    pub username: String,
    /// Gold balance.
    pub gold: i64,
    /// Cumulative exp.
    pub exp: i64,
    /// Current level.
    pub level: i32,
    /// Creation timestamp.
    pub created_at: DateTime<Utc>,
    /// Last balance change.
    pub updated_at: DateTime<Utc>,
}

impl TryFrom<UserRow> for UserAccount {
    type Error = DbError;

    fn try_from(row: UserRow) -> Result<Self, Self::Error> {
        let level = u32::try_from(row.level)
            .map_err(|e| DbError::CorruptRow(format!("user {} level {}: {e}", row.id, row.level)))?;
        Ok(Self {
            id: row.id.into(),
            username: row.username,
            gold: row.gold,
            exp: row.exp,
            level,
            created_at: row.created_at,
            updated_at: row.updated_at,
        })
    }
}

/// A row from the `tasks` table.
#[derive(Debug, Clone, sqlx::FromRow)]
pub struct TaskRow {
    /// Task UUID.
    pub id: Uuid,
    /// Title.
    pub title: String,
    /// Description.
    pub description: String,
    /// Gold granted on completion.
    pub gold_reward: i64,
    /// Exp granted on completion.
    pub exp_reward: i64,
    /// Recurrence kind (cast from `PostgreSQL` enum).
    pub kind: String,
    /// Whether the task can be completed.
    pub is_active: bool,
}

impl TryFrom<TaskRow> for Task {
    type Error = DbError;

    fn try_from(row: TaskRow) -> Result<Self, Self::Error> {
        Ok(Self {
            id: row.id.into(),
            kind: task_kind_from_db(&row.kind)?,
            title: row.title,
            description: row.description,
            gold_reward: row.gold_reward,
            exp_reward: row.exp_reward,
            is_active: row.is_active,
        })
    }
}

/// A row from the `rewards` table.
#[derive(Debug, Clone, sqlx::FromRow)]
pub struct RewardRow {
    /// Reward UUID.
    pub id: Uuid,
    /// Title.
    pub title: String,
    /// Description.
    pub description: String,
    /// Price in gold.
    pub cost: i64,
    /// Remaining units; `NULL` means unlimited.
    pub stock: Option<i32>,
    /// Whether the reward can be purchased.
    pub is_active: bool,
}

impl TryFrom<RewardRow> for Reward {
    type Error = DbError;

    fn try_from(row: RewardRow) -> Result<Self, Self::Error> {
        Ok(Self {
            id: row.id.into(),
            stock: stock_from_db(row.stock)?,
            title: row.title,
            description: row.description,
            cost: row.cost,
            is_active: row.is_active,
        })
    }
}

/// Convert a stored stock column to [`Stock`].
pub fn stock_from_db(stock: Option<i32>) -> Result<Stock, DbError> {
    match stock {
        None => Ok(Stock::Unlimited),
        Some(n) => u32::try_from(n)
            .map(Stock::Finite)
            .map_err(|e| DbError::CorruptRow(format!("negative stock {n}: {e}"))),
    }
}

/// Convert a [`Stock`] to its column value.
pub fn stock_to_db(stock: Stock) -> Result<Option<i32>, DbError> {
    match stock {
        Stock::Unlimited => Ok(None),
        Stock::Finite(n) => i32::try_from(n)
            .map(Some)
            .map_err(|e| DbError::CorruptRow(format!("stock {n} out of range: {e}"))),
    }
}

/// Convert a [`TaskKind`] to its `PostgreSQL` enum string.
pub const fn task_kind_to_db(kind: TaskKind) -> &'static str {
    match kind {
        TaskKind::Daily => "daily",
        TaskKind::Once => "once",
    }
}

/// Parse a `task_kind` enum string.
pub fn task_kind_from_db(value: &str) -> Result<TaskKind, DbError> {
    match value {
        "daily" => Ok(TaskKind::Daily),
        "once" => Ok(TaskKind::Once),
        other => Err(DbError::CorruptRow(format!("unknown task kind: {other}"))),
    }
}

/// Convert a [`LedgerEntryKind`] to its `PostgreSQL` enum string.
pub const fn ledger_entry_kind_to_db(kind: LedgerEntryKind) -> &'static str {
    match kind {
        LedgerEntryKind::GoldIn => "gold_in",
        LedgerEntryKind::GoldOut => "gold_out",
        LedgerEntryKind::ExpIn => "exp_in",
    }
}

/// Parse a `ledger_entry_kind` enum string.
pub fn ledger_entry_kind_from_db(value: &str) -> Result<LedgerEntryKind, DbError> {
    match value {
        "gold_in" => Ok(LedgerEntryKind::GoldIn),
        "gold_out" => Ok(LedgerEntryKind::GoldOut),
        "exp_in" => Ok(LedgerEntryKind::ExpIn),
        other => Err(DbError::CorruptRow(format!("unknown ledger entry kind: {other}"))),
    }
}

/// Convert a [`RefKind`] to its `PostgreSQL` enum string.
pub const fn ref_kind_to_db(kind: RefKind) -> &'static str {
    match kind {
        RefKind::Task => "task",
        RefKind::Reward => "reward",
    }
}

/// Parse a `ref_kind` enum string.
pub fn ref_kind_from_db(value: &str) -> Result<RefKind, DbError> {
    match value {
        "task" => Ok(RefKind::Task),
        "reward" => Ok(RefKind::Reward),
        other => Err(DbError::CorruptRow(format!("unknown ref kind: {other}"))),
    }
}
