//! Ledger persistence: appending entries and reading a user's history.
//!
//! Entries are appended inside the engine's transaction, one row per
//! balance change. The `ledger` table rejects `UPDATE` and `DELETE` with a
//! trigger, so nothing written here can be rewritten later.

use liferpg_types::{LedgerEntry, LedgerEntryId, UserId};
use sqlx::{PgConnection, PgPool};
use uuid::Uuid;

use crate::error::DbError;
use crate::rows::{ledger_entry_kind_from_db, ledger_entry_kind_to_db, ref_kind_from_db, ref_kind_to_db};

/// Insert one ledger entry on an open connection or transaction.
///
/// # Errors
///
/// Returns [`DbError`] if the insert fails; nothing is partially written.
pub async fn insert_entry(
    conn: &mut PgConnection,
    entry: &LedgerEntry,
) -> Result<LedgerEntryId, DbError> {
    sqlx::query(
        r"INSERT INTO ledger (id, user_id, kind, amount, balance, description, ref_kind, ref_id, created_at)
          VALUES ($1, $2, $3::ledger_entry_kind, $4, $5, $6, $7::ref_kind, $8, $9)",
    )
    .bind(entry.id.into_inner())
    .bind(entry.user_id.into_inner())
    .bind(ledger_entry_kind_to_db(entry.kind))
    .bind(entry.amount)
    .bind(entry.balance)
    .bind(&entry.description)
    .bind(ref_kind_to_db(entry.ref_kind))
    .bind(entry.ref_id)
    .bind(entry.created_at)
    .execute(conn)
    .await?;

    tracing::debug!(
        entry_id = %entry.id,
        user_id = %entry.user_id,
        kind = ledger_entry_kind_to_db(entry.kind),
        amount = entry.amount,
        "Appended ledger entry"
    );
    Ok(entry.id)
}

/// Read operations on the `ledger` table.
pub struct LedgerStore<'a> {
    pool: &'a PgPool,
}

impl<'a> LedgerStore<'a> {
    /// Create a new ledger store bound to a connection pool.
    pub const fn new(pool: &'a PgPool) -> Self {
        Self { pool }
    }

    /// All entries of a user in append order.
    ///
    /// Ordered by the `seq` column, not `created_at`: a transaction that
    /// waited on a row lock may carry an earlier timestamp than the entry
    /// it was serialized behind.
    ///
    /// # Errors
    ///
    /// Returns [`DbError::Postgres`] if the query fails, or
    /// [`DbError::CorruptRow`] if a stored enum value is unknown.
    pub async fn entries_for_user(&self, user_id: UserId) -> Result<Vec<LedgerEntry>, DbError> {
        let rows = sqlx::query_as::<_, LedgerRow>(
            r"SELECT id, user_id, kind::TEXT as kind, amount, balance, description, ref_kind::TEXT as ref_kind, ref_id, created_at
              FROM ledger
              WHERE user_id = $1
              ORDER BY seq",
        )
        .bind(user_id.into_inner())
        .fetch_all(self.pool)
        .await?;

        rows.into_iter().map(LedgerEntry::try_from).collect()
    }
}

/// A row from the `ledger` table.
#[derive(Debug, Clone, sqlx::FromRow)]
pub struct LedgerRow {
    /// Ledger entry UUID.
    pub id: Uuid,
    /// User whose balance changed.
    pub user_id: Uuid,
    /// Entry kind as a string (cast from `PostgreSQL` enum).
    pub kind: String,
    /// Amount moved.
    pub amount: i64,
    /// Balance after the change.
    pub balance: i64,
    /// Human-readable description.
    pub description: String,
    /// Reference kind as a string (cast from `PostgreSQL` enum).
    pub ref_kind: String,
    /// Task or reward that caused the change.
    pub ref_id: Uuid,
    /// Real-world timestamp.
    pub created_at: chrono::DateTime<chrono::Utc>,
}

impl TryFrom<LedgerRow> for LedgerEntry {
    type Error = DbError;

    fn try_from(row: LedgerRow) -> Result<Self, Self::Error> {
        Ok(Self {
            id: LedgerEntryId::from(row.id),
            user_id: UserId::from(row.user_id),
            kind: ledger_entry_kind_from_db(&row.kind)?,
            amount: row.amount,
            balance: row.balance,
            description: row.description,
            ref_kind: ref_kind_from_db(&row.ref_kind)?,
            ref_id: row.ref_id,
            created_at: row.created_at,
        })
    }
}
