//! Core record structs for the gamification core.
//!
//! Accounts, task and reward definitions, completion records, ledger
//! entries, and the result summaries returned to the HTTP layer.

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use ts_rs::TS;
use uuid::Uuid;

use crate::enums::{CompletionPeriod, LedgerEntryKind, RefKind, Stock, TaskKind};
use crate::ids::{CompletionId, LedgerEntryId, RewardId, TaskId, UserId};

// ---------------------------------------------------------------------------
// User account
// ---------------------------------------------------------------------------

/// Mutable balance and level fields of a user.
///
/// Created at registration with zero gold, zero exp and level 1. Only the
/// task completion and reward redemption engines mutate it.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize, TS)]
#[ts(export, export_to = "bindings/")]
pub struct UserAccount {
    /// Unique user identifier.
    pub id: UserId,
    /// Display name.
    pub username: String,
    /// Spendable gold (never negative).
    pub gold: i64,
    /// Cumulative experience (never decreases).
    pub exp: i64,
    /// Level derived from `exp`, in `[1, 100]`.
    pub level: u32,
    /// When the account was created.
    pub created_at: DateTime<Utc>,
    /// When the balances last changed.
    pub updated_at: DateTime<Utc>,
}

impl UserAccount {
    /// A freshly registered account.
    pub fn new(username: String, now: DateTime<Utc>) -> Self {
        Self {
            id: UserId::new(),
            username,
            gold: 0,
            exp: 0,
            level: 1,
            created_at: now,
            updated_at: now,
        }
    }
}

// ---------------------------------------------------------------------------
// Definitions (read-only to the engines)
// ---------------------------------------------------------------------------

/// A completable unit of work that grants gold and exp.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize, TS)]
#[ts(export, export_to = "bindings/")]
pub struct Task {
    /// Unique task identifier.
    pub id: TaskId,
    /// Short title shown to the player.
    pub title: String,
    /// Longer description.
    pub description: String,
    /// Gold granted on completion.
    pub gold_reward: i64,
    /// Exp granted on completion.
    pub exp_reward: i64,
    /// Recurrence kind.
    pub kind: TaskKind,
    /// Inactive tasks cannot be completed.
    pub is_active: bool,
}

/// A purchasable item priced in gold.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize, TS)]
#[ts(export, export_to = "bindings/")]
pub struct Reward {
    /// Unique reward identifier.
    pub id: RewardId,
    /// Short title shown to the player.
    pub title: String,
    /// Longer description.
    pub description: String,
    /// Price in gold.
    pub cost: i64,
    /// Remaining stock.
    pub stock: Stock,
    /// Inactive rewards cannot be purchased.
    pub is_active: bool,
}

// ---------------------------------------------------------------------------
// Completion record
// ---------------------------------------------------------------------------

/// Proof that a task's reward was granted to a user for one period.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize, TS)]
#[ts(export, export_to = "bindings/")]
pub struct CompletionRecord {
    /// Unique record identifier.
    pub id: CompletionId,
    /// The user who completed the task.
    pub user_id: UserId,
    /// The completed task.
    pub task_id: TaskId,
    /// The eligibility period this record occupies.
    pub period: CompletionPeriod,
    /// When the completion happened.
    pub completed_at: DateTime<Utc>,
}

// ---------------------------------------------------------------------------
// Ledger entry
// ---------------------------------------------------------------------------

/// An immutable record of one balance change.
///
/// The ledger is append-only. For each user, the sum of `gold_in` minus
/// `gold_out` amounts equals the current gold balance, and the sum of
/// `exp_in` amounts equals the current exp.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize, TS)]
#[ts(export, export_to = "bindings/")]
pub struct LedgerEntry {
    /// Unique entry identifier.
    pub id: LedgerEntryId,
    /// The user whose balance changed.
    pub user_id: UserId,
    /// Direction and currency of the change.
    pub kind: LedgerEntryKind,
    /// Amount moved (always positive).
    pub amount: i64,
    /// Balance of the affected currency after the change.
    pub balance: i64,
    /// Human-readable description (e.g. `"Completed task: Run"`).
    pub description: String,
    /// Kind of record that caused the change.
    pub ref_kind: RefKind,
    /// Identifier of the task or reward that caused the change.
    pub ref_id: Uuid,
    /// Real-world timestamp.
    pub created_at: DateTime<Utc>,
}

// ---------------------------------------------------------------------------
// Results returned to the HTTP layer
// ---------------------------------------------------------------------------

/// Summary of a successful task completion.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize, TS)]
#[ts(export, export_to = "bindings/")]
pub struct CompletionOutcome {
    /// The completed task.
    pub task_id: TaskId,
    /// Gold granted.
    pub gold_reward: i64,
    /// Exp granted.
    pub exp_reward: i64,
    /// Gold balance after the grant.
    pub new_gold: i64,
    /// Exp after the grant.
    pub new_exp: i64,
    /// Level after the grant.
    pub new_level: u32,
    /// True iff the new level is higher than the previous one.
    pub leveled_up: bool,
}

/// Summary of a successful reward purchase.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize, TS)]
#[ts(export, export_to = "bindings/")]
pub struct PurchaseOutcome {
    /// The purchased reward.
    pub reward_id: RewardId,
    /// Gold spent.
    pub cost: i64,
    /// Gold balance after the purchase.
    pub new_gold: i64,
    /// Title of the purchased reward.
    pub reward_title: String,
    /// Stock left after the purchase.
    pub remaining_stock: Stock,
}

/// Where a user stands inside their current level.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize, TS)]
#[ts(export, export_to = "bindings/")]
pub struct LevelProgress {
    /// Current level.
    pub level: u32,
    /// Cumulative exp at which the current level began.
    pub level_floor_exp: i64,
    /// Exp needed to go from the start of this level to the next.
    pub level_span_exp: i64,
    /// Exp earned since the start of this level.
    pub exp_into_level: i64,
    /// Whole-number percentage through the level, `0..=100`.
    pub percent: u8,
}

/// Read-only view of a user's balances.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize, TS)]
#[ts(export, export_to = "bindings/")]
pub struct UserProgress {
    /// The user.
    pub user_id: UserId,
    /// Gold balance.
    pub gold: i64,
    /// Cumulative exp.
    pub exp: i64,
    /// Current level.
    pub level: u32,
    /// Progress through the current level.
    pub progress: LevelProgress,
}
