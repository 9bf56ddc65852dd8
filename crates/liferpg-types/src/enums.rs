//! Enumeration types for the gamification core.
//!
//! Task recurrence, ledger entry kinds, reference kinds, reward stock and
//! the completion period a record occupies.

use chrono::NaiveDate;
use serde::{Deserialize, Serialize};
use ts_rs::TS;

/// Storage key used for the single period of a once-only task.
const ONCE_PERIOD_KEY: &str = "once";

/// Date format used for daily period keys.
const DAY_PERIOD_FORMAT: &str = "%Y-%m-%d";

// ---------------------------------------------------------------------------
// Task recurrence
// ---------------------------------------------------------------------------

/// How often a user may earn a task's reward.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize, TS)]
#[ts(export, export_to = "bindings/")]
#[serde(rename_all = "snake_case")]
pub enum TaskKind {
    /// Completable once per calendar day per user.
    Daily,
    /// Completable at most once ever per user.
    Once,
}

// ---------------------------------------------------------------------------
// Ledger
// ---------------------------------------------------------------------------

/// The currency a ledger entry moves.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize, TS)]
#[ts(export, export_to = "bindings/")]
#[serde(rename_all = "snake_case")]
pub enum Currency {
    /// Spendable gold.
    Gold,
    /// Cumulative experience.
    Exp,
}

/// The category of a balance change in the ledger.
///
/// The signed effect of an entry is implied by its kind; the recorded
/// amount is never negative.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize, TS)]
#[ts(export, export_to = "bindings/")]
#[serde(rename_all = "snake_case")]
pub enum LedgerEntryKind {
    /// Gold credited to the user.
    GoldIn,
    /// Gold debited from the user.
    GoldOut,
    /// Experience credited to the user.
    ExpIn,
}

impl LedgerEntryKind {
    /// The currency this kind of entry moves.
    pub const fn currency(self) -> Currency {
        match self {
            Self::GoldIn | Self::GoldOut => Currency::Gold,
            Self::ExpIn => Currency::Exp,
        }
    }

    /// Whether the entry increases the balance it applies to.
    pub const fn is_credit(self) -> bool {
        matches!(self, Self::GoldIn | Self::ExpIn)
    }
}

/// The kind of record that caused a ledger entry.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize, TS)]
#[ts(export, export_to = "bindings/")]
#[serde(rename_all = "snake_case")]
pub enum RefKind {
    /// A completed task.
    Task,
    /// A redeemed reward.
    Reward,
}

// ---------------------------------------------------------------------------
// Reward stock
// ---------------------------------------------------------------------------

/// Remaining stock of a reward.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize, TS)]
#[ts(export, export_to = "bindings/")]
#[serde(rename_all = "snake_case")]
pub enum Stock {
    /// No stock limit.
    Unlimited,
    /// A finite number of units left.
    Finite(u32),
}

impl Stock {
    /// Whether a finite stock has run out.
    pub const fn is_exhausted(self) -> bool {
        matches!(self, Self::Finite(0))
    }

    /// Stock after one unit is taken, or `None` if nothing is left.
    ///
    /// Unlimited stock is unchanged.
    pub fn take_one(self) -> Option<Self> {
        match self {
            Self::Unlimited => Some(Self::Unlimited),
            Self::Finite(n) => n.checked_sub(1).map(Self::Finite),
        }
    }
}

// ---------------------------------------------------------------------------
// Completion period
// ---------------------------------------------------------------------------

/// The eligibility window a completion record occupies.
///
/// A once-only task has a single period for its whole lifetime. A daily
/// task has one period per calendar day in the reference timezone. At most
/// one completion record exists per (user, task, period).
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize, TS)]
#[ts(export, export_to = "bindings/")]
#[serde(rename_all = "snake_case")]
pub enum CompletionPeriod {
    /// The lifetime period of a once-only task.
    Once,
    /// One calendar day of a daily task.
    Day(NaiveDate),
}

impl CompletionPeriod {
    /// The period a completion of a task of `kind` occupies on `today`.
    pub const fn for_task(kind: TaskKind, today: NaiveDate) -> Self {
        match kind {
            TaskKind::Daily => Self::Day(today),
            TaskKind::Once => Self::Once,
        }
    }

    /// Stable storage key (`"once"` or `YYYY-MM-DD`).
    pub fn key(&self) -> String {
        match self {
            Self::Once => ONCE_PERIOD_KEY.to_owned(),
            Self::Day(day) => day.format(DAY_PERIOD_FORMAT).to_string(),
        }
    }
}

#[cfg(test)]
#[allow(clippy::unwrap_used)]
mod tests {
    use super::*;

    #[test]
    fn finite_stock_decrements_to_zero() {
        let stock = Stock::Finite(1);
        let after = stock.take_one().unwrap();
        assert_eq!(after, Stock::Finite(0));
        assert!(after.is_exhausted());
        assert_eq!(after.take_one(), None);
    }

    #[test]
    fn unlimited_stock_never_runs_out() {
        assert_eq!(Stock::Unlimited.take_one(), Some(Stock::Unlimited));
        assert!(!Stock::Unlimited.is_exhausted());
    }

    #[test]
    fn period_follows_task_kind() {
        let today = NaiveDate::from_ymd_opt(2026, 10, 16).unwrap();
        assert_eq!(
            CompletionPeriod::for_task(TaskKind::Daily, today),
            CompletionPeriod::Day(today)
        );
        assert_eq!(
            CompletionPeriod::for_task(TaskKind::Once, today),
            CompletionPeriod::Once
        );
    }

    #[test]
    fn period_keys_are_stable() {
        let day = CompletionPeriod::Day(NaiveDate::from_ymd_opt(2026, 1, 2).unwrap());
        assert_eq!(day.key(), "2026-01-02");
        assert_eq!(CompletionPeriod::Once.key(), "once");
    }

    #[test]
    fn entry_kinds_map_to_currencies() {
        assert_eq!(LedgerEntryKind::GoldIn.currency(), Currency::Gold);
        assert_eq!(LedgerEntryKind::GoldOut.currency(), Currency::Gold);
        assert_eq!(LedgerEntryKind::ExpIn.currency(), Currency::Exp);
        assert!(!LedgerEntryKind::GoldOut.is_credit());
    }

    #[test]
    fn stock_serializes_as_tagged_state() {
        let json = serde_json::to_string(&Stock::Finite(3)).unwrap();
        assert_eq!(json, r#"{"finite":3}"#);
        let json = serde_json::to_string(&Stock::Unlimited).unwrap();
        assert_eq!(json, r#""unlimited""#);
    }
}
