//! Reconciliation of a user's ledger against their account balances.
//!
//! For every user the ledger must explain the account exactly:
//!
//! ```text
//! sum(gold_in) - sum(gold_out) == account.gold
//! sum(exp_in)                  == account.exp
//! ```
//!
//! Each entry also records the balance after it was applied, so walking
//! the entries in order must reproduce every recorded balance. A failure
//! of either check produces a [`LedgerMismatch`].

use std::collections::BTreeMap;

use liferpg_types::{Currency, LedgerEntry, LedgerEntryId, UserAccount, UserId};

use crate::LedgerMismatch;

/// The outcome of reconciling one user's ledger.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum ReconciliationResult {
    /// The ledger explains the account balances exactly.
    Balanced,
    /// The ledger and the account disagree.
    Mismatch(LedgerMismatch),
}

impl ReconciliationResult {
    /// Whether the ledger reconciles.
    pub const fn is_balanced(&self) -> bool {
        matches!(self, Self::Balanced)
    }
}

/// Totals derived from one currency's ledger entries.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct Drift {
    /// Net total according to the ledger.
    pub ledger_total: i64,
    /// Balance stored on the account.
    pub account_balance: i64,
}

/// Reconcile `entries` (in insertion order) against `account`.
///
/// Entries belonging to other users are ignored.
pub fn reconcile(account: &UserAccount, entries: &[LedgerEntry]) -> ReconciliationResult {
    let mut totals: BTreeMap<Currency, i64> = BTreeMap::new();
    totals.insert(Currency::Gold, 0);
    totals.insert(Currency::Exp, 0);
    let mut broken_entries: Vec<LedgerEntryId> = Vec::new();

    for entry in entries.iter().filter(|e| e.user_id == account.id) {
        let currency = entry.kind.currency();
        let running = totals.entry(currency).or_insert(0);

        let next = if entry.kind.is_credit() {
            running.checked_add(entry.amount)
        } else {
            running.checked_sub(entry.amount)
        };
        let Some(next) = next else {
            return overflow_mismatch(account.id, currency);
        };
        *running = next;

        if entry.balance != next {
            broken_entries.push(entry.id);
        }
    }

    let mut drifts: BTreeMap<Currency, Drift> = BTreeMap::new();
    for (currency, account_balance) in [(Currency::Gold, account.gold), (Currency::Exp, account.exp)] {
        let ledger_total = totals.get(&currency).copied().unwrap_or(0);
        if ledger_total != account_balance {
            drifts.insert(
                currency,
                Drift {
                    ledger_total,
                    account_balance,
                },
            );
        }
    }

    if drifts.is_empty() && broken_entries.is_empty() {
        return ReconciliationResult::Balanced;
    }

    let message = format!(
        "LEDGER_MISMATCH for user {}: {} currency drift(s), {} entry balance(s) out of sequence",
        account.id,
        drifts.len(),
        broken_entries.len(),
    );
    tracing::warn!(user_id = %account.id, "{message}");

    ReconciliationResult::Mismatch(LedgerMismatch {
        user_id: account.id,
        drifts,
        broken_entries,
        message,
    })
}

/// Construct a mismatch for arithmetic overflow during summation.
fn overflow_mismatch(user_id: UserId, currency: Currency) -> ReconciliationResult {
    ReconciliationResult::Mismatch(LedgerMismatch {
        user_id,
        drifts: BTreeMap::new(),
        broken_entries: Vec::new(),
        message: format!(
            "LEDGER_MISMATCH for user {user_id}: arithmetic overflow while summing {currency:?}",
        ),
    })
}

#[cfg(test)]
#[allow(clippy::panic)]
mod tests {
    use chrono::Utc;
    use liferpg_types::{LedgerEntryKind, RefKind};
    use uuid::Uuid;

    use super::*;
    use crate::EntryBuilder;

    fn entry(user: UserId, kind: LedgerEntryKind, amount: i64, balance: i64) -> LedgerEntry {
        let built = EntryBuilder::new(user, kind)
            .amount(amount)
            .balance(balance)
            .description("test".to_owned())
            .reference(RefKind::Task, Uuid::now_v7())
            .build();
        match built {
            Ok(e) => e,
            Err(e) => panic!("test entry must build: {e}"),
        }
    }

    fn account(gold: i64, exp: i64) -> UserAccount {
        let mut account = UserAccount::new("tester".to_owned(), Utc::now());
        account.gold = gold;
        account.exp = exp;
        account
    }

    #[test]
    fn empty_ledger_matches_new_account() {
        let acc = account(0, 0);
        assert!(reconcile(&acc, &[]).is_balanced());
    }

    #[test]
    fn grants_and_purchase_reconcile() {
        let acc = account(70, 40);
        let entries = vec![
            entry(acc.id, LedgerEntryKind::GoldIn, 50, 50),
            entry(acc.id, LedgerEntryKind::ExpIn, 20, 20),
            entry(acc.id, LedgerEntryKind::GoldIn, 50, 100),
            entry(acc.id, LedgerEntryKind::ExpIn, 20, 40),
            entry(acc.id, LedgerEntryKind::GoldOut, 30, 70),
        ];
        assert_eq!(reconcile(&acc, &entries), ReconciliationResult::Balanced);
    }

    #[test]
    fn missing_entry_is_detected() {
        let acc = account(100, 0);
        let entries = vec![entry(acc.id, LedgerEntryKind::GoldIn, 50, 50)];
        match reconcile(&acc, &entries) {
            ReconciliationResult::Mismatch(m) => {
                let drift = m.drifts.get(&Currency::Gold).copied();
                assert_eq!(
                    drift,
                    Some(Drift {
                        ledger_total: 50,
                        account_balance: 100
                    })
                );
                assert!(m.broken_entries.is_empty());
            }
            ReconciliationResult::Balanced => panic!("expected mismatch"),
        }
    }

    #[test]
    fn out_of_sequence_balance_is_detected() {
        let acc = account(20, 0);
        let bad = entry(acc.id, LedgerEntryKind::GoldIn, 10, 15);
        let bad_id = bad.id;
        let entries = vec![entry(acc.id, LedgerEntryKind::GoldIn, 10, 10), bad];
        match reconcile(&acc, &entries) {
            ReconciliationResult::Mismatch(m) => {
                assert!(m.drifts.is_empty());
                assert_eq!(m.broken_entries, vec![bad_id]);
            }
            ReconciliationResult::Balanced => panic!("expected mismatch"),
        }
    }

    #[test]
    fn other_users_entries_are_ignored() {
        let acc = account(10, 0);
        let stranger = UserId::new();
        let entries = vec![
            entry(stranger, LedgerEntryKind::GoldIn, 999, 999),
            entry(acc.id, LedgerEntryKind::GoldIn, 10, 10),
        ];
        assert!(reconcile(&acc, &entries).is_balanced());
    }
}
