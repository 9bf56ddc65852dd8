//! Validated construction of ledger entries.
//!
//! Every balance mutation performed by the engines is paired with exactly
//! one [`LedgerEntry`]. The [`EntryBuilder`] checks the entry before it is
//! handed to storage: amounts are never negative (the sign of the change
//! is carried by the [`LedgerEntryKind`]) and the resulting balance is
//! never negative.

use chrono::{DateTime, Utc};
use uuid::Uuid;

use liferpg_types::{LedgerEntry, LedgerEntryId, LedgerEntryKind, RefKind, UserId};

use crate::LedgerError;

/// Builder for constructing validated [`LedgerEntry`] values.
///
/// # Examples
///
/// ```
/// use chrono::Utc;
/// use liferpg_ledger::EntryBuilder;
/// use liferpg_types::{LedgerEntryKind, RefKind, UserId};
/// use uuid::Uuid;
///
/// let entry = EntryBuilder::new(UserId::new(), LedgerEntryKind::GoldIn)
///     .amount(10)
///     .balance(110)
///     .description("Completed task: Morning run".to_owned())
///     .reference(RefKind::Task, Uuid::now_v7())
///     .at(Utc::now())
///     .build();
///
/// assert!(entry.is_ok());
/// ```
#[derive(Debug)]
pub struct EntryBuilder {
    user_id: UserId,
    kind: LedgerEntryKind,
    amount: Option<i64>,
    balance: Option<i64>,
    description: Option<String>,
    reference: Option<(RefKind, Uuid)>,
    created_at: Option<DateTime<Utc>>,
}

impl EntryBuilder {
    /// Start building an entry of `kind` for `user_id`.
    pub const fn new(user_id: UserId, kind: LedgerEntryKind) -> Self {
        Self {
            user_id,
            kind,
            amount: None,
            balance: None,
            description: None,
            reference: None,
            created_at: None,
        }
    }

    /// Set the amount moved.
    #[must_use]
    pub const fn amount(mut self, amount: i64) -> Self {
        self.amount = Some(amount);
        self
    }

    /// Set the balance of the affected currency after the change.
    #[must_use]
    pub const fn balance(mut self, balance: i64) -> Self {
        self.balance = Some(balance);
        self
    }

    /// Set the human-readable description.
    #[must_use]
    pub fn description(mut self, description: String) -> Self {
        self.description = Some(description);
        self
    }

    /// Set the task or reward that caused the change.
    #[must_use]
    pub const fn reference(mut self, kind: RefKind, id: Uuid) -> Self {
        self.reference = Some((kind, id));
        self
    }

    /// Set the entry timestamp. Defaults to [`Utc::now`].
    #[must_use]
    pub const fn at(mut self, created_at: DateTime<Utc>) -> Self {
        self.created_at = Some(created_at);
        self
    }

    /// Validate inputs and produce a [`LedgerEntry`].
    ///
    /// # Errors
    ///
    /// Returns [`LedgerError::MissingField`] if a required field is unset.
    /// Returns [`LedgerError::NegativeAmount`] if the amount is negative.
    /// Returns [`LedgerError::NegativeBalance`] if the resulting balance is
    /// negative.
    pub fn build(self) -> Result<LedgerEntry, LedgerError> {
        let amount = self.amount.ok_or(LedgerError::MissingField("amount"))?;
        let balance = self.balance.ok_or(LedgerError::MissingField("balance"))?;
        let description = self
            .description
            .ok_or(LedgerError::MissingField("description"))?;
        let (ref_kind, ref_id) = self
            .reference
            .ok_or(LedgerError::MissingField("reference"))?;

        if amount < 0 {
            return Err(LedgerError::NegativeAmount { amount });
        }
        if balance < 0 {
            return Err(LedgerError::NegativeBalance {
                kind: self.kind,
                balance,
            });
        }

        Ok(LedgerEntry {
            id: LedgerEntryId::new(),
            user_id: self.user_id,
            kind: self.kind,
            amount,
            balance,
            description,
            ref_kind,
            ref_id,
            created_at: self.created_at.unwrap_or_else(Utc::now),
        })
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn gold_in() -> EntryBuilder {
        EntryBuilder::new(UserId::new(), LedgerEntryKind::GoldIn)
            .description("Completed task: Read".to_owned())
            .reference(RefKind::Task, Uuid::now_v7())
    }

    #[test]
    fn valid_entry_builds() {
        let entry = gold_in().amount(25).balance(125).build();
        assert!(entry.is_ok());
        if let Ok(entry) = entry {
            assert_eq!(entry.amount, 25);
            assert_eq!(entry.balance, 125);
            assert_eq!(entry.kind, LedgerEntryKind::GoldIn);
            assert_eq!(entry.ref_kind, RefKind::Task);
        }
    }

    #[test]
    fn zero_amount_is_allowed() {
        // A free reward still records its purchase.
        let entry = EntryBuilder::new(UserId::new(), LedgerEntryKind::GoldOut)
            .amount(0)
            .balance(40)
            .description("Redeemed reward: Sticker".to_owned())
            .reference(RefKind::Reward, Uuid::now_v7())
            .build();
        assert!(entry.is_ok());
    }

    #[test]
    fn negative_amount_rejected() {
        let result = gold_in().amount(-1).balance(10).build();
        assert!(matches!(result, Err(LedgerError::NegativeAmount { amount: -1 })));
    }

    #[test]
    fn negative_balance_rejected() {
        let result = gold_in().amount(5).balance(-5).build();
        assert!(matches!(result, Err(LedgerError::NegativeBalance { .. })));
    }

    #[test]
    fn missing_reference_rejected() {
        let result = EntryBuilder::new(UserId::new(), LedgerEntryKind::ExpIn)
            .amount(5)
            .balance(5)
            .description("x".to_owned())
            .build();
        assert!(matches!(result, Err(LedgerError::MissingField("reference"))));
    }

    #[test]
    fn explicit_timestamp_is_kept() {
        let at = DateTime::<Utc>::UNIX_EPOCH;
        let entry = gold_in().amount(1).balance(1).at(at).build();
        assert_eq!(entry.map(|e| e.created_at).ok(), Some(at));
    }
}
