//! Reward redemption engine.
//!
//! The reward row is locked first and the user row second. Completions
//! lock only the user, so no two operations ever wait on each other in
//! opposite orders. All checks run against the freshly locked rows, and
//! the timestamp is taken only once both locks are held.

use liferpg_db::{ProgressUpdate, Store, StoreTx};
use liferpg_ledger::EntryBuilder;
use liferpg_types::{LedgerEntryKind, PurchaseOutcome, RefKind, RewardId, UserId};
use tracing::{debug, info};

use crate::clock::Clock;
use crate::error::GameError;
use crate::service::GameService;

impl<S: Store, C: Clock> GameService<S, C> {
    /// Redeem a reward for gold.
    ///
    /// # Errors
    ///
    /// - [`GameError::NotFound`] if the reward or user does not exist
    /// - [`GameError::RewardInactive`] if the reward is deactivated
    /// - [`GameError::OutOfStock`] if finite stock is exhausted
    /// - [`GameError::InsufficientFunds`] if gold is below the cost
    /// - [`GameError::Storage`] on datastore failure or persistent conflicts
    pub async fn purchase_reward(
        &self,
        user_id: UserId,
        reward_id: RewardId,
    ) -> Result<PurchaseOutcome, GameError> {
        self.retry
            .run("purchase_reward", move || {
                self.try_purchase_reward(user_id, reward_id)
            })
            .await
    }

    async fn try_purchase_reward(
        &self,
        user_id: UserId,
        reward_id: RewardId,
    ) -> Result<PurchaseOutcome, GameError> {
        let mut tx = self.store.begin().await?;

        let reward = tx.lock_reward(reward_id).await?.ok_or(GameError::NotFound {
            entity: "reward",
            id: reward_id.into_inner(),
        })?;
        if !reward.is_active {
            return Err(GameError::RewardInactive(reward_id));
        }
        let Some(remaining_stock) = reward.stock.take_one() else {
            debug!(%reward_id, "Reward stock exhausted");
            return Err(GameError::OutOfStock(reward_id));
        };
        if reward.cost < 0 {
            return Err(GameError::Invariant(format!(
                "reward {reward_id} has a negative cost"
            )));
        }

        let user = tx.lock_user(user_id).await?.ok_or(GameError::NotFound {
            entity: "user",
            id: user_id.into_inner(),
        })?;
        let now = self.clock.now();
        if user.gold < reward.cost {
            return Err(GameError::InsufficientFunds {
                required: reward.cost,
                available: user.gold,
            });
        }

        let new_gold = user
            .gold
            .checked_sub(reward.cost)
            .ok_or_else(|| GameError::Invariant(format!("gold underflow for user {user_id}")))?;

        tx.update_user_progress(
            user_id,
            ProgressUpdate {
                gold: new_gold,
                exp: user.exp,
                level: user.level,
                updated_at: now,
            },
        )
        .await?;

        if remaining_stock != reward.stock {
            tx.set_reward_stock(reward_id, remaining_stock).await?;
        }

        let entry = EntryBuilder::new(user_id, LedgerEntryKind::GoldOut)
            .amount(reward.cost)
            .balance(new_gold)
            .description(format!("Redeemed reward: {}", reward.title))
            .reference(RefKind::Reward, reward_id.into_inner())
            .at(now)
            .build()?;
        tx.append_ledger(&entry).await?;

        tx.commit().await?;

        info!(
            %user_id,
            %reward_id,
            cost = reward.cost,
            new_gold,
            "Reward redeemed"
        );

        Ok(PurchaseOutcome {
            reward_id,
            cost: reward.cost,
            new_gold,
            reward_title: reward.title,
            remaining_stock,
        })
    }
}

#[cfg(test)]
#[allow(
    clippy::unwrap_used,
    clippy::panic,
    clippy::indexing_slicing,
    clippy::arithmetic_side_effects
)]
mod tests {
    use std::sync::Arc;

    use chrono::{DateTime, Utc};
    use liferpg_db::MemoryStore;
    use liferpg_types::{Reward, Stock, Task, TaskId, TaskKind, UserAccount};

    use super::*;
    use crate::clock::FixedClock;

    fn reward(cost: i64, stock: Stock) -> Reward {
        Reward {
            id: RewardId::new(),
            title: "Movie night".to_owned(),
            description: String::new(),
            cost,
            stock,
            is_active: true,
        }
    }

    async fn setup(
        reward: &Reward,
        gold: i64,
    ) -> (GameService<MemoryStore, FixedClock>, UserAccount) {
        let now = DateTime::parse_from_rfc3339("2026-10-16T08:00:00Z")
            .unwrap()
            .with_timezone(&Utc);
        let store = MemoryStore::new();
        store.put_reward(reward.clone()).await;

        let mut user = UserAccount::new("alice".to_owned(), now);
        user.gold = gold;
        store.put_user(user.clone()).await;

        (GameService::new(store, FixedClock::at(now)), user)
    }

    #[tokio::test]
    async fn purchase_debits_gold_and_stock() {
        let reward = reward(40, Stock::Finite(3));
        let (svc, user) = setup(&reward, 100).await;

        let outcome = svc.purchase_reward(user.id, reward.id).await.unwrap();
        assert_eq!(outcome.cost, 40);
        assert_eq!(outcome.new_gold, 60);
        assert_eq!(outcome.reward_title, "Movie night");
        assert_eq!(outcome.remaining_stock, Stock::Finite(2));

        let stored = svc.store().reward(reward.id).await.unwrap();
        assert_eq!(stored.stock, Stock::Finite(2));

        let ledger = svc.store().ledger_for_user(user.id).await.unwrap();
        assert_eq!(ledger.len(), 1);
        assert_eq!(ledger[0].kind, LedgerEntryKind::GoldOut);
        assert_eq!(ledger[0].amount, 40);
        assert_eq!(ledger[0].balance, 60);
        assert_eq!(ledger[0].description, "Redeemed reward: Movie night");
        assert_eq!(ledger[0].ref_kind, RefKind::Reward);
    }

    #[tokio::test]
    async fn unlimited_stock_is_untouched() {
        let reward = reward(10, Stock::Unlimited);
        let (svc, user) = setup(&reward, 30).await;

        for _ in 0..3 {
            svc.purchase_reward(user.id, reward.id).await.unwrap();
        }
        let stored = svc.store().reward(reward.id).await.unwrap();
        assert_eq!(stored.stock, Stock::Unlimited);
        assert_eq!(svc.user_progress(user.id).await.unwrap().gold, 0);
    }

    #[tokio::test]
    async fn insufficient_funds_leaves_gold_unchanged() {
        let reward = reward(100, Stock::Finite(5));
        let (svc, user) = setup(&reward, 50).await;

        let result = svc.purchase_reward(user.id, reward.id).await;
        assert!(matches!(
            result,
            Err(GameError::InsufficientFunds {
                required: 100,
                available: 50
            })
        ));
        assert_eq!(svc.user_progress(user.id).await.unwrap().gold, 50);
        assert_eq!(
            svc.store().reward(reward.id).await.unwrap().stock,
            Stock::Finite(5)
        );
        assert!(svc.store().ledger_for_user(user.id).await.unwrap().is_empty());
    }

    #[tokio::test]
    async fn checks_run_in_order() {
        // Inactive wins over out-of-stock and insufficient funds.
        let mut inactive = reward(1_000, Stock::Finite(0));
        inactive.is_active = false;
        let (svc, user) = setup(&inactive, 0).await;
        let result = svc.purchase_reward(user.id, inactive.id).await;
        assert!(matches!(result, Err(GameError::RewardInactive(_))));

        // Out-of-stock wins over insufficient funds.
        let empty = reward(1_000, Stock::Finite(0));
        let (svc, user) = setup(&empty, 0).await;
        let result = svc.purchase_reward(user.id, empty.id).await;
        assert!(matches!(result, Err(GameError::OutOfStock(_))));
    }

    #[tokio::test]
    async fn unknown_reward_and_user_are_not_found() {
        let reward = reward(10, Stock::Unlimited);
        let (svc, user) = setup(&reward, 10).await;

        let result = svc.purchase_reward(user.id, RewardId::new()).await;
        assert!(matches!(result, Err(GameError::NotFound { entity: "reward", .. })));

        let result = svc.purchase_reward(UserId::new(), reward.id).await;
        assert!(matches!(result, Err(GameError::NotFound { entity: "user", .. })));
    }

    #[tokio::test]
    async fn free_reward_still_records_ledger_entry() {
        let reward = reward(0, Stock::Finite(1));
        let (svc, user) = setup(&reward, 0).await;

        let outcome = svc.purchase_reward(user.id, reward.id).await.unwrap();
        assert_eq!(outcome.new_gold, 0);
        let ledger = svc.store().ledger_for_user(user.id).await.unwrap();
        assert_eq!(ledger.len(), 1);
        assert_eq!(ledger[0].amount, 0);
    }

    #[tokio::test]
    async fn failed_ledger_append_keeps_stock_and_gold() {
        let reward = reward(10, Stock::Finite(1));
        let (svc, user) = setup(&reward, 10).await;

        svc.store().set_fail_ledger_appends(true);
        let result = svc.purchase_reward(user.id, reward.id).await;
        assert!(matches!(result, Err(GameError::Storage(_))));
        assert_eq!(svc.user_progress(user.id).await.unwrap().gold, 10);
        assert_eq!(
            svc.store().reward(reward.id).await.unwrap().stock,
            Stock::Finite(1)
        );
    }

    #[tokio::test(flavor = "multi_thread", worker_threads = 4)]
    async fn concurrent_purchases_of_last_unit() {
        let reward = reward(10, Stock::Finite(1));
        let (svc, user) = setup(&reward, 1_000).await;
        let svc = Arc::new(svc);

        let handles: Vec<_> = (0..2)
            .map(|_| {
                let svc = Arc::clone(&svc);
                let (user_id, reward_id) = (user.id, reward.id);
                tokio::spawn(async move { svc.purchase_reward(user_id, reward_id).await })
            })
            .collect();

        let mut succeeded = 0;
        let mut out_of_stock = 0;
        for handle in handles {
            match handle.await.unwrap() {
                Ok(_) => succeeded += 1,
                Err(GameError::OutOfStock(_)) => out_of_stock += 1,
                Err(other) => panic!("unexpected error: {other}"),
            }
        }

        assert_eq!((succeeded, out_of_stock), (1, 1));
        assert_eq!(
            svc.store().reward(reward.id).await.unwrap().stock,
            Stock::Finite(0)
        );
        assert_eq!(svc.user_progress(user.id).await.unwrap().gold, 990);
        assert_eq!(svc.store().ledger_for_user(user.id).await.unwrap().len(), 1);
    }

    #[tokio::test]
    async fn entry_is_stamped_after_the_lock_wait() {
        let reward = reward(10, Stock::Unlimited);
        let (svc, user) = setup(&reward, 100).await;
        let svc = Arc::new(svc);
        let queued_at = svc.clock().now();

        let holder = svc.store().begin().await.unwrap();
        let waiting = {
            let svc = Arc::clone(&svc);
            let (user_id, reward_id) = (user.id, reward.id);
            tokio::spawn(async move { svc.purchase_reward(user_id, reward_id).await })
        };
        tokio::time::sleep(std::time::Duration::from_millis(50)).await;
        svc.clock().advance(chrono::TimeDelta::seconds(5));
        drop(holder);

        waiting.await.unwrap().unwrap();
        let ledger = svc.store().ledger_for_user(user.id).await.unwrap();
        assert_eq!(ledger.len(), 1);
        assert!(ledger[0].created_at > queued_at);
        assert_eq!(svc.store().snapshot().await.users[&user.id].updated_at, ledger[0].created_at);
    }

    #[tokio::test]
    async fn earned_then_spent_gold_reconciles() {
        let reward = reward(30, Stock::Finite(2));
        let (svc, user) = setup(&reward, 0).await;
        let task = Task {
            id: TaskId::new(),
            title: "Read a chapter".to_owned(),
            description: String::new(),
            gold_reward: 50,
            exp_reward: 10,
            kind: TaskKind::Daily,
            is_active: true,
        };
        svc.store().put_task(task.clone()).await;

        svc.complete_task(user.id, task.id).await.unwrap();
        let outcome = svc.purchase_reward(user.id, reward.id).await.unwrap();
        assert_eq!(outcome.new_gold, 20);

        let ledger = svc.store().ledger_for_user(user.id).await.unwrap();
        let kinds: Vec<_> = ledger.iter().map(|e| e.kind).collect();
        assert_eq!(
            kinds,
            [
                LedgerEntryKind::GoldIn,
                LedgerEntryKind::ExpIn,
                LedgerEntryKind::GoldOut
            ]
        );
        assert!(svc.audit_user(user.id).await.unwrap().is_balanced());
    }
}
