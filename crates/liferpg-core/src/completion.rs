//! Task completion engine.
//!
//! A completion runs as one transaction:
//!
//! 1. Read the task; it must exist and be active.
//! 2. Lock the user row. Concurrent completions by the same user queue
//!    here, so the eligibility check below always sees committed state.
//!    The clock is read after this point.
//! 3. Check the completion window (`once`, or today's date for daily
//!    tasks). The unique `(user, task, period)` key backs this check up at
//!    the storage layer.
//! 4. Insert the completion record, grant gold and exp, recompute the
//!    level, and append one ledger entry per non-zero grant.
//! 5. Commit. Any failure before this point rolls everything back.

use liferpg_db::{DbError, ProgressUpdate, Store, StoreTx};
use liferpg_ledger::{EntryBuilder, level_for_experience};
use liferpg_types::{
    CompletionId, CompletionOutcome, CompletionPeriod, CompletionRecord, LedgerEntryKind,
    RefKind, TaskId, UserId,
};
use tracing::{debug, info};

use crate::clock::Clock;
use crate::error::GameError;
use crate::service::GameService;

impl<S: Store, C: Clock> GameService<S, C> {
    /// Complete a task on behalf of a user.
    ///
    /// # Errors
    ///
    /// - [`GameError::NotFound`] if the task or user does not exist
    /// - [`GameError::TaskInactive`] if the task is deactivated
    /// - [`GameError::AlreadyCompleted`] if the current window is used
    /// - [`GameError::Storage`] on datastore failure or persistent conflicts
    pub async fn complete_task(
        &self,
        user_id: UserId,
        task_id: TaskId,
    ) -> Result<CompletionOutcome, GameError> {
        self.retry
            .run("complete_task", move || self.try_complete_task(user_id, task_id))
            .await
    }

    async fn try_complete_task(
        &self,
        user_id: UserId,
        task_id: TaskId,
    ) -> Result<CompletionOutcome, GameError> {
        let mut tx = self.store.begin().await?;

        let task = tx.task(task_id).await?.ok_or(GameError::NotFound {
            entity: "task",
            id: task_id.into_inner(),
        })?;
        if !task.is_active {
            return Err(GameError::TaskInactive(task_id));
        }
        if task.gold_reward < 0 || task.exp_reward < 0 {
            return Err(GameError::Invariant(format!(
                "task {task_id} has a negative reward"
            )));
        }

        let user = tx.lock_user(user_id).await?.ok_or(GameError::NotFound {
            entity: "user",
            id: user_id.into_inner(),
        })?;

        // Read the clock only once the user lock is held, so a request that
        // waited behind another one is stamped after it and sees the day
        // the lock was granted in.
        let now = self.clock.now();
        let period = CompletionPeriod::for_task(task.kind, self.clock.today_at(now));
        if tx.has_completion(user_id, task_id, period).await? {
            debug!(%user_id, %task_id, period = %period.key(), "Completion window already used");
            return Err(GameError::AlreadyCompleted { task_id });
        }

        let record = CompletionRecord {
            id: CompletionId::new(),
            user_id,
            task_id,
            period,
            completed_at: now,
        };
        tx.insert_completion(&record).await.map_err(|e| match e {
            DbError::UniqueViolation(_) => GameError::AlreadyCompleted { task_id },
            other => GameError::from(other),
        })?;

        let new_gold = user
            .gold
            .checked_add(task.gold_reward)
            .ok_or_else(|| GameError::Invariant(format!("gold overflow for user {user_id}")))?;
        let new_exp = user
            .exp
            .checked_add(task.exp_reward)
            .ok_or_else(|| GameError::Invariant(format!("exp overflow for user {user_id}")))?;
        let new_level = level_for_experience(new_exp);

        tx.update_user_progress(
            user_id,
            ProgressUpdate {
                gold: new_gold,
                exp: new_exp,
                level: new_level,
                updated_at: now,
            },
        )
        .await?;

        let description = format!("Completed task: {}", task.title);
        let grants = [
            (LedgerEntryKind::GoldIn, task.gold_reward, new_gold),
            (LedgerEntryKind::ExpIn, task.exp_reward, new_exp),
        ];
        for (kind, amount, balance) in grants {
            if amount == 0 {
                continue;
            }
            let entry = EntryBuilder::new(user_id, kind)
                .amount(amount)
                .balance(balance)
                .description(description.clone())
                .reference(RefKind::Task, task_id.into_inner())
                .at(now)
                .build()?;
            tx.append_ledger(&entry).await?;
        }

        tx.commit().await?;

        let leveled_up = new_level > user.level;
        info!(
            %user_id,
            %task_id,
            gold = task.gold_reward,
            exp = task.exp_reward,
            new_level,
            leveled_up,
            "Task completed"
        );

        Ok(CompletionOutcome {
            task_id,
            gold_reward: task.gold_reward,
            exp_reward: task.exp_reward,
            new_gold,
            new_exp,
            new_level,
            leveled_up,
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

    use chrono::{DateTime, TimeDelta, Utc};
    use liferpg_db::MemoryStore;
    use liferpg_types::{LedgerEntryKind, Task, TaskKind, UserAccount};

    use super::*;
    use crate::clock::FixedClock;
    use crate::retry::RetryPolicy;

    fn start() -> DateTime<Utc> {
        DateTime::parse_from_rfc3339("2026-10-16T08:00:00Z")
            .unwrap()
            .with_timezone(&Utc)
    }

    fn task(kind: TaskKind, gold: i64, exp: i64) -> Task {
        Task {
            id: TaskId::new(),
            title: "Morning run".to_owned(),
            description: String::new(),
            gold_reward: gold,
            exp_reward: exp,
            kind,
            is_active: true,
        }
    }

    async fn setup(
        task: &Task,
    ) -> (GameService<MemoryStore, FixedClock>, UserAccount) {
        let store = MemoryStore::new();
        store.put_task(task.clone()).await;
        let svc = GameService::new(store, FixedClock::at(start()));
        let user = svc.register_user("alice").await.unwrap();
        (svc, user)
    }

    #[tokio::test]
    async fn completion_grants_rewards_and_records_ledger() {
        let task = task(TaskKind::Once, 30, 120);
        let (svc, user) = setup(&task).await;

        let outcome = svc.complete_task(user.id, task.id).await.unwrap();
        assert_eq!(outcome.gold_reward, 30);
        assert_eq!(outcome.exp_reward, 120);
        assert_eq!(outcome.new_gold, 30);
        assert_eq!(outcome.new_exp, 120);
        assert_eq!(outcome.new_level, 2);
        assert!(outcome.leveled_up);

        let ledger = svc.store().ledger_for_user(user.id).await.unwrap();
        assert_eq!(ledger.len(), 2);
        assert_eq!(ledger[0].kind, LedgerEntryKind::GoldIn);
        assert_eq!(ledger[0].amount, 30);
        assert_eq!(ledger[0].balance, 30);
        assert_eq!(ledger[0].description, "Completed task: Morning run");
        assert_eq!(ledger[0].ref_kind, RefKind::Task);
        assert_eq!(ledger[0].ref_id, task.id.into_inner());
        assert_eq!(ledger[1].kind, LedgerEntryKind::ExpIn);
        assert_eq!(ledger[1].balance, 120);

        assert!(svc.audit_user(user.id).await.unwrap().is_balanced());
    }

    #[tokio::test]
    async fn once_task_completes_only_once() {
        let task = task(TaskKind::Once, 10, 10);
        let (svc, user) = setup(&task).await;

        svc.complete_task(user.id, task.id).await.unwrap();
        svc.clock().advance(TimeDelta::days(3));
        let second = svc.complete_task(user.id, task.id).await;
        assert!(matches!(second, Err(GameError::AlreadyCompleted { .. })));

        let progress = svc.user_progress(user.id).await.unwrap();
        assert_eq!(progress.gold, 10);
        assert_eq!(progress.exp, 10);
    }

    #[tokio::test]
    async fn daily_task_resets_next_day() {
        let task = task(TaskKind::Daily, 5, 20);
        let (svc, user) = setup(&task).await;

        svc.complete_task(user.id, task.id).await.unwrap();
        let same_day = svc.complete_task(user.id, task.id).await;
        assert!(matches!(same_day, Err(GameError::AlreadyCompleted { .. })));

        svc.clock().advance(TimeDelta::days(1));
        let next_day = svc.complete_task(user.id, task.id).await.unwrap();
        assert_eq!(next_day.new_gold, 10);
        assert_eq!(next_day.new_exp, 40);
    }

    #[tokio::test]
    async fn daily_window_follows_reference_timezone() {
        let task = task(TaskKind::Daily, 5, 5);
        let store = MemoryStore::new();
        store.put_task(task.clone()).await;
        // 15:30 UTC on the 16th is 23:30 on the 16th at UTC+8.
        let late = DateTime::parse_from_rfc3339("2026-10-16T15:30:00Z")
            .unwrap()
            .with_timezone(&Utc);
        let clock = FixedClock::at_with_offset(late, 480).unwrap();
        let svc = GameService::new(store, clock);
        let user = svc.register_user("night-owl").await.unwrap();

        svc.complete_task(user.id, task.id).await.unwrap();
        // One hour later it is the 17th locally, still the 16th in UTC.
        svc.clock().advance(TimeDelta::hours(1));
        svc.complete_task(user.id, task.id).await.unwrap();
    }

    #[tokio::test]
    async fn unknown_task_is_not_found() {
        let task = task(TaskKind::Once, 1, 1);
        let (svc, user) = setup(&task).await;
        let result = svc.complete_task(user.id, TaskId::new()).await;
        assert!(matches!(result, Err(GameError::NotFound { entity: "task", .. })));
    }

    #[tokio::test]
    async fn unknown_user_is_not_found() {
        let task = task(TaskKind::Once, 1, 1);
        let (svc, _) = setup(&task).await;
        let result = svc.complete_task(UserId::new(), task.id).await;
        assert!(matches!(result, Err(GameError::NotFound { entity: "user", .. })));
    }

    #[tokio::test]
    async fn inactive_task_is_rejected_before_eligibility() {
        let mut task = task(TaskKind::Once, 1, 1);
        task.is_active = false;
        let (svc, user) = setup(&task).await;
        let result = svc.complete_task(user.id, task.id).await;
        assert!(matches!(result, Err(GameError::TaskInactive(id)) if id == task.id));
    }

    #[tokio::test]
    async fn zero_rewards_write_no_ledger_entries() {
        let task = task(TaskKind::Once, 0, 50);
        let (svc, user) = setup(&task).await;

        let outcome = svc.complete_task(user.id, task.id).await.unwrap();
        assert_eq!(outcome.new_gold, 0);
        assert!(!outcome.leveled_up);

        let ledger = svc.store().ledger_for_user(user.id).await.unwrap();
        assert_eq!(ledger.len(), 1);
        assert_eq!(ledger[0].kind, LedgerEntryKind::ExpIn);
    }

    #[tokio::test]
    async fn level_is_capped() {
        let task = task(TaskKind::Daily, 0, 1_000_000);
        let (svc, user) = setup(&task).await;
        let outcome = svc.complete_task(user.id, task.id).await.unwrap();
        assert_eq!(outcome.new_level, 100);
    }

    #[tokio::test]
    async fn failed_ledger_append_rolls_back_everything() {
        let task = task(TaskKind::Once, 10, 10);
        let (svc, user) = setup(&task).await;

        svc.store().set_fail_ledger_appends(true);
        let result = svc.complete_task(user.id, task.id).await;
        assert!(matches!(
            result,
            Err(GameError::Storage(DbError::WriteFailed(_)))
        ));

        let state = svc.store().snapshot().await;
        assert!(state.completions.is_empty());
        assert!(state.ledger.is_empty());
        assert_eq!(state.users[&user.id].gold, 0);

        // The window was not consumed by the failed attempt.
        svc.store().set_fail_ledger_appends(false);
        svc.complete_task(user.id, task.id).await.unwrap();
    }

    #[tokio::test]
    async fn commit_conflict_is_retried() {
        let task = task(TaskKind::Once, 10, 10);
        let (svc, user) = setup(&task).await;

        svc.store().inject_commit_conflicts(2);
        let outcome = svc.complete_task(user.id, task.id).await.unwrap();
        assert_eq!(outcome.new_gold, 10);

        let state = svc.store().snapshot().await;
        assert_eq!(state.completions.len(), 1);
        assert_eq!(state.ledger.len(), 2);
    }

    #[tokio::test]
    async fn persistent_conflict_surfaces_storage_failure() {
        let task = task(TaskKind::Once, 10, 10);
        let (svc, user) = setup(&task).await;
        let svc = svc.with_retry(RetryPolicy::new(2));

        svc.store().inject_commit_conflicts(2);
        let result = svc.complete_task(user.id, task.id).await;
        assert!(matches!(result, Err(GameError::Storage(DbError::Conflict(_)))));
        assert_eq!(svc.user_progress(user.id).await.unwrap().gold, 0);
    }

    #[tokio::test]
    async fn entries_are_stamped_after_the_lock_wait() {
        let task = task(TaskKind::Once, 10, 10);
        let (svc, user) = setup(&task).await;
        let svc = Arc::new(svc);

        let holder = svc.store().begin().await.unwrap();
        let waiting = {
            let svc = Arc::clone(&svc);
            let (user_id, task_id) = (user.id, task.id);
            tokio::spawn(async move { svc.complete_task(user_id, task_id).await })
        };
        tokio::time::sleep(std::time::Duration::from_millis(50)).await;
        svc.clock().advance(TimeDelta::seconds(5));
        drop(holder);

        waiting.await.unwrap().unwrap();
        let ledger = svc.store().ledger_for_user(user.id).await.unwrap();
        let expected = start() + TimeDelta::seconds(5);
        assert!(ledger.iter().all(|e| e.created_at == expected));
        assert_eq!(svc.store().snapshot().await.completions[0].completed_at, expected);
    }

    #[tokio::test]
    async fn daily_window_is_read_after_the_lock_wait() {
        let task = task(TaskKind::Daily, 5, 5);
        let (svc, user) = setup(&task).await;
        let svc = Arc::new(svc);
        let before_midnight = DateTime::parse_from_rfc3339("2026-10-16T23:59:59Z")
            .unwrap()
            .with_timezone(&Utc);
        svc.clock().set(before_midnight);
        svc.complete_task(user.id, task.id).await.unwrap();

        let holder = svc.store().begin().await.unwrap();
        let waiting = {
            let svc = Arc::clone(&svc);
            let (user_id, task_id) = (user.id, task.id);
            tokio::spawn(async move { svc.complete_task(user_id, task_id).await })
        };
        tokio::time::sleep(std::time::Duration::from_millis(50)).await;
        svc.clock().advance(TimeDelta::seconds(2));
        drop(holder);

        let outcome = waiting.await.unwrap().unwrap();
        assert_eq!(outcome.new_gold, 10);
    }

    #[tokio::test(flavor = "multi_thread", worker_threads = 4)]
    async fn concurrent_completions_grant_once() {
        let task = task(TaskKind::Once, 25, 40);
        let (svc, user) = setup(&task).await;
        let svc = Arc::new(svc);

        let handles: Vec<_> = (0..8)
            .map(|_| {
                let svc = Arc::clone(&svc);
                let (user_id, task_id) = (user.id, task.id);
                tokio::spawn(async move { svc.complete_task(user_id, task_id).await })
            })
            .collect();

        let mut succeeded = 0;
        for handle in handles {
            match handle.await.unwrap() {
                Ok(_) => succeeded += 1,
                Err(GameError::AlreadyCompleted { .. }) => {}
                Err(other) => panic!("unexpected error: {other}"),
            }
        }

        assert_eq!(succeeded, 1);
        let progress = svc.user_progress(user.id).await.unwrap();
        assert_eq!(progress.gold, 25);
        assert_eq!(progress.exp, 40);
        assert!(svc.audit_user(user.id).await.unwrap().is_balanced());
    }
}
