//! Shared type definitions for the Life RPG gamification core.
//!
//! This crate is the single source of truth for all types used across the
//! workspace. Types defined here flow downstream to `TypeScript` via `ts-rs`
//! for the H5 client.
//!
//! # Modules
//!
//! - [`ids`] -- Type-safe UUID wrappers for all record identifiers
//! - [`enums`] -- Task kinds, ledger entry kinds, stock, completion periods
//! - [`structs`] -- Accounts, definitions, ledger entries, engine results

pub mod enums;
pub mod ids;
pub mod structs;

// Re-export all public types at crate root for convenience.
pub use enums::{CompletionPeriod, Currency, LedgerEntryKind, RefKind, Stock, TaskKind};
pub use ids::{CompletionId, LedgerEntryId, RewardId, TaskId, UserId};
pub use structs::{
    CompletionOutcome, CompletionRecord, LedgerEntry, LevelProgress, PurchaseOutcome, Reward,
    Task, UserAccount, UserProgress,
};
