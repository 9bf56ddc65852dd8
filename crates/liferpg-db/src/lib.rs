//! Transactional storage for the Life RPG gamification core.
//!
//! The engines never talk to a database directly. They are written
//! against the [`Store`] / [`StoreTx`] traits and receive a concrete store
//! by injection, so production runs on `PostgreSQL` and tests run on the
//! serializable in-memory store.
//!
//! # Architecture
//!
//! ```text
//! Engine
//!     |
//!     +-- Store::begin() --> StoreTx
//!         |-- lock_user / lock_reward     (row locks, fresh reads)
//!         |-- task / has_completion       (eligibility)
//!         |-- insert_completion / update_user_progress / set_reward_stock
//!         |-- append_ledger               (append-only audit)
//!         +-- commit()                    (drop = rollback)
//! ```
//!
//! # Modules
//!
//! - [`store`] -- The storage traits
//! - [`pg_store`] -- `PostgreSQL` implementation with `FOR UPDATE` row locks
//! - [`memory`] -- Serializable in-memory implementation
//! - [`postgres`] -- `PostgreSQL` connection pool and configuration
//! - [`ledger_store`] -- Ledger inserts and per-user history reads
//! - [`rows`] -- Row types and enum mappings
//! - [`error`] -- Shared error types

pub mod error;
pub mod ledger_store;
pub mod memory;
pub mod pg_store;
pub mod postgres;
pub mod rows;
pub mod store;

// Re-export primary types for convenience.
pub use error::DbError;
pub use ledger_store::{LedgerRow, LedgerStore};
pub use memory::{MemoryState, MemoryStore, MemoryTx};
pub use pg_store::{PgStore, PgTx};
pub use postgres::{PostgresConfig, PostgresPool};
pub use store::{ProgressUpdate, Store, StoreTx};
