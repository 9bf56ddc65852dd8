//! Gamification engines for Life RPG.
//!
//! This crate owns the rules that move gold and experience: task
//! completion with exactly-once eligibility, reward redemption with stock
//! and balance checks, and level progression. Every mutation runs inside
//! one storage transaction obtained from an injected [`Store`].
//!
//! # Modules
//!
//! - [`service`] -- [`GameService`] facade, registration, progress, audit
//! - [`completion`] -- Task completion engine
//! - [`redemption`] -- Reward redemption engine
//! - [`clock`] -- [`Clock`] trait, system and fixed clocks
//! - [`retry`] -- Bounded retry of conflicted transactions
//! - [`config`] -- Configuration loading from `liferpg-config.yaml`
//! - [`error`] -- [`GameError`] and its stable [`ErrorKind`]
//!
//! [`Store`]: liferpg_db::Store

pub mod clock;
pub mod completion;
pub mod config;
pub mod error;
pub mod redemption;
pub mod retry;
pub mod service;

pub use clock::{Clock, ClockError, FixedClock, SystemClock};
pub use config::{AppConfig, ConfigError, LogFormat, StorageBackend};
pub use error::{ErrorKind, GameError};
pub use retry::RetryPolicy;
pub use service::GameService;
