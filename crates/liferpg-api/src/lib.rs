//! HTTP adapter for the Life RPG gamification engines.
//!
//! This crate exposes the engines over a thin Axum REST layer:
//!
//! - **Task completion** and **reward redemption** on behalf of the
//!   caller identified by the `x-user-id` header
//! - **Progress** and **ledger audit** reads for the caller
//! - **Registration** of new accounts
//!
//! # Architecture
//!
//! Authentication is upstream. Handlers extract the caller, parse path
//! ids, call [`GameService`](liferpg_core::GameService), and map each
//! [`GameError`](liferpg_core::GameError) kind to an HTTP status with a
//! stable JSON error body.

pub mod error;
pub mod extract;
pub mod handlers;
pub mod router;
pub mod server;
pub mod state;

// Re-export primary types for convenience.
pub use error::ApiError;
pub use extract::{CurrentUser, USER_ID_HEADER};
pub use router::build_router;
pub use server::{ServerConfig, ServerError, serve_on, start_server};
pub use state::AppState;
