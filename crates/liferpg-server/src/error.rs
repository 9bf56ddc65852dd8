//! Error types for the server binary.
//!
//! [`StartupError`] wraps every failure that can stop the process before
//! or while serving, so the startup helpers can propagate with `?`.

/// Top-level error for the server binary.
#[derive(Debug, thiserror::Error)]
pub enum StartupError {
    /// Configuration loading failed.
    #[error("config error: {source}")]
    Config {
        /// The underlying config error.
        #[from]
        source: liferpg_core::ConfigError,
    },

    /// The reference timezone is invalid.
    #[error("clock error: {source}")]
    Clock {
        /// The underlying clock error.
        #[from]
        source: liferpg_core::ClockError,
    },

    /// Connecting to or migrating the database failed.
    #[error("database error: {source}")]
    Database {
        /// The underlying storage error.
        #[from]
        source: liferpg_db::DbError,
    },

    /// The HTTP server failed to start or crashed.
    #[error("server error: {source}")]
    Server {
        /// The underlying server error.
        #[from]
        source: liferpg_api::ServerError,
    },
}
