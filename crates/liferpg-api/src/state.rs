//! Shared application state for the HTTP adapter.
//!
//! [`AppState`] wraps the engine facade. Handlers never touch the store
//! directly; every business rule lives behind [`GameService`].

use std::time::Instant;

use liferpg_core::GameService;

/// State shared by all handlers.
#[derive(Debug)]
pub struct AppState<S, C> {
    /// The engines.
    pub service: GameService<S, C>,
    /// When the process started serving.
    pub started_at: Instant,
}

impl<S, C> AppState<S, C> {
    /// Wrap a service.
    pub fn new(service: GameService<S, C>) -> Self {
        Self {
            service,
            started_at: Instant::now(),
        }
    }
}
