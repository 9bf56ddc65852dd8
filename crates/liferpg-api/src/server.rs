//! Listener setup and graceful shutdown.

use std::net::SocketAddr;
use std::sync::Arc;

use liferpg_core::Clock;
use liferpg_db::Store;
use tokio::net::TcpListener;
use tracing::info;

use crate::router::build_router;
use crate::state::AppState;

/// Where to listen.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ServerConfig {
    /// Interface to bind, e.g. `0.0.0.0`.
    pub host: String,
    /// TCP port; `0` picks a free one.
    pub port: u16,
}

impl ServerConfig {
    /// Resolve `host:port` into a socket address.
    ///
    /// # Errors
    ///
    /// [`ServerError::Address`] if the host is not an IP literal.
    pub fn socket_addr(&self) -> Result<SocketAddr, ServerError> {
        let raw = format!("{}:{}", self.host, self.port);
        raw.parse()
            .map_err(|source| ServerError::Address { raw, source })
    }
}

impl Default for ServerConfig {
    fn default() -> Self {
        Self {
            host: "0.0.0.0".to_owned(),
            port: 8080,
        }
    }
}

/// Failures while starting or running the listener.
#[derive(Debug, thiserror::Error)]
pub enum ServerError {
    /// `host:port` is not a socket address.
    #[error("invalid listen address {raw}: {source}")]
    Address {
        /// The offending `host:port`.
        raw: String,
        /// Parse failure.
        source: std::net::AddrParseError,
    },

    /// The port could not be bound.
    #[error("failed to bind {addr}: {source}")]
    Bind {
        /// Address we tried.
        addr: SocketAddr,
        /// OS error.
        source: std::io::Error,
    },

    /// Accepting or serving connections failed.
    #[error("server I/O error: {0}")]
    Serve(#[source] std::io::Error),
}

/// Bind `config` and serve until `Ctrl-C`.
///
/// # Errors
///
/// See [`ServerError`].
pub async fn start_server<S, C>(
    config: &ServerConfig,
    state: Arc<AppState<S, C>>,
) -> Result<(), ServerError>
where
    S: Store + 'static,
    C: Clock + 'static,
{
    let addr = config.socket_addr()?;
    let listener = TcpListener::bind(addr)
        .await
        .map_err(|source| ServerError::Bind { addr, source })?;
    serve_on(listener, state).await
}

/// Serve on an already bound listener until `Ctrl-C`.
///
/// In-flight requests finish before this returns, so no transaction is
/// cut off halfway.
///
/// # Errors
///
/// [`ServerError::Serve`] on a fatal I/O error.
pub async fn serve_on<S, C>(
    listener: TcpListener,
    state: Arc<AppState<S, C>>,
) -> Result<(), ServerError>
where
    S: Store + 'static,
    C: Clock + 'static,
{
    if let Ok(local) = listener.local_addr() {
        info!(addr = %local, "HTTP API listening");
    }

    axum::serve(listener, build_router(state))
        .with_graceful_shutdown(async {
            match tokio::signal::ctrl_c().await {
                Ok(()) => info!("Shutdown requested, draining connections"),
                Err(e) => {
                    tracing::error!(error = %e, "Cannot listen for Ctrl-C, serving until killed");
                    std::future::pending::<()>().await;
                }
            }
        })
        .await
        .map_err(ServerError::Serve)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn resolves_ip_literal() {
        let config = ServerConfig {
            host: "127.0.0.1".to_owned(),
            port: 9000,
        };
        assert_eq!(
            config.socket_addr().ok(),
            Some(SocketAddr::from(([127, 0, 0, 1], 9000)))
        );
    }

    #[test]
    fn rejects_hostname() {
        let config = ServerConfig {
            host: "localhost".to_owned(),
            port: 9000,
        };
        assert!(matches!(
            config.socket_addr(),
            Err(ServerError::Address { .. })
        ));
    }
}
