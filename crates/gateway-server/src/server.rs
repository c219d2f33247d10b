//! HTTP listener with graceful shutdown.

use std::future::{Future, IntoFuture};
use std::net::SocketAddr;
use std::time::Duration;
use thiserror::Error;
use tokio::net::TcpListener;
use tokio::sync::oneshot;
use tracing::{info, warn};

use crate::{routes::create_router, state::AppState};

/// Server errors
#[derive(Debug, Error)]
pub enum ServerError {
    /// Host/port do not form a socket address
    #[error("Invalid listen address {0}")]
    InvalidAddress(String),

    /// Could not bind the listener
    #[error("Failed to bind {addr}: {source}")]
    Bind {
        /// Address
        addr: SocketAddr,
        /// Underlying error
        #[source]
        source: std::io::Error,
    },

    /// Listener failed while serving
    #[error("Server error: {0}")]
    Io(#[from] std::io::Error),
}

/// The gateway HTTP server
#[derive(Debug, Clone)]
pub struct Server {
    state: AppState,
}

impl Server {
    /// Create a server over `state`
    #[must_use]
    pub fn new(state: AppState) -> Self {
        Self { state }
    }

    /// Bind the configured address and serve until `shutdown` resolves
    ///
    /// # Errors
    /// Returns an error if the address is invalid, binding fails, or serving fails
    pub async fn run<F>(self, shutdown: F) -> Result<(), ServerError>
    where
        F: Future<Output = ()> + Send + 'static,
    {
        let settings = self.state.config.snapshot().server.clone();
        let addr = settings
            .socket_addr()
            .map_err(|_| ServerError::InvalidAddress(format!("{}:{}", settings.host, settings.port)))?;

        let listener = TcpListener::bind(addr)
            .await
            .map_err(|source| ServerError::Bind { addr, source })?;

        self.serve(listener, shutdown).await
    }

    /// Serve on an already bound listener.
    ///
    /// After `shutdown` resolves, in-flight requests (streams included) get
    /// the configured grace period before their connections are dropped.
    ///
    /// # Errors
    /// Returns an error if the listener fails
    pub async fn serve<F>(self, listener: TcpListener, shutdown: F) -> Result<(), ServerError>
    where
        F: Future<Output = ()> + Send + 'static,
    {
        let grace = self.state.config.snapshot().server.shutdown_timeout;
        let local_addr = listener.local_addr()?;
        let router = create_router(self.state);

        let (started_tx, started_rx) = oneshot::channel::<()>();
        let signal = async move {
            shutdown.await;
            info!("Shutdown requested; draining in-flight requests");
            let _ = started_tx.send(());
        };

        info!(addr = %local_addr, "Gateway listening");

        let server = axum::serve(listener, router)
            .with_graceful_shutdown(signal)
            .into_future();

        tokio::select! {
            result = server => result?,
            () = grace_elapsed(started_rx, grace) => {
                warn!(grace_secs = grace.as_secs(), "Grace period elapsed; dropping open connections");
            }
        }

        info!("Server stopped");
        Ok(())
    }
}

async fn grace_elapsed(started: oneshot::Receiver<()>, grace: Duration) {
    if started.await.is_err() {
        // The server finished without a shutdown request.
        std::future::pending::<()>().await;
    }
    tokio::time::sleep(grace).await;
}
