//! HTTP front end for chargen.
//!
//! Exposes the character operations and backup store as JSON endpoints and
//! runs the autosaver alongside the listener. See [`routes`] for the route
//! table.

pub mod error;
pub mod routes;

use std::net::SocketAddr;
use std::sync::Arc;
use std::time::Duration;

use tokio::net::TcpListener;
use tokio::sync::oneshot;
use tracing::{info, warn};

use chargen_core::{Autosaver, PdfConverter};
use chargen_provider::TextGenerator;
use chargen_shared::{ChargenError, Result};
use chargen_storage::BackupStore;

pub use error::ApiError;
pub use routes::{AppState, app_router};

/// Runtime options for [`serve`].
#[derive(Debug, Clone)]
pub struct ServeOptions {
    pub addr: SocketAddr,
    pub autosave_interval: Duration,
    pub autosave_name: String,
}

/// Bind, serve until Ctrl+C / SIGTERM, then flush a final autosave.
pub async fn serve<G, P, S>(state: AppState<G, P, S>, options: ServeOptions) -> Result<()>
where
    G: TextGenerator + 'static,
    P: PdfConverter + 'static,
    S: BackupStore + 'static,
{
    let listener = TcpListener::bind(options.addr)
        .await
        .map_err(|e| ChargenError::Network(format!("failed to bind {}: {e}", options.addr)))?;

    let (stop_autosave, autosave_shutdown) = oneshot::channel();
    let autosave = Autosaver::new(Arc::clone(&state.store), options.autosave_interval)
        .with_name(options.autosave_name)
        .spawn(state.subscribe(), autosave_shutdown);

    info!(addr = %options.addr, "chargen server listening");

    let served = axum::serve(listener, app_router(state))
        .with_graceful_shutdown(shutdown_signal())
        .await
        .map_err(|e| ChargenError::Network(format!("server error: {e}")));

    info!("chargen server shutting down");
    let _ = stop_autosave.send(());
    if let Err(e) = autosave.await {
        warn!(error = %e, "autosave task did not finish cleanly");
    }

    served
}

/// Resolves on Ctrl+C, or SIGTERM on Unix.
async fn shutdown_signal() {
    let ctrl_c = async {
        if let Err(e) = tokio::signal::ctrl_c().await {
            warn!(error = %e, "failed to listen for Ctrl+C");
            std::future::pending::<()>().await;
        }
    };

    #[cfg(unix)]
    let terminate = async {
        match tokio::signal::unix::signal(tokio::signal::unix::SignalKind::terminate()) {
            Ok(mut signal) => {
                signal.recv().await;
            }
            Err(e) => {
                warn!(error = %e, "failed to install SIGTERM handler");
                std::future::pending::<()>().await;
            }
        }
    };

    #[cfg(not(unix))]
    let terminate = std::future::pending::<()>();

    tokio::select! {
        _ = ctrl_c => info!("received Ctrl+C"),
        _ = terminate => info!("received terminate signal"),
    }
}
