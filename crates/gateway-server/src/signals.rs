//! Process signal handling.

use gateway_config::ConfigHandle;
use tokio::signal;
use tracing::{error, info, warn};

/// Resolves on Ctrl+C, SIGTERM or SIGQUIT and returns the signal name.
///
/// A handler that cannot be installed is logged and never fires; the others
/// still work.
pub async fn shutdown_signal() -> String {
    let ctrl_c = async {
        if let Err(e) = signal::ctrl_c().await {
            error!(error = %e, "Failed to install Ctrl+C handler");
            std::future::pending::<()>().await;
        }
        "ctrl+c"
    };

    #[cfg(unix)]
    let sigterm = wait_for(signal::unix::SignalKind::terminate(), "sigterm");
    #[cfg(unix)]
    let sigquit = wait_for(signal::unix::SignalKind::quit(), "sigquit");

    #[cfg(not(unix))]
    let sigterm = std::future::pending::<&str>();
    #[cfg(not(unix))]
    let sigquit = std::future::pending::<&str>();

    let signal_name = tokio::select! {
        name = ctrl_c => name,
        name = sigterm => name,
        name = sigquit => name,
    };

    info!(signal = signal_name, "Received shutdown signal");
    signal_name.to_string()
}

#[cfg(unix)]
async fn wait_for(kind: signal::unix::SignalKind, name: &'static str) -> &'static str {
    match signal::unix::signal(kind) {
        Ok(mut stream) => {
            stream.recv().await;
        }
        Err(e) => {
            error!(error = %e, signal = name, "Failed to install signal handler");
            std::future::pending::<()>().await;
        }
    }
    name
}

/// Reload configuration on every SIGHUP.
///
/// A failed reload keeps serving with the previous configuration.
pub fn spawn_reload_on_hangup(handle: ConfigHandle) -> tokio::task::JoinHandle<()> {
    tokio::spawn(async move {
        #[cfg(unix)]
        {
            let mut hangups = match signal::unix::signal(signal::unix::SignalKind::hangup()) {
                Ok(stream) => stream,
                Err(e) => {
                    error!(error = %e, "Failed to install SIGHUP handler; reload disabled");
                    return;
                }
            };
            while hangups.recv().await.is_some() {
                info!("SIGHUP received; reloading configuration");
                if let Err(e) = handle.reload() {
                    warn!(error = %e, "Configuration reload failed; keeping previous");
                }
            }
        }
        #[cfg(not(unix))]
        {
            let _ = handle;
        }
    })
}
