//! Operator termination signals

use std::future::Future;
use tracing::{error, info};

use crate::event::{Event, EventEmitter};

/// Completes with the name of the first SIGTERM, SIGINT or SIGQUIT delivered
#[cfg(unix)]
pub async fn wait_for_shutdown_signal() -> std::io::Result<&'static str> {
    use tokio::signal::unix::{signal, SignalKind};

    let mut term = signal(SignalKind::terminate())?;
    let mut int = signal(SignalKind::interrupt())?;
    let mut quit = signal(SignalKind::quit())?;

    let name = tokio::select! {
        _ = term.recv() => "SIGTERM",
        _ = int.recv() => "SIGINT",
        _ = quit.recv() => "SIGQUIT",
    };
    Ok(name)
}

#[cfg(not(unix))]
pub async fn wait_for_shutdown_signal() -> std::io::Result<&'static str> {
    tokio::signal::ctrl_c().await.map(|()| "ctrl-c")
}

/// Emit [`Event::ExternalTerminationRequested`] when `signal` completes.
///
/// If the handler cannot be installed the listener reports and exits without
/// emitting.
pub async fn listen_for<F>(signal: F, emitter: EventEmitter) -> bool
where
    F: Future<Output = std::io::Result<&'static str>>,
{
    match signal.await {
        Ok(name) => {
            info!(signal = name, "termination signal received");
            emitter.emit(Event::ExternalTerminationRequested).await
        }
        Err(e) => {
            error!(error = %e, "failed to install signal handler");
            false
        }
    }
}
