//! Process shutdown signal handling.

use std::io;

use tracing::info;

/// Install the shutdown signal handlers now and return a future that
/// resolves when SIGINT or SIGTERM arrives.
///
/// Handler installation failures propagate to the caller at startup instead
/// of surfacing deep inside the serve loop; the returned future itself is
/// infallible and fits `serve_with_shutdown`.
#[cfg(unix)]
pub fn shutdown_signal() -> io::Result<impl Future<Output = ()>> {
    use tokio::signal::unix::{SignalKind, signal};

    let mut interrupt = signal(SignalKind::interrupt())?;
    let mut terminate = signal(SignalKind::terminate())?;

    Ok(async move {
        tokio::select! {
            _ = interrupt.recv() => {}
            _ = terminate.recv() => {}
        }
        info!("shutdown signal received");
    })
}

#[cfg(not(unix))]
pub fn shutdown_signal() -> io::Result<impl Future<Output = ()>> {
    Ok(async {
        if let Err(e) = tokio::signal::ctrl_c().await {
            tracing::warn!(error = %e, "ctrl-c handler failed, shutting down");
        }
        info!("shutdown signal received");
    })
}
