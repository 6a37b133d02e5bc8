//! Interrupt handling
//!
//! Each interrupt becomes one [`UpstreamHandle::request_shutdown`] call, so the
//! first Ctrl-C closes the upstream gracefully and repeated ones force the
//! stop.

use std::future::Future;

use tokio::sync::watch;

use crate::client::{ClientState, ShutdownProgress, UpstreamHandle};

/// Wait for the next interrupt
///
/// Returns `false` when signals cannot be received.
#[cfg(unix)]
pub async fn interrupt() -> bool {
    use tokio::signal::unix::{signal, SignalKind};

    let mut sigterm = match signal(SignalKind::terminate()) {
        Ok(sigterm) => sigterm,
        Err(e) => {
            tracing::warn!(error = %e, "Failed to install SIGTERM handler");
            return tokio::signal::ctrl_c().await.is_ok();
        }
    };

    tokio::select! {
        result = tokio::signal::ctrl_c() => result.is_ok(),
        _ = sigterm.recv() => true,
    }
}

/// Wait for the next interrupt
///
/// Returns `false` when signals cannot be received.
#[cfg(not(unix))]
pub async fn interrupt() -> bool {
    tokio::signal::ctrl_c().await.is_ok()
}

/// Forward interrupts to the client until it stops
///
/// Returns once the client reaches [`ClientState::Stopped`], whether through a
/// signal or on its own, or when `next_signal` reports the source is gone.
pub async fn drive_shutdown<F, Fut>(handle: &UpstreamHandle, mut next_signal: F)
where
    F: FnMut() -> Fut,
    Fut: Future<Output = bool>,
{
    let stopped = wait_stopped(handle.watch_state());
    tokio::pin!(stopped);

    loop {
        tokio::select! {
            received = next_signal() => {
                if !received {
                    tracing::warn!("Signal source closed, no longer handling interrupts");
                    return;
                }
            }
            _ = &mut stopped => return,
        }

        tracing::debug!("Interrupt received");
        match handle.request_shutdown().await {
            ShutdownProgress::Stopped => return,
            ShutdownProgress::Closing | ShutdownProgress::AwaitingForce => {}
        }
    }
}

async fn wait_stopped(mut state: watch::Receiver<ClientState>) {
    loop {
        if state.borrow_and_update().is_terminal() {
            return;
        }
        if state.changed().await.is_err() {
            return;
        }
    }
}
