//! Signal handling for the long-running service.
//!
//! SIGINT, SIGTERM and SIGHUP cancel a [`CancellationToken`]; the caller
//! reacts by stopping the scheduler, which lets the in-flight stage finish.
//! A second signal exits immediately with status 130.

use std::sync::Arc;
use std::sync::atomic::{AtomicU32, Ordering};
use tokio_util::sync::CancellationToken;
use tracing::{error, info, warn};

#[cfg(unix)]
type Listeners = Option<(tokio::signal::unix::Signal, tokio::signal::unix::Signal)>;

#[cfg(unix)]
fn register_listeners() -> Listeners {
    use tokio::signal::unix::{SignalKind, signal};
    match (signal(SignalKind::terminate()), signal(SignalKind::hangup())) {
        (Ok(term), Ok(hup)) => Some((term, hup)),
        (Err(e), _) | (_, Err(e)) => {
            warn!("Could not register SIGTERM/SIGHUP handlers, only Ctrl+C stops the service: {e}");
            None
        }
    }
}

async fn ctrl_c() {
    if let Err(e) = tokio::signal::ctrl_c().await {
        error!("Failed to listen for Ctrl+C: {e}");
        std::future::pending::<()>().await;
    }
}

#[cfg(unix)]
async fn next_signal(listeners: &mut Listeners) {
    match listeners {
        Some((term, hup)) => {
            tokio::select! {
                _ = ctrl_c() => {}
                _ = term.recv() => {}
                _ = hup.recv() => {}
            }
        }
        None => ctrl_c().await,
    }
}

/// Spawns the signal listener and returns the token it cancels.
pub fn install_signal_handler() -> CancellationToken {
    let token = CancellationToken::new();
    let count = Arc::new(AtomicU32::new(0));

    let handler_token = token.clone();
    tokio::spawn(async move {
        #[cfg(unix)]
        let mut listeners = register_listeners();

        loop {
            #[cfg(unix)]
            next_signal(&mut listeners).await;

            #[cfg(not(unix))]
            ctrl_c().await;

            let prev = count.fetch_add(1, Ordering::SeqCst);
            if prev == 0 {
                info!("Shutdown requested, letting the current stage finish");
                info!("Send the signal again to force exit");
                handler_token.cancel();
            } else {
                warn!("Force exit requested");
                std::process::exit(130);
            }
        }
    });

    token
}
