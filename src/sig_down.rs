//! Signal-driven graceful shutdown.
//!
//! Listens for SIGINT/SIGTERM and exposes a [`CancellationToken`] the axum
//! server uses for graceful shutdown. In-flight webhook handlers run to
//! completion; any relay submission already started finishes its ledger
//! update before the process exits.

use tokio_util::sync::CancellationToken;

/// Shutdown signal listener.
pub struct SigDown {
    token: CancellationToken,
}

impl SigDown {
    /// Spawns the signal listener.
    pub fn try_new() -> std::io::Result<Self> {
        let token = CancellationToken::new();

        #[cfg(unix)]
        {
            use tokio::signal::unix::{SignalKind, signal};
            let mut sigterm = signal(SignalKind::terminate())?;
            let mut sigint = signal(SignalKind::interrupt())?;
            let token = token.clone();
            tokio::spawn(async move {
                tokio::select! {
                    _ = sigterm.recv() => tracing::info!("received SIGTERM, shutting down"),
                    _ = sigint.recv() => tracing::info!("received SIGINT, shutting down"),
                }
                token.cancel();
            });
        }

        #[cfg(not(unix))]
        {
            let token = token.clone();
            tokio::spawn(async move {
                if tokio::signal::ctrl_c().await.is_ok() {
                    tracing::info!("received ctrl-c, shutting down");
                }
                token.cancel();
            });
        }

        Ok(Self { token })
    }

    /// Token cancelled once a shutdown signal arrives.
    pub fn cancellation_token(&self) -> CancellationToken {
        self.token.clone()
    }
}
