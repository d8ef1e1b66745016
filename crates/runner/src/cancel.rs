//! Sweep-wide cancellation driven by operator interrupts.

use std::sync::Arc;
use tokio::runtime::Handle;
use tokio::sync::watch;
use tracing::warn;

/// Cloneable cancellation flag. Once cancelled it stays cancelled.
#[derive(Debug, Clone)]
pub struct CancelToken {
    sender: Arc<watch::Sender<bool>>,
    receiver: watch::Receiver<bool>,
}

impl Default for CancelToken {
    fn default() -> Self {
        Self::new()
    }
}

impl CancelToken {
    pub fn new() -> Self {
        let (sender, receiver) = watch::channel(false);
        Self {
            sender: Arc::new(sender),
            receiver,
        }
    }

    pub fn cancel(&self) {
        self.sender.send_replace(true);
    }

    pub fn is_cancelled(&self) -> bool {
        *self.receiver.borrow()
    }

    /// Resolves once the token is cancelled.
    pub async fn cancelled(&self) {
        let mut receiver = self.receiver.clone();
        if receiver.wait_for(|cancelled| *cancelled).await.is_err() {
            std::future::pending::<()>().await;
        }
    }

    /// Cancel this token on SIGINT (and SIGTERM on unix).
    pub fn cancel_on_interrupt(&self, handle: &Handle) {
        let token = self.clone();
        handle.spawn(async move {
            if wait_for_interrupt().await {
                warn!("interrupt received; stopping sweep after the current step");
                token.cancel();
            }
        });
    }
}

#[cfg(unix)]
async fn wait_for_interrupt() -> bool {
    use tokio::signal::unix::{signal, SignalKind};

    let mut terminate = match signal(SignalKind::terminate()) {
        Ok(stream) => stream,
        Err(err) => {
            warn!(error = %err, "cannot listen for SIGTERM");
            return wait_for_ctrl_c().await;
        }
    };

    tokio::select! {
        interrupted = wait_for_ctrl_c() => interrupted,
        _ = terminate.recv() => true,
    }
}

#[cfg(not(unix))]
async fn wait_for_interrupt() -> bool {
    wait_for_ctrl_c().await
}

async fn wait_for_ctrl_c() -> bool {
    match tokio::signal::ctrl_c().await {
        Ok(()) => true,
        Err(err) => {
            warn!(error = %err, "cannot listen for Ctrl+C; interrupts will not print a summary");
            std::future::pending::<bool>().await
        }
    }
}
