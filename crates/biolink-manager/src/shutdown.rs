//! Shutdown signalling for background discovery.

use std::sync::Arc;

use tokio::sync::watch;

/// A handle for triggering or checking shutdown status.
#[derive(Debug, Clone)]
pub struct ShutdownHandle {
    tx: Arc<watch::Sender<bool>>,
    rx: watch::Receiver<bool>,
}

impl Default for ShutdownHandle {
    fn default() -> Self {
        Self::new()
    }
}

impl ShutdownHandle {
    /// Creates a handle in the running state.
    pub fn new() -> Self {
        let (tx, rx) = watch::channel(false);
        Self {
            tx: Arc::new(tx),
            rx,
        }
    }

    /// Triggers a shutdown.
    pub fn trigger(&self) {
        let _ = self.tx.send(true);
    }

    /// Returns true if shutdown has been triggered.
    pub fn is_shutdown(&self) -> bool {
        *self.rx.borrow()
    }

    /// Returns a future that completes when shutdown is triggered.
    pub fn signal(&self) -> ShutdownSignal {
        ShutdownSignal {
            rx: self.rx.clone(),
        }
    }
}

/// A signal that completes when shutdown is triggered.
///
/// Never completes if every handle is dropped without triggering.
pub struct ShutdownSignal {
    rx: watch::Receiver<bool>,
}

impl ShutdownSignal {
    /// Waits for the shutdown signal.
    pub async fn wait(mut self) {
        loop {
            if *self.rx.borrow() {
                return;
            }
            if self.rx.changed().await.is_err() {
                std::future::pending::<()>().await;
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::time::Duration;

    #[tokio::test]
    async fn trigger_sets_flag() {
        let handle = ShutdownHandle::new();
        assert!(!handle.is_shutdown());

        handle.clone().trigger();
        assert!(handle.is_shutdown());
    }

    #[tokio::test]
    async fn signal_wait() {
        let handle = ShutdownHandle::new();
        let signal = handle.signal();

        let trigger = handle.clone();
        tokio::spawn(async move {
            tokio::time::sleep(Duration::from_millis(10)).await;
            trigger.trigger();
        });

        let result = tokio::time::timeout(Duration::from_millis(500), signal.wait()).await;
        assert!(result.is_ok());
    }

    #[tokio::test]
    async fn dropped_handles_never_signal() {
        let handle = ShutdownHandle::new();
        let signal = handle.signal();
        drop(handle);

        let result = tokio::time::timeout(Duration::from_millis(20), signal.wait()).await;
        assert!(result.is_err());
    }
}
