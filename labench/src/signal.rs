use std::sync::Arc;
use tokio::sync::watch;

/// Creates a linked cancellation pair.
///
/// The handle may be cloned and triggered from any number of producers; triggering is
/// idempotent. Every clone of the signal observes the same, single transition.
pub fn cancellation() -> (CancelHandle, CancelSignal) {
    let (tx, rx) = watch::channel(false);
    (CancelHandle { tx: Arc::new(tx) }, CancelSignal { rx })
}

#[derive(Clone, Debug)]
pub struct CancelHandle {
    tx: Arc<watch::Sender<bool>>,
}

impl CancelHandle {
    pub fn cancel(&self) {
        self.tx.send_replace(true);
    }

    pub fn is_cancelled(&self) -> bool {
        *self.tx.borrow()
    }

    pub fn signal(&self) -> CancelSignal {
        CancelSignal {
            rx: self.tx.subscribe(),
        }
    }
}

#[derive(Clone, Debug)]
pub struct CancelSignal {
    rx: watch::Receiver<bool>,
}

impl CancelSignal {
    /// A signal that never fires.
    pub fn never() -> Self {
        let (_, signal) = cancellation();
        signal
    }

    pub fn is_cancelled(&self) -> bool {
        *self.rx.borrow()
    }

    /// Resolves once cancelled. Pends forever if every handle was dropped without cancelling.
    pub async fn cancelled(&self) {
        let mut rx = self.rx.clone();
        if rx.wait_for(|cancelled| *cancelled).await.is_err() {
            std::future::pending::<()>().await;
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::time::Duration;

    #[tokio::test]
    async fn cancel_is_broadcast() {
        let (handle, signal) = cancellation();
        let other = signal.clone();
        let waiter = tokio::spawn(async move { other.cancelled().await });

        assert!(!signal.is_cancelled());
        handle.cancel();
        handle.clone().cancel();

        waiter.await.unwrap();
        assert!(signal.is_cancelled());
        assert!(handle.signal().is_cancelled());
    }

    #[tokio::test(start_paused = true)]
    async fn never_does_not_fire() {
        let signal = CancelSignal::never();
        let res = tokio::time::timeout(Duration::from_secs(3600), signal.cancelled()).await;
        assert!(res.is_err());
    }
}
