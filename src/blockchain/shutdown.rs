use std::future::Future;
use tokio::sync::watch;
use tokio::time::Instant;

/// Owner side of a shutdown signal
#[derive(Debug)]
pub struct ShutdownTrigger {
    tx: watch::Sender<bool>,
}

impl ShutdownTrigger {
    pub fn trigger(&self) {
        self.tx.send_replace(true);
    }

    pub fn is_triggered(&self) -> bool {
        *self.tx.borrow()
    }
}

/// Task side of a shutdown signal, with an optional deadline.
///
/// A dropped trigger never fires; only an explicit `trigger()` or the
/// deadline cancels.
#[derive(Debug, Clone)]
pub struct Shutdown {
    rx: watch::Receiver<bool>,
    deadline: Option<Instant>,
}

pub fn channel() -> (ShutdownTrigger, Shutdown) {
    let (tx, rx) = watch::channel(false);
    (ShutdownTrigger { tx }, Shutdown { rx, deadline: None })
}

impl Shutdown {
    pub fn with_deadline(mut self, deadline: Instant) -> Self {
        self.deadline = Some(deadline);
        self
    }

    pub fn is_cancelled(&self) -> bool {
        let deadline_passed = self.deadline.map_or(false, |deadline| Instant::now() >= deadline);
        *self.rx.borrow() || deadline_passed
    }

    /// Resolves once the trigger fires or the deadline passes
    pub async fn cancelled(&mut self) {
        let rx = &mut self.rx;
        let signalled = async move {
            if rx.wait_for(|triggered| *triggered).await.is_err() {
                std::future::pending::<()>().await;
            }
        };

        match self.deadline {
            Some(deadline) => {
                tokio::select! {
                    _ = signalled => {}
                    _ = tokio::time::sleep_until(deadline) => {}
                }
            }
            None => signalled.await,
        }
    }

    /// Run `fut` unless cancellation comes first; `None` means cancelled.
    pub async fn guard<F: Future>(&mut self, fut: F) -> Option<F::Output> {
        tokio::select! {
            biased;
            _ = self.cancelled() => None,
            output = fut => Some(output),
        }
    }
}
