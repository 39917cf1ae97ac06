/*!
 * Concurrency primitives shared by translation runs.
 *
 * - `ConcurrencyLimiter`: process-wide cap on in-flight chunk translations.
 *   Clones share the same semaphore, so every run submitted through clones
 *   of one service competes for the same permits.
 * - `CancellationHandle` / `CancelSignal`: a one-shot abort flag built on a
 *   `watch` channel that any suspension point can `select!` against.
 */

use std::sync::Arc;

use tokio::sync::{OwnedSemaphorePermit, Semaphore, watch};

use crate::errors::TranslationError;

/// Bounds the number of chunk translations running at once
#[derive(Debug, Clone)]
pub struct ConcurrencyLimiter {
    semaphore: Arc<Semaphore>,
    capacity: usize,
}

impl ConcurrencyLimiter {
    pub fn new(capacity: usize) -> Result<Self, TranslationError> {
        if capacity == 0 {
            return Err(TranslationError::Config(
                "max concurrent translations must be a positive integer".to_string(),
            ));
        }
        Ok(Self {
            semaphore: Arc::new(Semaphore::new(capacity)),
            capacity,
        })
    }

    pub fn capacity(&self) -> usize {
        self.capacity
    }

    /// Permits not currently held
    pub fn available(&self) -> usize {
        self.semaphore.available_permits()
    }

    /// Wait for a permit, giving up if the run is cancelled first
    pub async fn acquire(&self, cancel: &CancelSignal) -> Result<OwnedSemaphorePermit, TranslationError> {
        if cancel.is_cancelled() {
            return Err(TranslationError::Cancelled);
        }

        let semaphore = Arc::clone(&self.semaphore);
        tokio::select! {
            permit = semaphore.acquire_owned() => {
                permit.map_err(|_| TranslationError::Config("concurrency limiter closed".to_string()))
            }
            _ = cancel.cancelled() => Err(TranslationError::Cancelled),
        }
    }
}

/// Create a linked cancellation handle and signal
pub fn cancellation() -> (CancellationHandle, CancelSignal) {
    let (tx, rx) = watch::channel(false);
    (CancellationHandle { tx: Arc::new(tx) }, CancelSignal { rx })
}

/// Requests cancellation of every run holding a matching signal
#[derive(Debug, Clone)]
pub struct CancellationHandle {
    tx: Arc<watch::Sender<bool>>,
}

impl CancellationHandle {
    pub fn cancel(&self) {
        self.tx.send_replace(true);
    }

    pub fn is_cancelled(&self) -> bool {
        *self.tx.borrow()
    }

    /// A new signal observing this handle
    pub fn signal(&self) -> CancelSignal {
        CancelSignal { rx: self.tx.subscribe() }
    }
}

/// Observes a cancellation request
#[derive(Debug, Clone)]
pub struct CancelSignal {
    rx: watch::Receiver<bool>,
}

impl CancelSignal {
    /// A signal that is never cancelled
    pub fn never() -> Self {
        let (tx, rx) = watch::channel(false);
        // The sender is dropped, which `cancelled` treats as "never"
        drop(tx);
        Self { rx }
    }

    pub fn is_cancelled(&self) -> bool {
        *self.rx.borrow()
    }

    /// Resolves once cancellation is requested; pending forever otherwise
    pub async fn cancelled(&self) {
        let mut rx = self.rx.clone();
        loop {
            if *rx.borrow_and_update() {
                return;
            }
            if rx.changed().await.is_err() {
                std::future::pending::<()>().await;
            }
        }
    }
}
