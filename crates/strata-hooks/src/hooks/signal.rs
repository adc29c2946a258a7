//! Completion signals handed to continuation-style hook bodies.

use std::sync::{Arc, Mutex, PoisonError};

use tokio::sync::oneshot;
use tracing::debug;

use strata_core::AppError;

type Slot = Arc<Mutex<Option<oneshot::Sender<Option<AppError>>>>>;

/// One-shot completion handle.
///
/// The first call to [`ok`](Self::ok) or [`err`](Self::err) is delivered to
/// the engine; every later call, from this handle or any clone of it, is a
/// no-op. Dropping every clone without signaling is reported to the engine
/// as an abandoned hook.
#[derive(Clone)]
pub struct Next {
    slot: Slot,
}

impl std::fmt::Debug for Next {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("Next")
            .field("signaled", &self.is_signaled())
            .finish()
    }
}

impl Next {
    /// Creates a handle and the receiver the engine waits on.
    pub(crate) fn channel() -> (Self, oneshot::Receiver<Option<AppError>>) {
        let (tx, rx) = oneshot::channel();
        (
            Self {
                slot: Arc::new(Mutex::new(Some(tx))),
            },
            rx,
        )
    }

    /// Signals successful completion.
    pub fn ok(&self) {
        self.signal(None);
    }

    /// Signals completion with an error.
    ///
    /// For error-handling post hooks this replaces the chain's error.
    pub fn err(&self, error: AppError) {
        self.signal(Some(error));
    }

    /// Delivers `outcome` if this is the first signal.
    ///
    /// Returns `true` when the signal was delivered.
    pub fn signal(&self, outcome: Option<AppError>) -> bool {
        let sender = self
            .slot
            .lock()
            .unwrap_or_else(PoisonError::into_inner)
            .take();

        match sender {
            // The receiver may already be gone if the engine timed out.
            Some(tx) => tx.send(outcome).is_ok(),
            None => {
                debug!("Ignoring repeated completion signal");
                false
            }
        }
    }

    /// Returns whether a signal has already been sent.
    pub fn is_signaled(&self) -> bool {
        self.slot
            .lock()
            .unwrap_or_else(PoisonError::into_inner)
            .is_none()
    }
}
