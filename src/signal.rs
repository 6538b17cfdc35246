//! Host readiness signal.
//!
//! The host fires a [`ReadyTrigger`] once its own startup is complete; the
//! cache holds the matching [`ReadySignal`] and syncs when it fires.
//!
//! ```
//! use recondb::ready_signal;
//!
//! # #[tokio::main]
//! # async fn main() {
//! let (trigger, mut signal) = ready_signal();
//! assert!(!signal.is_fired());
//! trigger.fire();
//! assert!(signal.wait().await);
//! # }
//! ```

use tokio::sync::watch;

/// Create a linked trigger/signal pair.
#[must_use]
pub fn ready_signal() -> (ReadyTrigger, ReadySignal) {
    let (tx, rx) = watch::channel(false);
    (ReadyTrigger { tx }, ReadySignal { rx })
}

/// Host side of the readiness signal.
#[derive(Debug)]
pub struct ReadyTrigger {
    tx: watch::Sender<bool>,
}

impl ReadyTrigger {
    /// Fire the signal. Returns `false` if it had already fired.
    pub fn fire(&self) -> bool {
        self.tx.send_if_modified(|fired| {
            if *fired {
                false
            } else {
                *fired = true;
                true
            }
        })
    }
}

/// Cache side of the readiness signal.
#[derive(Debug, Clone)]
pub struct ReadySignal {
    rx: watch::Receiver<bool>,
}

impl ReadySignal {
    #[must_use]
    pub fn is_fired(&self) -> bool {
        *self.rx.borrow()
    }

    /// Wait until the signal fires.
    ///
    /// Returns `false` if the trigger was dropped without firing.
    pub async fn wait(&mut self) -> bool {
        self.rx.wait_for(|fired| *fired).await.is_ok()
    }
}
