//! Stop signal for the accept loop.

use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::Arc;

use tokio::sync::broadcast;

/// Tells the listener to stop accepting.
///
/// Only the accept loop listens; requests already admitted are not
/// interrupted and finish on their own. Cloning shares the same signal, so a
/// signal handler task can hold one copy while `main` holds another.
#[derive(Clone)]
pub struct Shutdown {
    notify: broadcast::Sender<()>,
    triggered: Arc<AtomicBool>,
}

impl Shutdown {
    pub fn new() -> Self {
        let (notify, _) = broadcast::channel(1);
        Self {
            notify,
            triggered: Arc::new(AtomicBool::new(false)),
        }
    }

    /// A receiver that resolves once [`trigger`](Self::trigger) is called.
    /// Subscribe before triggering; late subscribers miss the signal.
    pub fn subscribe(&self) -> broadcast::Receiver<()> {
        self.notify.subscribe()
    }

    /// Raise the signal. Repeated calls are harmless.
    pub fn trigger(&self) {
        if !self.triggered.swap(true, Ordering::SeqCst) {
            let _ = self.notify.send(());
        }
    }

    /// Whether the stop was requested, as opposed to the listener ending on
    /// its own.
    pub fn is_triggered(&self) -> bool {
        self.triggered.load(Ordering::SeqCst)
    }
}

impl Default for Shutdown {
    fn default() -> Self {
        Self::new()
    }
}
