use tokio::sync::broadcast;

/// Listens for the server shutdown signal.
///
/// The signal is delivered through a `broadcast::Receiver`. Only a
/// single value is ever sent; once it arrives, the owning task should
/// wind down.
///
/// `Shutdown` tracks whether that value has already been observed, so
/// callers can poll `is_shutdown()` without consuming the channel
/// twice.
pub(crate) struct Shutdown {
    shutdown: bool,
    notify: broadcast::Receiver<()>,
}

impl Shutdown {
    pub(crate) fn new(notify: broadcast::Receiver<()>) -> Shutdown {
        Shutdown {
            shutdown: false,
            notify,
        }
    }

    pub(crate) fn is_shutdown(&self) -> bool {
        self.shutdown
    }

    /// Waits for the shutdown notification, returning immediately if
    /// it was already received.
    pub(crate) async fn recv(&mut self) {
        if self.shutdown {
            return;
        }

        // Only one value is ever sent, so a lag error can't happen here.
        let _ = self.notify.recv().await;

        self.shutdown = true;
    }
}
