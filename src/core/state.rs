//! Process-wide shutdown state.
//!
//! The Ctrl+C handler sets `SHUTDOWN` and notifies the registered watch
//! loop. With nothing registered (one-shot build, config errors) the
//! process exits right away.

use std::sync::OnceLock;
use std::sync::atomic::{AtomicBool, Ordering};

use crossbeam::channel::{self, Receiver, Sender};

/// Shutdown has been requested (Ctrl+C received)
static SHUTDOWN: AtomicBool = AtomicBool::new(false);

/// Shutdown signal sender for the watch loop
static SHUTDOWN_TX: OnceLock<Sender<()>> = OnceLock::new();

/// Setup the global Ctrl+C handler. Call once at program start.
pub fn setup_shutdown_handler() -> anyhow::Result<()> {
    ctrlc::set_handler(request_shutdown)
        .map_err(|e| anyhow::anyhow!("failed to set Ctrl+C handler: {}", e))
}

/// Register the watch loop for graceful shutdown.
///
/// Returns `None` if a receiver was already handed out.
pub fn register_shutdown() -> Option<Receiver<()>> {
    let (tx, rx) = channel::bounded(1);
    SHUTDOWN_TX.set(tx).ok().map(|()| rx)
}

/// Flag shutdown and wake the registered loop, or exit if there is none.
pub fn request_shutdown() {
    SHUTDOWN.store(true, Ordering::SeqCst);
    match SHUTDOWN_TX.get() {
        Some(tx) => {
            crate::log!("watch"; "shutting down...");
            let _ = tx.try_send(());
        }
        None => std::process::exit(0),
    }
}

/// Check if shutdown has been requested
pub fn is_shutdown() -> bool {
    SHUTDOWN.load(Ordering::Relaxed)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_registered_loop_receives_shutdown() {
        let rx = register_shutdown().unwrap();
        assert!(register_shutdown().is_none());
        assert!(!is_shutdown());

        request_shutdown();
        request_shutdown();
        assert!(is_shutdown());
        assert!(rx.try_recv().is_ok());
        assert!(rx.try_recv().is_err());
    }
}
