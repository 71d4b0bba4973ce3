//! Keep-alive indicator for long-running exchanges
//!
//! While an exchange is in flight the transport is pulsed periodically
//! (a typing indicator, a spinner). The loop is bound to an explicit stop
//! signal and must be stopped as soon as the reply is ready, whether the
//! exchange succeeded or failed.

use std::sync::Arc;
use std::time::Duration;

use async_trait::async_trait;
use tokio::sync::watch;
use tokio::task::{JoinError, JoinHandle};

use crate::Result;

/// Default interval between pulses
pub const DEFAULT_PULSE_INTERVAL: Duration = Duration::from_secs(4);

/// Something that can show the user a request is still being worked on
#[async_trait]
pub trait KeepAlive: Send + Sync {
    /// Emit one pulse
    ///
    /// # Errors
    ///
    /// Returns an error if the indicator cannot be shown; the loop stops
    async fn pulse(&self) -> Result<()>;
}

/// A running keep-alive loop
#[derive(Debug)]
pub struct Heartbeat {
    stop: watch::Sender<bool>,
    handle: JoinHandle<()>,
}

impl Heartbeat {
    /// Start pulsing `indicator` every `interval`
    ///
    /// The first pulse is emitted immediately.
    #[must_use]
    pub fn start(indicator: Arc<dyn KeepAlive>, interval: Duration) -> Self {
        let (stop, mut stopped) = watch::channel(false);

        let handle = tokio::spawn(async move {
            loop {
                // A pulse that hangs must not outlive the stop signal
                tokio::select! {
                    biased;
                    _ = stopped.changed() => break,
                    pulsed = indicator.pulse() => {
                        if let Err(e) = pulsed {
                            tracing::debug!(error = %e, "keep-alive pulse failed");
                            break;
                        }
                    }
                }

                tokio::select! {
                    changed = stopped.changed() => {
                        // A dropped sender counts as a stop
                        if changed.is_err() || *stopped.borrow() {
                            break;
                        }
                    }
                    () = tokio::time::sleep(interval) => {}
                }
            }
        });

        Self { stop, handle }
    }

    /// Signal the loop to stop and wait for it to exit
    ///
    /// The loop is aborted as well, so an indicator that never returns
    /// cannot hold up the caller.
    pub async fn stop(self) {
        // Send fails only if the loop already exited
        let _ = self.stop.send(true);
        self.handle.abort();
        if let Some(e) = self.handle.await.err().filter(JoinError::is_panic) {
            tracing::warn!(error = %e, "keep-alive loop panicked");
        }
    }

    /// Whether the loop has exited
    #[must_use]
    pub fn is_finished(&self) -> bool {
        self.handle.is_finished()
    }
}
