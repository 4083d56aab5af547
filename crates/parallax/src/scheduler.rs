//! Frame loop
//!
//! One task that re-arms on a fixed interval and calls a tick closure until
//! the closure returns `false` or the loop is stopped. Missed ticks are
//! skipped rather than bursted.

use std::time::Duration;

use plxproto::SessionPort;
use tokio::task::JoinHandle;
use tokio::time::MissedTickBehavior;
use tokio_util::sync::CancellationToken;
use tracing::{debug, trace};

#[derive(Debug)]
pub struct FrameLoop {
    cancel: CancellationToken,
    handle: JoinHandle<()>,
}

impl FrameLoop {
    /// Start ticking. `tick` receives a frame counter starting at 1.
    pub fn spawn<F>(interval: Duration, mut tick: F) -> Self
    where
        F: FnMut(u64) -> bool + Send + 'static,
    {
        let cancel = CancellationToken::new();
        let token = cancel.clone();

        let handle = tokio::spawn(async move {
            let mut ticker = tokio::time::interval(interval);
            ticker.set_missed_tick_behavior(MissedTickBehavior::Skip);
            let mut frame: u64 = 0;

            loop {
                tokio::select! {
                    biased;

                    _ = token.cancelled() => break,

                    _ = ticker.tick() => {
                        frame += 1;
                        trace!(frame, "Frame tick");
                        if !tick(frame) {
                            debug!(frame, "Frame loop finished");
                            break;
                        }
                    }
                }
            }
        });

        Self { cancel, handle }
    }

    /// Stop when `session` closes.
    pub fn stop_on_close(&self, session: &SessionPort) {
        let token = self.cancel.clone();
        session.close_event().add_listener(move |_| token.cancel());
    }

    pub fn stop(&self) {
        self.cancel.cancel();
    }

    pub fn is_running(&self) -> bool {
        !self.handle.is_finished()
    }

    /// Stop and wait for the task to exit.
    pub async fn shutdown(self) {
        self.cancel.cancel();
        let _ = self.handle.await;
    }
}
