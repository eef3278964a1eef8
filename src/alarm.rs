//! Fixed-interval poller that drives manual-mode TTFD detection.

use std::sync::{Arc, Weak};
use std::time::Duration;

use display_timing::TtfdSource;
use parking_lot::Mutex;
use screenperf_core_types::Clock;
use tokio::runtime::Handle;
use tokio::task::JoinHandle;
use tokio::time::{interval, MissedTickBehavior};
use tokio_util::sync::CancellationToken;
use tracing::{debug, trace};

use crate::session::ScreenSession;

/// Owned by the session it polls; dropping it stops the task.
pub struct ManualTtfdAlarm {
    cancel: CancellationToken,
    handle: JoinHandle<()>,
}

impl ManualTtfdAlarm {
    /// Spawns the poll loop on the current tokio runtime. Returns `None`
    /// outside a runtime; the host then drives polling itself.
    ///
    /// The loop ends on the first captured TTFD, when `cancel` fires, or
    /// once the session is gone or disposed.
    pub fn spawn(
        session: Weak<Mutex<ScreenSession>>,
        clock: Arc<dyn Clock>,
        period: Duration,
        cancel: CancellationToken,
    ) -> Option<Self> {
        let runtime = Handle::try_current().ok()?;
        let token = cancel.clone();
        let handle = runtime.spawn(async move {
            let mut ticker = interval(period.max(Duration::from_millis(1)));
            ticker.set_missed_tick_behavior(MissedTickBehavior::Skip);
            // The first tick completes immediately.
            ticker.tick().await;
            loop {
                tokio::select! {
                    _ = token.cancelled() => break,
                    _ = ticker.tick() => {
                        let Some(session) = session.upgrade() else {
                            break;
                        };
                        match poll_once(&session, clock.as_ref()) {
                            PollStep::Waiting => continue,
                            PollStep::Captured(source) => {
                                crate::metrics::record_ttfd_capture(source);
                                debug!(%source, "manual ttfd alarm fired");
                                break;
                            }
                            PollStep::Finished => break,
                        }
                    }
                }
            }
            trace!("manual ttfd alarm stopped");
        });
        Some(Self { cancel, handle })
    }

    pub fn is_finished(&self) -> bool {
        self.handle.is_finished()
    }

    pub fn cancel(&self) {
        self.cancel.cancel();
    }
}

impl Drop for ManualTtfdAlarm {
    fn drop(&mut self) {
        self.cancel.cancel();
    }
}

enum PollStep {
    Waiting,
    Captured(TtfdSource),
    Finished,
}

fn poll_once(session: &Mutex<ScreenSession>, clock: &dyn Clock) -> PollStep {
    let mut guard = session.lock();
    if guard.is_disposed() {
        return PollStep::Finished;
    }
    match guard.poll_manual(clock.now_ms()) {
        Some(source) => PollStep::Captured(source),
        None if guard.display_timing().ttfd_ms.is_some() => PollStep::Finished,
        None => PollStep::Waiting,
    }
}
