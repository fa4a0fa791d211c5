//! Single-slot timeout scheduler.
//!
//! ```text
//! schedule(ti) ──▶ [slot: latest (height, round, step)] ──▶ [ticker loop]
//!                                   (sleep elapses) ──▶ BftEvent::Timeout(ti)
//! ```

use super::BftEvent;
use crate::domain::TimeoutInfo;
use std::sync::Arc;
use tokio::sync::{mpsc, watch};
use tokio::task::JoinHandle;
use tokio::time::{self, Instant};
use tracing::{debug, trace};

/// Schedules timeouts on a running [`TimeoutTicker`].
#[derive(Debug, Clone)]
pub struct TickerHandle {
    slot: Arc<watch::Sender<Option<TimeoutInfo>>>,
}

impl TickerHandle {
    /// Arm `ti` unless a later `(height, round, step)` is already armed.
    /// Equal keys re-arm; earlier ones are stale.
    pub fn schedule_timeout(&self, ti: TimeoutInfo) {
        self.slot.send_if_modified(|slot| {
            if slot.as_ref().is_some_and(|current| ti.key() < current.key()) {
                trace!(height = ti.height, round = ti.round, step = %ti.step, "Ignored stale timeout");
                return false;
            }
            *slot = Some(ti);
            true
        });
    }
}

/// Holds at most one outstanding timeout and delivers it to the state
/// handler when it elapses.
pub(crate) struct TimeoutTicker<B> {
    slot: watch::Receiver<Option<TimeoutInfo>>,
    events: mpsc::Sender<BftEvent<B>>,
    shutdown: watch::Receiver<bool>,
    current: Option<TimeoutInfo>,
}

impl<B: Send + 'static> TimeoutTicker<B> {
    pub(crate) fn spawn(
        events: mpsc::Sender<BftEvent<B>>,
        shutdown: watch::Receiver<bool>,
    ) -> (TickerHandle, JoinHandle<()>) {
        let (slot_tx, slot_rx) = watch::channel(None);
        let ticker = Self {
            slot: slot_rx,
            events,
            shutdown,
            current: None,
        };
        let task = tokio::spawn(ticker.run());
        (
            TickerHandle {
                slot: Arc::new(slot_tx),
            },
            task,
        )
    }

    async fn run(mut self) {
        let sleep = time::sleep(std::time::Duration::ZERO);
        tokio::pin!(sleep);
        let mut armed = false;

        loop {
            tokio::select! {
                biased;
                _ = self.shutdown.changed() => break,
                changed = self.slot.changed() => {
                    if changed.is_err() {
                        break;
                    }
                    let Some(ti) = self.slot.borrow_and_update().clone() else { continue };
                    sleep.as_mut().reset(Instant::now() + ti.duration);
                    armed = true;
                    self.current = Some(ti);
                }
                _ = &mut sleep, if armed => {
                    armed = false;
                    let Some(ti) = self.current.clone() else { continue };
                    debug!(height = ti.height, round = ti.round, step = %ti.step, "Timeout elapsed");
                    if self.events.send(BftEvent::Timeout(ti)).await.is_err() {
                        break;
                    }
                }
            }
        }
        debug!("Timeout ticker stopped");
    }
}
