use std::sync::Arc;
use std::time::Duration;

use tokio::sync::watch;
use tokio::time::MissedTickBehavior;

use super::TaskHandle;
use crate::clock::Clock;
use crate::elapsed::ElapsedTimeTracker;
use crate::execution::TourExecution;

/// Refresh `display` every `tick` from the latest execution snapshot.
///
/// The ticker ends on its own once it observes a terminal snapshot, leaving
/// the display frozen at the execution's end time.
pub fn spawn_elapsed_ticker(
    clock: Arc<dyn Clock>,
    mut snapshots: watch::Receiver<Option<TourExecution>>,
    display: Arc<watch::Sender<String>>,
    tick: Duration,
) -> TaskHandle {
    TaskHandle::spawn("elapsed", async move {
        let mut tracker = ElapsedTimeTracker::new();
        let mut interval = tokio::time::interval(tick);
        interval.set_missed_tick_behavior(MissedTickBehavior::Skip);
        loop {
            interval.tick().await;
            let running = snapshots
                .borrow_and_update()
                .as_ref()
                .is_none_or(|execution| tracker.observe(execution));
            display.send_if_modified(|shown| {
                let next = tracker.display(clock.now());
                if *shown == next {
                    return false;
                }
                *shown = next;
                true
            });
            if !running {
                return;
            }
        }
    })
}
