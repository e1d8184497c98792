use std::sync::Arc;
use std::time::Duration;

use log::{debug, error, warn};
use tokio::sync::watch;
use tokio::time::{Instant, MissedTickBehavior};
use tokio_util::sync::CancellationToken;

use super::source::PositionSource;
use super::{SharedEngine, TaskHandle, publish_snapshot};
use crate::error::TrackingError;
use crate::execution::{ExecutionId, TourExecution};
use crate::{PersistenceGateway, TourCatalog};

/// Periodically samples a [`PositionSource`] and feeds the engine.
///
/// Unavailable samples are skipped. A sample resolved after `stop()` is
/// discarded before it reaches the engine.
#[derive(Debug, Default)]
pub struct PollingScheduler {
    task: Option<TaskHandle>,
}

impl PollingScheduler {
    #[must_use]
    pub const fn new() -> Self {
        Self { task: None }
    }

    /// Start polling `execution` every `interval`. Restarting replaces the
    /// previous schedule.
    pub fn start<G, T>(
        &mut self,
        engine: SharedEngine<G, T>,
        execution: ExecutionId,
        source: Arc<dyn PositionSource>,
        snapshots: watch::Sender<Option<TourExecution>>,
        interval: Duration,
    ) where
        G: PersistenceGateway + Send + 'static,
        T: TourCatalog + Send + 'static,
    {
        self.stop();
        debug!(
            "polling {} source every {interval:?} for execution {execution}",
            source.kind()
        );
        self.task = Some(TaskHandle::spawn_with("polling", |token| {
            poll_loop(engine, execution, source, snapshots, interval, token)
        }));
    }

    /// Cancel the schedule. Idempotent.
    pub fn stop(&mut self) {
        if let Some(task) = self.task.take() {
            task.cancel();
        }
    }

    #[must_use]
    pub fn is_running(&self) -> bool {
        self.task
            .as_ref()
            .is_some_and(|task| !task.is_cancelled() && !task.is_finished())
    }

    /// Hand the running task to an owner that cancels it with its siblings.
    pub(crate) fn take_handle(&mut self) -> Option<TaskHandle> {
        self.task.take()
    }
}

async fn poll_loop<G, T>(
    engine: SharedEngine<G, T>,
    execution: ExecutionId,
    source: Arc<dyn PositionSource>,
    snapshots: watch::Sender<Option<TourExecution>>,
    period: Duration,
    token: CancellationToken,
) where
    G: PersistenceGateway + Send + 'static,
    T: TourCatalog + Send + 'static,
{
    let mut interval = tokio::time::interval_at(Instant::now() + period, period);
    interval.set_missed_tick_behavior(MissedTickBehavior::Skip);
    loop {
        interval.tick().await;
        if token.is_cancelled() {
            return;
        }

        let position = match source.current_position().await {
            Ok(position) => position,
            Err(unavailable) => {
                debug!("skipping poll for {execution}: {unavailable}");
                continue;
            }
        };
        if token.is_cancelled() {
            debug!("dropping late position for {execution}");
            return;
        }

        let mut guard = engine.lock().await;
        if token.is_cancelled() {
            return;
        }
        match guard.check_position(&execution, position) {
            Ok(snapshot) => {
                drop(guard);
                let terminal = !snapshot.is_active();
                publish_snapshot(&snapshots, snapshot);
                if terminal {
                    debug!("execution {execution} is terminal; polling ends");
                    return;
                }
            }
            Err(TrackingError::NotFound(id)) => {
                error!("execution {id} disappeared; polling ends");
                return;
            }
            Err(err) => {
                warn!("position check for {execution} failed: {err}");
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::clock::ManualClock;
    use crate::config::TrackingConfig;
    use crate::engine::TourExecutionEngine;
    use crate::geo::Coordinate;
    use crate::memory::{InMemoryCatalog, InMemoryGateway};
    use crate::runtime::share;
    use crate::runtime::source::SimulatedSource;
    use crate::tour::{Tour, TourId, TourKeyPoint, UserId};
    use chrono::{TimeZone, Utc};

    fn engine() -> (
        SharedEngine<InMemoryGateway, InMemoryCatalog>,
        InMemoryGateway,
        ExecutionId,
    ) {
        let tour = Tour::new(
            "t1",
            vec![
                TourKeyPoint::new("a", 1, 44.80, 20.40),
                TourKeyPoint::new("b", 2, 44.81, 20.46),
            ],
        );
        let gateway = InMemoryGateway::new();
        let mut engine = TourExecutionEngine::new(
            gateway.clone(),
            InMemoryCatalog::with_tours([tour]),
            &TrackingConfig::default(),
        )
        .with_clock(Arc::new(ManualClock::new(
            Utc.with_ymd_and_hms(2025, 6, 1, 9, 0, 0).unwrap(),
        )))
        .with_seed(1);
        let exec = engine
            .start_tour(&TourId::from("t1"), &UserId::from("ana"))
            .unwrap();
        (share(engine), gateway, exec.id)
    }

    #[tokio::test(start_paused = true)]
    async fn polling_records_reached_key_points() {
        let (engine, gateway, id) = engine();
        let (pos_tx, pos_rx) = watch::channel(Some(Coordinate::new(44.80, 20.40)));
        let (snap_tx, snap_rx) = watch::channel(None);
        let mut scheduler = PollingScheduler::new();
        scheduler.start(
            Arc::clone(&engine),
            id.clone(),
            Arc::new(SimulatedSource::new(pos_rx)),
            snap_tx,
            Duration::from_secs(5),
        );
        assert!(scheduler.is_running());

        tokio::time::sleep(Duration::from_millis(5_100)).await;
        assert_eq!(snap_rx.borrow().as_ref().map(TourExecution::completed_count), Some(1));

        pos_tx.send_replace(Some(Coordinate::new(44.81, 20.46)));
        tokio::time::sleep(Duration::from_secs(5)).await;
        assert_eq!(gateway.all()[0].completed_count(), 2);

        scheduler.stop();
        scheduler.stop();
        assert!(!scheduler.is_running());
    }

    #[tokio::test(start_paused = true)]
    async fn unavailable_source_skips_ticks() {
        let (engine, gateway, id) = engine();
        let before = gateway.all()[0].clone();
        let (_pos_tx, pos_rx) = watch::channel(None);
        let (snap_tx, snap_rx) = watch::channel(None);
        let mut scheduler = PollingScheduler::new();
        scheduler.start(
            engine,
            id,
            Arc::new(SimulatedSource::new(pos_rx)),
            snap_tx,
            Duration::from_secs(5),
        );

        tokio::time::sleep(Duration::from_secs(30)).await;
        assert!(scheduler.is_running());
        assert!(snap_rx.borrow().is_none());
        assert_eq!(gateway.all()[0], before);
    }

    #[tokio::test(start_paused = true)]
    async fn polling_ends_once_execution_is_terminal() {
        let (engine, _gateway, id) = engine();
        engine.lock().await.abandon(&id).unwrap();
        let (snap_tx, snap_rx) = watch::channel(None);
        let mut scheduler = PollingScheduler::new();
        scheduler.start(
            engine,
            id,
            Arc::new(SimulatedSource::fixed(Coordinate::new(44.80, 20.40))),
            snap_tx,
            Duration::from_secs(5),
        );

        tokio::time::sleep(Duration::from_millis(5_100)).await;
        assert!(!scheduler.is_running());
        let snapshot = snap_rx.borrow().clone().unwrap();
        assert!(!snapshot.is_active());
        assert_eq!(snapshot.completed_count(), 0);
    }
}
