//! One tourist's live tracking session.
//!
//! A session starts (or resumes) an execution, picks a position source and
//! runs the polling, simulation and elapsed-time tasks until the execution
//! reaches a terminal state or the session is dropped.
use std::sync::Arc;

use log::{debug, info, warn};
use tokio::sync::{broadcast, watch};

use super::elapsed::spawn_elapsed_ticker;
use super::polling::PollingScheduler;
use super::route::RouteProvider;
use super::simulation::SimulationDriver;
use super::source::{PositionSensor, PositionSource, SensorSource, SimulatedSource, SourceKind};
use super::{SharedEngine, TaskSet, publish_snapshot};
use crate::clock::Clock;
use crate::config::TrackingConfig;
use crate::elapsed::{ElapsedTimeTracker, elapsed_since};
use crate::error::TrackingError;
use crate::execution::{ExecutionId, Progress, TourExecution};
use crate::geo::Coordinate;
use crate::simulator::MovementEvent;
use crate::tour::{Tour, TourId, UserId};
use crate::{PersistenceGateway, TourCatalog};

/// Position source chosen when a session starts.
pub enum SourceSelection {
    Sensor(Arc<dyn PositionSensor>),
    /// Walk from `origin` to the first key point, then along the tour.
    Simulated {
        origin: Coordinate,
        routes: Arc<dyn RouteProvider>,
    },
}

pub struct TrackingSession<G, T>
where
    G: PersistenceGateway + Send + 'static,
    T: TourCatalog + Send + 'static,
{
    engine: SharedEngine<G, T>,
    execution: ExecutionId,
    user: UserId,
    tour: Tour,
    tasks: TaskSet,
    simulation: Option<SimulationDriver>,
    snapshots: watch::Sender<Option<TourExecution>>,
    display: Arc<watch::Sender<String>>,
    clock: Arc<dyn Clock>,
    source: SourceKind,
    torn_down: bool,
}

impl<G, T> TrackingSession<G, T>
where
    G: PersistenceGateway + Send + 'static,
    T: TourCatalog + Send + 'static,
{
    /// Start `tour_id` for `user` and begin tracking.
    ///
    /// A failed route lookup does not fail the session: the simulated
    /// tourist stays pinned at `origin` instead.
    ///
    /// # Errors
    ///
    /// Returns `Config` for an out-of-range `config`, otherwise whatever
    /// [`crate::TourExecutionEngine::start_tour`] returns.
    pub async fn start(
        engine: SharedEngine<G, T>,
        tour_id: &TourId,
        user: &UserId,
        selection: SourceSelection,
        config: &TrackingConfig,
    ) -> Result<Self, TrackingError> {
        config.validate()?;
        let (execution, tour, clock) = {
            let mut guard = engine.lock().await;
            let execution = guard.start_tour(tour_id, user)?;
            let tour = guard.load_tour(tour_id)?;
            (execution, tour, guard.clock())
        };

        let (snapshots, snapshot_rx) = watch::channel(Some(execution.clone()));
        let mut simulation = None;
        let source: Arc<dyn PositionSource> = match selection {
            SourceSelection::Sensor(sensor) => Arc::new(SensorSource::new(sensor)),
            SourceSelection::Simulated { origin, routes } => {
                match SimulationDriver::prepare(
                    routes.as_ref(),
                    origin,
                    &tour,
                    config.simulation_tick(),
                )
                .await
                {
                    Ok(mut driver) => {
                        driver.follow(snapshots.subscribe());
                        driver.start();
                        let source = driver.source();
                        simulation = Some(driver);
                        Arc::new(source)
                    }
                    Err(err) => {
                        warn!(
                            "route for tour {tour_id} unavailable ({err}); holding position at {origin}"
                        );
                        Arc::new(SimulatedSource::fixed(origin))
                    }
                }
            }
        };
        let kind = source.kind();

        let (display, _) = watch::channel(elapsed_since(execution.start_time, clock.now()));
        let display = Arc::new(display);

        let mut tasks = TaskSet::new();
        let mut polling = PollingScheduler::new();
        polling.start(
            Arc::clone(&engine),
            execution.id.clone(),
            source,
            snapshots.clone(),
            config.poll_interval(),
        );
        if let Some(handle) = polling.take_handle() {
            tasks.push(handle);
        }
        tasks.push(spawn_elapsed_ticker(
            Arc::clone(&clock),
            snapshot_rx,
            Arc::clone(&display),
            config.elapsed_tick(),
        ));

        info!(
            "tracking execution {} of tour {} for {user} via {kind} source",
            execution.id, tour.id
        );
        Ok(Self {
            engine,
            execution: execution.id,
            user: user.clone(),
            tour,
            tasks,
            simulation,
            snapshots,
            display,
            clock,
            source: kind,
            torn_down: false,
        })
    }

    #[must_use]
    pub const fn execution_id(&self) -> &ExecutionId {
        &self.execution
    }

    #[must_use]
    pub const fn user(&self) -> &UserId {
        &self.user
    }

    #[must_use]
    pub const fn tour(&self) -> &Tour {
        &self.tour
    }

    #[must_use]
    pub const fn source_kind(&self) -> SourceKind {
        self.source
    }

    /// Latest published execution snapshot.
    #[must_use]
    pub fn current(&self) -> Option<TourExecution> {
        self.snapshots.borrow().clone()
    }

    #[must_use]
    pub fn progress(&self) -> Option<Progress> {
        self.snapshots
            .borrow()
            .as_ref()
            .map(|execution| execution.progress(&self.tour))
    }

    #[must_use]
    pub fn snapshots(&self) -> watch::Receiver<Option<TourExecution>> {
        self.snapshots.subscribe()
    }

    /// Elapsed-time display, `HH:MM:SS`.
    #[must_use]
    pub fn elapsed(&self) -> watch::Receiver<String> {
        self.display.subscribe()
    }

    /// Movement events, when the session is simulated and a route was found.
    #[must_use]
    pub fn movement_events(&self) -> Option<broadcast::Receiver<MovementEvent>> {
        self.simulation.as_ref().map(SimulationDriver::subscribe)
    }

    #[must_use]
    pub const fn simulation(&self) -> Option<&SimulationDriver> {
        self.simulation.as_ref()
    }

    /// Number of scheduled tasks still live, simulation included.
    #[must_use]
    pub fn running_tasks(&self) -> usize {
        let simulating = self
            .simulation
            .as_ref()
            .is_some_and(SimulationDriver::is_running);
        self.tasks.running() + usize::from(simulating)
    }

    #[must_use]
    pub const fn is_torn_down(&self) -> bool {
        self.torn_down
    }

    /// Run a proximity check right now, outside the polling schedule.
    ///
    /// # Errors
    ///
    /// Returns the engine's error for the check.
    pub async fn check_now(&self, position: Coordinate) -> Result<TourExecution, TrackingError> {
        let snapshot = self
            .engine
            .lock()
            .await
            .check_position(&self.execution, position)?;
        publish_snapshot(&self.snapshots, snapshot.clone());
        Ok(snapshot)
    }

    /// Complete the execution and stop tracking.
    ///
    /// On `Precondition` the session keeps running.
    ///
    /// # Errors
    ///
    /// Returns the engine's error for the transition.
    pub async fn complete(&mut self) -> Result<TourExecution, TrackingError> {
        let engine = Arc::clone(&self.engine);
        let mut guard = engine.lock().await;
        let done = guard.complete(&self.execution)?;
        self.teardown();
        drop(guard);
        self.publish_final(&done);
        Ok(done)
    }

    /// Abandon the execution and stop tracking. Tasks are cancelled before
    /// the engine lock is released, so no in-flight check can follow.
    ///
    /// On error the session keeps running.
    ///
    /// # Errors
    ///
    /// Returns the engine's error for the transition.
    pub async fn abandon(&mut self) -> Result<TourExecution, TrackingError> {
        let engine = Arc::clone(&self.engine);
        let mut guard = engine.lock().await;
        let done = guard.abandon(&self.execution)?;
        self.teardown();
        drop(guard);
        self.publish_final(&done);
        Ok(done)
    }

    /// Publish the terminal snapshot and freeze the display at its end time,
    /// since the ticker that would have observed it is already cancelled.
    fn publish_final(&self, done: &TourExecution) {
        let mut tracker = ElapsedTimeTracker::new();
        tracker.observe(done);
        self.display.send_replace(tracker.display(self.clock.now()));
        publish_snapshot(&self.snapshots, done.clone());
    }

    /// Cancel every task and freeze the simulation. Idempotent.
    pub fn teardown(&mut self) {
        if self.torn_down {
            return;
        }
        self.tasks.cancel_all();
        if let Some(simulation) = self.simulation.as_mut() {
            simulation.stop();
        }
        self.torn_down = true;
        debug!("session for execution {} torn down", self.execution);
    }
}

impl<G, T> Drop for TrackingSession<G, T>
where
    G: PersistenceGateway + Send + 'static,
    T: TourCatalog + Send + 'static,
{
    fn drop(&mut self) {
        self.teardown();
    }
}
