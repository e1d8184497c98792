//! Timer-driven movement simulation.
//!
//! The driver resolves both polylines before it will vend a position, then
//! advances the shared [`MovementSimulator`] one vertex per tick. Restarts
//! bump a generation counter so a task that outlived its `stop()` can never
//! advance the cursor a second time.
use std::sync::{Arc, Mutex, MutexGuard, PoisonError};
use std::time::Duration;

use log::{debug, info};
use tokio::sync::{broadcast, watch};
use tokio::time::{Instant, MissedTickBehavior};

use super::TaskHandle;
use super::route::RouteProvider;
use super::source::SimulatedSource;
use crate::error::RouteError;
use crate::execution::TourExecution;
use crate::geo::{Coordinate, Polyline};
use crate::simulator::{MovementEvent, MovementPhase, MovementSimulator};
use crate::tour::Tour;

const EVENT_BUFFER: usize = 1024;

#[derive(Debug)]
struct Shared {
    simulator: MovementSimulator,
    generation: u64,
}

pub struct SimulationDriver {
    shared: Arc<Mutex<Shared>>,
    position: watch::Sender<Option<Coordinate>>,
    events: broadcast::Sender<MovementEvent>,
    tick: Duration,
    task: Option<TaskHandle>,
    execution: Option<watch::Receiver<Option<TourExecution>>>,
}

impl SimulationDriver {
    /// Resolve the to-start and tour polylines for `tour`, starting from
    /// `origin`. Nothing is published until both are available.
    ///
    /// # Errors
    ///
    /// Returns the provider's `RouteError`, or `RouteError::Empty` if it
    /// answered with an empty polyline.
    pub async fn prepare(
        routes: &dyn RouteProvider,
        origin: Coordinate,
        tour: &Tour,
        tick: Duration,
    ) -> Result<Self, RouteError> {
        let to_start = match tour.first_key_point() {
            Some(first) => non_empty(routes.resolve_route(&[origin, first.coordinate()]).await?)?,
            None => Polyline::new(vec![origin]),
        };
        let waypoints = tour.waypoints();
        let tour_line = if waypoints.len() >= 2 {
            non_empty(routes.resolve_route(&waypoints).await?)?
        } else {
            Polyline::new(waypoints)
        };
        debug!(
            "simulation prepared: {} to-start vertices, {} tour vertices",
            to_start.len(),
            tour_line.len()
        );
        Ok(Self::from_polylines(to_start, tour_line, tick))
    }

    /// Driver over already-resolved polylines.
    #[must_use]
    pub fn from_polylines(to_start: Polyline, tour: Polyline, tick: Duration) -> Self {
        let simulator = MovementSimulator::new(to_start, tour);
        let (position, _) = watch::channel(simulator.current_position());
        let (events, _) = broadcast::channel(EVENT_BUFFER);
        Self {
            shared: Arc::new(Mutex::new(Shared {
                simulator,
                generation: 0,
            })),
            position,
            events,
            tick,
            task: None,
            execution: None,
        }
    }

    /// Halt for good once `snapshots` shows a terminal execution. Takes
    /// effect from the next `start()`.
    pub fn follow(&mut self, snapshots: watch::Receiver<Option<TourExecution>>) {
        self.execution = Some(snapshots);
    }

    fn lock(&self) -> MutexGuard<'_, Shared> {
        self.shared.lock().unwrap_or_else(PoisonError::into_inner)
    }

    /// Position source reading this driver's output.
    #[must_use]
    pub fn source(&self) -> SimulatedSource {
        SimulatedSource::new(self.position.subscribe())
    }

    #[must_use]
    pub fn positions(&self) -> watch::Receiver<Option<Coordinate>> {
        self.position.subscribe()
    }

    #[must_use]
    pub fn subscribe(&self) -> broadcast::Receiver<MovementEvent> {
        self.events.subscribe()
    }

    #[must_use]
    pub fn position(&self) -> Option<Coordinate> {
        *self.position.borrow()
    }

    #[must_use]
    pub fn phase(&self) -> Option<MovementPhase> {
        self.lock().simulator.phase()
    }

    #[must_use]
    pub fn has_arrived(&self) -> bool {
        self.lock().simulator.has_arrived()
    }

    #[must_use]
    pub fn is_running(&self) -> bool {
        self.task
            .as_ref()
            .is_some_and(|task| !task.is_cancelled() && !task.is_finished())
    }

    /// Begin or resume ticking. No-op while running or after arrival.
    pub fn start(&mut self) {
        if self.is_running() {
            return;
        }
        let generation = {
            let mut shared = self.lock();
            if shared.simulator.has_arrived() {
                debug!("simulation already arrived; start ignored");
                return;
            }
            shared.simulator.start();
            shared.generation += 1;
            shared.generation
        };

        let shared = Arc::clone(&self.shared);
        let position = self.position.clone();
        let events = self.events.clone();
        let tick = self.tick;
        let execution = self.execution.clone();
        self.task = Some(TaskHandle::spawn("simulation", async move {
            run_ticks(shared, generation, position, events, execution, tick).await;
        }));
    }

    /// Cancel the schedule, keeping the cursor for a later `start()`. Idempotent.
    pub fn stop(&mut self) {
        if let Some(task) = self.task.take() {
            task.cancel();
        }
        let mut shared = self.lock();
        shared.simulator.stop();
        shared.generation += 1;
    }
}

impl Drop for SimulationDriver {
    fn drop(&mut self) {
        self.stop();
    }
}

fn non_empty(line: Polyline) -> Result<Polyline, RouteError> {
    if line.is_empty() {
        Err(RouteError::Empty)
    } else {
        Ok(line)
    }
}

async fn run_ticks(
    shared: Arc<Mutex<Shared>>,
    generation: u64,
    position: watch::Sender<Option<Coordinate>>,
    events: broadcast::Sender<MovementEvent>,
    mut execution: Option<watch::Receiver<Option<TourExecution>>>,
    tick: Duration,
) {
    let mut interval = tokio::time::interval_at(Instant::now() + tick, tick);
    interval.set_missed_tick_behavior(MissedTickBehavior::Delay);
    loop {
        tokio::select! {
            biased;
            () = finished(&mut execution) => {
                let mut guard = shared.lock().unwrap_or_else(PoisonError::into_inner);
                if guard.generation == generation {
                    guard.simulator.stop();
                    guard.generation += 1;
                }
                debug!("execution finished; simulation halted");
                return;
            }
            _ = interval.tick() => {}
        }
        let event = {
            let mut guard = shared.lock().unwrap_or_else(PoisonError::into_inner);
            if guard.generation != generation {
                return;
            }
            guard.simulator.tick()
        };
        let Some(event) = event else {
            return;
        };
        match event {
            MovementEvent::Advanced { position: at, .. } => {
                position.send_replace(Some(at));
                let _ = events.send(event);
            }
            MovementEvent::Arrived { position: at } => {
                position.send_replace(Some(at));
                let _ = events.send(event);
                info!("simulated tourist arrived at {at}");
                return;
            }
        }
    }
}

/// Resolves once the followed execution is terminal; never without one.
async fn finished(execution: &mut Option<watch::Receiver<Option<TourExecution>>>) {
    if let Some(rx) = execution.as_mut() {
        loop {
            let done = rx
                .borrow_and_update()
                .as_ref()
                .is_some_and(|snapshot| !snapshot.is_active());
            if done {
                return;
            }
            if rx.changed().await.is_err() {
                break;
            }
        }
    }
    std::future::pending().await
}
