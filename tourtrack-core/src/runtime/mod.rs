//! Scheduled tracking runtime.
//!
//! Three periodic tasks coexist per active session: position polling,
//! movement simulation and the elapsed-time display. Each owns a
//! [`TaskHandle`]; cancelling a handle is synchronous and idempotent, and a
//! cancelled task drops whatever it was awaiting, so an I/O completion that
//! arrives after teardown never reaches the engine.

mod elapsed;
mod polling;
mod route;
mod session;
mod simulation;
mod source;

use std::future::Future;
use std::sync::Arc;

use tokio::sync::{Mutex, watch};
use tokio::task::JoinHandle;
use tokio_util::sync::CancellationToken;

use crate::engine::TourExecutionEngine;
use crate::execution::TourExecution;

pub use elapsed::spawn_elapsed_ticker;
pub use polling::PollingScheduler;
pub use route::{RouteProvider, StraightLineRouteProvider};
pub use session::{SourceSelection, TrackingSession};
pub use simulation::SimulationDriver;
pub use source::{
    ManualSensor, PositionSensor, PositionSource, SensorSource, SimulatedSource, SourceKind,
};

/// Engine shared between the session and its tasks. The lock serializes
/// position checks for every execution the engine owns.
pub type SharedEngine<G, T> = Arc<Mutex<TourExecutionEngine<G, T>>>;

#[must_use]
pub fn share<G, T>(engine: TourExecutionEngine<G, T>) -> SharedEngine<G, T>
where
    G: crate::PersistenceGateway,
    T: crate::TourCatalog,
{
    Arc::new(Mutex::new(engine))
}

/// Cancellable handle to one spawned periodic task.
#[derive(Debug)]
pub struct TaskHandle {
    name: &'static str,
    token: CancellationToken,
    join: JoinHandle<()>,
}

impl TaskHandle {
    /// Spawn `task`, racing it against cancellation. Cancellation wins ties.
    pub fn spawn<F>(name: &'static str, task: F) -> Self
    where
        F: Future<Output = ()> + Send + 'static,
    {
        Self::spawn_with(name, |_| task)
    }

    /// Like [`Self::spawn`], handing the body a clone of its own token so it
    /// can re-check cancellation between steps that do not yield.
    pub fn spawn_with<F, Fut>(name: &'static str, make: F) -> Self
    where
        F: FnOnce(CancellationToken) -> Fut,
        Fut: Future<Output = ()> + Send + 'static,
    {
        let token = CancellationToken::new();
        let task = make(token.clone());
        let guard = token.clone();
        let join = tokio::spawn(async move {
            tokio::select! {
                biased;
                () = guard.cancelled() => {
                    log::debug!("{name} task cancelled");
                }
                () = task => {}
            }
        });
        Self { name, token, join }
    }

    #[must_use]
    pub const fn name(&self) -> &'static str {
        self.name
    }

    /// Token the task body can poll between awaits.
    #[must_use]
    pub fn token(&self) -> CancellationToken {
        self.token.clone()
    }

    pub fn cancel(&self) {
        self.token.cancel();
    }

    #[must_use]
    pub fn is_cancelled(&self) -> bool {
        self.token.is_cancelled()
    }

    #[must_use]
    pub fn is_finished(&self) -> bool {
        self.join.is_finished()
    }
}

impl Drop for TaskHandle {
    fn drop(&mut self) {
        self.token.cancel();
    }
}

/// Every task owned by one session; cancelled together on teardown.
#[derive(Debug, Default)]
pub struct TaskSet {
    tasks: Vec<TaskHandle>,
}

impl TaskSet {
    #[must_use]
    pub const fn new() -> Self {
        Self { tasks: Vec::new() }
    }

    pub fn push(&mut self, task: TaskHandle) {
        self.tasks.push(task);
    }

    /// Cancel every task. Safe to call from several teardown paths.
    pub fn cancel_all(&self) {
        for task in &self.tasks {
            task.cancel();
        }
    }

    #[must_use]
    pub fn all_cancelled(&self) -> bool {
        self.tasks.iter().all(TaskHandle::is_cancelled)
    }

    /// Tasks neither cancelled nor finished.
    #[must_use]
    pub fn running(&self) -> usize {
        self.tasks
            .iter()
            .filter(|task| !task.is_cancelled() && !task.is_finished())
            .count()
    }

    #[must_use]
    pub fn len(&self) -> usize {
        self.tasks.len()
    }

    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.tasks.is_empty()
    }
}

impl Drop for TaskSet {
    fn drop(&mut self) {
        self.cancel_all();
    }
}

/// Publish a snapshot unless it would overwrite a terminal snapshot of the
/// same execution with an older Active one.
pub(crate) fn publish_snapshot(
    tx: &watch::Sender<Option<TourExecution>>,
    execution: TourExecution,
) -> bool {
    tx.send_if_modified(|current| {
        let stale = current
            .as_ref()
            .is_some_and(|cur| cur.id == execution.id && !cur.is_active() && execution.is_active());
        if stale || current.as_ref() == Some(&execution) {
            return false;
        }
        *current = Some(execution);
        true
    })
}
