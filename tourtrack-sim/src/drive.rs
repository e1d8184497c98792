use anyhow::{Context, Result};
use colored::Colorize;
use log::debug;
use serde::Serialize;
use std::sync::Arc;
use std::time::Duration;
use tokio::sync::broadcast::{self, error::RecvError};
use tokio::time::{Instant, MissedTickBehavior};

use tourtrack_core::runtime::{
    ManualSensor, SourceKind, SourceSelection, StraightLineRouteProvider, TrackingSession, share,
};
use tourtrack_core::{
    Coordinate, InMemoryCatalog, InMemoryGateway, MovementEvent, Tour, TourExecution,
    TourExecutionEngine, TrackingConfig, UserId, elapsed_since,
};

use crate::PositionMode;

#[derive(Debug, Clone)]
pub struct DriveOptions {
    pub user: UserId,
    pub mode: PositionMode,
    pub origin: Coordinate,
    pub positions: Vec<Coordinate>,
    pub pin_every: Duration,
    pub abandon_after: Option<Duration>,
    pub max_duration: Duration,
    pub seed: Option<u64>,
    pub verbose: bool,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "snake_case")]
pub enum Ending {
    Completed,
    Abandoned,
    TimedOut,
}

#[derive(Debug, Clone)]
pub struct Outcome {
    pub tour: Tour,
    pub execution: TourExecution,
    pub ending: Ending,
    pub source: SourceKind,
    pub elapsed: String,
    pub movement_ticks: usize,
    pub arrived: bool,
    pub wall_time: Duration,
}

/// Run one session until every key point is reached, the abandon timer
/// fires or the time budget runs out.
pub async fn drive_session(
    tour: Tour,
    config: TrackingConfig,
    options: DriveOptions,
) -> Result<Outcome> {
    let mut engine = TourExecutionEngine::try_new(
        InMemoryGateway::new(),
        InMemoryCatalog::with_tours([tour.clone()]),
        &config,
    )
    .context("invalid tracking config")?;
    if let Some(seed) = options.seed {
        engine = engine.with_seed(seed);
    }

    let manual = ManualSensor::new();
    let selection = match options.mode {
        PositionMode::Simulate => SourceSelection::Simulated {
            origin: options.origin,
            routes: Arc::new(StraightLineRouteProvider::new(config.route_step_m)),
        },
        PositionMode::Manual => SourceSelection::Sensor(Arc::new(manual.clone())),
    };

    let started = Instant::now();
    let mut session =
        TrackingSession::start(share(engine), &tour.id, &options.user, selection, &config)
            .await
            .with_context(|| format!("failed to start tour {}", tour.id))?;

    let mut snapshots = session.snapshots();
    let mut movement = session.movement_events();
    let mut pins = options.positions.iter().copied();
    if let Some(first) = pins.next() {
        manual.set_position(first);
    }
    let mut pin_timer = tokio::time::interval_at(started + options.pin_every, options.pin_every);
    pin_timer.set_missed_tick_behavior(MissedTickBehavior::Delay);
    let deadline = tokio::time::sleep(options.max_duration);
    tokio::pin!(deadline);
    let abandon = async {
        match options.abandon_after {
            Some(after) => tokio::time::sleep(after).await,
            None => std::future::pending().await,
        }
    };
    tokio::pin!(abandon);

    let mut announced = 0;
    let mut ticks = 0;
    let mut arrived = false;
    let already_done = session
        .progress()
        .is_some_and(|progress| progress.is_finished());

    let ending = if already_done {
        Ending::Completed
    } else {
        loop {
            tokio::select! {
                changed = snapshots.changed() => {
                    changed.context("session stopped publishing snapshots")?;
                    let snapshot = snapshots.borrow_and_update().clone();
                    let Some(execution) = snapshot else { continue };
                    announce_completions(&tour, &execution, &mut announced);
                    if execution.progress(&tour).is_finished() {
                        break Ending::Completed;
                    }
                }
                event = next_movement(&mut movement) => {
                    ticks += 1;
                    match event {
                        MovementEvent::Advanced { position, phase } => {
                            if options.verbose {
                                println!("   {} {position} ({phase:?})", "→".dimmed());
                            }
                        }
                        MovementEvent::Arrived { position } => {
                            arrived = true;
                            println!("🏁 Simulated tourist arrived at {position}");
                        }
                    }
                }
                _ = pin_timer.tick(), if options.mode == PositionMode::Manual => {
                    if let Some(next) = pins.next() {
                        debug!("pinning tourist at {next}");
                        manual.set_position(next);
                    }
                }
                () = &mut abandon => break Ending::Abandoned,
                () = &mut deadline => {
                    eprintln!("⚠️  {}", "Time budget exhausted; abandoning".yellow());
                    break Ending::TimedOut;
                }
            }
        }
    };

    let execution = match ending {
        Ending::Completed => session.complete().await.context("failed to complete tour")?,
        Ending::Abandoned | Ending::TimedOut => {
            session.abandon().await.context("failed to abandon tour")?
        }
    };
    let elapsed = session.elapsed().borrow().clone();

    Ok(Outcome {
        tour,
        execution,
        ending,
        source: session.source_kind(),
        elapsed,
        movement_ticks: ticks,
        arrived,
        wall_time: started.elapsed(),
    })
}

/// Next simulated movement; never resolves when there is no simulation.
async fn next_movement(
    movement: &mut Option<broadcast::Receiver<MovementEvent>>,
) -> MovementEvent {
    if let Some(rx) = movement.as_mut() {
        loop {
            match rx.recv().await {
                Ok(event) => return event,
                Err(RecvError::Lagged(skipped)) => {
                    debug!("movement stream lagged by {skipped} events");
                }
                Err(RecvError::Closed) => break,
            }
        }
    }
    std::future::pending().await
}

fn announce_completions(tour: &Tour, execution: &TourExecution, announced: &mut usize) {
    let total = tour.key_points().len();
    for done in execution.completed_key_points.iter().skip(*announced) {
        let label = tour
            .key_point(&done.key_point_id)
            .map_or(done.key_point_id.as_str(), |kp| kp.label());
        *announced += 1;
        println!(
            "📍 Reached {} ({}/{total}) after {}",
            label.green().bold(),
            *announced,
            elapsed_since(execution.start_time, done.completion_time)
        );
    }
}
