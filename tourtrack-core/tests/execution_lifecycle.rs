use chrono::{TimeDelta, TimeZone, Utc};
use std::sync::Arc;
use tourtrack_core::{
    Clock, Coordinate, ExecutionStatus, InMemoryCatalog, InMemoryGateway, ManualClock, Tour,
    TourExecution, TourExecutionEngine, TourId, TourKeyPoint, TrackingConfig, TrackingError,
    UserId,
};

const A: Coordinate = Coordinate::new(44.80, 20.40);
const B: Coordinate = Coordinate::new(44.81, 20.46);

struct World {
    engine: TourExecutionEngine<InMemoryGateway, InMemoryCatalog>,
    gateway: InMemoryGateway,
    clock: ManualClock,
}

fn belgrade() -> Tour {
    Tour::new(
        "belgrade",
        vec![
            TourKeyPoint::new("kp-b", 2, B.latitude, B.longitude).named("Kalemegdan"),
            TourKeyPoint::new("kp-a", 1, A.latitude, A.longitude).named("Republic Square"),
        ],
    )
}

fn world() -> World {
    let gateway = InMemoryGateway::new();
    let clock = ManualClock::new(Utc.with_ymd_and_hms(2025, 6, 1, 9, 0, 0).unwrap());
    let catalog = InMemoryCatalog::with_tours([
        belgrade(),
        Tour::new("zemun", vec![TourKeyPoint::new("kp-z", 1, 44.84, 20.41)]),
    ]);
    let engine = TourExecutionEngine::new(gateway.clone(), catalog, &TrackingConfig::default())
        .with_clock(Arc::new(clock.clone()))
        .with_seed(42);
    World {
        engine,
        gateway,
        clock,
    }
}

fn ana() -> UserId {
    UserId::from("ana")
}

fn start(w: &mut World) -> TourExecution {
    w.engine
        .start_tour(&TourId::from("belgrade"), &ana())
        .expect("start tour")
}

#[test]
fn walking_both_key_points_allows_completion() {
    let mut w = world();
    let exec = start(&mut w);

    w.clock.advance(TimeDelta::minutes(5));
    let at_a = w.engine.check_position(&exec.id, A).unwrap();
    assert_eq!(at_a.completed_count(), 1);
    assert_eq!(at_a.completed_key_points[0].key_point_id.as_str(), "kp-a");
    assert_eq!(at_a.completed_key_points[0].completion_time, w.clock.now());

    w.clock.advance(TimeDelta::minutes(20));
    let at_b = w.engine.check_position(&exec.id, B).unwrap();
    assert_eq!(at_b.completed_count(), 2);

    w.clock.advance(TimeDelta::minutes(1));
    let done = w.engine.complete(&exec.id).unwrap();
    assert_eq!(done.status, ExecutionStatus::Completed);
    assert_eq!(done.end_time, Some(w.clock.now()));
    assert!(w.engine.get_active_execution(&ana()).unwrap().is_none());
}

#[test]
fn distant_position_changes_only_activity() {
    let mut w = world();
    let exec = start(&mut w);
    w.clock.advance(TimeDelta::seconds(10));

    // Roughly 5 km north of both key points.
    let far = Coordinate::new(44.85, 20.43);
    let after = w.engine.check_position(&exec.id, far).unwrap();
    assert!(after.completed_key_points.is_empty());
    assert_eq!(after.last_activity, w.clock.now());
    assert_eq!(after.status, ExecutionStatus::Active);
}

#[test]
fn completion_requires_every_key_point() {
    let mut w = world();
    let exec = start(&mut w);
    w.engine.check_position(&exec.id, A).unwrap();

    let err = w.engine.complete(&exec.id).unwrap_err();
    assert!(matches!(
        err,
        TrackingError::Precondition {
            completed: 1,
            required: 2,
            ..
        }
    ));
    assert!(err.is_recoverable());
    assert!(w.engine.load_execution(&exec.id).unwrap().is_active());
}

#[test]
fn terminal_execution_ignores_positions() {
    let mut w = world();
    let exec = start(&mut w);
    let abandoned = w.engine.abandon(&exec.id).unwrap();
    assert_eq!(abandoned.status, ExecutionStatus::Abandoned);

    w.clock.advance(TimeDelta::minutes(3));
    let after = w.engine.check_position(&exec.id, A).unwrap();
    assert_eq!(after, abandoned);
    assert!(after.completed_key_points.is_empty());
    assert_eq!(w.gateway.all(), vec![abandoned.clone()]);

    // Abandoning twice is harmless; completing is not.
    assert_eq!(w.engine.abandon(&exec.id).unwrap(), abandoned);
    assert!(matches!(
        w.engine.complete(&exec.id),
        Err(TrackingError::Terminal {
            status: ExecutionStatus::Abandoned,
            ..
        })
    ));
}

#[test]
fn completed_execution_ignores_positions() {
    let mut w = world();
    let exec = start(&mut w);
    w.engine.check_position(&exec.id, A).unwrap();
    w.clock.advance(TimeDelta::minutes(10));
    w.engine.check_position(&exec.id, B).unwrap();
    let done = w.engine.complete(&exec.id).unwrap();

    w.clock.advance(TimeDelta::minutes(7));
    let after = w.engine.check_position(&exec.id, A).unwrap();
    assert_eq!(after, done);
    assert_eq!(after.completed_count(), 2);
    assert_eq!(after.last_activity, done.last_activity);
    assert_eq!(w.gateway.all(), vec![done.clone()]);

    // Completing twice is harmless; abandoning is not.
    assert_eq!(w.engine.complete(&exec.id).unwrap(), done);
    assert!(matches!(
        w.engine.abandon(&exec.id),
        Err(TrackingError::Terminal {
            status: ExecutionStatus::Completed,
            ..
        })
    ));
}

#[test]
fn second_tour_conflicts_without_creating_execution() {
    let mut w = world();
    let exec = start(&mut w);
    let err = w
        .engine
        .start_tour(&TourId::from("zemun"), &ana())
        .unwrap_err();
    match err {
        TrackingError::Conflict { active, tour, .. } => {
            assert_eq!(active, exec.id);
            assert_eq!(tour.as_str(), "belgrade");
        }
        other => panic!("expected conflict, got {other:?}"),
    }
    assert_eq!(w.gateway.len(), 1);

    // Once finished, the user may start another tour.
    w.engine.abandon(&exec.id).unwrap();
    let next = w
        .engine
        .start_tour(&TourId::from("zemun"), &ana())
        .unwrap();
    assert_ne!(next.id, exec.id);
    assert_eq!(w.gateway.len(), 2);
}

#[test]
fn one_check_can_complete_overlapping_key_points_in_order() {
    let gateway = InMemoryGateway::new();
    let tour = Tour::new(
        "plaza",
        vec![
            TourKeyPoint::new("fountain", 2, 44.80001, 20.40001),
            TourKeyPoint::new("gate", 1, 44.80, 20.40),
            TourKeyPoint::new("tower", 3, 44.90, 20.50),
        ],
    );
    let mut engine = TourExecutionEngine::new(
        gateway.clone(),
        InMemoryCatalog::with_tours([tour]),
        &TrackingConfig::default(),
    );
    let exec = engine.start_tour(&TourId::from("plaza"), &ana()).unwrap();
    let after = engine.check_position(&exec.id, A).unwrap();

    let ids: Vec<&str> = after
        .completed_key_points
        .iter()
        .map(|c| c.key_point_id.as_str())
        .collect();
    assert_eq!(ids, ["gate", "fountain"]);
    let progress = after.progress(&engine.load_tour(&exec.tour_id).unwrap());
    assert_eq!(progress.to_string(), "2/3");
}

#[test]
fn snapshot_serializes_with_wire_field_names() {
    let mut w = world();
    let exec = start(&mut w);
    let after = w.engine.check_position(&exec.id, A).unwrap();

    let json = serde_json::to_value(&after).unwrap();
    assert_eq!(json["ID"], exec.id.as_str());
    assert_eq!(json["TourId"], "belgrade");
    assert_eq!(json["UserId"], "ana");
    assert_eq!(json["Status"], "Active");
    assert_eq!(json["CompletedKeyPoints"][0]["KeyPointId"], "kp-a");
    assert!(json.get("EndTime").is_none());

    let back: TourExecution = serde_json::from_value(json).unwrap();
    assert_eq!(back, after);
}

#[test]
fn offline_gateway_reports_recoverable_failure() -> anyhow::Result<()> {
    let mut w = world();
    let exec = start(&mut w);
    w.gateway.set_offline(true);
    let err = w.engine.check_position(&exec.id, A).unwrap_err();
    assert!(matches!(err, TrackingError::Persistence(_)));
    assert!(err.is_recoverable());

    w.gateway.set_offline(false);
    let stored = w.engine.load_execution(&exec.id)?;
    assert!(stored.completed_key_points.is_empty());
    Ok(())
}
