//! Deterministic movement along precomputed polylines.
//!
//! The simulator owns a cursor over two phases: the path from the tourist's
//! location to the first key point, then the tour itself. Each tick advances
//! exactly one vertex. The tour phase begins only once the to-start phase has
//! delivered its final vertex, and [`MovementEvent::Arrived`] is emitted once
//! per simulator regardless of how often it is stopped and restarted.
use serde::{Deserialize, Serialize};

use crate::geo::{Coordinate, Polyline};

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum MovementPhase {
    ToStart,
    Tour,
}

#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
#[serde(tag = "kind", rename_all = "snake_case")]
pub enum MovementEvent {
    Advanced {
        position: Coordinate,
        phase: MovementPhase,
    },
    Arrived {
        position: Coordinate,
    },
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
struct Cursor {
    phase: MovementPhase,
    vertex: usize,
}

#[derive(Debug, Clone, PartialEq)]
pub struct MovementSimulator {
    to_start: Polyline,
    tour: Polyline,
    cursor: Option<Cursor>,
    running: bool,
    arrived: bool,
}

impl MovementSimulator {
    /// Two-phase simulator. Either polyline may be empty.
    #[must_use]
    pub fn new(to_start: Polyline, tour: Polyline) -> Self {
        let cursor = Self::initial_cursor(&to_start, &tour);
        Self {
            to_start,
            tour,
            cursor,
            running: false,
            arrived: false,
        }
    }

    /// Single-phase simulator over one polyline.
    #[must_use]
    pub fn single(polyline: Polyline) -> Self {
        Self::new(Polyline::default(), polyline)
    }

    fn initial_cursor(to_start: &Polyline, tour: &Polyline) -> Option<Cursor> {
        if !to_start.is_empty() {
            Some(Cursor {
                phase: MovementPhase::ToStart,
                vertex: 0,
            })
        } else if !tour.is_empty() {
            Some(Cursor {
                phase: MovementPhase::Tour,
                vertex: 0,
            })
        } else {
            None
        }
    }

    fn line(&self, phase: MovementPhase) -> &Polyline {
        match phase {
            MovementPhase::ToStart => &self.to_start,
            MovementPhase::Tour => &self.tour,
        }
    }

    /// Begin or resume ticking. A no-op once arrived.
    pub fn start(&mut self) {
        if !self.arrived {
            self.running = true;
        }
    }

    /// Pause ticking, keeping the cursor. Idempotent.
    pub fn stop(&mut self) {
        self.running = false;
    }

    #[must_use]
    pub const fn is_running(&self) -> bool {
        self.running
    }

    #[must_use]
    pub const fn has_arrived(&self) -> bool {
        self.arrived
    }

    #[must_use]
    pub fn phase(&self) -> Option<MovementPhase> {
        self.cursor.map(|c| c.phase)
    }

    /// Current simulated position; `None` when both polylines are empty.
    #[must_use]
    pub fn current_position(&self) -> Option<Coordinate> {
        self.cursor
            .and_then(|c| self.line(c.phase).get(c.vertex))
    }

    /// Advance one vertex. Returns `None` while stopped or after arrival.
    pub fn tick(&mut self) -> Option<MovementEvent> {
        if !self.running || self.arrived {
            return None;
        }
        let Some(cursor) = self.cursor else {
            // Nothing to walk; treat as arrived on the spot.
            self.running = false;
            self.arrived = true;
            return None;
        };

        let line_len = self.line(cursor.phase).len();
        if cursor.vertex + 1 < line_len {
            let next = Cursor {
                vertex: cursor.vertex + 1,
                ..cursor
            };
            return self.move_to(next);
        }

        if cursor.phase == MovementPhase::ToStart {
            // Skip the tour's first vertex when it duplicates the junction.
            let vertex = usize::from(self.to_start.last() == self.tour.first());
            if vertex < self.tour.len() {
                let next = Cursor {
                    phase: MovementPhase::Tour,
                    vertex,
                };
                return self.move_to(next);
            }
        }

        let position = self.current_position()?;
        self.running = false;
        self.arrived = true;
        Some(MovementEvent::Arrived { position })
    }

    fn move_to(&mut self, next: Cursor) -> Option<MovementEvent> {
        self.cursor = Some(next);
        let position = self.current_position()?;
        Some(MovementEvent::Advanced {
            position,
            phase: next.phase,
        })
    }
}

impl Iterator for MovementSimulator {
    type Item = MovementEvent;

    fn next(&mut self) -> Option<Self::Item> {
        self.tick()
    }
}
