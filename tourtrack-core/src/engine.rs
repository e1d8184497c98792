//! The execution state machine.
//!
//! ```text
//!            start_tour
//!                │
//!                ▼
//!   ┌──── check_position ────┐
//!   │          Active        │
//!   └────────────────────────┘
//!        │ complete   │ abandon
//!        ▼            ▼
//!    Completed     Abandoned
//! ```
//!
//! Every mutation is written through the [`PersistenceGateway`] before it is
//! returned; a failed write leaves stored state untouched and nothing is
//! buffered for retry. Mutations take `&mut self`, so a single engine
//! serializes the proximity checks it performs.
use chrono::{DateTime, Utc};
use log::{debug, info};
use rand::{RngCore, SeedableRng};
use rand_chacha::ChaCha20Rng;
use smallvec::SmallVec;
use std::fmt::Write as _;
use std::sync::Arc;

use crate::clock::{Clock, SystemClock};
use crate::config::{ConfigError, TrackingConfig};
use crate::constants::EXECUTION_ID_BYTES;
use crate::error::TrackingError;
use crate::execution::{ExecutionId, ExecutionStatus, TourExecution};
use crate::geo::Coordinate;
use crate::proximity::ProximityEvaluator;
use crate::tour::{KeyPointId, Tour, TourId, UserId};
use crate::{PersistenceGateway, TourCatalog};

pub struct TourExecutionEngine<G, T>
where
    G: PersistenceGateway,
    T: TourCatalog,
{
    gateway: G,
    catalog: T,
    evaluator: ProximityEvaluator,
    clock: Arc<dyn Clock>,
    ids: ChaCha20Rng,
}

impl<G, T> TourExecutionEngine<G, T>
where
    G: PersistenceGateway,
    T: TourCatalog,
{
    /// Engine on the system clock with entropy-seeded execution ids.
    ///
    /// `config` is taken as-is; use [`Self::try_new`] for configuration that
    /// has not been through [`TrackingConfig::validate`].
    #[must_use]
    pub fn new(gateway: G, catalog: T, config: &TrackingConfig) -> Self {
        Self {
            gateway,
            catalog,
            evaluator: ProximityEvaluator::new(config.proximity_threshold_m),
            clock: Arc::new(SystemClock),
            ids: ChaCha20Rng::from_entropy(),
        }
    }

    /// Like [`Self::new`], rejecting an out-of-range `config`.
    ///
    /// # Errors
    ///
    /// Returns the first constraint `config` violates.
    pub fn try_new(gateway: G, catalog: T, config: &TrackingConfig) -> Result<Self, ConfigError> {
        config.validate()?;
        Ok(Self::new(gateway, catalog, config))
    }

    #[must_use]
    pub fn with_clock(mut self, clock: Arc<dyn Clock>) -> Self {
        self.clock = clock;
        self
    }

    /// Deterministic execution ids.
    #[must_use]
    pub fn with_seed(mut self, seed: u64) -> Self {
        self.ids = ChaCha20Rng::seed_from_u64(seed);
        self
    }

    #[must_use]
    pub fn clock(&self) -> Arc<dyn Clock> {
        Arc::clone(&self.clock)
    }

    #[must_use]
    pub fn now(&self) -> DateTime<Utc> {
        self.clock.now()
    }

    #[must_use]
    pub const fn gateway(&self) -> &G {
        &self.gateway
    }

    #[must_use]
    pub const fn catalog(&self) -> &T {
        &self.catalog
    }

    #[must_use]
    pub const fn evaluator(&self) -> &ProximityEvaluator {
        &self.evaluator
    }

    fn next_id(&mut self) -> ExecutionId {
        let mut bytes = [0_u8; EXECUTION_ID_BYTES];
        self.ids.fill_bytes(&mut bytes);
        let mut hex = String::with_capacity(EXECUTION_ID_BYTES * 2);
        for byte in bytes {
            let _ = write!(hex, "{byte:02x}");
        }
        ExecutionId::new(hex)
    }

    /// Resolve a tour from the catalog.
    ///
    /// # Errors
    ///
    /// Returns `TourNotFound` for unknown ids, or `Catalog` if the lookup fails.
    pub fn load_tour(&self, tour_id: &TourId) -> Result<Tour, TrackingError> {
        self.catalog
            .fetch_tour(tour_id)
            .map_err(TrackingError::catalog)?
            .ok_or_else(|| TrackingError::TourNotFound(tour_id.clone()))
    }

    /// Fetch an execution by id.
    ///
    /// # Errors
    ///
    /// Returns `NotFound` for unknown ids, or `Persistence` if the gateway fails.
    pub fn load_execution(&self, id: &ExecutionId) -> Result<TourExecution, TrackingError> {
        self.gateway
            .fetch_execution(id)
            .map_err(TrackingError::persistence)?
            .ok_or_else(|| TrackingError::NotFound(id.clone()))
    }

    fn store(&self, execution: &TourExecution) -> Result<(), TrackingError> {
        self.gateway
            .update_execution(execution)
            .map_err(TrackingError::persistence)
    }

    /// The user's Active execution, if any.
    ///
    /// # Errors
    ///
    /// Returns `Persistence` if the gateway lookup fails.
    pub fn get_active_execution(
        &self,
        user: &UserId,
    ) -> Result<Option<TourExecution>, TrackingError> {
        self.gateway
            .fetch_active_execution(user)
            .map_err(TrackingError::persistence)
    }

    /// Begin a new execution of `tour_id` for `user`.
    ///
    /// A user holds at most one Active execution. Starting the tour they are
    /// already on returns that execution unchanged.
    ///
    /// # Errors
    ///
    /// Returns `Conflict` if the user is active on a different tour,
    /// `TourNotFound` for unknown tours, or a gateway/catalog failure.
    pub fn start_tour(
        &mut self,
        tour_id: &TourId,
        user: &UserId,
    ) -> Result<TourExecution, TrackingError> {
        let tour = self.load_tour(tour_id)?;

        if let Some(active) = self.get_active_execution(user)? {
            if active.tour_id == tour.id {
                info!(
                    "user {user} resumed execution {} of tour {}",
                    active.id, tour.id
                );
                return Ok(active);
            }
            return Err(TrackingError::Conflict {
                user: user.clone(),
                active: active.id,
                tour: active.tour_id,
            });
        }

        let execution = TourExecution::start(
            self.next_id(),
            tour.id.clone(),
            user.clone(),
            self.clock.now(),
        );
        self.gateway
            .create_execution(&execution)
            .map_err(TrackingError::persistence)?;
        info!(
            "user {user} started execution {} of tour {} ({} key points)",
            execution.id,
            tour.id,
            tour.key_points().len()
        );
        Ok(execution)
    }

    /// Record every pending key point within reach of `position`.
    ///
    /// Terminal executions are returned as stored without any write. Key
    /// points already completed are never recorded twice, so repeating a
    /// check at the same coordinate only refreshes `last_activity`.
    ///
    /// # Errors
    ///
    /// Returns `NotFound` for unknown executions, or a gateway/catalog failure.
    pub fn check_position(
        &mut self,
        id: &ExecutionId,
        position: Coordinate,
    ) -> Result<TourExecution, TrackingError> {
        let execution = self.load_execution(id)?;
        self.apply_position(execution, position)
    }

    /// [`Self::check_position`] against the user's Active execution.
    ///
    /// # Errors
    ///
    /// Returns `NoActiveExecution` if the user has none.
    pub fn check_position_for_user(
        &mut self,
        user: &UserId,
        position: Coordinate,
    ) -> Result<TourExecution, TrackingError> {
        let execution = self
            .get_active_execution(user)?
            .ok_or_else(|| TrackingError::NoActiveExecution(user.clone()))?;
        self.apply_position(execution, position)
    }

    fn apply_position(
        &self,
        mut execution: TourExecution,
        position: Coordinate,
    ) -> Result<TourExecution, TrackingError> {
        if !execution.is_active() {
            debug!(
                "ignoring position for {} execution {}",
                execution.status, execution.id
            );
            return Ok(execution);
        }

        let tour = self.load_tour(&execution.tour_id)?;
        let now = self.clock.now();
        let reached: SmallVec<[KeyPointId; 4]> = self
            .evaluator
            .reached_among(position, execution.pending_key_points(&tour))
            .into_iter()
            .map(|kp| kp.id.clone())
            .collect();

        for key_point in reached {
            let label = tour
                .key_point(&key_point)
                .map_or_else(|| key_point.to_string(), |kp| kp.label().to_string());
            if execution.record_completion(key_point, now) {
                info!(
                    "user {} completed key point '{label}' ({}/{})",
                    execution.user_id,
                    execution.completed_count(),
                    tour.key_points().len()
                );
            }
        }

        execution.last_activity = now;
        self.store(&execution)?;
        Ok(execution)
    }

    /// Finish the execution successfully.
    ///
    /// Completing an already Completed execution returns it unchanged.
    ///
    /// # Errors
    ///
    /// Returns `Precondition` while key points remain, `Terminal` if the
    /// execution was abandoned, `NotFound` for unknown ids, or a gateway failure.
    pub fn complete(&mut self, id: &ExecutionId) -> Result<TourExecution, TrackingError> {
        let mut execution = self.load_execution(id)?;
        if let Some(settled) = Self::settled(&execution, ExecutionStatus::Completed)? {
            return Ok(settled);
        }

        let tour = self.load_tour(&execution.tour_id)?;
        let required = tour.key_points().len();
        let completed = execution.completed_count();
        if completed < required {
            return Err(TrackingError::Precondition {
                execution: execution.id,
                completed,
                required,
            });
        }

        execution.finish(ExecutionStatus::Completed, self.clock.now());
        self.store(&execution)?;
        info!(
            "execution {} of tour {} completed by {}",
            execution.id, execution.tour_id, execution.user_id
        );
        Ok(execution)
    }

    /// Give up on the execution. Always succeeds while Active.
    ///
    /// Abandoning an already Abandoned execution returns it unchanged.
    ///
    /// # Errors
    ///
    /// Returns `Terminal` if the execution was completed, `NotFound` for
    /// unknown ids, or a gateway failure.
    pub fn abandon(&mut self, id: &ExecutionId) -> Result<TourExecution, TrackingError> {
        let mut execution = self.load_execution(id)?;
        if let Some(settled) = Self::settled(&execution, ExecutionStatus::Abandoned)? {
            return Ok(settled);
        }

        execution.finish(ExecutionStatus::Abandoned, self.clock.now());
        self.store(&execution)?;
        info!(
            "execution {} of tour {} abandoned by {}",
            execution.id, execution.tour_id, execution.user_id
        );
        Ok(execution)
    }

    /// [`Self::complete`], refusing executions owned by someone else.
    ///
    /// # Errors
    ///
    /// Returns `NotOwner` if `user` does not own the execution.
    pub fn complete_for(
        &mut self,
        user: &UserId,
        id: &ExecutionId,
    ) -> Result<TourExecution, TrackingError> {
        self.ensure_owner(user, id)?;
        self.complete(id)
    }

    /// [`Self::abandon`], refusing executions owned by someone else.
    ///
    /// # Errors
    ///
    /// Returns `NotOwner` if `user` does not own the execution.
    pub fn abandon_for(
        &mut self,
        user: &UserId,
        id: &ExecutionId,
    ) -> Result<TourExecution, TrackingError> {
        self.ensure_owner(user, id)?;
        self.abandon(id)
    }

    fn ensure_owner(&self, user: &UserId, id: &ExecutionId) -> Result<(), TrackingError> {
        let execution = self.load_execution(id)?;
        if &execution.user_id == user {
            Ok(())
        } else {
            Err(TrackingError::NotOwner {
                execution: execution.id,
                user: user.clone(),
            })
        }
    }

    /// `Some` when the execution already sits in `target`; `Terminal` when it
    /// sits in the other terminal state; `None` while Active.
    fn settled(
        execution: &TourExecution,
        target: ExecutionStatus,
    ) -> Result<Option<TourExecution>, TrackingError> {
        match execution.status {
            ExecutionStatus::Active => Ok(None),
            status if status == target => Ok(Some(execution.clone())),
            status => Err(TrackingError::Terminal {
                execution: execution.id.clone(),
                status,
            }),
        }
    }
}
