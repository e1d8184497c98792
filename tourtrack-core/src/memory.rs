//! In-process implementations of the persistence and catalog collaborators.
//!
//! Both are cheap to clone; clones share the same backing map so a test or
//! the CLI can keep a handle for inspection after moving one into an engine.
use std::collections::{BTreeMap, HashMap};
use std::convert::Infallible;
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::{Arc, Mutex, PoisonError, RwLock};

use thiserror::Error;

use crate::execution::{ExecutionId, TourExecution};
use crate::tour::{Tour, TourId, UserId};
use crate::{PersistenceGateway, TourCatalog};

#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum GatewayError {
    #[error("storage offline")]
    Offline,
    #[error("execution {0} already exists")]
    Duplicate(ExecutionId),
    #[error("execution {0} does not exist")]
    Missing(ExecutionId),
}

#[derive(Debug, Clone, Default)]
pub struct InMemoryGateway {
    executions: Arc<Mutex<BTreeMap<ExecutionId, TourExecution>>>,
    offline: Arc<AtomicBool>,
    read_only: Arc<AtomicBool>,
}

impl InMemoryGateway {
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// Simulate a network partition: every call fails with [`GatewayError::Offline`].
    pub fn set_offline(&self, offline: bool) {
        self.offline.store(offline, Ordering::SeqCst);
    }

    /// Reads keep working but every write fails with [`GatewayError::Offline`].
    pub fn set_read_only(&self, read_only: bool) {
        self.read_only.store(read_only, Ordering::SeqCst);
    }

    #[must_use]
    pub fn len(&self) -> usize {
        self.lock().len()
    }

    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.lock().is_empty()
    }

    /// Every stored execution, ordered by id.
    #[must_use]
    pub fn all(&self) -> Vec<TourExecution> {
        self.lock().values().cloned().collect()
    }

    fn lock(&self) -> std::sync::MutexGuard<'_, BTreeMap<ExecutionId, TourExecution>> {
        self.executions.lock().unwrap_or_else(PoisonError::into_inner)
    }

    fn online(&self) -> Result<(), GatewayError> {
        if self.offline.load(Ordering::SeqCst) {
            Err(GatewayError::Offline)
        } else {
            Ok(())
        }
    }

    fn writable(&self) -> Result<(), GatewayError> {
        self.online()?;
        if self.read_only.load(Ordering::SeqCst) {
            Err(GatewayError::Offline)
        } else {
            Ok(())
        }
    }
}

impl PersistenceGateway for InMemoryGateway {
    type Error = GatewayError;

    fn create_execution(&self, execution: &TourExecution) -> Result<(), Self::Error> {
        self.writable()?;
        let mut map = self.lock();
        if map.contains_key(&execution.id) {
            return Err(GatewayError::Duplicate(execution.id.clone()));
        }
        map.insert(execution.id.clone(), execution.clone());
        Ok(())
    }

    fn update_execution(&self, execution: &TourExecution) -> Result<(), Self::Error> {
        self.writable()?;
        let mut map = self.lock();
        let Some(slot) = map.get_mut(&execution.id) else {
            return Err(GatewayError::Missing(execution.id.clone()));
        };
        *slot = execution.clone();
        Ok(())
    }

    fn fetch_execution(&self, id: &ExecutionId) -> Result<Option<TourExecution>, Self::Error> {
        self.online()?;
        Ok(self.lock().get(id).cloned())
    }

    fn fetch_active_execution(&self, user: &UserId) -> Result<Option<TourExecution>, Self::Error> {
        self.online()?;
        Ok(self
            .lock()
            .values()
            .find(|exec| &exec.user_id == user && exec.is_active())
            .cloned())
    }
}

#[derive(Debug, Clone, Default)]
pub struct InMemoryCatalog {
    tours: Arc<RwLock<HashMap<TourId, Tour>>>,
}

impl InMemoryCatalog {
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    #[must_use]
    pub fn with_tours(tours: impl IntoIterator<Item = Tour>) -> Self {
        let catalog = Self::new();
        for tour in tours {
            catalog.insert(tour);
        }
        catalog
    }

    pub fn insert(&self, tour: Tour) {
        self.tours
            .write()
            .unwrap_or_else(PoisonError::into_inner)
            .insert(tour.id.clone(), tour);
    }
}

impl TourCatalog for InMemoryCatalog {
    type Error = Infallible;

    fn fetch_tour(&self, id: &TourId) -> Result<Option<Tour>, Self::Error> {
        Ok(self
            .tours
            .read()
            .unwrap_or_else(PoisonError::into_inner)
            .get(id)
            .cloned())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::tour::TourKeyPoint;
    use chrono::Utc;

    fn exec(id: &str, user: &str) -> TourExecution {
        TourExecution::start(
            ExecutionId::from(id),
            TourId::from("t1"),
            UserId::from(user),
            Utc::now(),
        )
    }

    #[test]
    fn gateway_creates_updates_and_finds_active() {
        let gateway = InMemoryGateway::new();
        let mut e = exec("e1", "ana");
        gateway.create_execution(&e).unwrap();
        assert_eq!(
            gateway.create_execution(&e),
            Err(GatewayError::Duplicate(e.id.clone()))
        );
        assert_eq!(
            gateway
                .fetch_active_execution(&UserId::from("ana"))
                .unwrap()
                .map(|x| x.id),
            Some(e.id.clone())
        );

        e.finish(crate::ExecutionStatus::Abandoned, Utc::now());
        gateway.update_execution(&e).unwrap();
        assert!(
            gateway
                .fetch_active_execution(&UserId::from("ana"))
                .unwrap()
                .is_none()
        );
        assert_eq!(
            gateway.update_execution(&exec("ghost", "ana")),
            Err(GatewayError::Missing(ExecutionId::from("ghost")))
        );
        assert_eq!(gateway.len(), 1);
    }

    #[test]
    fn offline_gateway_rejects_everything() {
        let gateway = InMemoryGateway::new();
        gateway.set_offline(true);
        assert_eq!(
            gateway.create_execution(&exec("e1", "ana")),
            Err(GatewayError::Offline)
        );
        assert!(gateway.is_empty());
        gateway.set_offline(false);
        assert!(gateway.create_execution(&exec("e1", "ana")).is_ok());
    }

    #[test]
    fn read_only_gateway_still_serves_reads() {
        let gateway = InMemoryGateway::new();
        let e = exec("e1", "ana");
        gateway.create_execution(&e).unwrap();
        gateway.set_read_only(true);
        assert_eq!(gateway.update_execution(&e), Err(GatewayError::Offline));
        assert_eq!(gateway.fetch_execution(&e.id).unwrap(), Some(e));
    }

    #[test]
    fn catalog_clones_share_tours() {
        let catalog = InMemoryCatalog::new();
        let handle = catalog.clone();
        handle.insert(Tour::new("t1", vec![TourKeyPoint::new("a", 1, 44.8, 20.4)]));
        let tour = catalog.fetch_tour(&TourId::from("t1")).unwrap();
        assert_eq!(tour.map(|t| t.key_points().len()), Some(1));
        assert!(catalog.fetch_tour(&TourId::from("t2")).unwrap().is_none());
    }
}
