//! In-process fleet store.
//!
//! Mirrors the Postgres store closely enough to exercise the rental engine
//! without a database: each umbrella has its own async row lock (rentals of an
//! umbrella live under the same lock), writes are buffered in the transaction
//! and applied atomically on commit, and the table constraints of the schema
//! are re-checked before a commit is accepted.

use std::{
    collections::{BTreeMap, BTreeSet, HashMap},
    sync::{
        atomic::{AtomicI64, Ordering},
        Arc, Mutex, MutexGuard,
    },
    time::Duration,
};

use async_trait::async_trait;
use chrono::{DateTime, Utc};
use dashmap::DashMap;
use tokio::sync::{Mutex as RowLock, OwnedMutexGuard};

use crate::{
    error::{AppError, AppResult},
    models::{
        rental::{NewRental, RentalRecord},
        umbrella::{Umbrella, UmbrellaStatus, UmbrellaSummary},
    },
    repository::store::{FleetStore, FleetTx},
};

/// Committed contents of the store
#[derive(Debug, Clone, Default)]
pub struct FleetSnapshot {
    pub stations: BTreeSet<i32>,
    pub umbrellas: BTreeMap<String, Umbrella>,
    pub rentals: Vec<RentalRecord>,
}

impl FleetSnapshot {
    pub fn open_rentals_for(&self, umbrella_id: &str) -> Vec<&RentalRecord> {
        self.rentals
            .iter()
            .filter(|r| r.umbrella_id == umbrella_id && r.is_open())
            .collect()
    }

    /// Constraint violations, empty when the snapshot is consistent
    pub fn violations(&self) -> Vec<String> {
        let mut violations = Vec::new();
        let mut open: HashMap<&str, usize> = HashMap::new();

        for umbrella in self.umbrellas.values() {
            if !umbrella.is_consistent() {
                violations.push(format!(
                    "umbrella {} is {} with station {:?}",
                    umbrella.umbrella_id, umbrella.status, umbrella.station_id
                ));
            }
            if let Some(station_id) = umbrella.station_id {
                if !self.stations.contains(&station_id) {
                    violations.push(format!(
                        "umbrella {} references unknown station {}",
                        umbrella.umbrella_id, station_id
                    ));
                }
            }
        }

        for rental in &self.rentals {
            if !self.umbrellas.contains_key(&rental.umbrella_id) {
                violations.push(format!(
                    "rental {} references unknown umbrella {}",
                    rental.rent_id, rental.umbrella_id
                ));
            }
            if !self.stations.contains(&rental.station_id) {
                violations.push(format!(
                    "rental {} references unknown station {}",
                    rental.rent_id, rental.station_id
                ));
            }
            match rental.return_time {
                None => *open.entry(rental.umbrella_id.as_str()).or_default() += 1,
                Some(returned) if returned < rental.rent_time => violations.push(format!(
                    "rental {} returned before it started",
                    rental.rent_id
                )),
                Some(_) => {}
            }
        }

        for (umbrella_id, count) in open {
            if count > 1 {
                violations.push(format!("umbrella {} has {} open rentals", umbrella_id, count));
            }
        }

        violations
    }
}

/// Builder for a pre-populated [`MemoryFleetStore`]
#[derive(Debug, Default)]
pub struct MemoryFleetBuilder {
    snapshot: FleetSnapshot,
    lock_timeout: Option<Duration>,
}

impl MemoryFleetBuilder {
    pub fn station(mut self, station_id: i32) -> Self {
        self.snapshot.stations.insert(station_id);
        self
    }

    pub fn umbrella(mut self, umbrella: Umbrella) -> Self {
        self.snapshot
            .umbrellas
            .insert(umbrella.umbrella_id.clone(), umbrella);
        self
    }

    pub fn rental(mut self, rental: RentalRecord) -> Self {
        self.snapshot.rentals.push(rental);
        self
    }

    pub fn lock_timeout(mut self, timeout: Duration) -> Self {
        self.lock_timeout = Some(timeout);
        self
    }

    pub fn build(self) -> MemoryFleetStore {
        let next_rent_id = self
            .snapshot
            .rentals
            .iter()
            .map(|r| r.rent_id)
            .max()
            .unwrap_or(0)
            + 1;

        MemoryFleetStore {
            shared: Arc::new(Shared {
                state: Mutex::new(self.snapshot),
                row_locks: DashMap::new(),
                next_rent_id: AtomicI64::new(next_rent_id),
                lock_timeout: self.lock_timeout.unwrap_or(MemoryFleetStore::DEFAULT_LOCK_TIMEOUT),
            }),
        }
    }
}

#[derive(Debug)]
struct Shared {
    state: Mutex<FleetSnapshot>,
    row_locks: DashMap<String, Arc<RowLock<()>>>,
    next_rent_id: AtomicI64,
    lock_timeout: Duration,
}

impl Shared {
    fn state(&self) -> AppResult<MutexGuard<'_, FleetSnapshot>> {
        self.state
            .lock()
            .map_err(|_| AppError::Internal("fleet state lock poisoned".to_string()))
    }

    fn committed_umbrella(&self, umbrella_id: &str) -> AppResult<Option<Umbrella>> {
        let state = self.state()?;
        Ok(state.umbrellas.get(umbrella_id).cloned())
    }

    fn committed_open_rentals(&self, umbrella_id: &str) -> AppResult<Vec<RentalRecord>> {
        let state = self.state()?;
        Ok(state
            .open_rentals_for(umbrella_id)
            .into_iter()
            .cloned()
            .collect())
    }

    fn committed_rental(&self, rent_id: i64) -> AppResult<Option<RentalRecord>> {
        let state = self.state()?;
        Ok(state.rentals.iter().find(|r| r.rent_id == rent_id).cloned())
    }

    fn station_exists(&self, station_id: i32) -> AppResult<bool> {
        let state = self.state()?;
        Ok(state.stations.contains(&station_id))
    }

    fn available_umbrellas(&self, station_id: i32) -> AppResult<Vec<UmbrellaSummary>> {
        let state = self.state()?;
        Ok(state
            .umbrellas
            .values()
            .filter(|u| u.is_docked_at(station_id))
            .cloned()
            .map(UmbrellaSummary::from)
            .collect())
    }

    fn current_rental(&self, user_id: &str) -> AppResult<Option<String>> {
        let state = self.state()?;
        Ok(state
            .rentals
            .iter()
            .filter(|r| r.user_id == user_id && r.is_open())
            .max_by_key(|r| (r.rent_time, r.rent_id))
            .map(|r| r.umbrella_id.clone()))
    }

    fn rental_history(&self, user_id: &str) -> AppResult<Vec<RentalRecord>> {
        let state = self.state()?;
        let mut records: Vec<RentalRecord> = state
            .rentals
            .iter()
            .filter(|r| r.user_id == user_id)
            .cloned()
            .collect();
        records.sort_by(|a, b| (b.rent_time, b.rent_id).cmp(&(a.rent_time, a.rent_id)));
        Ok(records)
    }

    fn row_lock(&self, umbrella_id: &str) -> Arc<RowLock<()>> {
        self.row_locks
            .entry(umbrella_id.to_string())
            .or_default()
            .clone()
    }
}

/// Fleet store kept in process memory
#[derive(Debug, Clone)]
pub struct MemoryFleetStore {
    shared: Arc<Shared>,
}

impl MemoryFleetStore {
    pub const DEFAULT_LOCK_TIMEOUT: Duration = Duration::from_secs(1);

    pub fn builder() -> MemoryFleetBuilder {
        MemoryFleetBuilder::default()
    }

    /// Copy of the committed state
    pub fn snapshot(&self) -> AppResult<FleetSnapshot> {
        Ok(self.shared.state()?.clone())
    }
}

#[async_trait]
impl FleetStore for MemoryFleetStore {
    async fn begin(&self) -> AppResult<Box<dyn FleetTx>> {
        Ok(Box::new(MemoryFleetTx {
            shared: self.shared.clone(),
            held: HashMap::new(),
            umbrellas: HashMap::new(),
            inserted: Vec::new(),
            closed: HashMap::new(),
        }))
    }

    async fn station_exists(&self, station_id: i32) -> AppResult<bool> {
        self.shared.station_exists(station_id)
    }

    async fn available_umbrellas(&self, station_id: i32) -> AppResult<Vec<UmbrellaSummary>> {
        self.shared.available_umbrellas(station_id)
    }

    async fn current_rental(&self, user_id: &str) -> AppResult<Option<String>> {
        self.shared.current_rental(user_id)
    }

    async fn rental_history(&self, user_id: &str) -> AppResult<Vec<RentalRecord>> {
        self.shared.rental_history(user_id)
    }
}

struct MemoryFleetTx {
    shared: Arc<Shared>,
    /// Row locks held until commit or drop
    held: HashMap<String, OwnedMutexGuard<()>>,
    umbrellas: HashMap<String, Umbrella>,
    inserted: Vec<RentalRecord>,
    /// rent_id -> (return station, return time)
    closed: HashMap<i64, (i32, DateTime<Utc>)>,
}

impl MemoryFleetTx {
    async fn acquire(&mut self, umbrella_id: &str) -> AppResult<()> {
        if self.held.contains_key(umbrella_id) {
            return Ok(());
        }

        let lock = self.shared.row_lock(umbrella_id);
        let guard = tokio::time::timeout(self.shared.lock_timeout, lock.lock_owned())
            .await
            .map_err(|_| AppError::LockTimeout)?;

        self.held.insert(umbrella_id.to_string(), guard);
        Ok(())
    }

    fn current_umbrella(&self, umbrella_id: &str) -> AppResult<Option<Umbrella>> {
        match self.umbrellas.get(umbrella_id) {
            Some(pending) => Ok(Some(pending.clone())),
            None => self.shared.committed_umbrella(umbrella_id),
        }
    }

    fn open_rentals(&self, umbrella_id: &str) -> AppResult<Vec<RentalRecord>> {
        let mut open = self.shared.committed_open_rentals(umbrella_id)?;
        open.extend(
            self.inserted
                .iter()
                .filter(|r| r.umbrella_id == umbrella_id && r.is_open())
                .cloned(),
        );
        open.retain(|r| !self.closed.contains_key(&r.rent_id));
        Ok(open)
    }

    async fn update_umbrella<F>(&mut self, umbrella_id: &str, update: F) -> AppResult<()>
    where
        F: FnOnce(&mut Umbrella) + Send,
    {
        self.acquire(umbrella_id).await?;

        let mut umbrella = self
            .current_umbrella(umbrella_id)?
            .ok_or_else(|| AppError::NotFound(format!("Umbrella {} not found", umbrella_id)))?;
        update(&mut umbrella);

        self.umbrellas.insert(umbrella_id.to_string(), umbrella);
        Ok(())
    }
}

#[async_trait]
impl FleetTx for MemoryFleetTx {
    async fn station_exists(&mut self, station_id: i32) -> AppResult<bool> {
        self.shared.station_exists(station_id)
    }

    async fn lock_umbrella(&mut self, umbrella_id: &str) -> AppResult<Option<Umbrella>> {
        self.acquire(umbrella_id).await?;
        self.current_umbrella(umbrella_id)
    }

    async fn mark_rented(&mut self, umbrella_id: &str, user_id: &str) -> AppResult<()> {
        let user_id = user_id.to_string();
        self.update_umbrella(umbrella_id, move |u| {
            u.status = UmbrellaStatus::Rented;
            u.station_id = None;
            u.last_user_id = Some(user_id);
        })
        .await
    }

    async fn mark_available(&mut self, umbrella_id: &str, station_id: i32) -> AppResult<()> {
        self.update_umbrella(umbrella_id, move |u| {
            u.status = UmbrellaStatus::Available;
            u.station_id = Some(station_id);
        })
        .await
    }

    async fn open_rental(&mut self, rental: &NewRental) -> AppResult<i64> {
        self.acquire(&rental.umbrella_id).await?;

        let rent_id = self.shared.next_rent_id.fetch_add(1, Ordering::SeqCst);
        self.inserted.push(RentalRecord {
            rent_id,
            user_id: rental.user_id.clone(),
            station_id: rental.station_id,
            umbrella_id: rental.umbrella_id.clone(),
            rent_time: rental.rent_time,
            return_time: None,
        });

        Ok(rent_id)
    }

    async fn lock_open_rental(&mut self, umbrella_id: &str) -> AppResult<Option<RentalRecord>> {
        self.acquire(umbrella_id).await?;

        Ok(self
            .open_rentals(umbrella_id)?
            .into_iter()
            .max_by_key(|r| (r.rent_time, r.rent_id)))
    }

    async fn close_rental(
        &mut self,
        rent_id: i64,
        station_id: i32,
        return_time: DateTime<Utc>,
    ) -> AppResult<()> {
        let record = match self.inserted.iter().find(|r| r.rent_id == rent_id) {
            Some(pending) => Some(pending.clone()),
            None => self.shared.committed_rental(rent_id)?,
        };
        let still_open = record
            .map(|r| {
                r.is_open()
                    && !self.closed.contains_key(&rent_id)
                    && self.held.contains_key(&r.umbrella_id)
            })
            .unwrap_or(false);

        if !still_open {
            return Err(AppError::Internal(format!(
                "Rental {} was not open when closing it",
                rent_id
            )));
        }

        self.closed.insert(rent_id, (station_id, return_time));
        Ok(())
    }

    async fn commit(self: Box<Self>) -> AppResult<()> {
        let MemoryFleetTx {
            shared,
            held,
            umbrellas,
            inserted,
            closed,
        } = *self;

        let mut state = shared.state()?;
        let mut next = state.clone();

        next.umbrellas.extend(umbrellas);
        next.rentals.extend(inserted);
        for rental in next.rentals.iter_mut() {
            if let Some((station_id, return_time)) = closed.get(&rental.rent_id) {
                rental.station_id = *station_id;
                rental.return_time = Some(*return_time);
            }
        }

        if let Some(violation) = next.violations().into_iter().next() {
            return Err(AppError::Constraint(violation));
        }

        *state = next;
        drop(state);
        drop(held);
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn store() -> MemoryFleetStore {
        MemoryFleetStore::builder()
            .station(1)
            .station(2)
            .umbrella(Umbrella::docked("U1", 1))
            .lock_timeout(Duration::from_millis(50))
            .build()
    }

    #[tokio::test]
    async fn writes_are_invisible_until_commit() {
        let store = store();
        let mut tx = store.begin().await.unwrap();
        tx.mark_rented("U1", "alice").await.unwrap();

        let before = store.snapshot().unwrap();
        assert_eq!(before.umbrellas["U1"].status, UmbrellaStatus::Available);

        tx.commit().await.unwrap();
        let after = store.snapshot().unwrap();
        assert_eq!(after.umbrellas["U1"].status, UmbrellaStatus::Rented);
        assert_eq!(after.umbrellas["U1"].station_id, None);
    }

    #[tokio::test]
    async fn dropping_a_transaction_rolls_back_and_unlocks() {
        let store = store();
        {
            let mut tx = store.begin().await.unwrap();
            tx.mark_rented("U1", "alice").await.unwrap();
        }

        let mut tx = store.begin().await.unwrap();
        let umbrella = tx.lock_umbrella("U1").await.unwrap().unwrap();
        assert_eq!(umbrella.status, UmbrellaStatus::Available);
    }

    #[tokio::test]
    async fn second_locker_times_out() {
        let store = store();
        let mut first = store.begin().await.unwrap();
        first.lock_umbrella("U1").await.unwrap();

        let mut second = store.begin().await.unwrap();
        let err = second.lock_umbrella("U1").await.unwrap_err();
        assert!(matches!(err, AppError::LockTimeout));
    }

    #[tokio::test]
    async fn commit_rejects_broken_custody() {
        let store = store();
        let mut tx = raw_tx(&store);
        tx.update_umbrella("U1", |u| u.station_id = None)
            .await
            .unwrap();

        let err = Box::new(tx).commit().await.unwrap_err();
        assert!(matches!(err, AppError::Constraint(_)));
        assert!(store.snapshot().unwrap().violations().is_empty());
    }

    #[tokio::test]
    async fn commit_rejects_second_open_rental() {
        let store = store();
        let mut tx = store.begin().await.unwrap();
        for _ in 0..2 {
            tx.open_rental(&NewRental {
                user_id: "alice".to_string(),
                station_id: 1,
                umbrella_id: "U1".to_string(),
                rent_time: Utc::now(),
            })
            .await
            .unwrap();
        }

        let err = tx.commit().await.unwrap_err();
        assert!(matches!(err, AppError::Constraint(_)));
        assert!(store.snapshot().unwrap().rentals.is_empty());
    }

    #[tokio::test]
    async fn closing_twice_is_rejected() {
        let store = MemoryFleetStore::builder()
            .station(1)
            .umbrella(Umbrella::rented("U1", "alice"))
            .rental(RentalRecord {
                rent_id: 7,
                user_id: "alice".to_string(),
                station_id: 1,
                umbrella_id: "U1".to_string(),
                rent_time: Utc::now(),
                return_time: None,
            })
            .build();

        let mut tx = store.begin().await.unwrap();
        let open = tx.lock_open_rental("U1").await.unwrap().unwrap();
        assert_eq!(open.rent_id, 7);

        tx.close_rental(7, 1, Utc::now()).await.unwrap();
        assert!(tx.close_rental(7, 1, Utc::now()).await.is_err());
        assert!(tx.lock_open_rental("U1").await.unwrap().is_none());
    }

    #[tokio::test]
    async fn rent_ids_continue_after_seeded_rentals() {
        let store = MemoryFleetStore::builder()
            .station(1)
            .umbrella(Umbrella::docked("U1", 1))
            .rental(RentalRecord {
                rent_id: 41,
                user_id: "alice".to_string(),
                station_id: 1,
                umbrella_id: "U1".to_string(),
                rent_time: Utc::now(),
                return_time: Some(Utc::now()),
            })
            .build();

        let mut tx = store.begin().await.unwrap();
        let rent_id = tx
            .open_rental(&NewRental {
                user_id: "bob".to_string(),
                station_id: 1,
                umbrella_id: "U1".to_string(),
                rent_time: Utc::now(),
            })
            .await
            .unwrap();
        assert_eq!(rent_id, 42);
    }

    fn raw_tx(store: &MemoryFleetStore) -> MemoryFleetTx {
        MemoryFleetTx {
            shared: store.shared.clone(),
            held: HashMap::new(),
            umbrellas: HashMap::new(),
            inserted: Vec::new(),
            closed: HashMap::new(),
        }
    }
}
