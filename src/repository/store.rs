//! Transactional access to the fleet (umbrellas) and the rental ledger.
//!
//! The rental engine only talks to these traits. A transaction holds row locks
//! from the moment it reads a row with `lock_*` until it is committed or
//! dropped; dropping an uncommitted transaction rolls it back.

use std::time::Duration;

use async_trait::async_trait;
use chrono::{DateTime, Utc};
use sqlx::{Postgres, Transaction};

use crate::{
    error::{AppError, AppResult},
    models::{
        rental::{NewRental, RentalRecord},
        umbrella::{Umbrella, UmbrellaSummary},
    },
    repository::Repository,
};

#[async_trait]
pub trait FleetStore: Send + Sync {
    /// Start a transaction with a bounded lock wait
    async fn begin(&self) -> AppResult<Box<dyn FleetTx>>;

    async fn station_exists(&self, station_id: i32) -> AppResult<bool>;

    async fn available_umbrellas(&self, station_id: i32) -> AppResult<Vec<UmbrellaSummary>>;

    /// Umbrella of the user's most recent open rental, read from committed state
    async fn current_rental(&self, user_id: &str) -> AppResult<Option<String>>;

    async fn rental_history(&self, user_id: &str) -> AppResult<Vec<RentalRecord>>;
}

#[async_trait]
pub trait FleetTx: Send {
    async fn station_exists(&mut self, station_id: i32) -> AppResult<bool>;

    /// Read an umbrella under an exclusive row lock
    async fn lock_umbrella(&mut self, umbrella_id: &str) -> AppResult<Option<Umbrella>>;

    async fn mark_rented(&mut self, umbrella_id: &str, user_id: &str) -> AppResult<()>;

    async fn mark_available(&mut self, umbrella_id: &str, station_id: i32) -> AppResult<()>;

    async fn open_rental(&mut self, rental: &NewRental) -> AppResult<i64>;

    /// Most recent open rental for an umbrella, locked
    async fn lock_open_rental(&mut self, umbrella_id: &str) -> AppResult<Option<RentalRecord>>;

    async fn close_rental(
        &mut self,
        rent_id: i64,
        station_id: i32,
        return_time: DateTime<Utc>,
    ) -> AppResult<()>;

    async fn commit(self: Box<Self>) -> AppResult<()>;
}

/// Fleet store backed by Postgres row locks (`SELECT ... FOR UPDATE`)
#[derive(Clone)]
pub struct PgFleetStore {
    repository: Repository,
    lock_timeout: Duration,
}

impl PgFleetStore {
    pub fn new(repository: Repository, lock_timeout: Duration) -> Self {
        Self {
            repository,
            lock_timeout,
        }
    }
}

#[async_trait]
impl FleetStore for PgFleetStore {
    async fn begin(&self) -> AppResult<Box<dyn FleetTx>> {
        let mut tx = self.repository.pool.begin().await?;

        // SET does not take bind parameters; the value is an integer we own.
        let set_timeout = format!("SET LOCAL lock_timeout = '{}ms'", self.lock_timeout.as_millis());
        sqlx::query(&set_timeout).execute(&mut *tx).await?;

        Ok(Box::new(PgFleetTx {
            tx,
            repository: self.repository.clone(),
        }))
    }

    async fn station_exists(&self, station_id: i32) -> AppResult<bool> {
        self.repository.stations.exists(station_id).await
    }

    async fn available_umbrellas(&self, station_id: i32) -> AppResult<Vec<UmbrellaSummary>> {
        self.repository.umbrellas.list_available_at(station_id).await
    }

    async fn current_rental(&self, user_id: &str) -> AppResult<Option<String>> {
        self.repository.rentals.current_umbrella_for_user(user_id).await
    }

    async fn rental_history(&self, user_id: &str) -> AppResult<Vec<RentalRecord>> {
        self.repository.rentals.history_for_user(user_id).await
    }
}

struct PgFleetTx {
    tx: Transaction<'static, Postgres>,
    repository: Repository,
}

#[async_trait]
impl FleetTx for PgFleetTx {
    async fn station_exists(&mut self, station_id: i32) -> AppResult<bool> {
        self.repository.stations.exists_in(&mut self.tx, station_id).await
    }

    async fn lock_umbrella(&mut self, umbrella_id: &str) -> AppResult<Option<Umbrella>> {
        self.repository.umbrellas.lock(&mut self.tx, umbrella_id).await
    }

    async fn mark_rented(&mut self, umbrella_id: &str, user_id: &str) -> AppResult<()> {
        self.repository
            .umbrellas
            .mark_rented(&mut self.tx, umbrella_id, user_id)
            .await
    }

    async fn mark_available(&mut self, umbrella_id: &str, station_id: i32) -> AppResult<()> {
        self.repository
            .umbrellas
            .mark_available(&mut self.tx, umbrella_id, station_id)
            .await
    }

    async fn open_rental(&mut self, rental: &NewRental) -> AppResult<i64> {
        self.repository.rentals.insert_open(&mut self.tx, rental).await
    }

    async fn lock_open_rental(&mut self, umbrella_id: &str) -> AppResult<Option<RentalRecord>> {
        self.repository
            .rentals
            .lock_open_for_umbrella(&mut self.tx, umbrella_id)
            .await
    }

    async fn close_rental(
        &mut self,
        rent_id: i64,
        station_id: i32,
        return_time: DateTime<Utc>,
    ) -> AppResult<()> {
        self.repository
            .rentals
            .close(&mut self.tx, rent_id, station_id, return_time)
            .await
    }

    async fn commit(self: Box<Self>) -> AppResult<()> {
        let PgFleetTx { tx, .. } = *self;
        tx.commit().await.map_err(AppError::from)
    }
}
