//! Repository layer for database operations

pub mod favorites;
#[cfg(any(test, feature = "test-util"))]
pub mod memory;
pub mod rentals;
pub mod stations;
pub mod store;
pub mod umbrellas;
pub mod users;

use sqlx::{Pool, Postgres};

use crate::error::AppResult;

/// Main repository struct holding database connection pool
#[derive(Clone)]
pub struct Repository {
    pub pool: Pool<Postgres>,
    pub stations: stations::StationsRepository,
    pub umbrellas: umbrellas::UmbrellasRepository,
    pub rentals: rentals::RentalsRepository,
    pub users: users::UsersRepository,
    pub favorites: favorites::FavoritesRepository,
}

impl Repository {
    /// Create a new repository with the given database pool
    pub fn new(pool: Pool<Postgres>) -> Self {
        Self {
            stations: stations::StationsRepository::new(pool.clone()),
            umbrellas: umbrellas::UmbrellasRepository::new(pool.clone()),
            rentals: rentals::RentalsRepository::new(pool.clone()),
            users: users::UsersRepository::new(pool.clone()),
            favorites: favorites::FavoritesRepository::new(pool.clone()),
            pool,
        }
    }

    /// Round-trip to the database
    pub async fn ping(&self) -> AppResult<()> {
        sqlx::query("SELECT 1").execute(&self.pool).await?;
        Ok(())
    }
}
