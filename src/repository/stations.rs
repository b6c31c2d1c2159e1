//! Station directory (read only)

use sqlx::{Pool, Postgres, Transaction};

use crate::{error::AppResult, models::station::Station};

#[derive(Clone)]
pub struct StationsRepository {
    pool: Pool<Postgres>,
}

impl StationsRepository {
    pub fn new(pool: Pool<Postgres>) -> Self {
        Self { pool }
    }

    /// List stations, optionally restricted to one region
    pub async fn list(&self, region: Option<&str>) -> AppResult<Vec<Station>> {
        let stations = match region {
            Some(region) => {
                sqlx::query_as::<_, Station>(
                    "SELECT station_id, name, lat, lng, region FROM stations WHERE region = $1 ORDER BY station_id",
                )
                .bind(region)
                .fetch_all(&self.pool)
                .await?
            }
            None => {
                sqlx::query_as::<_, Station>(
                    "SELECT station_id, name, lat, lng, region FROM stations ORDER BY station_id",
                )
                .fetch_all(&self.pool)
                .await?
            }
        };

        Ok(stations)
    }

    pub async fn exists(&self, station_id: i32) -> AppResult<bool> {
        let exists: bool =
            sqlx::query_scalar("SELECT EXISTS(SELECT 1 FROM stations WHERE station_id = $1)")
                .bind(station_id)
                .fetch_one(&self.pool)
                .await?;
        Ok(exists)
    }

    /// Existence check inside a rental transaction
    pub async fn exists_in(
        &self,
        tx: &mut Transaction<'_, Postgres>,
        station_id: i32,
    ) -> AppResult<bool> {
        let exists: bool =
            sqlx::query_scalar("SELECT EXISTS(SELECT 1 FROM stations WHERE station_id = $1)")
                .bind(station_id)
                .fetch_one(&mut **tx)
                .await?;
        Ok(exists)
    }
}
