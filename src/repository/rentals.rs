//! Rental ledger queries

use chrono::{DateTime, Utc};
use sqlx::{Pool, Postgres, Transaction};

use crate::{
    error::{AppError, AppResult},
    models::rental::{NewRental, RentalRecord},
};

#[derive(Clone)]
pub struct RentalsRepository {
    pool: Pool<Postgres>,
}

impl RentalsRepository {
    pub fn new(pool: Pool<Postgres>) -> Self {
        Self { pool }
    }

    /// Umbrella of the user's most recent open rental
    pub async fn current_umbrella_for_user(&self, user_id: &str) -> AppResult<Option<String>> {
        let umbrella_id = sqlx::query_scalar::<_, String>(
            r#"
            SELECT umbrella_id
            FROM rental_records
            WHERE user_id = $1 AND return_time IS NULL
            ORDER BY rent_time DESC, rent_id DESC
            LIMIT 1
            "#,
        )
        .bind(user_id)
        .fetch_optional(&self.pool)
        .await?;

        Ok(umbrella_id)
    }

    /// Get rental history for a user, most recent first
    pub async fn history_for_user(&self, user_id: &str) -> AppResult<Vec<RentalRecord>> {
        let records = sqlx::query_as::<_, RentalRecord>(
            r#"
            SELECT rent_id, user_id, station_id, umbrella_id, rent_time, return_time
            FROM rental_records
            WHERE user_id = $1
            ORDER BY rent_time DESC, rent_id DESC
            "#,
        )
        .bind(user_id)
        .fetch_all(&self.pool)
        .await?;

        Ok(records)
    }

    /// Open a rental and return its identifier
    pub async fn insert_open(
        &self,
        tx: &mut Transaction<'_, Postgres>,
        rental: &NewRental,
    ) -> AppResult<i64> {
        let rent_id = sqlx::query_scalar::<_, i64>(
            r#"
            INSERT INTO rental_records (user_id, station_id, umbrella_id, rent_time)
            VALUES ($1, $2, $3, $4)
            RETURNING rent_id
            "#,
        )
        .bind(&rental.user_id)
        .bind(rental.station_id)
        .bind(&rental.umbrella_id)
        .bind(rental.rent_time)
        .fetch_one(&mut **tx)
        .await?;

        Ok(rent_id)
    }

    /// Most recent open rental of an umbrella, row-locked
    pub async fn lock_open_for_umbrella(
        &self,
        tx: &mut Transaction<'_, Postgres>,
        umbrella_id: &str,
    ) -> AppResult<Option<RentalRecord>> {
        let record = sqlx::query_as::<_, RentalRecord>(
            r#"
            SELECT rent_id, user_id, station_id, umbrella_id, rent_time, return_time
            FROM rental_records
            WHERE umbrella_id = $1 AND return_time IS NULL
            ORDER BY rent_time DESC
            LIMIT 1
            FOR UPDATE
            "#,
        )
        .bind(umbrella_id)
        .fetch_optional(&mut **tx)
        .await?;

        Ok(record)
    }

    /// Close an open rental at the return station
    pub async fn close(
        &self,
        tx: &mut Transaction<'_, Postgres>,
        rent_id: i64,
        station_id: i32,
        return_time: DateTime<Utc>,
    ) -> AppResult<()> {
        let result = sqlx::query(
            r#"
            UPDATE rental_records
            SET return_time = $1, station_id = $2
            WHERE rent_id = $3 AND return_time IS NULL
            "#,
        )
        .bind(return_time)
        .bind(station_id)
        .bind(rent_id)
        .execute(&mut **tx)
        .await?;

        if result.rows_affected() == 0 {
            return Err(AppError::Internal(format!(
                "Rental {} was not open when closing it",
                rent_id
            )));
        }
        Ok(())
    }
}
