//! Umbrella rows: fleet reads and the custody updates used by rentals

use sqlx::{Pool, Postgres, Transaction};

use crate::{
    error::{AppError, AppResult},
    models::umbrella::{Umbrella, UmbrellaStatus, UmbrellaSummary},
};

#[derive(Clone)]
pub struct UmbrellasRepository {
    pool: Pool<Postgres>,
}

impl UmbrellasRepository {
    pub fn new(pool: Pool<Postgres>) -> Self {
        Self { pool }
    }

    /// Umbrellas docked and available at a station
    pub async fn list_available_at(&self, station_id: i32) -> AppResult<Vec<UmbrellaSummary>> {
        let umbrellas = sqlx::query_as::<_, UmbrellaSummary>(
            r#"
            SELECT umbrella_id, status
            FROM umbrellas
            WHERE station_id = $1 AND status = $2
            ORDER BY umbrella_id
            "#,
        )
        .bind(station_id)
        .bind(UmbrellaStatus::Available)
        .fetch_all(&self.pool)
        .await?;

        Ok(umbrellas)
    }

    /// Read an umbrella and hold its row lock until the transaction ends
    pub async fn lock(
        &self,
        tx: &mut Transaction<'_, Postgres>,
        umbrella_id: &str,
    ) -> AppResult<Option<Umbrella>> {
        let umbrella = sqlx::query_as::<_, Umbrella>(
            r#"
            SELECT umbrella_id, status, station_id, last_user_id
            FROM umbrellas
            WHERE umbrella_id = $1
            FOR UPDATE
            "#,
        )
        .bind(umbrella_id)
        .fetch_optional(&mut **tx)
        .await?;

        Ok(umbrella)
    }

    pub async fn mark_rented(
        &self,
        tx: &mut Transaction<'_, Postgres>,
        umbrella_id: &str,
        user_id: &str,
    ) -> AppResult<()> {
        let result = sqlx::query(
            "UPDATE umbrellas SET status = $1, station_id = NULL, last_user_id = $2 WHERE umbrella_id = $3",
        )
        .bind(UmbrellaStatus::Rented)
        .bind(user_id)
        .bind(umbrella_id)
        .execute(&mut **tx)
        .await?;

        if result.rows_affected() == 0 {
            return Err(AppError::NotFound(format!("Umbrella {} not found", umbrella_id)));
        }
        Ok(())
    }

    pub async fn mark_available(
        &self,
        tx: &mut Transaction<'_, Postgres>,
        umbrella_id: &str,
        station_id: i32,
    ) -> AppResult<()> {
        let result = sqlx::query(
            "UPDATE umbrellas SET status = $1, station_id = $2 WHERE umbrella_id = $3",
        )
        .bind(UmbrellaStatus::Available)
        .bind(station_id)
        .bind(umbrella_id)
        .execute(&mut **tx)
        .await?;

        if result.rows_affected() == 0 {
            return Err(AppError::NotFound(format!("Umbrella {} not found", umbrella_id)));
        }
        Ok(())
    }
}
