//! Favorite stations repository

use sqlx::{Pool, Postgres};

use crate::{
    error::{AppError, AppResult},
    models::favorite::Favorite,
};

#[derive(Clone)]
pub struct FavoritesRepository {
    pool: Pool<Postgres>,
}

impl FavoritesRepository {
    pub fn new(pool: Pool<Postgres>) -> Self {
        Self { pool }
    }

    /// Bookmark a station; `Conflict` when it is already bookmarked
    pub async fn add(&self, user_id: &str, station_id: i32) -> AppResult<()> {
        let result = sqlx::query(
            r#"
            INSERT INTO bookmarks (user_id, station_id)
            VALUES ($1, $2)
            ON CONFLICT (user_id, station_id) DO NOTHING
            "#,
        )
        .bind(user_id)
        .bind(station_id)
        .execute(&self.pool)
        .await?;

        if result.rows_affected() == 0 {
            return Err(AppError::Conflict(
                "Station is already in favorites".to_string(),
            ));
        }
        Ok(())
    }

    pub async fn list(&self, user_id: &str) -> AppResult<Vec<Favorite>> {
        let favorites = sqlx::query_as::<_, Favorite>(
            r#"
            SELECT b.station_id,
                   s.name AS station_name,
                   s.lat AS latitude,
                   s.lng AS longitude
            FROM bookmarks b
            JOIN stations s ON b.station_id = s.station_id
            WHERE b.user_id = $1
            ORDER BY b.created_at
            "#,
        )
        .bind(user_id)
        .fetch_all(&self.pool)
        .await?;

        Ok(favorites)
    }

    /// Remove a bookmark; `NotFound` when there was none
    pub async fn remove(&self, user_id: &str, station_id: i32) -> AppResult<()> {
        let result = sqlx::query("DELETE FROM bookmarks WHERE user_id = $1 AND station_id = $2")
            .bind(user_id)
            .bind(station_id)
            .execute(&self.pool)
            .await?;

        if result.rows_affected() == 0 {
            return Err(AppError::NotFound("Favorite not found".to_string()));
        }
        Ok(())
    }
}
