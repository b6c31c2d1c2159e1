//! Favorite stations of a user

use crate::{
    error::{AppError, AppResult},
    models::favorite::Favorite,
    repository::Repository,
};

#[derive(Clone)]
pub struct FavoritesService {
    repository: Repository,
}

impl FavoritesService {
    pub fn new(repository: Repository) -> Self {
        Self { repository }
    }

    pub async fn add(&self, user_id: &str, station_id: Option<i32>) -> AppResult<()> {
        let station_id =
            station_id.ok_or_else(|| AppError::Validation("station_id is required".to_string()))?;

        if !self.repository.stations.exists(station_id).await? {
            return Err(AppError::NotFound(format!("Station {} not found", station_id)));
        }

        self.repository.favorites.add(user_id, station_id).await
    }

    pub async fn list(&self, user_id: &str) -> AppResult<Vec<Favorite>> {
        self.repository.favorites.list(user_id).await
    }

    pub async fn remove(&self, user_id: &str, station_id: Option<&str>) -> AppResult<()> {
        let station_id = parse_station_id(station_id)?;
        self.repository.favorites.remove(user_id, station_id).await
    }
}

/// Station id from a query string value
fn parse_station_id(raw: Option<&str>) -> AppResult<i32> {
    let raw = raw
        .map(str::trim)
        .filter(|s| !s.is_empty())
        .ok_or_else(|| AppError::Validation("station_id is required".to_string()))?;

    raw.parse()
        .map_err(|_| AppError::Validation(format!("Invalid station_id: {}", raw)))
}
