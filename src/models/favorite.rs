//! Favorite (bookmarked) stations

use serde::{Deserialize, Serialize};
use sqlx::FromRow;
use utoipa::{IntoParams, ToSchema};

/// Bookmarked station joined with its directory entry
#[derive(Debug, Clone, Serialize, Deserialize, FromRow, ToSchema)]
pub struct Favorite {
    pub station_id: i32,
    pub station_name: String,
    pub latitude: f64,
    pub longitude: f64,
}

/// Add favorite request
#[derive(Debug, Deserialize, ToSchema)]
pub struct AddFavoriteRequest {
    pub station_id: Option<i32>,
}

/// Remove favorite query
#[derive(Debug, Deserialize, IntoParams, ToSchema)]
#[into_params(parameter_in = Query)]
pub struct RemoveFavoriteQuery {
    pub station_id: Option<String>,
}
