//! Station directory endpoints

use axum::{
    extract::{Path, Query, State},
    Json,
};

use crate::{
    error::AppResult,
    models::{
        station::{NearbyQuery, NearbyStation, Station, StationQuery},
        umbrella::UmbrellaSummary,
    },
    AppState,
};

use super::AuthenticatedUser;

/// List stations, optionally by region
#[utoipa::path(
    get,
    path = "/stations",
    tag = "stations",
    params(StationQuery),
    responses(
        (status = 200, description = "Stations ordered by id", body = Vec<Station>)
    )
)]
pub async fn list_stations(
    State(state): State<AppState>,
    Query(query): Query<StationQuery>,
) -> AppResult<Json<Vec<Station>>> {
    let stations = state
        .services
        .stations
        .list(query.region.as_deref())
        .await?;
    Ok(Json(stations))
}

/// Stations within a radius of a position, nearest first
#[utoipa::path(
    get,
    path = "/stations/nearby",
    tag = "stations",
    params(NearbyQuery),
    responses(
        (status = 200, description = "Nearby stations with distances", body = Vec<NearbyStation>),
        (status = 400, description = "Invalid coordinates or radius", body = crate::error::ErrorResponse)
    )
)]
pub async fn nearby_stations(
    State(state): State<AppState>,
    Query(query): Query<NearbyQuery>,
) -> AppResult<Json<Vec<NearbyStation>>> {
    let stations = state.services.stations.nearby(&query).await?;
    Ok(Json(stations))
}

/// Available umbrellas docked at a station
#[utoipa::path(
    get,
    path = "/stations/{id}/umbrellas",
    tag = "stations",
    security(("bearer_auth" = [])),
    params(
        ("id" = i32, Path, description = "Station ID")
    ),
    responses(
        (status = 200, description = "Available umbrellas", body = Vec<UmbrellaSummary>),
        (status = 401, description = "Not authenticated"),
        (status = 404, description = "Station not found")
    )
)]
pub async fn list_umbrellas(
    State(state): State<AppState>,
    AuthenticatedUser(_claims): AuthenticatedUser,
    Path(station_id): Path<i32>,
) -> AppResult<Json<Vec<UmbrellaSummary>>> {
    let umbrellas = state.services.rentals.available_at(station_id).await?;
    Ok(Json(umbrellas))
}
