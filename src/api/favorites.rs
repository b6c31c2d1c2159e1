//! Favorite station endpoints

use axum::{
    extract::{rejection::JsonRejection, Query, State},
    Json,
};

use crate::{
    error::AppResult,
    models::favorite::{AddFavoriteRequest, Favorite, RemoveFavoriteQuery},
    AppState,
};

use super::{AuthenticatedUser, MessageResponse};

/// List favorite stations
#[utoipa::path(
    get,
    path = "/favorites",
    tag = "favorites",
    security(("bearer_auth" = [])),
    responses(
        (status = 200, description = "Favorite stations", body = Vec<Favorite>),
        (status = 401, description = "Not authenticated")
    )
)]
pub async fn list_favorites(
    State(state): State<AppState>,
    AuthenticatedUser(claims): AuthenticatedUser,
) -> AppResult<Json<Vec<Favorite>>> {
    let favorites = state.services.favorites.list(claims.user_id()).await?;
    Ok(Json(favorites))
}

/// Bookmark a station
#[utoipa::path(
    post,
    path = "/favorites",
    tag = "favorites",
    security(("bearer_auth" = [])),
    request_body = AddFavoriteRequest,
    responses(
        (status = 200, description = "Favorite added", body = MessageResponse),
        (status = 400, description = "Missing station_id"),
        (status = 404, description = "Station not found"),
        (status = 409, description = "Already a favorite")
    )
)]
pub async fn add_favorite(
    State(state): State<AppState>,
    AuthenticatedUser(claims): AuthenticatedUser,
    payload: Result<Json<AddFavoriteRequest>, JsonRejection>,
) -> AppResult<Json<MessageResponse>> {
    let Json(request) = payload?;
    state
        .services
        .favorites
        .add(claims.user_id(), request.station_id)
        .await?;

    Ok(Json(MessageResponse::new("Favorite added")))
}

/// Remove a bookmarked station
#[utoipa::path(
    delete,
    path = "/favorites",
    tag = "favorites",
    security(("bearer_auth" = [])),
    params(RemoveFavoriteQuery),
    responses(
        (status = 200, description = "Favorite removed", body = MessageResponse),
        (status = 400, description = "Missing or invalid station_id"),
        (status = 404, description = "Favorite not found")
    )
)]
pub async fn remove_favorite(
    State(state): State<AppState>,
    AuthenticatedUser(claims): AuthenticatedUser,
    Query(query): Query<RemoveFavoriteQuery>,
) -> AppResult<Json<MessageResponse>> {
    state
        .services
        .favorites
        .remove(claims.user_id(), query.station_id.as_deref())
        .await?;

    Ok(Json(MessageResponse::new("Favorite removed")))
}
