//! Rent and return endpoints

use axum::{
    extract::{rejection::JsonRejection, State},
    Json,
};
use serde::Serialize;
use utoipa::ToSchema;

use crate::{
    error::AppResult,
    models::rental::{RentalRecord, RentalRequest},
    AppState,
};

use super::AuthenticatedUser;

/// Rent response
#[derive(Debug, Serialize, ToSchema)]
pub struct RentResponse {
    pub message: String,
    /// Identifier of the opened rental record
    pub rent_id: i64,
}

/// Return response
#[derive(Debug, Serialize, ToSchema)]
pub struct ReturnResponse {
    pub message: String,
    /// True when the umbrella was restored without an open rental record
    pub reconciled: bool,
}

/// Rent an umbrella docked at a station
#[utoipa::path(
    post,
    path = "/rental/rent",
    tag = "rentals",
    security(("bearer_auth" = [])),
    request_body = RentalRequest,
    responses(
        (status = 200, description = "Umbrella rented", body = RentResponse),
        (status = 400, description = "Invalid request or umbrella not available", body = crate::error::ErrorResponse),
        (status = 401, description = "Not authenticated"),
        (status = 404, description = "Umbrella or station not found"),
        (status = 503, description = "Storage busy, retry later")
    )
)]
pub async fn rent(
    State(state): State<AppState>,
    AuthenticatedUser(claims): AuthenticatedUser,
    payload: Result<Json<RentalRequest>, JsonRejection>,
) -> AppResult<Json<RentResponse>> {
    let Json(request) = payload?;
    let command = request.into_command()?;

    let receipt = state
        .services
        .rentals
        .rent(claims.user_id(), &command)
        .await?;

    Ok(Json(RentResponse {
        message: "Umbrella rented successfully".to_string(),
        rent_id: receipt.rent_id,
    }))
}

/// Return an umbrella to any station
#[utoipa::path(
    post,
    path = "/rental/return",
    tag = "rentals",
    security(("bearer_auth" = [])),
    request_body = RentalRequest,
    responses(
        (status = 200, description = "Umbrella returned", body = ReturnResponse),
        (status = 400, description = "Invalid request or already returned", body = crate::error::ErrorResponse),
        (status = 401, description = "Not authenticated"),
        (status = 404, description = "Umbrella or station not found"),
        (status = 503, description = "Storage busy, retry later")
    )
)]
pub async fn return_umbrella(
    State(state): State<AppState>,
    AuthenticatedUser(claims): AuthenticatedUser,
    payload: Result<Json<RentalRequest>, JsonRejection>,
) -> AppResult<Json<ReturnResponse>> {
    let Json(request) = payload?;
    let command = request.into_command()?;

    let receipt = state
        .services
        .rentals
        .return_umbrella(claims.user_id(), &command)
        .await?;

    Ok(Json(ReturnResponse {
        message: "Umbrella returned successfully".to_string(),
        reconciled: receipt.reconciled,
    }))
}

/// Rental records of the current user, most recent first
#[utoipa::path(
    get,
    path = "/rental/history",
    tag = "rentals",
    security(("bearer_auth" = [])),
    responses(
        (status = 200, description = "Rental history", body = Vec<RentalRecord>),
        (status = 401, description = "Not authenticated")
    )
)]
pub async fn history(
    State(state): State<AppState>,
    AuthenticatedUser(claims): AuthenticatedUser,
) -> AppResult<Json<Vec<RentalRecord>>> {
    let records = state.services.rentals.history(claims.user_id()).await?;
    Ok(Json(records))
}
