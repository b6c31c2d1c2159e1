//! Profile endpoint

use axum::{extract::State, Json};

use crate::{error::AppResult, models::user::UserProfile, AppState};

use super::AuthenticatedUser;

/// Current user profile and the umbrella they hold
#[utoipa::path(
    get,
    path = "/user",
    tag = "users",
    security(("bearer_auth" = [])),
    responses(
        (status = 200, description = "User profile", body = UserProfile),
        (status = 401, description = "Not authenticated"),
        (status = 404, description = "User not found")
    )
)]
pub async fn get_profile(
    State(state): State<AppState>,
    AuthenticatedUser(claims): AuthenticatedUser,
) -> AppResult<Json<UserProfile>> {
    let profile = state.services.users.profile(claims.user_id()).await?;
    Ok(Json(profile))
}
