//! OpenAPI documentation

use axum::Router;
use utoipa::OpenApi;
use utoipa_swagger_ui::SwaggerUi;

use crate::api::{auth, favorites, health, rentals, stations, users, MessageResponse};

#[derive(OpenApi)]
#[openapi(
    info(
        title = "Umbrella API",
        version = "1.0.0",
        description = "Umbrella sharing REST API: stations, rentals and returns"
    ),
    servers(
        (url = "/api", description = "API")
    ),
    paths(
        // Health
        health::health_check,
        health::readiness_check,
        // Auth
        auth::signup,
        auth::login,
        // Profile
        users::get_profile,
        // Stations
        stations::list_stations,
        stations::nearby_stations,
        stations::list_umbrellas,
        // Favorites
        favorites::list_favorites,
        favorites::add_favorite,
        favorites::remove_favorite,
        // Rentals
        rentals::rent,
        rentals::return_umbrella,
        rentals::history,
    ),
    components(
        schemas(
            // Auth
            auth::TokenResponse,
            crate::models::user::SignupRequest,
            crate::models::user::LoginRequest,
            crate::models::user::UserProfile,
            // Stations
            crate::models::station::Station,
            crate::models::station::NearbyStation,
            crate::models::umbrella::UmbrellaStatus,
            crate::models::umbrella::UmbrellaSummary,
            // Favorites
            crate::models::favorite::Favorite,
            crate::models::favorite::AddFavoriteRequest,
            // Rentals
            crate::models::rental::RentalRequest,
            crate::models::rental::RentalRecord,
            rentals::RentResponse,
            rentals::ReturnResponse,
            // Health
            health::HealthResponse,
            // Common
            MessageResponse,
            crate::error::ErrorResponse,
        )
    ),
    tags(
        (name = "health", description = "Health check endpoints"),
        (name = "auth", description = "Sign-up and login"),
        (name = "users", description = "User profile"),
        (name = "stations", description = "Station directory and proximity search"),
        (name = "favorites", description = "Favorite stations"),
        (name = "rentals", description = "Umbrella rent and return")
    )
)]
pub struct ApiDoc;

/// Create the OpenAPI documentation router
pub fn create_openapi_router() -> Router {
    Router::new()
        .merge(SwaggerUi::new("/swagger-ui").url("/api-docs/openapi.json", ApiDoc::openapi()))
}
