//! Data models for the umbrella service

pub mod favorite;
pub mod rental;
pub mod station;
pub mod umbrella;
pub mod user;

// Re-export commonly used types
pub use favorite::Favorite;
pub use rental::{RentalCommand, RentalRecord, RentalRequest};
pub use station::Station;
pub use umbrella::{Umbrella, UmbrellaStatus};
pub use user::{User, UserClaims};
