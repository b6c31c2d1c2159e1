//! Umbrella sharing server
//!
//! Stations, umbrellas and a rental ledger behind a REST JSON API. Rent and
//! return are atomic custody transitions serialized per umbrella.

use std::sync::Arc;

pub mod api;
pub mod config;
pub mod error;
pub mod models;
pub mod proximity;
pub mod repository;
pub mod services;

pub use config::AppConfig;
pub use error::{AppError, AppResult};

/// Application state shared across all handlers
#[derive(Clone)]
pub struct AppState {
    pub config: Arc<AppConfig>,
    pub services: Arc<services::Services>,
}
