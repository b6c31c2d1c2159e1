//! Business logic services

pub mod favorites;
pub mod rentals;
pub mod stations;
pub mod users;

use std::sync::Arc;

use crate::{
    config::{AuthConfig, ProximityConfig},
    repository::{store::FleetStore, Repository},
};

/// Container for all services
#[derive(Clone)]
pub struct Services {
    pub repository: Repository,
    pub rentals: rentals::RentalService,
    pub stations: stations::StationsService,
    pub users: users::UsersService,
    pub favorites: favorites::FavoritesService,
}

impl Services {
    /// Wire every service to the directory repository and the fleet store
    pub fn new(
        repository: Repository,
        store: Arc<dyn FleetStore>,
        auth_config: AuthConfig,
        proximity_config: ProximityConfig,
    ) -> Self {
        Self {
            rentals: rentals::RentalService::new(store.clone()),
            stations: stations::StationsService::new(repository.clone(), proximity_config),
            users: users::UsersService::new(repository.clone(), store, auth_config),
            favorites: favorites::FavoritesService::new(repository.clone()),
            repository,
        }
    }
}
