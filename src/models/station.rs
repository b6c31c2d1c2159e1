//! Station model and directory queries

use serde::{Deserialize, Serialize};
use sqlx::FromRow;
use utoipa::{IntoParams, ToSchema};

use crate::proximity::{Coordinate, Located};

/// Rental station from database
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize, FromRow, ToSchema)]
pub struct Station {
    pub station_id: i32,
    pub name: String,
    pub lat: f64,
    pub lng: f64,
    pub region: Option<String>,
}

impl Located for Station {
    fn location_id(&self) -> i32 {
        self.station_id
    }

    fn coordinate(&self) -> Coordinate {
        Coordinate::new(self.lat, self.lng)
    }
}

/// Station directory query parameters
#[derive(Debug, Default, Deserialize, IntoParams, ToSchema)]
#[into_params(parameter_in = Query)]
pub struct StationQuery {
    /// Exact region label to filter on
    pub region: Option<String>,
}

/// Nearby search query parameters
#[derive(Debug, Deserialize, IntoParams, ToSchema)]
#[into_params(parameter_in = Query)]
pub struct NearbyQuery {
    pub lat: f64,
    pub lng: f64,
    /// Search radius in kilometres (server default when omitted)
    pub radius_km: Option<f64>,
}

/// Station with its distance from the caller
#[derive(Debug, Clone, Serialize, Deserialize, ToSchema)]
pub struct NearbyStation {
    #[serde(flatten)]
    pub station: Station,
    pub distance_km: f64,
}
