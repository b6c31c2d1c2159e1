//! Proximity search: ranks stations by great-circle distance from a position.
//!
//! Everything here is pure and deterministic, so it can be re-run on every
//! location update, either in the server or in a client.

use serde::{Deserialize, Serialize};
use utoipa::ToSchema;

/// Mean Earth radius used by the haversine formula
pub const EARTH_RADIUS_KM: f64 = 6371.0;

/// A WGS84 position in decimal degrees
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize, ToSchema)]
pub struct Coordinate {
    pub latitude: f64,
    pub longitude: f64,
}

impl Coordinate {
    pub fn new(latitude: f64, longitude: f64) -> Self {
        Self { latitude, longitude }
    }

    /// Finite and within [-90, 90] x [-180, 180]
    pub fn is_valid(&self) -> bool {
        self.latitude.is_finite()
            && self.longitude.is_finite()
            && (-90.0..=90.0).contains(&self.latitude)
            && (-180.0..=180.0).contains(&self.longitude)
    }
}

/// Anything with a stable identifier and a position on the map
pub trait Located {
    fn location_id(&self) -> i32;
    fn coordinate(&self) -> Coordinate;
}

/// Great-circle distance between two coordinates, in kilometres
pub fn haversine_km(from: Coordinate, to: Coordinate) -> f64 {
    let d_lat = (to.latitude - from.latitude).to_radians();
    let d_lon = (to.longitude - from.longitude).to_radians();

    let a = (d_lat / 2.0).sin().powi(2)
        + from.latitude.to_radians().cos()
            * to.latitude.to_radians().cos()
            * (d_lon / 2.0).sin().powi(2);
    // Rounding can push `a` just past 1 for near-antipodal points
    let a = a.clamp(0.0, 1.0);

    2.0 * EARTH_RADIUS_KM * a.sqrt().atan2((1.0 - a).sqrt())
}

/// Stations within `radius_km` of `origin`, nearest first.
///
/// Ties on distance are broken by identifier. An empty input or a radius that
/// nothing falls into yields an empty vector.
pub fn find_nearby<T: Located>(origin: Coordinate, stations: &[T], radius_km: f64) -> Vec<(&T, f64)> {
    let mut nearby: Vec<(&T, f64)> = stations
        .iter()
        .map(|station| (station, haversine_km(origin, station.coordinate())))
        .filter(|(_, distance)| *distance <= radius_km)
        .collect();

    nearby.sort_by(|(a, da), (b, db)| {
        da.total_cmp(db)
            .then_with(|| a.location_id().cmp(&b.location_id()))
    });

    nearby
}

/// Whether the "nearby" toggle is on
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum ProximityMode {
    #[default]
    Inactive,
    Active,
}

/// Side effect requested by a mode transition
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ProximityEffect {
    None,
    RefreshLocation,
}

/// Proximity toggle together with the free-text regional query.
///
/// A non-blank text query always wins: issuing one switches the toggle off,
/// and while it is present no proximity filtering happens.
#[derive(Debug, Clone, Default)]
pub struct NearbySearch {
    mode: ProximityMode,
    query: String,
}

impl NearbySearch {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn mode(&self) -> ProximityMode {
        self.mode
    }

    pub fn query(&self) -> &str {
        &self.query
    }

    /// User pressed the "nearby" control
    pub fn toggle(&mut self) -> ProximityEffect {
        match self.mode {
            ProximityMode::Inactive => {
                self.mode = ProximityMode::Active;
                ProximityEffect::RefreshLocation
            }
            ProximityMode::Active => {
                self.mode = ProximityMode::Inactive;
                ProximityEffect::None
            }
        }
    }

    /// User issued a regional text search
    pub fn search_text(&mut self, query: &str) {
        self.query = query.trim().to_string();
        if !self.query.is_empty() {
            self.mode = ProximityMode::Inactive;
        }
    }

    pub fn clear_text(&mut self) {
        self.query.clear();
    }

    pub fn is_filtering(&self) -> bool {
        self.mode == ProximityMode::Active && self.query.is_empty()
    }

    /// Nearby stations when filtering is on and a position is known, `None` otherwise
    pub fn apply<'a, T: Located>(
        &self,
        position: Option<Coordinate>,
        stations: &'a [T],
        radius_km: f64,
    ) -> Option<Vec<(&'a T, f64)>> {
        if !self.is_filtering() {
            return None;
        }
        position.map(|origin| find_nearby(origin, stations, radius_km))
    }
}
