//! Station directory reads and server-side proximity search

use crate::{
    config::ProximityConfig,
    error::{AppError, AppResult},
    models::station::{NearbyQuery, NearbyStation, Station},
    proximity::{find_nearby, Coordinate},
    repository::Repository,
};

#[derive(Clone)]
pub struct StationsService {
    repository: Repository,
    config: ProximityConfig,
}

impl StationsService {
    pub fn new(repository: Repository, config: ProximityConfig) -> Self {
        Self { repository, config }
    }

    pub async fn list(&self, region: Option<&str>) -> AppResult<Vec<Station>> {
        let region = region.map(str::trim).filter(|r| !r.is_empty());
        self.repository.stations.list(region).await
    }

    /// Stations around a position, nearest first
    pub async fn nearby(&self, query: &NearbyQuery) -> AppResult<Vec<NearbyStation>> {
        let (origin, radius_km) = search_area(query, self.config.default_radius_km)?;
        let stations = self.repository.stations.list(None).await?;
        Ok(rank(origin, &stations, radius_km))
    }
}

/// Validated origin and radius of a nearby query
fn search_area(query: &NearbyQuery, default_radius_km: f64) -> AppResult<(Coordinate, f64)> {
    let origin = Coordinate::new(query.lat, query.lng);
    if !origin.is_valid() {
        return Err(AppError::Validation(
            "lat must be within [-90, 90] and lng within [-180, 180]".to_string(),
        ));
    }

    let radius_km = query.radius_km.unwrap_or(default_radius_km);
    if !radius_km.is_finite() || radius_km < 0.0 {
        return Err(AppError::Validation(
            "radius_km must be a non-negative number".to_string(),
        ));
    }

    Ok((origin, radius_km))
}

fn rank(origin: Coordinate, stations: &[Station], radius_km: f64) -> Vec<NearbyStation> {
    find_nearby(origin, stations, radius_km)
        .into_iter()
        .map(|(station, distance_km)| NearbyStation {
            station: station.clone(),
            distance_km,
        })
        .collect()
}

#[cfg(test)]
mod tests {
    use super::*;

    fn query(lat: f64, lng: f64, radius_km: Option<f64>) -> NearbyQuery {
        NearbyQuery { lat, lng, radius_km }
    }

    fn station(station_id: i32, lat: f64, lng: f64) -> Station {
        Station {
            station_id,
            name: format!("Station {}", station_id),
            lat,
            lng,
            region: Some("Incheon".to_string()),
        }
    }

    #[test]
    fn missing_radius_uses_default() {
        let (_, radius) = search_area(&query(37.0, 126.0, None), 2.0).unwrap();
        assert_eq!(radius, 2.0);
    }

    #[test]
    fn out_of_range_coordinates_are_rejected() {
        assert!(matches!(
            search_area(&query(91.0, 0.0, None), 2.0),
            Err(AppError::Validation(_))
        ));
        assert!(matches!(
            search_area(&query(0.0, -181.0, None), 2.0),
            Err(AppError::Validation(_))
        ));
    }

    #[test]
    fn negative_or_nan_radius_is_rejected() {
        assert!(search_area(&query(0.0, 0.0, Some(-1.0)), 2.0).is_err());
        assert!(search_area(&query(0.0, 0.0, Some(f64::NAN)), 2.0).is_err());
        assert!(search_area(&query(0.0, 0.0, Some(0.0)), 2.0).is_ok());
    }

    #[test]
    fn ranks_directory_entries() {
        let stations = vec![station(2, 37.5000, 127.0000), station(1, 37.4480, 126.6575)];
        let nearby = rank(Coordinate::new(37.4481, 126.6570), &stations, 2.0);

        assert_eq!(nearby.len(), 1);
        assert_eq!(nearby[0].station.station_id, 1);

        let json = serde_json::to_value(&nearby[0]).unwrap();
        assert_eq!(json["station_id"], 1);
        assert!(json["distance_km"].as_f64().unwrap() < 0.1);
    }
}
