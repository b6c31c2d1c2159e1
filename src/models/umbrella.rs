//! Umbrella model and custody status

use serde::{Deserialize, Serialize};
use sqlx::{Decode, Encode, FromRow, Postgres};
use utoipa::ToSchema;

/// Custody state of an umbrella
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize, ToSchema)]
#[serde(rename_all = "SCREAMING_SNAKE_CASE")]
pub enum UmbrellaStatus {
    /// Docked at a station
    Available,
    /// With a user
    Rented,
}

impl UmbrellaStatus {
    pub fn as_str(&self) -> &'static str {
        match self {
            UmbrellaStatus::Available => "AVAILABLE",
            UmbrellaStatus::Rented => "RENTED",
        }
    }
}

impl std::fmt::Display for UmbrellaStatus {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "{}", self.as_str())
    }
}

impl std::str::FromStr for UmbrellaStatus {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.to_uppercase().as_str() {
            "AVAILABLE" => Ok(UmbrellaStatus::Available),
            "RENTED" => Ok(UmbrellaStatus::Rented),
            _ => Err(format!("Invalid umbrella status: {}", s)),
        }
    }
}

// SQLx conversion for UmbrellaStatus (stored as text)
impl sqlx::Type<Postgres> for UmbrellaStatus {
    fn type_info() -> sqlx::postgres::PgTypeInfo {
        <String as sqlx::Type<Postgres>>::type_info()
    }

    fn compatible(ty: &sqlx::postgres::PgTypeInfo) -> bool {
        <String as sqlx::Type<Postgres>>::compatible(ty)
    }
}

impl<'r> Decode<'r, Postgres> for UmbrellaStatus {
    fn decode(value: sqlx::postgres::PgValueRef<'r>) -> Result<Self, sqlx::error::BoxDynError> {
        let s: String = Decode::<Postgres>::decode(value)?;
        s.parse().map_err(|e: String| e.into())
    }
}

impl Encode<'_, Postgres> for UmbrellaStatus {
    fn encode_by_ref(&self, buf: &mut sqlx::postgres::PgArgumentBuffer) -> sqlx::encode::IsNull {
        <&str as Encode<Postgres>>::encode(self.as_str(), buf)
    }
}

/// Umbrella row
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize, FromRow, ToSchema)]
pub struct Umbrella {
    pub umbrella_id: String,
    pub status: UmbrellaStatus,
    /// Set exactly when the umbrella is available
    pub station_id: Option<i32>,
    pub last_user_id: Option<String>,
}

impl Umbrella {
    /// A docked umbrella at `station_id`
    pub fn docked(umbrella_id: impl Into<String>, station_id: i32) -> Self {
        Self {
            umbrella_id: umbrella_id.into(),
            status: UmbrellaStatus::Available,
            station_id: Some(station_id),
            last_user_id: None,
        }
    }

    /// An umbrella out with `user_id`
    pub fn rented(umbrella_id: impl Into<String>, user_id: impl Into<String>) -> Self {
        Self {
            umbrella_id: umbrella_id.into(),
            status: UmbrellaStatus::Rented,
            station_id: None,
            last_user_id: Some(user_id.into()),
        }
    }

    /// Status and station reference agree
    pub fn is_consistent(&self) -> bool {
        (self.status == UmbrellaStatus::Available) == self.station_id.is_some()
    }

    pub fn is_docked_at(&self, station_id: i32) -> bool {
        self.status == UmbrellaStatus::Available && self.station_id == Some(station_id)
    }
}

/// Umbrella entry in a station listing
#[derive(Debug, Clone, Serialize, Deserialize, FromRow, ToSchema)]
pub struct UmbrellaSummary {
    pub umbrella_id: String,
    pub status: UmbrellaStatus,
}

impl From<Umbrella> for UmbrellaSummary {
    fn from(umbrella: Umbrella) -> Self {
        Self {
            umbrella_id: umbrella.umbrella_id,
            status: umbrella.status,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn status_round_trips_through_text() {
        assert_eq!("available".parse::<UmbrellaStatus>(), Ok(UmbrellaStatus::Available));
        assert_eq!(UmbrellaStatus::Rented.to_string(), "RENTED");
        assert!("broken".parse::<UmbrellaStatus>().is_err());
    }

    #[test]
    fn status_serializes_upper_case() {
        let json = serde_json::to_string(&UmbrellaStatus::Available).unwrap();
        assert_eq!(json, "\"AVAILABLE\"");
    }

    #[test]
    fn custody_consistency() {
        assert!(Umbrella::docked("U1", 1).is_consistent());
        assert!(Umbrella::rented("U1", "a@b.c").is_consistent());

        let mut broken = Umbrella::docked("U1", 1);
        broken.status = UmbrellaStatus::Rented;
        assert!(!broken.is_consistent());
    }

    #[test]
    fn docked_at_checks_station() {
        let umbrella = Umbrella::docked("U1", 3);
        assert!(umbrella.is_docked_at(3));
        assert!(!umbrella.is_docked_at(4));
        assert!(!Umbrella::rented("U1", "x").is_docked_at(3));
    }
}
