//! Rental ledger model and rent/return requests

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use sqlx::FromRow;
use utoipa::ToSchema;
use validator::Validate;

use crate::error::{AppError, AppResult};

/// Rental ledger row
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize, FromRow, ToSchema)]
pub struct RentalRecord {
    pub rent_id: i64,
    pub user_id: String,
    /// Where the rental began, or where it ended once returned
    pub station_id: i32,
    pub umbrella_id: String,
    pub rent_time: DateTime<Utc>,
    /// `None` while the rental is open
    pub return_time: Option<DateTime<Utc>>,
}

impl RentalRecord {
    pub fn is_open(&self) -> bool {
        self.return_time.is_none()
    }
}

/// Ledger entry to insert when a rental starts
#[derive(Debug, Clone)]
pub struct NewRental {
    pub user_id: String,
    pub station_id: i32,
    pub umbrella_id: String,
    pub rent_time: DateTime<Utc>,
}

/// Rent or return request body
#[derive(Debug, Clone, Deserialize, Validate, ToSchema)]
pub struct RentalRequest {
    #[validate(required(message = "station_id is required"), range(min = 1, message = "station_id must be positive"))]
    pub station_id: Option<i32>,
    #[validate(
        required(message = "umbrella_id is required"),
        length(min = 1, max = 64, message = "umbrella_id must be 1-64 characters")
    )]
    pub umbrella_id: Option<String>,
}

/// Validated rent or return target
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct RentalCommand {
    pub station_id: i32,
    pub umbrella_id: String,
}

impl RentalRequest {
    /// Check required fields before any transaction is opened
    pub fn into_command(self) -> AppResult<RentalCommand> {
        self.validate()?;

        let station_id = self
            .station_id
            .ok_or_else(|| AppError::Validation("station_id is required".to_string()))?;
        let umbrella_id = self
            .umbrella_id
            .map(|id| id.trim().to_string())
            .filter(|id| !id.is_empty())
            .ok_or_else(|| AppError::Validation("umbrella_id is required".to_string()))?;

        Ok(RentalCommand {
            station_id,
            umbrella_id,
        })
    }
}

/// Outcome of a successful rent
#[derive(Debug, Clone, PartialEq)]
pub struct RentReceipt {
    pub rent_id: i64,
    pub rent_time: DateTime<Utc>,
}

/// Outcome of a successful return
#[derive(Debug, Clone, PartialEq)]
pub struct ReturnReceipt {
    /// Closed ledger entry, absent when the ledger had no open record
    pub rent_id: Option<i64>,
    pub return_time: DateTime<Utc>,
    /// True when custody was restored without an open ledger record
    pub reconciled: bool,
}
