use std::fmt;

use chrono::{DateTime, NaiveDate, Utc};
use rust_decimal::Decimal;
use serde::{Deserialize, Serialize};

#[derive(Clone, Debug, PartialEq, Eq, Hash, Deserialize, Serialize)]
#[serde(from = "String", into = "String")]
pub enum TripType {
    Airport,
    Families,
    Passengers,
    Drive,
    /// Anything outside the known categories is kept verbatim.
    Other(String),
}

impl TripType {
    pub const KNOWN: [TripType; 4] = [
        TripType::Airport,
        TripType::Families,
        TripType::Passengers,
        TripType::Drive,
    ];

    pub fn as_str(&self) -> &str {
        match self {
            TripType::Airport => "Airport",
            TripType::Families => "Families",
            TripType::Passengers => "Passengers",
            TripType::Drive => "Drive",
            TripType::Other(other) => other,
        }
    }

    pub fn is_empty(&self) -> bool {
        self.as_str().trim().is_empty()
    }
}

impl From<String> for TripType {
    fn from(value: String) -> Self {
        match value.as_str() {
            "Airport" => TripType::Airport,
            "Families" => TripType::Families,
            "Passengers" => TripType::Passengers,
            "Drive" => TripType::Drive,
            _ => TripType::Other(value),
        }
    }
}

impl From<TripType> for String {
    fn from(value: TripType) -> Self {
        match value {
            TripType::Other(other) => other,
            known => known.as_str().to_string(),
        }
    }
}

impl fmt::Display for TripType {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

#[derive(Clone, Debug, PartialEq, Deserialize, Serialize, sqlx::FromRow)]
pub struct Trip {
    pub id: String,
    pub driver_id: String,
    pub driver_name: String,
    #[sqlx(try_from = "String")]
    pub trip_type: TripType,
    pub fare: Decimal,
    pub commission: Decimal,
    pub deduction: Decimal,
    pub date: DateTime<Utc>,
    pub created_at: DateTime<Utc>,
    pub updated_at: DateTime<Utc>,
}

/// Trip form as submitted by an admin, used for both create and update.
#[derive(Clone, Debug, Deserialize)]
pub struct TripInput {
    pub driver_id: String,
    pub trip_type: TripType,
    #[serde(default)]
    pub fare: Decimal,
    #[serde(default)]
    pub commission: Decimal,
    #[serde(default)]
    pub deduction: Decimal,
}

/// Row values written to the store, with the driver name already copied in.
#[derive(Clone, Debug, PartialEq)]
pub struct TripRecord {
    pub driver_id: String,
    pub driver_name: String,
    pub trip_type: TripType,
    pub fare: Decimal,
    pub commission: Decimal,
    pub deduction: Decimal,
}

impl TripRecord {
    pub fn new(input: TripInput, driver_name: String) -> Self {
        TripRecord {
            driver_id: input.driver_id,
            driver_name,
            trip_type: input.trip_type,
            fare: input.fare,
            commission: input.commission,
            deduction: input.deduction,
        }
    }
}

/// A trip as it was just before a write and as the write left it, both read
/// under the same row lock.
#[derive(Clone, Debug, PartialEq)]
pub struct TripRevision {
    pub before: Trip,
    pub after: Trip,
}

#[derive(Clone, Debug, Default, Deserialize)]
pub struct TripFilter {
    pub search: Option<String>,
    pub driver_id: Option<String>,
    pub trip_type: Option<String>,
    pub date: Option<NaiveDate>,
}

impl TripFilter {
    pub fn matches(&self, trip: &Trip) -> bool {
        let matches_search = match self.search.as_deref().map(str::trim) {
            None | Some("") => true,
            Some(term) => {
                let term = term.to_lowercase();
                trip.driver_name.to_lowercase().contains(&term)
                    || trip.trip_type.as_str().to_lowercase().contains(&term)
            }
        };

        let matches_driver = match self.driver_id.as_deref() {
            None | Some("all") => true,
            Some(driver_id) => trip.driver_id == driver_id,
        };

        let matches_type = match self.trip_type.as_deref() {
            None | Some("all") => true,
            Some(trip_type) => trip.trip_type.as_str() == trip_type,
        };

        let matches_date = self
            .date
            .map_or(true, |date| trip.date.date_naive() == date);

        matches_search && matches_driver && matches_type && matches_date
    }
}
