use chrono::{DateTime, NaiveDate, Utc};

use super::trips::Trip;
use rust_decimal::Decimal;
use serde::{Deserialize, Serialize};

/// Inclusive date range; an open end is unbounded.
#[derive(Clone, Debug, Default, Deserialize)]
pub struct ReportQuery {
    pub start: Option<DateTime<Utc>>,
    pub end: Option<DateTime<Utc>>,
}

impl ReportQuery {
    pub fn contains(&self, date: DateTime<Utc>) -> bool {
        self.start.map_or(true, |start| date >= start) && self.end.map_or(true, |end| date <= end)
    }
}

#[derive(Clone, Debug, PartialEq, Serialize)]
pub struct TripTypeCount {
    pub trip_type: String,
    pub count: usize,
}

#[derive(Clone, Debug, PartialEq, Serialize)]
pub struct DriverStats {
    pub driver_id: String,
    pub driver_name: String,
    pub trip_count: usize,
    pub total_commission: Decimal,
    pub balance: Decimal,
}

#[derive(Clone, Debug, PartialEq, Serialize)]
pub struct LowBalanceDriver {
    pub driver_id: String,
    pub name: String,
    pub phone: String,
    pub balance: Decimal,
}

#[derive(Clone, Debug, PartialEq, Serialize)]
pub struct Report {
    pub total_commission: Decimal,
    pub total_trips: usize,
    pub average_commission: Decimal,
    pub active_drivers: usize,
    pub trip_types: Vec<TripTypeCount>,
    pub top_drivers: Vec<DriverStats>,
    pub low_balance_drivers: Vec<LowBalanceDriver>,
}

#[derive(Clone, Debug, Default, Deserialize)]
pub struct DashboardQuery {
    /// Defaults to the current UTC day.
    pub date: Option<NaiveDate>,
}

/// Overview shown on the admin landing page.
#[derive(Clone, Debug, PartialEq, Serialize)]
pub struct Dashboard {
    pub date: NaiveDate,
    pub driver_count: usize,
    pub trip_count: usize,
    pub commission: Decimal,
    pub low_balance_count: usize,
    /// Most recent first, at most ten.
    pub recent_trips: Vec<Trip>,
}
