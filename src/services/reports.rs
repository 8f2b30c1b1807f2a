use std::collections::{HashMap, HashSet};
use std::sync::Arc;

use async_trait::async_trait;
use chrono::{NaiveDate, Utc};
use rust_decimal::{Decimal, RoundingStrategy};
use tokio::sync::oneshot;

use super::{RequestHandler, Service, ServiceError};
use crate::models::drivers::Driver;
use crate::models::reports::{
    Dashboard, DashboardQuery, DriverStats, LowBalanceDriver, Report, ReportQuery, TripTypeCount,
};
use crate::models::trips::{Trip, TripType};
use crate::repositories::{DriverStore, TripStore};

const TOP_DRIVERS: usize = 10;
const RECENT_TRIPS: usize = 10;

pub enum ReportRequest {
    GetReport {
        query: ReportQuery,
        response: oneshot::Sender<Result<Report, ServiceError>>,
    },
    GetDashboard {
        query: DashboardQuery,
        response: oneshot::Sender<Result<Dashboard, ServiceError>>,
    },
}

#[derive(Clone)]
pub struct ReportRequestHandler {
    drivers: Arc<dyn DriverStore>,
    trips: Arc<dyn TripStore>,
    low_balance_threshold: Decimal,
}

impl ReportRequestHandler {
    pub fn new(
        drivers: Arc<dyn DriverStore>,
        trips: Arc<dyn TripStore>,
        low_balance_threshold: Decimal,
    ) -> Self {
        ReportRequestHandler {
            drivers,
            trips,
            low_balance_threshold,
        }
    }

    async fn snapshot(&self) -> Result<(Vec<Trip>, Vec<Driver>), ServiceError> {
        let trips = self
            .trips
            .list_trips()
            .await
            .map_err(|e| ServiceError::Repository("ReportService".to_string(), e.to_string()))?;
        let drivers = self
            .drivers
            .list_drivers()
            .await
            .map_err(|e| ServiceError::Repository("ReportService".to_string(), e.to_string()))?;

        Ok((trips, drivers))
    }

    async fn get_report(&self, query: ReportQuery) -> Result<Report, ServiceError> {
        let (trips, drivers) = self.snapshot().await?;

        Ok(build_report(
            &trips,
            &drivers,
            &query,
            self.low_balance_threshold,
        ))
    }

    async fn get_dashboard(&self, query: DashboardQuery) -> Result<Dashboard, ServiceError> {
        let (trips, drivers) = self.snapshot().await?;
        let date = query.date.unwrap_or_else(|| Utc::now().date_naive());

        Ok(build_dashboard(
            &trips,
            &drivers,
            date,
            self.low_balance_threshold,
        ))
    }
}

/// Period totals over `trips` plus the drivers currently at or below the
/// low-balance threshold.
pub fn build_report(
    trips: &[Trip],
    drivers: &[Driver],
    query: &ReportQuery,
    low_balance_threshold: Decimal,
) -> Report {
    let in_range: Vec<&Trip> = trips.iter().filter(|trip| query.contains(trip.date)).collect();

    let total_commission: Decimal = in_range.iter().map(|trip| trip.commission).sum();
    let average_commission = if in_range.is_empty() {
        Decimal::ZERO
    } else {
        (total_commission / Decimal::from(in_range.len()))
            .round_dp_with_strategy(2, RoundingStrategy::MidpointAwayFromZero)
    };

    let active_drivers = in_range
        .iter()
        .map(|trip| trip.driver_id.as_str())
        .collect::<HashSet<_>>()
        .len();

    let trip_types = TripType::KNOWN
        .iter()
        .map(|trip_type| TripTypeCount {
            trip_type: trip_type.to_string(),
            count: in_range
                .iter()
                .filter(|trip| &trip.trip_type == trip_type)
                .count(),
        })
        .collect();

    Report {
        total_commission,
        total_trips: in_range.len(),
        average_commission,
        active_drivers,
        trip_types,
        top_drivers: top_drivers(&in_range, drivers),
        low_balance_drivers: drivers
            .iter()
            .filter(|driver| driver.balance <= low_balance_threshold)
            .map(|driver| LowBalanceDriver {
                driver_id: driver.id.clone(),
                name: driver.name.clone(),
                phone: driver.phone.clone(),
                balance: driver.balance,
            })
            .collect(),
    }
}

/// The day's activity on the UTC calendar day `date`, with the roster size
/// and the current low-balance count.
pub fn build_dashboard(
    trips: &[Trip],
    drivers: &[Driver],
    date: NaiveDate,
    low_balance_threshold: Decimal,
) -> Dashboard {
    let mut today: Vec<&Trip> = trips
        .iter()
        .filter(|trip| trip.date.date_naive() == date)
        .collect();
    today.sort_by(|a, b| b.date.cmp(&a.date));

    Dashboard {
        date,
        driver_count: drivers.len(),
        trip_count: today.len(),
        commission: today.iter().map(|trip| trip.commission).sum(),
        low_balance_count: drivers
            .iter()
            .filter(|driver| driver.balance <= low_balance_threshold)
            .count(),
        recent_trips: today
            .into_iter()
            .take(RECENT_TRIPS)
            .cloned()
            .collect(),
    }
}

fn top_drivers(trips: &[&Trip], drivers: &[Driver]) -> Vec<DriverStats> {
    let mut stats: HashMap<&str, DriverStats> = HashMap::new();

    for trip in trips {
        let entry = stats
            .entry(trip.driver_id.as_str())
            .or_insert_with(|| DriverStats {
                driver_id: trip.driver_id.clone(),
                driver_name: trip.driver_name.clone(),
                trip_count: 0,
                total_commission: Decimal::ZERO,
                balance: Decimal::ZERO,
            });
        entry.trip_count += 1;
        entry.total_commission += trip.commission;
    }

    let mut stats: Vec<DriverStats> = stats.into_values().collect();
    for stat in &mut stats {
        if let Some(driver) = drivers.iter().find(|driver| driver.id == stat.driver_id) {
            stat.balance = driver.balance;
        }
    }

    stats.sort_by(|a, b| {
        b.trip_count
            .cmp(&a.trip_count)
            .then_with(|| a.driver_name.cmp(&b.driver_name))
    });
    stats.truncate(TOP_DRIVERS);

    stats
}

#[async_trait]
impl RequestHandler<ReportRequest> for ReportRequestHandler {
    async fn handle_request(&self, request: ReportRequest) {
        match request {
            ReportRequest::GetReport { query, response } => {
                let report = self.get_report(query).await;
                let _ = response.send(report);
            }
            ReportRequest::GetDashboard { query, response } => {
                let dashboard = self.get_dashboard(query).await;
                let _ = response.send(dashboard);
            }
        }
    }
}

pub struct ReportService;

impl ReportService {
    pub fn new() -> Self {
        ReportService {}
    }
}

#[async_trait]
impl Service<ReportRequest, ReportRequestHandler> for ReportService {}
