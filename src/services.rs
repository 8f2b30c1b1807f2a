use std::sync::Arc;

use async_trait::async_trait;
use axum::http::StatusCode;
use tokio::sync::mpsc;

use crate::ledger::{BalanceDelta, Ledger, LedgerError};
use crate::repositories::{DriverStore, TripStore};
use crate::settings::Settings;

mod drivers;
mod http;
mod portal;
mod reports;
mod trips;

#[derive(Debug, thiserror::Error)]
pub enum ServiceError {
    #[error("Validation error: {0}")]
    Validation(String),
    #[error("Not found: {0}")]
    NotFound(String),
    #[error("Conflict: {0}")]
    Conflict(String),
    #[error("Repository error: {0} - {1}")]
    Repository(String, String),
    #[error("Communication error: {0} - {1}")]
    Communication(String, String),
    #[error("Trip {trip_id} saved but driver balances are out of date: {reason}")]
    PartialFailure {
        trip_id: String,
        pending: Vec<BalanceDelta>,
        reason: String,
    },
}

impl ServiceError {
    pub fn status_code(&self) -> StatusCode {
        match self {
            ServiceError::Validation(_) => StatusCode::BAD_REQUEST,
            ServiceError::NotFound(_) => StatusCode::NOT_FOUND,
            ServiceError::Conflict(_) => StatusCode::CONFLICT,
            ServiceError::Repository(..)
            | ServiceError::Communication(..)
            | ServiceError::PartialFailure { .. } => StatusCode::INTERNAL_SERVER_ERROR,
        }
    }
}

impl From<LedgerError> for ServiceError {
    fn from(error: LedgerError) -> Self {
        match error {
            LedgerError::Validation(message) => ServiceError::Validation(message),
            LedgerError::DriverNotFound(id) => ServiceError::NotFound(format!("driver {}", id)),
            LedgerError::TripNotFound(id) => ServiceError::NotFound(format!("trip {}", id)),
            LedgerError::Store(message) => ServiceError::Repository("Ledger".to_string(), message),
            LedgerError::BalanceNotApplied {
                trip_id,
                pending,
                reason,
            } => ServiceError::PartialFailure {
                trip_id,
                pending,
                reason,
            },
        }
    }
}

#[async_trait]
pub trait RequestHandler<T>: Send + Sync + 'static
where
    T: Send + 'static,
{
    async fn handle_request(&self, request: T);
}

#[async_trait]
pub trait Service<T, H>: Send + Sync + 'static
where
    T: Send + 'static,
    H: RequestHandler<T> + Clone + Send,
{
    async fn run(&mut self, handler: H, receiver: &mut mpsc::Receiver<T>) {
        while let Some(request) = receiver.recv().await {
            let handler = handler.clone();

            tokio::spawn(async move {
                handler.handle_request(request).await;
            });
        }
    }
}

/// Senders for every running service.
#[derive(Clone)]
pub struct Channels {
    pub drivers: mpsc::Sender<drivers::DriverRequest>,
    pub trips: mpsc::Sender<trips::TripRequest>,
    pub reports: mpsc::Sender<reports::ReportRequest>,
    pub portal: mpsc::Sender<portal::PortalRequest>,
}

pub fn spawn_services(
    driver_store: Arc<dyn DriverStore>,
    trip_store: Arc<dyn TripStore>,
    low_balance_threshold: rust_decimal::Decimal,
) -> Channels {
    let (driver_tx, mut driver_rx) = mpsc::channel(512);
    let (trip_tx, mut trip_rx) = mpsc::channel(512);
    let (report_tx, mut report_rx) = mpsc::channel(512);
    let (portal_tx, mut portal_rx) = mpsc::channel(512);

    let mut driver_service = drivers::DriverService::new();
    let mut trip_service = trips::TripService::new();
    let mut report_service = reports::ReportService::new();
    let mut portal_service = portal::PortalService::new();

    log::info!("Starting driver service.");
    let handler = drivers::DriverRequestHandler::new(driver_store.clone());
    tokio::spawn(async move {
        driver_service.run(handler, &mut driver_rx).await;
    });

    log::info!("Starting trip service.");
    let ledger = Ledger::new(driver_store.clone(), trip_store.clone());
    let handler = trips::TripRequestHandler::new(ledger, trip_store.clone());
    tokio::spawn(async move {
        trip_service.run(handler, &mut trip_rx).await;
    });

    log::info!("Starting report service.");
    let handler = reports::ReportRequestHandler::new(
        driver_store.clone(),
        trip_store.clone(),
        low_balance_threshold,
    );
    tokio::spawn(async move {
        report_service.run(handler, &mut report_rx).await;
    });

    log::info!("Starting portal service.");
    let handler = portal::PortalRequestHandler::new(driver_store, trip_store);
    tokio::spawn(async move {
        portal_service.run(handler, &mut portal_rx).await;
    });

    Channels {
        drivers: driver_tx,
        trips: trip_tx,
        reports: report_tx,
        portal: portal_tx,
    }
}

/// Starts every service and serves HTTP until the listener stops.
pub async fn start_services(
    driver_store: Arc<dyn DriverStore>,
    trip_store: Arc<dyn TripStore>,
    settings: Settings,
) -> Result<(), anyhow::Error> {
    let channels = spawn_services(
        driver_store,
        trip_store,
        settings.ledger.low_balance_threshold,
    );

    log::info!("Starting HTTP server.");
    http::start_http_server(channels, &settings.http).await
}
