use std::sync::Arc;

use async_trait::async_trait;
use tokio::sync::oneshot;

use super::{RequestHandler, Service, ServiceError};
use crate::models::drivers::DriverSummary;
use crate::repositories::{DriverStore, TripStore};
use crate::utils::phone::{raw_candidates, PhoneError, PhoneNumber};

pub enum PortalRequest {
    LookupDriver {
        phone: String,
        response: oneshot::Sender<Result<DriverSummary, ServiceError>>,
    },
}

#[derive(Clone)]
pub struct PortalRequestHandler {
    drivers: Arc<dyn DriverStore>,
    trips: Arc<dyn TripStore>,
}

impl PortalRequestHandler {
    pub fn new(drivers: Arc<dyn DriverStore>, trips: Arc<dyn TripStore>) -> Self {
        PortalRequestHandler { drivers, trips }
    }

    async fn lookup_driver(&self, phone: &str) -> Result<DriverSummary, ServiceError> {
        let candidates = match PhoneNumber::parse(phone) {
            Ok(number) => number.lookup_candidates(phone),
            Err(PhoneError::Unrecognised(_)) => {
                log::debug!("Unrecognised phone {:?}, trying it as stored.", phone);
                raw_candidates(phone)
            }
            Err(e) => return Err(ServiceError::Validation(e.to_string())),
        };

        let driver = self
            .drivers
            .lookup_driver_by_phone(&candidates)
            .await
            .map_err(|e| ServiceError::Repository("PortalService".to_string(), e.to_string()))?
            .ok_or_else(|| ServiceError::NotFound(format!("driver with phone {}", phone.trim())))?;

        let trip_count = self
            .trips
            .count_trips_for_driver(&driver.id)
            .await
            .map_err(|e| ServiceError::Repository("PortalService".to_string(), e.to_string()))?;

        Ok(DriverSummary {
            id: driver.id,
            name: driver.name,
            balance: driver.balance,
            trip_count,
        })
    }
}

#[async_trait]
impl RequestHandler<PortalRequest> for PortalRequestHandler {
    async fn handle_request(&self, request: PortalRequest) {
        match request {
            PortalRequest::LookupDriver { phone, response } => {
                let summary = self.lookup_driver(&phone).await;
                let _ = response.send(summary);
            }
        }
    }
}

pub struct PortalService;

impl PortalService {
    pub fn new() -> Self {
        PortalService {}
    }
}

#[async_trait]
impl Service<PortalRequest, PortalRequestHandler> for PortalService {}
