use std::sync::Arc;

use async_trait::async_trait;
use rust_decimal::Decimal;
use tokio::sync::oneshot;

use super::{RequestHandler, Service, ServiceError};
use crate::models::drivers::{Driver, DriverDeletion, DriverFilter, DriverUpdate, NewDriver};
use crate::repositories::DriverStore;
use crate::utils::{money::check_amount, phone::PhoneNumber};

pub enum DriverRequest {
    CreateDriver {
        driver: NewDriver,
        response: oneshot::Sender<Result<Driver, ServiceError>>,
    },
    GetDriver {
        id: String,
        response: oneshot::Sender<Result<Driver, ServiceError>>,
    },
    ListDrivers {
        filter: DriverFilter,
        response: oneshot::Sender<Result<Vec<Driver>, ServiceError>>,
    },
    UpdateDriver {
        id: String,
        update: DriverUpdate,
        response: oneshot::Sender<Result<Driver, ServiceError>>,
    },
    DeleteDriver {
        id: String,
        response: oneshot::Sender<Result<(), ServiceError>>,
    },
}

#[derive(Clone)]
pub struct DriverRequestHandler {
    drivers: Arc<dyn DriverStore>,
}

impl DriverRequestHandler {
    pub fn new(drivers: Arc<dyn DriverStore>) -> Self {
        DriverRequestHandler { drivers }
    }

    async fn create_driver(&self, driver: NewDriver) -> Result<Driver, ServiceError> {
        let driver = NewDriver {
            name: required_name(&driver.name)?,
            phone: canonical_phone(&driver.phone)?,
            balance: valid_balance(driver.balance)?,
            photo_url: driver.photo_url,
        };

        let driver = self
            .drivers
            .insert_driver(&driver)
            .await
            .map_err(|e| ServiceError::Repository("DriverService".to_string(), e.to_string()))?;
        log::info!("Created driver {} ({}).", driver.id, driver.name);

        Ok(driver)
    }

    async fn get_driver(&self, id: &str) -> Result<Driver, ServiceError> {
        self.drivers
            .get_driver(id)
            .await
            .map_err(|e| ServiceError::Repository("DriverService".to_string(), e.to_string()))?
            .ok_or_else(|| ServiceError::NotFound(format!("driver {}", id)))
    }

    async fn list_drivers(&self, filter: DriverFilter) -> Result<Vec<Driver>, ServiceError> {
        let drivers = self
            .drivers
            .list_drivers()
            .await
            .map_err(|e| ServiceError::Repository("DriverService".to_string(), e.to_string()))?;

        Ok(drivers
            .into_iter()
            .filter(|driver| filter.matches(driver))
            .collect())
    }

    async fn update_driver(&self, id: &str, update: DriverUpdate) -> Result<Driver, ServiceError> {
        let update = DriverUpdate {
            name: update.name.as_deref().map(required_name).transpose()?,
            phone: update.phone.as_deref().map(canonical_phone).transpose()?,
            balance: update.balance.map(valid_balance).transpose()?,
            photo_url: update.photo_url,
        };

        let driver = self
            .drivers
            .update_driver(id, &update)
            .await
            .map_err(|e| ServiceError::Repository("DriverService".to_string(), e.to_string()))?
            .ok_or_else(|| ServiceError::NotFound(format!("driver {}", id)))?;

        if let Some(balance) = update.balance {
            log::info!("Balance of driver {} set to {} by admin.", id, balance);
        }

        Ok(driver)
    }

    async fn delete_driver(&self, id: &str) -> Result<(), ServiceError> {
        let deletion = self
            .drivers
            .delete_driver(id)
            .await
            .map_err(|e| ServiceError::Repository("DriverService".to_string(), e.to_string()))?;

        match deletion {
            DriverDeletion::Deleted => {
                log::info!("Deleted driver {}.", id);
                Ok(())
            }
            DriverDeletion::HasTrips => Err(ServiceError::Conflict(
                "Cannot delete driver with existing trips".to_string(),
            )),
            DriverDeletion::NotFound => Err(ServiceError::NotFound(format!("driver {}", id))),
        }
    }
}

fn required_name(name: &str) -> Result<String, ServiceError> {
    let name = name.trim();
    if name.is_empty() {
        return Err(ServiceError::Validation("name is required".to_string()));
    }

    Ok(name.to_string())
}

fn valid_balance(balance: Decimal) -> Result<Decimal, ServiceError> {
    check_amount("balance", balance).map_err(|e| ServiceError::Validation(e.to_string()))?;
    Ok(balance)
}

fn canonical_phone(phone: &str) -> Result<String, ServiceError> {
    PhoneNumber::parse(phone)
        .map(|phone| phone.canonical())
        .map_err(|e| ServiceError::Validation(e.to_string()))
}

#[async_trait]
impl RequestHandler<DriverRequest> for DriverRequestHandler {
    async fn handle_request(&self, request: DriverRequest) {
        match request {
            DriverRequest::CreateDriver { driver, response } => {
                let result = self.create_driver(driver).await;
                let _ = response.send(result);
            }
            DriverRequest::GetDriver { id, response } => {
                let result = self.get_driver(&id).await;
                let _ = response.send(result);
            }
            DriverRequest::ListDrivers { filter, response } => {
                let result = self.list_drivers(filter).await;
                let _ = response.send(result);
            }
            DriverRequest::UpdateDriver {
                id,
                update,
                response,
            } => {
                let result = self.update_driver(&id, update).await;
                let _ = response.send(result);
            }
            DriverRequest::DeleteDriver { id, response } => {
                let result = self.delete_driver(&id).await;
                let _ = response.send(result);
            }
        }
    }
}

pub struct DriverService;

impl DriverService {
    pub fn new() -> Self {
        DriverService {}
    }
}

#[async_trait]
impl Service<DriverRequest, DriverRequestHandler> for DriverService {}
