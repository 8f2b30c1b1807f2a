use std::sync::Arc;

use async_trait::async_trait;
use tokio::sync::oneshot;

use super::{RequestHandler, Service, ServiceError};
use crate::ledger::Ledger;
use crate::models::trips::{Trip, TripFilter, TripInput};
use crate::repositories::TripStore;

pub enum TripRequest {
    CreateTrip {
        input: TripInput,
        response: oneshot::Sender<Result<Trip, ServiceError>>,
    },
    GetTrip {
        id: String,
        response: oneshot::Sender<Result<Trip, ServiceError>>,
    },
    ListTrips {
        filter: TripFilter,
        response: oneshot::Sender<Result<Vec<Trip>, ServiceError>>,
    },
    UpdateTrip {
        id: String,
        input: TripInput,
        response: oneshot::Sender<Result<Trip, ServiceError>>,
    },
    DeleteTrip {
        id: String,
        response: oneshot::Sender<Result<Trip, ServiceError>>,
    },
}

#[derive(Clone)]
pub struct TripRequestHandler {
    ledger: Ledger,
    trips: Arc<dyn TripStore>,
}

impl TripRequestHandler {
    pub fn new(ledger: Ledger, trips: Arc<dyn TripStore>) -> Self {
        TripRequestHandler { ledger, trips }
    }

    async fn get_trip(&self, id: &str) -> Result<Trip, ServiceError> {
        self.trips
            .get_trip(id)
            .await
            .map_err(|e| ServiceError::Repository("TripService".to_string(), e.to_string()))?
            .ok_or_else(|| ServiceError::NotFound(format!("trip {}", id)))
    }

    async fn list_trips(&self, filter: TripFilter) -> Result<Vec<Trip>, ServiceError> {
        let trips = self
            .trips
            .list_trips()
            .await
            .map_err(|e| ServiceError::Repository("TripService".to_string(), e.to_string()))?;

        Ok(trips
            .into_iter()
            .filter(|trip| filter.matches(trip))
            .collect())
    }
}

#[async_trait]
impl RequestHandler<TripRequest> for TripRequestHandler {
    async fn handle_request(&self, request: TripRequest) {
        match request {
            TripRequest::CreateTrip { input, response } => {
                let result = self.ledger.record_trip(input).await.map_err(Into::into);
                let _ = response.send(result);
            }
            TripRequest::GetTrip { id, response } => {
                let result = self.get_trip(&id).await;
                let _ = response.send(result);
            }
            TripRequest::ListTrips { filter, response } => {
                let result = self.list_trips(filter).await;
                let _ = response.send(result);
            }
            TripRequest::UpdateTrip {
                id,
                input,
                response,
            } => {
                let result = self.ledger.revise_trip(&id, input).await.map_err(Into::into);
                let _ = response.send(result);
            }
            TripRequest::DeleteTrip { id, response } => {
                let result = self.ledger.remove_trip(&id).await.map_err(Into::into);
                let _ = response.send(result);
            }
        }
    }
}

pub struct TripService;

impl TripService {
    pub fn new() -> Self {
        TripService {}
    }
}

#[async_trait]
impl Service<TripRequest, TripRequestHandler> for TripService {}
