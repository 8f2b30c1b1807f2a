use axum::{
    extract::{Path, Query, State},
    http::StatusCode,
    Json,
};
use serde_json::json;

use super::{dispatch, reply, AppState, Reply};
use crate::models::drivers::{DriverFilter, DriverUpdate, NewDriver};
use crate::services::drivers::DriverRequest;

pub async fn create_driver(State(state): State<AppState>, Json(req): Json<NewDriver>) -> Reply {
    let result = dispatch(&state.drivers, "DriverService", |response| {
        DriverRequest::CreateDriver {
            driver: req,
            response,
        }
    })
    .await;

    reply(result, StatusCode::CREATED)
}

pub async fn list_drivers(
    State(state): State<AppState>,
    Query(filter): Query<DriverFilter>,
) -> Reply {
    let result = dispatch(&state.drivers, "DriverService", |response| {
        DriverRequest::ListDrivers { filter, response }
    })
    .await;

    reply(result, StatusCode::OK)
}

pub async fn get_driver(State(state): State<AppState>, Path(id): Path<String>) -> Reply {
    let result = dispatch(&state.drivers, "DriverService", |response| {
        DriverRequest::GetDriver { id, response }
    })
    .await;

    reply(result, StatusCode::OK)
}

pub async fn update_driver(
    State(state): State<AppState>,
    Path(id): Path<String>,
    Json(update): Json<DriverUpdate>,
) -> Reply {
    let result = dispatch(&state.drivers, "DriverService", |response| {
        DriverRequest::UpdateDriver {
            id,
            update,
            response,
        }
    })
    .await;

    reply(result, StatusCode::OK)
}

pub async fn delete_driver(State(state): State<AppState>, Path(id): Path<String>) -> Reply {
    let result = dispatch(&state.drivers, "DriverService", |response| {
        DriverRequest::DeleteDriver {
            id: id.clone(),
            response,
        }
    })
    .await
    .map(|()| json!({ "id": id, "deleted": true }));

    reply(result, StatusCode::OK)
}
