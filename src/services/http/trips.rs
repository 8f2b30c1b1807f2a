use axum::{
    extract::{Path, Query, State},
    http::StatusCode,
    Json,
};

use super::{dispatch, reply, AppState, Reply};
use crate::models::trips::{TripFilter, TripInput};
use crate::services::trips::TripRequest;

pub async fn create_trip(State(state): State<AppState>, Json(input): Json<TripInput>) -> Reply {
    let result = dispatch(&state.trips, "TripService", |response| {
        TripRequest::CreateTrip { input, response }
    })
    .await;

    reply(result, StatusCode::CREATED)
}

pub async fn list_trips(State(state): State<AppState>, Query(filter): Query<TripFilter>) -> Reply {
    let result = dispatch(&state.trips, "TripService", |response| {
        TripRequest::ListTrips { filter, response }
    })
    .await;

    reply(result, StatusCode::OK)
}

pub async fn get_trip(State(state): State<AppState>, Path(id): Path<String>) -> Reply {
    let result = dispatch(&state.trips, "TripService", |response| TripRequest::GetTrip {
        id,
        response,
    })
    .await;

    reply(result, StatusCode::OK)
}

pub async fn update_trip(
    State(state): State<AppState>,
    Path(id): Path<String>,
    Json(input): Json<TripInput>,
) -> Reply {
    let result = dispatch(&state.trips, "TripService", |response| {
        TripRequest::UpdateTrip {
            id,
            input,
            response,
        }
    })
    .await;

    reply(result, StatusCode::OK)
}

pub async fn delete_trip(State(state): State<AppState>, Path(id): Path<String>) -> Reply {
    let result = dispatch(&state.trips, "TripService", |response| {
        TripRequest::DeleteTrip { id, response }
    })
    .await;

    reply(result, StatusCode::OK)
}
