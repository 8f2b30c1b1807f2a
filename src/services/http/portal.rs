use axum::{extract::State, http::StatusCode, Json};
use serde::Deserialize;

use super::{dispatch, reply, AppState, Reply};
use crate::services::portal::PortalRequest;

#[derive(Deserialize)]
pub struct PhoneLookup {
    pub phone: String,
}

pub async fn lookup_driver(State(state): State<AppState>, Json(req): Json<PhoneLookup>) -> Reply {
    let result = dispatch(&state.portal, "PortalService", |response| {
        PortalRequest::LookupDriver {
            phone: req.phone,
            response,
        }
    })
    .await;

    reply(result, StatusCode::OK)
}
