use axum::{
    extract::{Query, State},
    http::StatusCode,
};

use super::{dispatch, reply, AppState, Reply};
use crate::models::reports::{DashboardQuery, ReportQuery};
use crate::services::reports::ReportRequest;

pub async fn get_report(State(state): State<AppState>, Query(query): Query<ReportQuery>) -> Reply {
    let result = dispatch(&state.reports, "ReportService", |response| {
        ReportRequest::GetReport { query, response }
    })
    .await;

    reply(result, StatusCode::OK)
}

pub async fn get_dashboard(
    State(state): State<AppState>,
    Query(query): Query<DashboardQuery>,
) -> Reply {
    let result = dispatch(&state.reports, "ReportService", |response| {
        ReportRequest::GetDashboard { query, response }
    })
    .await;

    reply(result, StatusCode::OK)
}
