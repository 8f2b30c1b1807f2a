use std::sync::Arc;

use axum::{
    extract::{Request, State},
    http::{header, StatusCode},
    middleware::{self, Next},
    response::{IntoResponse, Response},
    routing::{get, post},
    Json, Router,
};
use serde::Serialize;
use serde_json::{json, Value};
use tokio::sync::{mpsc, oneshot};
use tower_http::trace::TraceLayer;

use super::{Channels, ServiceError};
use crate::settings::Http;

mod drivers;
mod portal;
mod reports;
mod trips;

type AppState = Channels;

type Reply = (StatusCode, Json<Value>);

/// Sends a request to a service and waits for its answer.
async fn dispatch<R, T>(
    channel: &mpsc::Sender<R>,
    service: &str,
    request: impl FnOnce(oneshot::Sender<Result<T, ServiceError>>) -> R,
) -> Result<T, ServiceError> {
    let (response_tx, response_rx) = oneshot::channel();

    channel
        .send(request(response_tx))
        .await
        .map_err(|e| ServiceError::Communication(service.to_string(), e.to_string()))?;

    response_rx
        .await
        .map_err(|e| ServiceError::Communication(service.to_string(), e.to_string()))?
}

fn reply<T: Serialize>(result: Result<T, ServiceError>, status: StatusCode) -> Reply {
    match result {
        Ok(body) => (status, Json(json!(body))),
        Err(error) => error_reply(error),
    }
}

fn error_reply(error: ServiceError) -> Reply {
    let status = error.status_code();
    if status.is_server_error() {
        log::error!("{}", error);
    }

    let body = match &error {
        ServiceError::PartialFailure {
            trip_id, pending, ..
        } => json!({
            "error": error.to_string(),
            "trip_id": trip_id,
            "pending": pending,
        }),
        _ => json!({ "error": error.to_string() }),
    };

    (status, Json(body))
}

#[derive(Clone)]
struct AdminToken(Arc<str>);

/// Lets a request through only when it carries `Authorization: Bearer <token>`.
async fn require_admin(
    State(AdminToken(token)): State<AdminToken>,
    request: Request,
    next: Next,
) -> Response {
    let presented = request
        .headers()
        .get(header::AUTHORIZATION)
        .and_then(|value| value.to_str().ok())
        .and_then(|value| value.strip_prefix("Bearer "));

    if presented == Some(&*token) {
        return next.run(request).await;
    }

    log::warn!(
        "Rejected unauthenticated {} {}",
        request.method(),
        request.uri().path()
    );
    (
        StatusCode::UNAUTHORIZED,
        Json(json!({ "error": "Unauthorized" })),
    )
        .into_response()
}

pub fn router(state: AppState, admin_token: &str) -> Router {
    let admin = Router::new()
        .route(
            "/drivers",
            post(drivers::create_driver).get(drivers::list_drivers),
        )
        .route(
            "/drivers/{id}",
            get(drivers::get_driver)
                .put(drivers::update_driver)
                .delete(drivers::delete_driver),
        )
        .route("/trips", post(trips::create_trip).get(trips::list_trips))
        .route(
            "/trips/{id}",
            get(trips::get_trip)
                .put(trips::update_trip)
                .delete(trips::delete_trip),
        )
        .route("/reports", get(reports::get_report))
        .route("/dashboard", get(reports::get_dashboard))
        .route_layer(middleware::from_fn_with_state(
            AdminToken(Arc::from(admin_token)),
            require_admin,
        ));

    Router::new()
        .merge(admin)
        .route("/portal/lookup", post(portal::lookup_driver))
        .route("/health", get(|| async { "OK" }))
        .with_state(state)
        .layer(TraceLayer::new_for_http())
}

pub async fn start_http_server(channels: Channels, settings: &Http) -> Result<(), anyhow::Error> {
    let app = router(channels, &settings.admin_token);

    let listener = tokio::net::TcpListener::bind(&settings.listen).await?;
    log::info!("Listening on {}", listener.local_addr()?);

    axum::serve(listener, app).await?;

    Ok(())
}
