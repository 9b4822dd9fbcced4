use std::{future::Future, net::SocketAddr};

use {
    axum::{
        Json, Router,
        body::Bytes,
        extract::{Path, State},
        http::StatusCode,
        response::{IntoResponse, Response},
        routing::{get, post},
    },
    herald_config::ScheduleParams,
    herald_routing::{AddOutcome, FailureReason, FireReport},
    serde::Deserialize,
    serde_json::json,
    tokio::net::TcpListener,
    tower_http::{
        cors::{Any, CorsLayer},
        trace::TraceLayer,
    },
    tracing::info,
};

use crate::{error::ApiError, state::AppState};

/// Body of `POST /v1/alerts/{id}/fire`. The body itself is optional.
#[derive(Debug, Default, Deserialize)]
struct FireRequest {
    #[serde(default)]
    msg: String,
}

/// Body of `POST|PUT /v1/alerts/{id}`. `schedule` is required; an empty list
/// is a valid alert with nothing to deliver.
#[derive(Debug, Deserialize)]
#[serde(deny_unknown_fields)]
struct AlertPayload {
    #[serde(default, rename = "alert")]
    alert_id: Option<String>,
    schedule: Vec<ScheduleParams>,
}

impl AlertPayload {
    fn parse(path_id: &str, body: &[u8]) -> Result<Self, ApiError> {
        let payload: Self = serde_json::from_slice(body)?;
        if let Some(body_id) = &payload.alert_id
            && body_id != path_id
        {
            return Err(ApiError::BadRequest(format!(
                "alert id in body '{body_id}' does not match path '{path_id}'"
            )));
        }
        Ok(payload)
    }
}

/// Build the router. Shared by the binary and the integration tests.
pub fn build_app(state: AppState) -> Router {
    let cors = CorsLayer::new()
        .allow_origin(Any)
        .allow_methods(Any)
        .allow_headers(Any);

    Router::new()
        .route("/health", get(ekg_handler))
        .route("/v1/ekg", get(ekg_handler))
        .route("/v1/alerts", get(list_handler))
        .route(
            "/v1/alerts/{id}",
            post(add_handler).put(update_handler).delete(delete_handler),
        )
        .route("/v1/alerts/{id}/fire", post(fire_handler))
        .route("/v1/channels", get(channels_handler))
        .route("/v1/triggers", get(triggers_handler))
        .layer(TraceLayer::new_for_http())
        .layer(cors)
        .with_state(state)
}

/// Serve the API on `listener` until `shutdown` resolves.
pub async fn serve(
    listener: TcpListener,
    state: AppState,
    shutdown: impl Future<Output = ()> + Send + 'static,
) -> anyhow::Result<()> {
    let addr = listener.local_addr()?;
    info!(%addr, version = state.version, "management API listening");
    axum::serve(
        listener,
        build_app(state).into_make_service_with_connect_info::<SocketAddr>(),
    )
    .with_graceful_shutdown(shutdown)
    .await?;
    info!("management API stopped");
    Ok(())
}

// ── Handlers ─────────────────────────────────────────────────────────────────

async fn ekg_handler() -> &'static str {
    "OK"
}

async fn fire_handler(
    State(state): State<AppState>,
    Path(alert_id): Path<String>,
    body: Bytes,
) -> Result<Response, ApiError> {
    let request = if body.iter().all(u8::is_ascii_whitespace) {
        FireRequest::default()
    } else {
        serde_json::from_slice::<FireRequest>(&body)?
    };

    let report = state.manager.fire(&alert_id, &request.msg).await?;
    Ok((fire_status(&report), Json(report)).into_response())
}

/// 200 when every enabled entry was queued, 503 when the dispatcher could not
/// take a job, 404 when the only failures are unknown channels.
fn fire_status(report: &FireReport) -> StatusCode {
    let unavailable = report.failed.iter().any(|f| {
        matches!(
            f.reason,
            FailureReason::QueueFull | FailureReason::DispatcherClosed
        )
    });
    if unavailable {
        StatusCode::SERVICE_UNAVAILABLE
    } else if report.has_failures() {
        StatusCode::NOT_FOUND
    } else {
        StatusCode::OK
    }
}

async fn add_handler(
    State(state): State<AppState>,
    Path(alert_id): Path<String>,
    body: Bytes,
) -> Result<Response, ApiError> {
    let payload = AlertPayload::parse(&alert_id, &body)?;
    match state.manager.add(&alert_id, payload.schedule).await? {
        AddOutcome::Created => {
            Ok((StatusCode::CREATED, Json(json!({ "alert": alert_id }))).into_response())
        },
        AddOutcome::AlreadyExists => Err(ApiError::Conflict(format!(
            "alert '{alert_id}' already exists"
        ))),
    }
}

async fn update_handler(
    State(state): State<AppState>,
    Path(alert_id): Path<String>,
    body: Bytes,
) -> Result<Json<serde_json::Value>, ApiError> {
    let payload = AlertPayload::parse(&alert_id, &body)?;
    state.manager.update(&alert_id, payload.schedule).await?;
    Ok(Json(json!({ "alert": alert_id })))
}

async fn delete_handler(
    State(state): State<AppState>,
    Path(alert_id): Path<String>,
) -> Result<Json<serde_json::Value>, ApiError> {
    state.manager.delete(&alert_id).await?;
    Ok(Json(json!({ "alert": alert_id })))
}

async fn list_handler(State(state): State<AppState>) -> impl IntoResponse {
    Json(state.manager.list().await)
}

async fn channels_handler(State(state): State<AppState>) -> impl IntoResponse {
    Json(state.manager.channels().describe_all())
}

async fn triggers_handler(State(state): State<AppState>) -> impl IntoResponse {
    let (status, triggers) = state.manager.triggers().await;
    Json(json!({
        "status": status,
        "triggers": triggers,
        "dispatch": state.manager.dispatch_stats(),
    }))
}
