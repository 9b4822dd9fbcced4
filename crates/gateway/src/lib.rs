//! HTTP management API for the alert router.
//!
//! Routes:
//! - `POST /v1/alerts/{id}/fire`: fire an alert
//! - `POST|PUT|DELETE /v1/alerts/{id}`: manage alert definitions
//! - `GET /v1/alerts`, `/v1/channels`, `/v1/triggers`: introspection
//! - `GET /v1/ekg`, `/health`: liveness

pub mod error;
pub mod server;
pub mod state;

pub use {
    error::ApiError,
    server::{build_app, serve},
    state::AppState,
};
