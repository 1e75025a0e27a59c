//! Router wiring.

use crate::{handlers, AppState};
use axum::{routing::{get, post}, Router};

pub fn create_router(state: AppState) -> Router {
    Router::new()
        .route("/", get(handlers::status))
        .route("/honeypot", post(handlers::honeypot))
        .with_state(state)
}
