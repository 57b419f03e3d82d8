//! Routes for the object router.
//!
//! ## Structure
//! - `GET /healthz` — liveness
//! - `GET /readyz`  — readiness (probes the storage engine)
//! - anything else  — method dispatch; only `POST` is accepted, the JSON body
//!   carries `method` (`create`, `write`, `read`, `list`, `delete`, `purge`)

use crate::{
    handlers::{
        dispatch_handlers::dispatch,
        health_handlers::{healthz, readyz},
    },
    services::object_service::ObjectService,
};
use axum::{Router, routing::get};

/// Build the router. Carries `ObjectService` as shared state.
pub fn routes() -> Router<ObjectService> {
    Router::new()
        .route("/healthz", get(healthz))
        .route("/readyz", get(readyz))
        .fallback(dispatch)
}
