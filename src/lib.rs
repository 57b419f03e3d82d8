//! Router, access control and metadata cache in front of a sharded,
//! per-tenant key/value store.
//!
//! Each object is an isolated namespace addressed by an [`ObjectId`]. The
//! [`ObjectService`] decides which namespace a request targets, checks the
//! two credentials, keeps each object's lifecycle record warm in a process
//! cache and forwards the operation to the storage engine.
//!
//! [`ObjectId`]: models::object_id::ObjectId
//! [`ObjectService`]: services::object_service::ObjectService

pub mod config;
pub mod errors;
pub mod handlers;
pub mod models;
pub mod routes;
pub mod services;

use axum::Router;
use services::object_service::ObjectService;

/// Build the HTTP application around a configured service.
pub fn app(service: ObjectService) -> Router {
    routes::routes::routes().with_state(service)
}
