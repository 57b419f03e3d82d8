//! The method-dispatch endpoint.
//!
//! Every call is a `POST` with a JSON body naming the method. Credentials come
//! from two headers; the body is parsed into a typed command before the
//! service sees it, so malformed requests never touch storage.

use crate::{
    errors::AppError,
    models::request::{Command, DispatchRequest},
    services::{
        access::Credentials,
        object_service::{ObjectService, Reply},
    },
};
use axum::{
    Json,
    extract::State,
    http::{HeaderMap, Method},
    response::{IntoResponse, Response},
};
use bytes::Bytes;
use serde_json::{Value, json};

pub const MAIN_KEY_HEADER: &str = "x-durable-objects-main-key";
pub const ACCESS_KEY_HEADER: &str = "x-durable-objects-access-key";

/// `POST` on any path — run one command against the object router.
pub async fn dispatch(
    State(service): State<ObjectService>,
    method: Method,
    headers: HeaderMap,
    body: Bytes,
) -> Result<Response, AppError> {
    if method != Method::POST {
        return Err(AppError::invalid_request(format!(
            "method {method} not allowed"
        )));
    }

    let request: DispatchRequest = serde_json::from_slice(&body)
        .map_err(|err| AppError::invalid_request(format!("invalid JSON body: {err}")))?;
    let command = Command::try_from(request)?;
    let creds = credentials(&headers);

    let reply = service.dispatch(&creds, command).await?;

    let body = match reply {
        Reply::Created(id) => json!({ "id": id }),
        Reply::Value(value) => json!({ "value": value }),
        Reply::Entries(entries) => json!(entries),
        Reply::Done => Value::Null,
    };
    Ok(Json(body).into_response())
}

fn credentials(headers: &HeaderMap) -> Credentials {
    let header = |name: &str| {
        headers
            .get(name)
            .and_then(|v| v.to_str().ok())
            .map(str::to_string)
    };
    Credentials {
        main_key: header(MAIN_KEY_HEADER),
        access_key: header(ACCESS_KEY_HEADER),
    }
}
