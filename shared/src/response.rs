use lambda_http::{http::StatusCode, Body, Error, Response};
use serde::Serialize;

use crate::error::ApiError;
use crate::types::ApiEnvelope;

/// Methods advertised on `OPTIONS /users`
pub const COLLECTION_METHODS: &str = "POST, OPTIONS";
/// Methods advertised on `OPTIONS /users/{id}`
pub const ITEM_METHODS: &str = "GET, PUT, DELETE, OPTIONS";

/// JSON response with the CORS origin header every route carries
pub fn json<T: Serialize>(status: StatusCode, payload: &T) -> Result<Response<Body>, Error> {
    Ok(Response::builder()
        .status(status)
        .header("Content-Type", "application/json")
        .header("Access-Control-Allow-Origin", "*")
        .body(serde_json::to_string(payload)?.into())
        .map_err(Box::new)?)
}

/// CORS preflight answer, no body
pub fn preflight(methods: &str) -> Result<Response<Body>, Error> {
    Ok(Response::builder()
        .status(StatusCode::OK)
        .header("Access-Control-Allow-Origin", "*")
        .header("Access-Control-Allow-Methods", methods)
        .header("Access-Control-Allow-Headers", "Content-Type")
        .body(Body::Empty)
        .map_err(Box::new)?)
}

/// Turn a handler failure into its envelope.
///
/// 4xx errors carry their own message; anything else is logged and
/// reported as `failure` with the underlying error text attached.
pub fn from_error(err: &ApiError, failure: &str) -> Result<Response<Body>, Error> {
    let status = err.status();
    if err.is_client_error() {
        return json(status, &ApiEnvelope::failure(err.to_string(), None));
    }

    tracing::error!("❌ {}: {}", failure, err);
    json(status, &ApiEnvelope::failure(failure, Some(err.to_string())))
}

pub fn not_found() -> Result<Response<Body>, Error> {
    json(
        StatusCode::NOT_FOUND,
        &ApiEnvelope::failure("Not found", None),
    )
}

pub fn method_not_allowed() -> Result<Response<Body>, Error> {
    json(
        StatusCode::METHOD_NOT_ALLOWED,
        &ApiEnvelope::failure("Method not allowed", None),
    )
}

#[cfg(test)]
mod tests {
    use super::*;

    fn body_json(resp: &Response<Body>) -> serde_json::Value {
        serde_json::from_slice(resp.body()).unwrap()
    }

    #[test]
    fn test_preflight_headers() {
        let resp = preflight(ITEM_METHODS).unwrap();
        assert_eq!(resp.status(), StatusCode::OK);
        assert_eq!(resp.headers()["Access-Control-Allow-Origin"], "*");
        assert_eq!(
            resp.headers()["Access-Control-Allow-Methods"],
            "GET, PUT, DELETE, OPTIONS"
        );
        assert_eq!(resp.headers()["Access-Control-Allow-Headers"], "Content-Type");
        assert!(resp.body().is_empty());
    }

    #[test]
    fn test_client_error_envelope() {
        let resp = from_error(
            &ApiError::NotFound("User with ID 9 not found".into()),
            "Failed to retrieve user",
        )
        .unwrap();
        assert_eq!(resp.status(), StatusCode::NOT_FOUND);
        assert_eq!(
            body_json(&resp),
            serde_json::json!({"success": false, "message": "User with ID 9 not found"})
        );
    }

    #[test]
    fn test_server_error_envelope_keeps_cause() {
        let resp = from_error(
            &ApiError::Storage("bucket unreachable".into()),
            "Failed to create user",
        )
        .unwrap();
        assert_eq!(resp.status(), StatusCode::INTERNAL_SERVER_ERROR);
        assert_eq!(resp.headers()["Access-Control-Allow-Origin"], "*");
        let body = body_json(&resp);
        assert_eq!(body["success"], false);
        assert_eq!(body["message"], "Failed to create user");
        assert_eq!(body["error"], "Storage error: bucket unreachable");
    }
}
