use lambda_http::{
    http::{header::CONTENT_TYPE, Method},
    Body, Error, Request, Response,
};
use std::sync::Arc;
use users_shared::response::{self, COLLECTION_METHODS, ITEM_METHODS};
use users_shared::{users, AppState};

/// Main Lambda handler - routes requests to the user endpoints
pub(crate) async fn function_handler(
    event: Request,
    state: Arc<AppState>,
) -> Result<Response<Body>, Error> {
    let method = event.method();
    let path = event.uri().path();
    let body = event.body();
    let content_type = event
        .headers()
        .get(CONTENT_TYPE)
        .and_then(|v| v.to_str().ok());
    tracing::info!("🚀 Users API invoked - Method: {} Path: {}", method, path);

    let store = state.users.as_ref();
    let photos = state.photos.as_ref();

    let parts: Vec<&str> = path.split('/').filter(|s| !s.is_empty()).collect();
    // Routes may arrive with the `/api` prefix of the function host
    let parts = match parts.as_slice() {
        ["api", rest @ ..] => rest,
        rest => rest,
    };

    match (method, parts) {
        // --- CORS PREFLIGHT ---
        (&Method::OPTIONS, ["users"]) => response::preflight(COLLECTION_METHODS),
        (&Method::OPTIONS, ["users", _]) => response::preflight(ITEM_METHODS),

        // --- USERS ---
        // POST /users - create user
        (&Method::POST, ["users"]) => {
            users::create_user(store, photos, content_type, body).await
        }
        // GET /users/{id} - get user
        (&Method::GET, ["users", user_id]) => users::get_user(store, user_id).await,
        // PUT /users/{id} - update user
        (&Method::PUT, ["users", user_id]) => {
            users::update_user(store, photos, user_id, content_type, body).await
        }
        // DELETE /users/{id} - delete user
        (&Method::DELETE, ["users", user_id]) => {
            users::delete_user(store, photos, user_id).await
        }

        // GET /health - database probe
        (&Method::GET, ["health"]) => users::health(store).await,

        (_, ["users"]) | (_, ["users", _]) | (_, ["health"]) => response::method_not_allowed(),
        _ => {
            tracing::warn!("⚠️ No route matched - Method: {} Path: {}", method, path);
            response::not_found()
        }
    }
}
