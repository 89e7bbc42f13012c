use lambda_http::{http::StatusCode, Body, Error, Response};

use crate::db::UserStore;
use crate::error::{ApiError, ApiResult};
use crate::form::parse_user_form;
use crate::response;
use crate::s3::PhotoStore;
use crate::types::{ApiEnvelope, HealthStatus, PhotoUpload, User};

/// Parse the `{id}` path segment
pub fn parse_user_id(raw: &str) -> ApiResult<i64> {
    raw.trim()
        .parse::<i64>()
        .map_err(|_| ApiError::Validation("Invalid user ID".to_string()))
}

fn user_not_found(id: i64) -> ApiError {
    ApiError::NotFound(format!("User with ID {} not found", id))
}

/// Best-effort photo removal, a failure here never fails the request
async fn discard_photo(photos: &dyn PhotoStore, url: &str) {
    tracing::info!("Deleting photo: {}", url);
    if let Err(e) = photos.remove(url).await {
        tracing::warn!("⚠️ Could not delete photo {}: {}", url, e);
    }
}

async fn upload_photo(photos: &dyn PhotoStore, photo: PhotoUpload) -> ApiResult<String> {
    tracing::info!("Uploading photo: {}", photo.file_name);
    let url = photos
        .store(&photo.file_name, photo.bytes, &photo.content_type)
        .await?;
    tracing::info!("Photo uploaded: {}", url);
    Ok(url)
}

/// POST /users
pub async fn create_user(
    users: &dyn UserStore,
    photos: &dyn PhotoStore,
    content_type: Option<&str>,
    body: &[u8],
) -> Result<Response<Body>, Error> {
    tracing::info!("HTTP trigger: Creating new user");

    match try_create_user(users, photos, content_type, body).await {
        Ok(user) => {
            tracing::info!("✅ User created successfully: ID {}", user.id);
            response::json(
                StatusCode::CREATED,
                &ApiEnvelope::ok(Some("User created successfully".to_string()), Some(user)),
            )
        }
        Err(e) => response::from_error(&e, "Failed to create user"),
    }
}

async fn try_create_user(
    users: &dyn UserStore,
    photos: &dyn PhotoStore,
    content_type: Option<&str>,
    body: &[u8],
) -> ApiResult<User> {
    let form = parse_user_form(content_type, body).await?;
    let name = form.validated_name()?;

    let photo_url = match form.photo {
        Some(photo) => {
            photo.validate()?;
            Some(upload_photo(photos, photo).await?)
        }
        None => None,
    };

    // An insert failure here orphans the uploaded photo
    users.insert_user(&name, photo_url.as_deref()).await
}

/// GET /users/{id}
pub async fn get_user(users: &dyn UserStore, raw_id: &str) -> Result<Response<Body>, Error> {
    tracing::info!("HTTP trigger: Getting user with ID: {}", raw_id);

    match try_get_user(users, raw_id).await {
        Ok(user) => {
            tracing::info!("User found: {}", user.name);
            response::json(StatusCode::OK, &ApiEnvelope::ok(None, Some(user)))
        }
        Err(e) => response::from_error(&e, "Failed to retrieve user"),
    }
}

async fn try_get_user(users: &dyn UserStore, raw_id: &str) -> ApiResult<User> {
    let id = parse_user_id(raw_id)?;
    users.find_user(id).await?.ok_or_else(|| user_not_found(id))
}

/// PUT /users/{id}
pub async fn update_user(
    users: &dyn UserStore,
    photos: &dyn PhotoStore,
    raw_id: &str,
    content_type: Option<&str>,
    body: &[u8],
) -> Result<Response<Body>, Error> {
    tracing::info!("HTTP trigger: Updating user with ID: {}", raw_id);

    match try_update_user(users, photos, raw_id, content_type, body).await {
        Ok(user) => {
            tracing::info!("✅ User updated successfully: ID {}", user.id);
            response::json(
                StatusCode::OK,
                &ApiEnvelope::ok(Some("User updated successfully".to_string()), Some(user)),
            )
        }
        Err(e) => response::from_error(&e, "Failed to update user"),
    }
}

async fn try_update_user(
    users: &dyn UserStore,
    photos: &dyn PhotoStore,
    raw_id: &str,
    content_type: Option<&str>,
    body: &[u8],
) -> ApiResult<User> {
    let id = parse_user_id(raw_id)?;
    let existing = users.find_user(id).await?.ok_or_else(|| user_not_found(id))?;

    let form = parse_user_form(content_type, body).await?;
    let name = form.validated_name()?;

    let photo_url = match form.photo {
        Some(photo) => {
            photo.validate()?;
            // Old photo goes first; if the upload then fails the row still
            // points at it until the next successful update
            if let Some(old) = existing.photo_url.as_deref() {
                discard_photo(photos, old).await;
            }
            Some(upload_photo(photos, photo).await?)
        }
        None => existing.photo_url,
    };

    users
        .update_user(id, &name, photo_url.as_deref())
        .await?
        .ok_or_else(|| user_not_found(id))
}

/// DELETE /users/{id}
pub async fn delete_user(
    users: &dyn UserStore,
    photos: &dyn PhotoStore,
    raw_id: &str,
) -> Result<Response<Body>, Error> {
    tracing::info!("HTTP trigger: Deleting user with ID: {}", raw_id);

    match try_delete_user(users, photos, raw_id).await {
        Ok(user) => {
            tracing::info!(
                "✅ User deleted successfully: ID {}, Name: {}",
                user.id,
                user.name
            );
            response::json(
                StatusCode::OK,
                &ApiEnvelope::<()>::ok(
                    Some(format!("User '{}' deleted successfully", user.name)),
                    None,
                ),
            )
        }
        Err(e) => response::from_error(&e, "Failed to delete user"),
    }
}

async fn try_delete_user(
    users: &dyn UserStore,
    photos: &dyn PhotoStore,
    raw_id: &str,
) -> ApiResult<User> {
    let id = parse_user_id(raw_id)?;
    let user = users.find_user(id).await?.ok_or_else(|| user_not_found(id))?;

    if let Some(url) = user.photo_url.as_deref() {
        discard_photo(photos, url).await;
    }

    users.delete_user(id).await?;
    Ok(user)
}

/// GET /health
pub async fn health(users: &dyn UserStore) -> Result<Response<Body>, Error> {
    if users.ping().await {
        response::json(
            StatusCode::OK,
            &ApiEnvelope::ok(
                None,
                Some(HealthStatus {
                    database: "up".to_string(),
                }),
            ),
        )
    } else {
        response::json(
            StatusCode::SERVICE_UNAVAILABLE,
            &ApiEnvelope::failure("Database unavailable", None),
        )
    }
}
