//! Multipart form boundary for the user endpoints.
//!
//! The request body is parsed into a typed [`UserForm`] before any
//! handler logic runs, and the validation rules for the name and photo
//! live next to it.

use bytes::Bytes;

use crate::error::{ApiError, ApiResult};
use crate::types::{PhotoUpload, UserForm, ALLOWED_PHOTO_TYPES, MAX_PHOTO_BYTES};

const NAME_FIELDS: [&str; 2] = ["nama", "name"];
const PHOTO_FIELDS: [&str; 2] = ["foto", "photo"];

/// Parse a `multipart/form-data` body into a [`UserForm`].
pub async fn parse_user_form(content_type: Option<&str>, body: &[u8]) -> ApiResult<UserForm> {
    let content_type =
        content_type.ok_or_else(|| ApiError::Form("Missing Content-Type".to_string()))?;

    if !content_type
        .trim_start()
        .to_ascii_lowercase()
        .starts_with("multipart/form-data")
    {
        return Err(ApiError::Form("Expected multipart/form-data".to_string()));
    }

    let boundary =
        multer::parse_boundary(content_type).map_err(|e| ApiError::Form(e.to_string()))?;

    let body = Bytes::copy_from_slice(body);
    let stream = futures_util::stream::once(async move { Ok::<_, std::io::Error>(body) });
    let mut multipart = multer::Multipart::new(stream, boundary);

    let mut form = UserForm::default();
    let mut photo_seen = false;

    while let Some(field) = multipart
        .next_field()
        .await
        .map_err(|e| ApiError::Form(format!("Failed to parse multipart: {}", e)))?
    {
        let name = field.name().unwrap_or("").to_string();

        if NAME_FIELDS.contains(&name.as_str()) {
            let text = field
                .text()
                .await
                .map_err(|e| ApiError::Form(format!("Failed to read {}: {}", name, e)))?;
            if form.name.is_none() {
                form.name = Some(text);
            }
        } else if PHOTO_FIELDS.contains(&name.as_str()) {
            // A plain text value under the photo name is not an upload
            let Some(file_name) = field.file_name().map(str::to_string) else {
                continue;
            };
            let content_type = field
                .content_type()
                .map(|mime| mime.essence_str().to_string())
                .unwrap_or_default();
            let bytes = field
                .bytes()
                .await
                .map_err(|e| ApiError::Form(format!("Failed to read {}: {}", name, e)))?;

            // Only the first file part counts; an empty one means "no photo"
            if !photo_seen {
                photo_seen = true;
                if !bytes.is_empty() {
                    form.photo = Some(PhotoUpload {
                        file_name,
                        content_type,
                        bytes: bytes.to_vec(),
                    });
                }
            }
        }
    }

    Ok(form)
}

impl UserForm {
    /// Trimmed name, or the validation error every write endpoint reports.
    pub fn validated_name(&self) -> ApiResult<String> {
        match self.name.as_deref().map(str::trim) {
            Some(name) if !name.is_empty() => Ok(name.to_string()),
            _ => Err(ApiError::Validation(
                "Nama is required and cannot be empty".to_string(),
            )),
        }
    }
}

impl PhotoUpload {
    pub fn validate(&self) -> ApiResult<()> {
        let content_type = self.content_type.trim().to_ascii_lowercase();
        if !ALLOWED_PHOTO_TYPES.contains(&content_type.as_str()) {
            return Err(ApiError::Validation(
                "Invalid file type. Only JPEG, PNG, GIF, and WebP are allowed".to_string(),
            ));
        }

        if self.size() > MAX_PHOTO_BYTES {
            return Err(ApiError::Validation(
                "File size must not exceed 5MB".to_string(),
            ));
        }

        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::testing::{file_part, finish_form, text_part, FORM_CONTENT_TYPE};

    fn photo(content_type: &str, size: usize) -> PhotoUpload {
        PhotoUpload {
            file_name: "me.png".into(),
            content_type: content_type.into(),
            bytes: vec![0u8; size],
        }
    }

    #[tokio::test]
    async fn test_parses_name_and_photo() {
        let body = finish_form(vec![
            text_part("nama", " Bob "),
            file_part("foto", "bob.png", "image/png", b"\x89PNG"),
        ]);
        let form = parse_user_form(Some(FORM_CONTENT_TYPE), &body).await.unwrap();

        assert_eq!(form.name.as_deref(), Some(" Bob "));
        assert_eq!(form.validated_name().unwrap(), "Bob");
        let photo = form.photo.unwrap();
        assert_eq!(photo.file_name, "bob.png");
        assert_eq!(photo.content_type, "image/png");
        assert_eq!(photo.bytes, b"\x89PNG");
    }

    #[tokio::test]
    async fn test_accepts_english_field_names() {
        let body = finish_form(vec![
            text_part("name", "Alice"),
            file_part("photo", "a.gif", "image/gif", b"GIF89a"),
            text_part("ignored", "x"),
        ]);
        let form = parse_user_form(Some(FORM_CONTENT_TYPE), &body).await.unwrap();

        assert_eq!(form.name.as_deref(), Some("Alice"));
        assert_eq!(form.photo.unwrap().content_type, "image/gif");
    }

    #[tokio::test]
    async fn test_empty_photo_is_absent() {
        let body = finish_form(vec![
            text_part("nama", "Carol"),
            file_part("foto", "", "application/octet-stream", b""),
        ]);
        let form = parse_user_form(Some(FORM_CONTENT_TYPE), &body).await.unwrap();

        assert!(form.photo.is_none());
    }

    #[tokio::test]
    async fn test_text_photo_field_is_ignored() {
        let body = finish_form(vec![
            text_part("nama", "Dana"),
            text_part("foto", "not-a-file"),
            file_part("photo", "d.webp", "image/webp", b"RIFF"),
        ]);
        let form = parse_user_form(Some(FORM_CONTENT_TYPE), &body).await.unwrap();
        assert_eq!(form.photo.unwrap().file_name, "d.webp");

        let body = finish_form(vec![text_part("nama", "Dana"), text_part("foto", "not-a-file")]);
        let form = parse_user_form(Some(FORM_CONTENT_TYPE), &body).await.unwrap();
        assert!(form.photo.is_none());
    }

    #[tokio::test]
    async fn test_rejects_non_multipart() {
        let err = parse_user_form(Some("application/json"), b"{}")
            .await
            .unwrap_err();
        assert!(matches!(err, ApiError::Form(_)));

        let err = parse_user_form(None, b"").await.unwrap_err();
        assert!(matches!(err, ApiError::Form(_)));
    }

    #[test]
    fn test_name_validation() {
        let blank = UserForm {
            name: Some("   ".into()),
            photo: None,
        };
        assert!(matches!(blank.validated_name(), Err(ApiError::Validation(_))));
        assert!(matches!(
            UserForm::default().validated_name(),
            Err(ApiError::Validation(_))
        ));
    }

    #[test]
    fn test_photo_type_validation() {
        for ok in ["image/jpeg", "image/jpg", "image/png", "image/gif", "IMAGE/WEBP"] {
            assert!(photo(ok, 10).validate().is_ok(), "{} should pass", ok);
        }
        let err = photo("application/pdf", 10).validate().unwrap_err();
        assert_eq!(
            err.to_string(),
            "Invalid file type. Only JPEG, PNG, GIF, and WebP are allowed"
        );
        assert!(photo("", 10).validate().is_err());
    }

    #[test]
    fn test_photo_size_limit() {
        assert!(photo("image/png", MAX_PHOTO_BYTES).validate().is_ok());
        let err = photo("image/png", MAX_PHOTO_BYTES + 1).validate().unwrap_err();
        assert_eq!(err.to_string(), "File size must not exceed 5MB");
    }
}
