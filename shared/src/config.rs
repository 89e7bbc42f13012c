use std::env;

use crate::error::{ApiError, ApiResult};

const DEFAULT_DB_HOST: &str = "localhost";
const DEFAULT_DB_PORT: u16 = 3306;
const DEFAULT_CONNECTION_LIMIT: u32 = 10;
pub const DEFAULT_CONTAINER_NAME: &str = "user-photos";

/// Where the relational store lives
#[derive(Debug, Clone, PartialEq)]
pub enum DatabaseTarget {
    Url(String),
    Parts {
        host: String,
        port: u16,
        user: String,
        password: String,
        database: String,
    },
}

/// Process-wide settings, read once at cold start
#[derive(Debug, Clone)]
pub struct Config {
    pub database: DatabaseTarget,
    pub connection_limit: u32,
    pub bucket: String,
    pub s3_endpoint: Option<String>,
    pub photo_base_url: String,
}

impl Config {
    pub fn from_env() -> ApiResult<Self> {
        Self::from_lookup(|key| env::var(key).ok())
    }

    /// Builds the config from any key lookup. `from_env` passes the process
    /// environment, tests pass a map.
    pub fn from_lookup<F>(lookup: F) -> ApiResult<Self>
    where
        F: Fn(&str) -> Option<String>,
    {
        let get = |key: &str| lookup(key).filter(|v| !v.trim().is_empty());

        let database = match get("DATABASE_URL") {
            Some(url) => DatabaseTarget::Url(url),
            None => DatabaseTarget::Parts {
                host: get("DB_HOST").unwrap_or_else(|| DEFAULT_DB_HOST.to_string()),
                port: parse_number(get("DB_PORT"), "DB_PORT", DEFAULT_DB_PORT)?,
                user: get("DB_USER").unwrap_or_default(),
                password: get("DB_PASSWORD").unwrap_or_default(),
                database: get("DB_NAME").unwrap_or_default(),
            },
        };

        let connection_limit = parse_number(
            get("DB_CONNECTION_LIMIT"),
            "DB_CONNECTION_LIMIT",
            DEFAULT_CONNECTION_LIMIT,
        )?;
        if connection_limit == 0 {
            return Err(ApiError::Config(
                "DB_CONNECTION_LIMIT must be at least 1".to_string(),
            ));
        }

        let bucket =
            get("BLOB_CONTAINER_NAME").unwrap_or_else(|| DEFAULT_CONTAINER_NAME.to_string());
        let s3_endpoint = get("S3_ENDPOINT").map(|e| e.trim_end_matches('/').to_string());

        let photo_base_url = match (get("PHOTO_BASE_URL"), &s3_endpoint) {
            (Some(base), _) => base.trim_end_matches('/').to_string(),
            (None, Some(endpoint)) => format!("{}/{}", endpoint, bucket),
            (None, None) => format!("https://{}.s3.amazonaws.com", bucket),
        };

        Ok(Self {
            database,
            connection_limit,
            bucket,
            s3_endpoint,
            photo_base_url,
        })
    }
}

fn parse_number<T: std::str::FromStr>(
    raw: Option<String>,
    key: &str,
    default: T,
) -> ApiResult<T> {
    match raw {
        None => Ok(default),
        Some(value) => value
            .trim()
            .parse()
            .map_err(|_| ApiError::Config(format!("{} must be a number, got '{}'", key, value))),
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::collections::HashMap;

    fn config_from(pairs: &[(&str, &str)]) -> ApiResult<Config> {
        let map: HashMap<String, String> = pairs
            .iter()
            .map(|(k, v)| (k.to_string(), v.to_string()))
            .collect();
        Config::from_lookup(|key| map.get(key).cloned())
    }

    #[test]
    fn test_defaults() {
        let config = config_from(&[]).unwrap();
        assert_eq!(config.bucket, "user-photos");
        assert_eq!(config.connection_limit, 10);
        assert_eq!(config.photo_base_url, "https://user-photos.s3.amazonaws.com");
        assert_eq!(
            config.database,
            DatabaseTarget::Parts {
                host: "localhost".into(),
                port: 3306,
                user: String::new(),
                password: String::new(),
                database: String::new(),
            }
        );
    }

    #[test]
    fn test_database_url_wins_over_parts() {
        let config = config_from(&[
            ("DATABASE_URL", "mysql://app:pw@db/users"),
            ("DB_HOST", "ignored"),
        ])
        .unwrap();
        assert_eq!(
            config.database,
            DatabaseTarget::Url("mysql://app:pw@db/users".into())
        );
    }

    #[test]
    fn test_custom_endpoint_drives_photo_base() {
        let config = config_from(&[
            ("S3_ENDPOINT", "http://localhost:9000/"),
            ("BLOB_CONTAINER_NAME", "avatars"),
        ])
        .unwrap();
        assert_eq!(config.s3_endpoint.as_deref(), Some("http://localhost:9000"));
        assert_eq!(config.photo_base_url, "http://localhost:9000/avatars");

        let config = config_from(&[("PHOTO_BASE_URL", "https://cdn.example.com/p/")]).unwrap();
        assert_eq!(config.photo_base_url, "https://cdn.example.com/p");
    }

    #[test]
    fn test_bad_numbers_are_rejected() {
        assert!(matches!(
            config_from(&[("DB_PORT", "mysql")]),
            Err(ApiError::Config(_))
        ));
        assert!(matches!(
            config_from(&[("DB_CONNECTION_LIMIT", "0")]),
            Err(ApiError::Config(_))
        ));
    }
}
