//! MySQL persistence for the `users` table.
//!
//! [`Database`] is a thin wrapper over a `sqlx` pool: statements go out
//! with positional `?` placeholders and every value is bound, never
//! formatted into the SQL text.

use std::str::FromStr;

use async_trait::async_trait;
use sqlx::mysql::{MySqlArguments, MySqlConnectOptions, MySqlPoolOptions, MySqlRow};
use sqlx::pool::PoolConnection;
use sqlx::query::{Query, QueryAs};
use sqlx::{Connection, FromRow, MySql, MySqlPool};

use crate::config::{Config, DatabaseTarget};
use crate::error::{ApiError, ApiResult};
use crate::types::User;

const SCHEMA: &str = r#"
CREATE TABLE IF NOT EXISTS users (
    id BIGINT NOT NULL AUTO_INCREMENT,
    nama VARCHAR(255) NOT NULL,
    foto TEXT NULL,
    created_at TIMESTAMP NOT NULL DEFAULT CURRENT_TIMESTAMP,
    updated_at TIMESTAMP NOT NULL DEFAULT CURRENT_TIMESTAMP ON UPDATE CURRENT_TIMESTAMP,
    PRIMARY KEY (id)
)
"#;

/// A positional statement parameter
#[derive(Debug, Clone, PartialEq)]
pub enum SqlParam {
    Int(i64),
    Text(String),
    NullableText(Option<String>),
}

/// What a write statement reports back
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct MutationSummary {
    pub last_insert_id: u64,
    pub rows_affected: u64,
}

/// Pooled connection to the relational store
#[derive(Clone)]
pub struct Database {
    pool: MySqlPool,
}

impl Database {
    /// Build the pool. Connections are opened on first use, and callers
    /// queue for a free slot once `connection_limit` are in flight.
    pub fn connect(config: &Config) -> ApiResult<Self> {
        let options = connect_options(&config.database)?;
        let pool = MySqlPoolOptions::new()
            .max_connections(config.connection_limit)
            .connect_lazy_with(options);

        Ok(Self { pool })
    }

    pub fn from_pool(pool: MySqlPool) -> Self {
        Self { pool }
    }

    /// Create the `users` table if it is missing
    pub async fn ensure_schema(&self) -> ApiResult<()> {
        self.execute(SCHEMA, &[]).await?;
        Ok(())
    }

    /// Run a write statement
    pub async fn execute(
        &self,
        statement: &str,
        params: &[SqlParam],
    ) -> ApiResult<MutationSummary> {
        let result = bind_params(sqlx::query(statement), params)
            .execute(&self.pool)
            .await
            .map_err(|e| {
                tracing::error!("Database query error: {}", e);
                ApiError::Persistence(e)
            })?;

        Ok(MutationSummary {
            last_insert_id: result.last_insert_id(),
            rows_affected: result.rows_affected(),
        })
    }

    /// Run a read statement and map every row
    pub async fn fetch_all<T>(&self, statement: &str, params: &[SqlParam]) -> ApiResult<Vec<T>>
    where
        T: for<'r> FromRow<'r, MySqlRow> + Send + Unpin,
    {
        bind_params_as(sqlx::query_as::<_, T>(statement), params)
            .fetch_all(&self.pool)
            .await
            .map_err(|e| {
                tracing::error!("Database query error: {}", e);
                ApiError::Persistence(e)
            })
    }

    /// Check out a single connection. It goes back to the pool on drop.
    pub async fn acquire(&self) -> ApiResult<PoolConnection<MySql>> {
        self.pool.acquire().await.map_err(|e| {
            tracing::error!("Database connection error: {}", e);
            ApiError::Persistence(e)
        })
    }

    pub async fn health_check(&self) -> bool {
        let mut conn = match self.acquire().await {
            Ok(conn) => conn,
            Err(_) => return false,
        };

        match conn.ping().await {
            Ok(()) => true,
            Err(e) => {
                tracing::error!("Database connection test failed: {}", e);
                false
            }
        }
    }
}

fn connect_options(target: &DatabaseTarget) -> ApiResult<MySqlConnectOptions> {
    match target {
        DatabaseTarget::Url(url) => MySqlConnectOptions::from_str(url)
            .map_err(|e| ApiError::Config(format!("Invalid DATABASE_URL: {}", e))),
        DatabaseTarget::Parts {
            host,
            port,
            user,
            password,
            database,
        } => {
            let mut options = MySqlConnectOptions::new()
                .host(host)
                .port(*port)
                .username(user)
                .password(password);
            if !database.is_empty() {
                options = options.database(database);
            }
            Ok(options)
        }
    }
}

fn bind_params<'q>(
    mut query: Query<'q, MySql, MySqlArguments>,
    params: &[SqlParam],
) -> Query<'q, MySql, MySqlArguments> {
    for param in params {
        query = match param {
            SqlParam::Int(v) => query.bind(*v),
            SqlParam::Text(v) => query.bind(v.clone()),
            SqlParam::NullableText(v) => query.bind(v.clone()),
        };
    }
    query
}

fn bind_params_as<'q, T>(
    mut query: QueryAs<'q, MySql, T, MySqlArguments>,
    params: &[SqlParam],
) -> QueryAs<'q, MySql, T, MySqlArguments> {
    for param in params {
        query = match param {
            SqlParam::Int(v) => query.bind(*v),
            SqlParam::Text(v) => query.bind(v.clone()),
            SqlParam::NullableText(v) => query.bind(v.clone()),
        };
    }
    query
}

// ========== USER STORE ==========

/// Row-level operations the handlers need from the relational store
#[async_trait]
pub trait UserStore: Send + Sync {
    async fn find_user(&self, id: i64) -> ApiResult<Option<User>>;

    /// Insert a row and return it as stored, timestamps included
    async fn insert_user(&self, name: &str, photo_url: Option<&str>) -> ApiResult<User>;

    /// Replace name and photo; `None` if the row vanished in the meantime
    async fn update_user(
        &self,
        id: i64,
        name: &str,
        photo_url: Option<&str>,
    ) -> ApiResult<Option<User>>;

    async fn delete_user(&self, id: i64) -> ApiResult<bool>;

    async fn ping(&self) -> bool;
}

#[async_trait]
impl UserStore for Database {
    async fn find_user(&self, id: i64) -> ApiResult<Option<User>> {
        let users: Vec<User> = self
            .fetch_all(
                "SELECT id, nama, foto, created_at, updated_at FROM users WHERE id = ?",
                &[SqlParam::Int(id)],
            )
            .await?;

        Ok(users.into_iter().next())
    }

    async fn insert_user(&self, name: &str, photo_url: Option<&str>) -> ApiResult<User> {
        let summary = self
            .execute(
                "INSERT INTO users (nama, foto) VALUES (?, ?)",
                &[
                    SqlParam::Text(name.to_string()),
                    SqlParam::NullableText(photo_url.map(str::to_string)),
                ],
            )
            .await?;

        let id = i64::try_from(summary.last_insert_id).map_err(|_| {
            ApiError::Persistence(sqlx::Error::Protocol(format!(
                "insert id {} out of range",
                summary.last_insert_id
            )))
        })?;

        self.find_user(id)
            .await?
            .ok_or(ApiError::Persistence(sqlx::Error::RowNotFound))
    }

    async fn update_user(
        &self,
        id: i64,
        name: &str,
        photo_url: Option<&str>,
    ) -> ApiResult<Option<User>> {
        // MySQL reports 0 affected rows when nothing changed, so re-read
        // instead of trusting the count
        self.execute(
            "UPDATE users SET nama = ?, foto = ?, updated_at = CURRENT_TIMESTAMP WHERE id = ?",
            &[
                SqlParam::Text(name.to_string()),
                SqlParam::NullableText(photo_url.map(str::to_string)),
                SqlParam::Int(id),
            ],
        )
        .await?;

        self.find_user(id).await
    }

    async fn delete_user(&self, id: i64) -> ApiResult<bool> {
        let summary = self
            .execute("DELETE FROM users WHERE id = ?", &[SqlParam::Int(id)])
            .await?;
        Ok(summary.rows_affected > 0)
    }

    async fn ping(&self) -> bool {
        self.health_check().await
    }
}
