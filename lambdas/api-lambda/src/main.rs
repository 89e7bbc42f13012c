use aws_sdk_s3::Client as S3Client;
use lambda_http::{run, service_fn, Error, Request};
use std::sync::Arc;
use users_shared::config::Config;
use users_shared::db::Database;
use users_shared::s3::PhotoBucket;
use users_shared::AppState;

mod http_handler;

#[tokio::main]
async fn main() -> Result<(), Error> {
    lambda_http::tracing::init_default_subscriber();

    // Pool and S3 client are built once per cold start and shared by every invocation
    let config = Config::from_env()?;

    let database = Database::connect(&config)?;
    if let Err(e) = database.ensure_schema().await {
        tracing::warn!("⚠️ Could not ensure users table exists: {}", e);
    }

    let aws_config = aws_config::load_from_env().await;
    let s3_client = match &config.s3_endpoint {
        Some(endpoint) => {
            let s3_config = aws_sdk_s3::config::Builder::from(&aws_config)
                .endpoint_url(endpoint)
                .force_path_style(true)
                .build();
            S3Client::from_conf(s3_config)
        }
        None => S3Client::new(&aws_config),
    };

    tracing::info!(
        "Users API ready - bucket: {}, pool size: {}",
        config.bucket,
        config.connection_limit
    );

    let state = AppState::new(
        Arc::new(database),
        Arc::new(PhotoBucket::new(s3_client, &config)),
    );

    run(service_fn(move |event: Request| {
        let state = Arc::clone(&state);
        async move { http_handler::function_handler(event, state).await }
    }))
    .await
}
