use std::net::SocketAddr;
use std::sync::Arc;
use std::time::Duration;

use anyhow::Result;
use aws_config::Region;
use aws_sdk_s3::config::Credentials;
use tower_http::{cors::CorsLayer, trace::TraceLayer};
use tracing::info;
use tracing_subscriber::{layer::SubscriberExt, util::SubscriberInitExt, EnvFilter};

use storytime::config::Config;
use storytime::db::create_pool;
use storytime::export::ExportRenderer;
use storytime::illustration::{ImageGenerationClient, PageImageSynchronizer};
use storytime::image_client::{self, OpenAiImageProvider};
use storytime::routes::build_router;
use storytime::state::AppState;
use storytime::storage::{HttpImageFetcher, S3ObjectStore};
use storytime::store::PgStoryStore;

#[tokio::main]
async fn main() -> Result<()> {
    // Load configuration first (fails on missing required env vars)
    let config = Config::from_env()?;

    // Initialize structured logging
    tracing_subscriber::registry()
        .with(EnvFilter::try_from_default_env().unwrap_or_else(|_| {
            EnvFilter::new(format!("{}={}", env!("CARGO_PKG_NAME"), &config.rust_log))
        }))
        .with(tracing_subscriber::fmt::layer())
        .init();

    info!("Starting Storytime API v{}", env!("CARGO_PKG_VERSION"));

    // Initialize PostgreSQL
    let db = create_pool(&config.database_url).await?;
    let store = Arc::new(PgStoryStore::new(db));

    // Initialize S3 / MinIO
    let s3 = build_s3_client(&config).await;
    let objects = Arc::new(S3ObjectStore::new(s3, config.s3_public_url.clone()));
    info!("S3 client initialized");

    let fetcher = Arc::new(HttpImageFetcher::new(Duration::from_secs(
        config.image_fetch_timeout_secs,
    ))?);

    // Initialize image provider
    let provider = Arc::new(OpenAiImageProvider::new(config.openai_api_key.clone())?);
    info!("Image provider initialized (model: {})", image_client::MODEL);

    let images = Arc::new(ImageGenerationClient::new(
        provider,
        store.clone(),
        objects.clone(),
        fetcher.clone(),
        config.image_bucket.clone(),
    ));
    let sync = Arc::new(PageImageSynchronizer::new(images.clone(), store.clone()));
    let exports = Arc::new(ExportRenderer::new(
        store.clone(),
        objects.clone(),
        fetcher,
        config.pdf_bucket.clone(),
    ));

    // Build app state
    let state = AppState {
        store,
        objects,
        images,
        sync,
        exports,
        config: config.clone(),
    };

    // Build router
    let app = build_router(state)
        .layer(TraceLayer::new_for_http())
        .layer(CorsLayer::permissive());

    let addr: SocketAddr = format!("0.0.0.0:{}", config.port).parse()?;
    info!("Listening on {addr}");

    let listener = tokio::net::TcpListener::bind(addr).await?;
    axum::serve(listener, app).await?;

    Ok(())
}

/// Constructs an S3 client configured for MinIO (local) or AWS (production).
async fn build_s3_client(config: &Config) -> aws_sdk_s3::Client {
    let credentials = Credentials::new(
        &config.aws_access_key_id,
        &config.aws_secret_access_key,
        None,
        None,
        "storytime-static",
    );

    let s3_config = aws_config::defaults(aws_config::BehaviorVersion::latest())
        .region(Region::new("us-east-1"))
        .credentials_provider(credentials)
        .endpoint_url(&config.s3_endpoint)
        .load()
        .await;

    // MinIO serves buckets by path, not virtual host.
    let s3_config = aws_sdk_s3::config::Builder::from(&s3_config)
        .force_path_style(true)
        .build();

    aws_sdk_s3::Client::from_conf(s3_config)
}
