use std::sync::Arc;

use sqlx::postgres::PgPoolOptions;
use tokio::net::TcpListener;
use tracing_subscriber::{layer::SubscriberExt, util::SubscriberInitExt};
use youth_site_backend::{
    AppState, Backend,
    auth::{AuthState, SupabaseAuthClient},
    config::{AppConfig, Env, SupabaseConfig},
    create_router,
    repository::{PostgresRepository, RepositoryState},
    storage::{S3StorageClient, StorageState},
};

/// main
///
/// Loads configuration, initialises logging, wires the platform clients (when
/// configured) and serves the router.
#[tokio::main]
async fn main() {
    dotenv::dotenv().ok();
    let config = AppConfig::load();

    // RUST_LOG wins; otherwise verbose for this crate, request-level for tower_http.
    let env_filter = tracing_subscriber::EnvFilter::try_from_default_env()
        .unwrap_or_else(|_| "youth_site_backend=debug,tower_http=info".into());

    match config.env {
        Env::Local => {
            tracing_subscriber::registry()
                .with(env_filter)
                .with(tracing_subscriber::fmt::layer().pretty())
                .init();
        }
        Env::Production => {
            tracing_subscriber::registry()
                .with(env_filter)
                .with(tracing_subscriber::fmt::layer().json())
                .init();
        }
    }

    tracing::info!("Application starting in {:?} mode", config.env);

    let backend = match config.supabase.as_ref() {
        Some(supabase) => match build_backend(supabase, &config.storage_bucket) {
            Ok(backend) => Some(backend),
            Err(err) => {
                tracing::error!(error = %err, "invalid DATABASE_URL, running unconfigured");
                None
            }
        },
        None => {
            tracing::warn!(
                "Supabase not configured: data routes answer 500 and the admin gate passes through"
            );
            None
        }
    };

    let bind_addr = config.bind_addr.clone();
    let app = create_router(AppState { config, backend });

    let listener = match TcpListener::bind(&bind_addr).await {
        Ok(listener) => listener,
        Err(err) => {
            tracing::error!(error = %err, addr = %bind_addr, "failed to bind listener");
            return;
        }
    };

    tracing::info!("Listening on {}", bind_addr);
    tracing::info!("API Documentation (Swagger UI) available at /swagger-ui");

    if let Err(err) = axum::serve(listener, app).await {
        tracing::error!(error = %err, "server terminated");
    }
}

/// Builds the platform clients. The pool connects lazily, so an unreachable
/// database surfaces as per-request store errors rather than a startup crash.
fn build_backend(supabase: &SupabaseConfig, bucket: &str) -> Result<Backend, sqlx::Error> {
    let pool = PgPoolOptions::new()
        .max_connections(5)
        .connect_lazy(&supabase.db_url)?;
    let repo = Arc::new(PostgresRepository::new(pool)) as RepositoryState;

    let auth = Arc::new(SupabaseAuthClient::new(
        &supabase.url,
        &supabase.anon_key,
        supabase.service_role_key.clone(),
        supabase.jwt_secret.clone(),
    )) as AuthState;

    // Storage S3 keys default to the service key, which the gateway also accepts.
    let service_key = supabase.service_role_key.clone().unwrap_or_default();
    let access_key = supabase
        .s3_access_key
        .clone()
        .unwrap_or_else(|| service_key.clone());
    let secret_key = supabase.s3_secret_key.clone().unwrap_or(service_key);
    let storage = Arc::new(S3StorageClient::new(
        &supabase.s3_endpoint(),
        &supabase.s3_region,
        &access_key,
        &secret_key,
        bucket,
        &supabase.public_object_base(bucket),
    )) as StorageState;

    Ok(Backend {
        repo,
        auth,
        storage,
    })
}
