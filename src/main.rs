use rental_marketplace::{
    AppState,
    config::{AppConfig, Env, StorageBackend},
    create_router,
    identity::{IdentityState, MockIdentityProvider, SupabaseIdentityClient},
    payments::{MockPaymentProvider, PaymentState, StripeClient},
    repository::{PostgresRepository, RepositoryState},
    storage::{LocalDiskStorage, S3StorageClient, StorageState},
};
use sqlx::postgres::PgPoolOptions;
use std::sync::Arc;
use tokio::net::TcpListener;
use tracing_subscriber::{layer::SubscriberExt, util::SubscriberInitExt};

/// main
///
/// Startup sequence: configuration, logging, database and migrations, external
/// providers, then the HTTP server.
#[tokio::main]
async fn main() {
    // 1. Configuration (fail-fast on missing production secrets).
    dotenv::dotenv().ok();
    let config = AppConfig::load();

    // 2. Logging. RUST_LOG wins over the default filter.
    let env_filter = tracing_subscriber::EnvFilter::try_from_default_env()
        .unwrap_or_else(|_| "rental_marketplace=debug,tower_http=info".into());

    match config.env {
        Env::Local => {
            tracing_subscriber::registry()
                .with(env_filter)
                .with(tracing_subscriber::fmt::layer().pretty())
                .init();
        }
        Env::Production => {
            // JSON lines for the log aggregator.
            tracing_subscriber::registry()
                .with(env_filter)
                .with(tracing_subscriber::fmt::layer().json())
                .init();
        }
    }

    tracing::info!("Application starting in {:?} mode", config.env);

    // 3. Database and schema.
    let pool = PgPoolOptions::new()
        .max_connections(5)
        .connect(&config.db_url)
        .await
        .expect("FATAL: Failed to connect to Postgres. Check DATABASE_URL.");

    sqlx::migrate!("./migrations")
        .run(&pool)
        .await
        .expect("FATAL: Database migrations failed.");

    let repo = Arc::new(PostgresRepository::new(pool)) as RepositoryState;

    // 4. Image storage.
    let storage: StorageState = match &config.storage {
        StorageBackend::Local => Arc::new(LocalDiskStorage::new(
            config.upload.directory.clone(),
            &config.public_url,
        )),
        StorageBackend::S3(s3) => Arc::new(S3StorageClient::new(s3)),
    };
    storage
        .ensure_ready()
        .await
        .expect("FATAL: Upload storage is not writable.");

    // 5. External providers. Local runs without keys fall back to in-process doubles.
    let payments: PaymentState = match &config.stripe {
        Some(stripe) => Arc::new(StripeClient::new(stripe)),
        None => {
            tracing::warn!("STRIPE keys not set; using the mock payment provider");
            Arc::new(MockPaymentProvider::new())
        }
    };
    let identity: IdentityState = match &config.identity {
        Some(identity) => Arc::new(SupabaseIdentityClient::new(identity)),
        None => {
            tracing::warn!("SUPABASE_URL/SUPABASE_KEY not set; using the mock identity provider");
            Arc::new(MockIdentityProvider::new())
        }
    };

    // 6. Router and server.
    let bind_addr = config.bind_addr.clone();
    let app = create_router(AppState {
        repo,
        storage,
        payments,
        identity,
        config,
    });

    let listener = TcpListener::bind(&bind_addr)
        .await
        .unwrap_or_else(|e| panic!("FATAL: Cannot bind {}: {}", bind_addr, e));

    tracing::info!("Listening on {}", bind_addr);
    tracing::info!("API Documentation (Swagger UI) available at /swagger-ui");

    if let Err(e) = axum::serve(listener, app).await {
        tracing::error!(error = %e, "server terminated");
    }
}
