use std::net::TcpListener;
use std::sync::Arc;
use secrecy::ExposeSecret;
use sqlx::postgres::PgPoolOptions;
use std::time::Duration;

use veri_backend::run;
use veri_backend::config::settings::get_config;
use veri_backend::db::PgIngestionStore;
use veri_backend::services::RedisService;
use veri_backend::telemetry::{get_subscriber, init_subscriber};

#[tokio::main]
async fn main() -> std::io::Result<()> {
    // Panic if we can't read the config or production is missing its signing secret
    let config = get_config().expect("Failed to read the config.");

    let subscriber = get_subscriber(
        "veri-backend".into(),
        config.application.log_level.clone(),
        std::io::stdout
    );
    init_subscriber(subscriber);

    if config.ingestion.signing_secret.is_none() {
        tracing::warn!("No ingestion signing secret configured - upload signatures will not be verified (local only)");
    }

    // Redis only carries dashboard notifications, ingestion works without it
    let redis_client = match &config.redis {
        Some(settings) => match RedisService::new(settings) {
            Ok(service) => Some(service.client),
            Err(e) => {
                tracing::error!("Failed to create Redis client: {}. Ingestion events will not be published.", e);
                None
            }
        },
        None => None,
    };

    // Only try to establish connection when actually used
    let connection_pool = PgPoolOptions::new()
        .max_connections(32)
        .acquire_timeout(Duration::from_secs(10))
        .idle_timeout(Duration::from_secs(600))
        .max_lifetime(Duration::from_secs(1800))
        .connect_lazy(
            config.database.connection_string().expose_secret()
        )
        .expect("Failed to create Postgres connection pool");
    let store = PgIngestionStore::new(connection_pool);
    if let Err(e) = store.migrate().await {
        tracing::error!("Failed to run database migrations: {}", e);
        std::process::exit(1);
    }

    let address = format!("{}:{}", config.application.host, config.application.port);
    let listener = TcpListener::bind(&address)?;
    tracing::info!("Ingestion endpoint listening on {}", address);

    run(
        listener,
        Arc::new(store),
        config.ingestion,
        redis_client,
        config.application.allowed_origins,
    )?.await
}
