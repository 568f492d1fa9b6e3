#![allow(dead_code)]

use chrono::{DateTime, Duration, Utc};
use once_cell::sync::Lazy;
use secrecy::{ExposeSecret, SecretString};
use sqlx::{Connection, Executor, PgConnection, PgPool};
use std::net::TcpListener;
use std::sync::Arc;
use uuid::Uuid;

use veri_backend::run;
use veri_backend::config::ingestion::IngestionSettings;
use veri_backend::config::settings::{get_config, DatabaseSettings};
use veri_backend::db::{InMemoryIngestionStore, PgIngestionStore};
use veri_backend::models::device_assignment::DeviceAssignment;
use veri_backend::telemetry::{get_subscriber, init_subscriber};

pub const SIGNING_SECRET: &str = "test-signing-secret";

// Ensure that the `tracing` stack is only initialised once using `once_cell`
static TRACING: Lazy<()> = Lazy::new(|| {
    let default_filter_level = "info".to_string();
    let subscriber_name = "test".to_string();

    if std::env::var("TEST_LOG").is_ok() {
        let subscriber = get_subscriber(
            subscriber_name,
            default_filter_level,
            std::io::stdout
        );
        init_subscriber(subscriber);
    } else {
        let subscriber = get_subscriber(
            subscriber_name,
            default_filter_level,
            std::io::sink
        );
        init_subscriber(subscriber);
    }
});

pub struct TestApp {
    pub address: String,
    pub store: InMemoryIngestionStore,
}

impl TestApp {
    pub fn ingest_url(&self) -> String {
        format!("{}/wearables/ingest", self.address)
    }

    /// Assign `device_id` to a fresh patient, starting an hour ago.
    pub async fn assign_device(&self, device_id: &str) -> Uuid {
        let patient_id = Uuid::new_v4();
        self.store
            .add_assignment(DeviceAssignment::new(device_id, patient_id, Utc::now() - Duration::hours(1)))
            .await;
        patient_id
    }
}

pub fn signing_secret() -> SecretString {
    SecretString::new(SIGNING_SECRET.to_string().into_boxed_str())
}

/// Server without signature verification.
pub async fn spawn_app() -> TestApp {
    spawn_app_with(IngestionSettings::default()).await
}

/// Server that requires uploads signed with `SIGNING_SECRET`.
pub async fn spawn_signed_app() -> TestApp {
    spawn_app_with(IngestionSettings {
        signing_secret: Some(signing_secret()),
        ..IngestionSettings::default()
    })
    .await
}

pub async fn spawn_app_with(ingestion_settings: IngestionSettings) -> TestApp {
    // The first time `initialize` is invoked the code in `TRACING` is executed.
    // All other invocations will instead skip execution.
    Lazy::force(&TRACING);

    let listener = TcpListener::bind("127.0.0.1:0")
        .expect("Failed to bind random port");
    // Get port assigned by the OS
    let port = listener.local_addr().unwrap().port();
    let address = format!("http://127.0.0.1:{}", port);

    let store = InMemoryIngestionStore::new();
    let server = run(
        listener,
        Arc::new(store.clone()),
        ingestion_settings,
        None,
        vec![],
    )
        .expect("Failed to bind address");
    // Launch the server as a background task
    let _ = tokio::spawn(server);
    TestApp {
        address,
        store,
    }
}

pub struct PgTestApp {
    pub address: String,
    pub db_pool: PgPool,
}

impl PgTestApp {
    pub fn ingest_url(&self) -> String {
        format!("{}/wearables/ingest", self.address)
    }

    pub async fn insert_assignment(
        &self,
        device_id: &str,
        patient_id: Uuid,
        assigned_at: DateTime<Utc>,
        revoked_at: Option<DateTime<Utc>>,
    ) {
        sqlx::query(
            r#"
            INSERT INTO device_assignments (id, device_id, patient_id, assigned_at, revoked_at)
            VALUES ($1, $2, $3, $4, $5)
            "#,
        )
        .bind(Uuid::new_v4())
        .bind(device_id)
        .bind(patient_id)
        .bind(assigned_at)
        .bind(revoked_at)
        .execute(&self.db_pool)
        .await
        .expect("Failed to insert device assignment");
    }

    /// Assign `device_id` to a fresh patient, starting an hour ago.
    pub async fn assign_device(&self, device_id: &str) -> Uuid {
        let patient_id = Uuid::new_v4();
        self.insert_assignment(device_id, patient_id, Utc::now() - Duration::hours(1), None)
            .await;
        patient_id
    }

    pub async fn audit_row_count(&self, device_id: &str) -> i64 {
        sqlx::query_scalar("SELECT COUNT(*) FROM wearable_audit_log WHERE device_id = $1")
            .bind(device_id)
            .fetch_one(&self.db_pool)
            .await
            .expect("Failed to count audit rows")
    }

    pub async fn vital_row_count(&self, device_id: &str) -> i64 {
        sqlx::query_scalar("SELECT COUNT(*) FROM patient_vitals WHERE device_id = $1")
            .bind(device_id)
            .fetch_one(&self.db_pool)
            .await
            .expect("Failed to count vital rows")
    }
}

/// Server backed by a freshly created and migrated Postgres database.
pub async fn spawn_pg_app() -> PgTestApp {
    Lazy::force(&TRACING);

    let listener = TcpListener::bind("127.0.0.1:0")
        .expect("Failed to bind random port");
    let port = listener.local_addr().unwrap().port();
    let address = format!("http://127.0.0.1:{}", port);

    let mut configuration = get_config().expect("Failed to read configuration.");
    // Randomise the database name so tests do not see each other's rows
    configuration.database.db_name = Uuid::new_v4().to_string();
    configuration.database.db_url = None;
    let connection_pool = configure_db(&configuration.database).await;

    let server = run(
        listener,
        Arc::new(PgIngestionStore::new(connection_pool.clone())),
        IngestionSettings::default(),
        None,
        vec![],
    )
        .expect("Failed to bind address");
    let _ = tokio::spawn(server);
    PgTestApp {
        address,
        db_pool: connection_pool,
    }
}

pub async fn configure_db(config: &DatabaseSettings) -> PgPool {
    // Create database
    let mut connection = PgConnection::connect(
            config.connection_string_without_db().expose_secret()
        )
        .await
        .expect("Failed to connect to Postgres");
    connection
        .execute(format!(r#"CREATE DATABASE "{}";"#, config.db_name).as_str())
        .await
        .expect("Failed to create database.");

    // Migrate database
    let connection_pool = PgPool::connect(config.connection_string().expose_secret())
        .await
        .expect("Failed to connect to Postgres.");
    PgIngestionStore::new(connection_pool.clone())
        .migrate()
        .await
        .expect("Failed to migrate the database");

    connection_pool
}
