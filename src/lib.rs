use actix_web::{http, web, App, HttpServer};
use actix_web::dev::Server;
use tracing_actix_web::TracingLogger;
use std::net::TcpListener;
use std::sync::Arc;
use actix_cors::Cors;

pub mod config;
mod routes;
mod handlers;
pub mod models;
pub mod utils;
pub mod db;
pub mod device;
pub mod ingestion;
pub mod services;
pub mod telemetry;
use crate::routes::init_routes;
use crate::config::ingestion::IngestionSettings;
use crate::db::store::IngestionStore;

/// Upper bound on an ingestion request body.
const MAX_BODY_BYTES: usize = 4 * 1024 * 1024;

pub fn run(
    listener: TcpListener,
    store: Arc<dyn IngestionStore>,
    ingestion_settings: IngestionSettings,
    redis_client: Option<Arc<redis::Client>>,
    allowed_origins: Vec<String>,
) -> Result<Server, std::io::Error> {
    // Wrap using web::Data, which boils down to an Arc smart pointer
    let store_data: web::Data<dyn IngestionStore> = web::Data::from(store);
    let ingestion_settings = web::Data::new(ingestion_settings);
    let redis_client_data = redis_client.map(web::Data::new);

    let server = HttpServer::new( move || {
        let cors = allowed_origins
            .iter()
            .fold(Cors::default(), |cors, origin| cors.allowed_origin(origin))
            .allowed_methods(vec!["GET", "POST"])
            .allowed_headers(vec![
                http::header::ACCEPT,
                http::header::CONTENT_TYPE,
                http::header::HeaderName::from_static(crate::utils::signature::TIMESTAMP_HEADER),
                http::header::HeaderName::from_static(crate::utils::signature::SIGNATURE_HEADER),
            ])
            .max_age(3600);

        let mut app = App::new()
            .wrap(TracingLogger::default())
            .wrap(cors)
            .app_data(web::PayloadConfig::new(MAX_BODY_BYTES))
            // Get a pointer copy and attach it to the application state
            .app_data(store_data.clone())
            .app_data(ingestion_settings.clone());
        if let Some(redis_client_data) = &redis_client_data {
            app = app.app_data(redis_client_data.clone());
        }

        app.configure(init_routes)
    })
    .listen(listener)?
    .run();

    Ok(server)
}
