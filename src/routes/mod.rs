use actix_web::web;

pub mod backend_health;
pub mod wearables;

pub fn init_routes(cfg: &mut web::ServiceConfig) {
    cfg.service(backend_health::backend_health);
    // Devices authenticate with x-veri-signature, not a user session
    cfg.service(
        web::scope("/wearables")
            .service(wearables::ingest)
    );
}
