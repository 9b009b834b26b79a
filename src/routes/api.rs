use crate::handlers;
use actix_web::{web, Scope};

pub fn config() -> Scope {
    web::scope("")
        .app_data(web::FormConfig::default().error_handler(handlers::form_error))
        .route("/health", web::get().to(handlers::health_check))
        .route("/get-json", web::post().to(handlers::get_json))
}
