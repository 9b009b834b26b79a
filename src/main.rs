mod config;
mod handlers;
mod models;
mod repositories;
mod routes;
mod services;
mod utils;

use actix_cors::Cors;
use actix_web::{middleware::Logger, web, App, HttpServer};
use std::sync::Arc;
use std::time::Instant;
use tracing::{error, info, warn};
use tracing_subscriber::{layer::SubscriberExt, util::SubscriberInitExt};

use config::{Config, QuotaSettings, StoreBackend};
use handlers::health::not_found;
use repositories::{FileUsageRepo, RedisUsageRepo, SqliteUsageRepo, UsageStore};
use routes::api;
use services::{EnrichService, GoogleCseProvider, QuotaService, SearchService};

#[derive(Clone)]
pub struct AppState {
    pub search_service: SearchService,
    pub enrich_service: EnrichService,
    pub quota_service: QuotaService,
    pub config: Config,
    pub start_time: Instant,
}

/// Opens the configured usage store, falling back to the JSON file.
async fn open_usage_store(settings: &QuotaSettings) -> Arc<dyn UsageStore> {
    let opened: anyhow::Result<Arc<dyn UsageStore>> = match settings.store {
        StoreBackend::File => Ok(Arc::new(FileUsageRepo::new(&settings.file_path))),
        StoreBackend::Sqlite => SqliteUsageRepo::new(&settings.sqlite_path)
            .map(|repo| Arc::new(repo) as Arc<dyn UsageStore>),
        StoreBackend::Redis => RedisUsageRepo::new(&settings.redis_url, settings.redis_key.clone())
            .await
            .map(|repo| Arc::new(repo) as Arc<dyn UsageStore>),
    };

    match opened {
        Ok(store) => store,
        Err(e) => {
            warn!(
                "Failed to open {:?} usage store, using {}: {:#}",
                settings.store, settings.file_path, e
            );
            Arc::new(FileUsageRepo::new(&settings.file_path))
        }
    }
}

#[actix_web::main]
async fn main() -> std::io::Result<()> {
    // Initialize tracing
    tracing_subscriber::registry()
        .with(tracing_subscriber::EnvFilter::new(
            std::env::var("RUST_LOG").unwrap_or_else(|_| "info".to_string()),
        ))
        .with(tracing_subscriber::fmt::layer())
        .init();

    // Load configuration
    let config = match Config::from_env() {
        Ok(config) => {
            info!("Configuration loaded successfully");
            config
        }
        Err(e) => {
            error!("Failed to load configuration: {:#}", e);
            std::process::exit(1);
        }
    };

    info!("Starting search proxy on port {}", config.server.port);

    let provider = match GoogleCseProvider::new(&config.search) {
        Ok(provider) => provider,
        Err(e) => {
            error!("Failed to build search client: {:#}", e);
            std::process::exit(1);
        }
    };
    let enrich_service = match EnrichService::from_settings(&config.pipeline) {
        Ok(service) => service,
        Err(e) => {
            error!("Failed to build page fetcher: {:#}", e);
            std::process::exit(1);
        }
    };

    let store = open_usage_store(&config.quota).await;
    let quota_service = QuotaService::load(store, config.quota.daily_limit).await;

    info!(
        extract_metadata = config.pipeline.extract_metadata,
        scrape_headings = config.pipeline.scrape_headings,
        daily_limit = config.quota.daily_limit,
        "Result pipeline configured"
    );

    let state = AppState {
        search_service: SearchService::new(Arc::new(provider)),
        enrich_service,
        quota_service,
        config: config.clone(),
        start_time: Instant::now(),
    };

    // Create HTTP server
    let allowed_origins = config.security.allowed_origins.clone();
    let server = HttpServer::new(move || {
        let mut cors = Cors::default()
            .allowed_methods(vec!["GET", "POST"])
            .allow_any_header()
            .max_age(3600);
        if allowed_origins.iter().any(|origin| origin == "*") {
            cors = cors.allow_any_origin();
        } else {
            for origin in &allowed_origins {
                cors = cors.allowed_origin(origin);
            }
        }

        App::new()
            .app_data(web::Data::new(state.clone()))
            .wrap(cors)
            .wrap(Logger::default())
            .service(api::config())
            .default_service(web::route().to(not_found))
    })
    .bind(format!("{}:{}", config.server.host, config.server.port))?;

    info!(
        "Server started successfully at http://{}:{}",
        config.server.host, config.server.port
    );

    // Run the server
    server.workers(config.server.workers).run().await
}
