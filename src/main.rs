//! Testdeck Server - Main entry point.
//!
//! Starts the Actix-web server with configured routes and middleware.

use std::sync::Arc;

use actix_cors::Cors;
use actix_web::{http::header, web, App, HttpServer};
use tracing::{error, info, warn, Level};
use tracing_subscriber::FmtSubscriber;
use utoipa::OpenApi;
use utoipa_swagger_ui::SwaggerUi;

use testdeck_lib::api::{self, ApiDoc, ExecutionSessions, SharedStore};
use testdeck_lib::config::{Config, StoreBackend};
use testdeck_lib::middleware::RequestLogger;
use testdeck_lib::models::{WsEvent, WsEventMessage};
use testdeck_lib::services::{EventBroadcaster, SessionRegistry};
use testdeck_lib::store::{EntityStore, FailoverStore, MemoryStore, PgStore};

/// Forward store change events into the WebSocket broadcaster.
///
/// The task ends when the store's change feed closes, which only happens at
/// shutdown.
fn spawn_change_forwarder(store: &SharedStore, broadcaster: EventBroadcaster) {
    let Some(mut rx) = store.watch() else {
        warn!("Entity store does not support change subscriptions; WebSocket clients only see result and completion events");
        return;
    };

    tokio::spawn(async move {
        loop {
            match rx.recv().await {
                Ok(change) => {
                    broadcaster.send(WsEventMessage::new(WsEvent::entity_changed(change)));
                }
                Err(tokio::sync::broadcast::error::RecvError::Lagged(missed)) => {
                    warn!(missed, "Change forwarder lagged behind the store feed");
                }
                Err(tokio::sync::broadcast::error::RecvError::Closed) => break,
            }
        }
    });
}

#[actix_web::main]
async fn main() -> std::io::Result<()> {
    // Load environment variables from .env file
    dotenvy::dotenv().ok();

    // Initialize logging
    let subscriber = FmtSubscriber::builder()
        .with_max_level(Level::INFO)
        .with_env_filter(tracing_subscriber::EnvFilter::from_default_env())
        .finish();
    tracing::subscriber::set_global_default(subscriber).expect("Failed to set tracing subscriber");

    // Load configuration
    let config = match Config::from_env() {
        Ok(cfg) => cfg,
        Err(e) => {
            error!("Failed to load configuration: {}", e);
            error!("");
            error!("Please check your environment variables:");
            error!("  - RUST_ENV must be set to 'development' or 'production'");
            error!("  - In production, DATABASE_URL and TDK_ADMIN_PASSWORD must be set");
            error!("  - In production, values must not match development defaults");
            std::process::exit(1);
        }
    };

    info!("========================================");
    info!("  Testdeck Server");
    info!("  Environment: {}", config.environment);
    info!("========================================");

    if config.is_development() {
        warn!("Running in DEVELOPMENT mode - do not use in production!");
    }

    // Select the primary entity store backend, then wrap it with the local
    // failover cache so in-session writes survive a primary outage.
    let primary: SharedStore = match config.store_backend {
        StoreBackend::Postgres => {
            let store = match PgStore::connect(&config.database_url).await {
                Ok(store) => store,
                Err(e) => {
                    error!("Failed to initialize PostgreSQL store: {}", e);
                    std::process::exit(1);
                }
            };
            info!("PostgreSQL store connected, migrations applied");
            Arc::new(store)
        }
        StoreBackend::Memory => {
            info!("In-memory store selected; all data is lost on shutdown");
            Arc::new(MemoryStore::new())
        }
    };
    let store: SharedStore = Arc::new(FailoverStore::new(primary));

    // Seed user accounts
    let registry = match SessionRegistry::from_config(&config) {
        Ok(registry) => registry,
        Err(e) => {
            error!("Failed to seed user accounts: {}", e);
            std::process::exit(1);
        }
    };
    let registry = web::Data::new(registry);

    // Real-time fan-out
    let broadcaster = EventBroadcaster::new();
    spawn_change_forwarder(&store, broadcaster.clone());

    // Guided execution sessions
    let sessions = web::Data::new(ExecutionSessions::new());

    let bind_address = config.bind_address();
    let is_development = config.is_development();

    let worker_count = if is_development {
        info!(
            "Starting server at http://{} (4 workers - development mode)",
            bind_address
        );
        4
    } else {
        let cpus = num_cpus::get();
        info!(
            "Starting server at http://{} ({} workers)",
            bind_address, cpus
        );
        cpus
    };

    // Start HTTP server
    let server = HttpServer::new(move || {
        // Configure CORS
        let cors = if is_development {
            // Permissive CORS for development
            Cors::default()
                .allowed_origin("http://localhost:3000")
                .allowed_origin("http://127.0.0.1:3000")
                .allowed_methods(vec!["GET", "POST", "PUT", "DELETE", "OPTIONS"])
                .allowed_headers(vec![
                    header::AUTHORIZATION,
                    header::ACCEPT,
                    header::CONTENT_TYPE,
                ])
                .max_age(3600)
        } else {
            // Restrictive CORS for production (same-origin only)
            Cors::default()
                .allowed_methods(vec!["GET", "POST", "PUT", "DELETE", "OPTIONS"])
                .allowed_headers(vec![
                    header::AUTHORIZATION,
                    header::ACCEPT,
                    header::CONTENT_TYPE,
                ])
                .max_age(3600)
        };

        App::new()
            // Add CORS middleware (must be before other middleware)
            .wrap(cors)
            // Add request logging middleware
            .wrap(RequestLogger)
            // Add shared state
            .app_data(web::Data::new(store.clone()))
            .app_data(registry.clone())
            .app_data(web::Data::new(broadcaster.clone()))
            .app_data(sessions.clone())
            // Configure API routes
            .service(
                web::scope("/api/v1")
                    .configure(api::configure_health_routes)
                    .configure(api::configure_auth_routes)
                    .configure(api::configure_project_routes)
                    .configure(api::configure_test_suite_routes)
                    .configure(api::configure_test_case_routes)
                    .configure(api::configure_test_run_routes)
                    .configure(api::configure_execution_routes)
                    .configure(api::configure_websocket_routes),
            )
            // Interactive API docs
            .service(
                SwaggerUi::new("/swagger-ui/{_:.*}")
                    .url("/api-docs/openapi.json", ApiDoc::openapi()),
            )
    });

    // Set worker count
    server
        .workers(worker_count)
        .bind(&bind_address)?
        .run()
        .await
}
