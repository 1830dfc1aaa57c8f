use std::net::SocketAddr;
use std::sync::Arc;
use std::time::Duration;

use dotenv::dotenv;
use tokio::net::TcpListener;
use tower_http::cors::{CorsLayer, Any};
use tower_http::timeout::TimeoutLayer;
use tower_http::trace::{self, TraceLayer};
use tracing::{Level, info, warn};
use tracing_subscriber::{layer::SubscriberExt, util::SubscriberInitExt};

mod router;

use appointment_cell::models::SchedulingRules;
use appointment_cell::services::booking::AppointmentBookingService;
use appointment_cell::services::clock::SystemClock;
use appointment_cell::services::directory::ConfiguredProviderDirectory;
use appointment_cell::services::memory::{InMemoryAppointmentStore, InMemoryClientDirectory};
use appointment_cell::services::validation::TimeWindowValidator;
use shared_config::AppConfig;

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    // Loading Env Vars
    dotenv().ok();

    // Initialize tracing
    tracing_subscriber::registry()
        .with(tracing_subscriber::EnvFilter::new(
            std::env::var("RUST_LOG").unwrap_or_else(|_| "info,tower_http=debug".into()),
        ))
        .with(tracing_subscriber::fmt::layer())
        .init();

    info!("Starting scheduling API server");

    let config = Arc::new(AppConfig::from_env());
    let booking_service = Arc::new(build_booking_service(&config));

    let cors = CorsLayer::new()
        .allow_origin(Any)
        .allow_methods(Any)
        .allow_headers(Any);

    let app = router::create_router(Arc::clone(&config), booking_service)
        .layer(TimeoutLayer::new(Duration::from_secs(config.request_timeout_secs)))
        .layer(
            TraceLayer::new_for_http()
                .make_span_with(trace::DefaultMakeSpan::new()
                    .level(Level::INFO))
                .on_response(trace::DefaultOnResponse::new()
                    .level(Level::INFO)),
        )
        .layer(cors);

    let addr = SocketAddr::from(([0, 0, 0, 0], config.port));
    info!("Listening on {}", addr);

    let listener = TcpListener::bind(addr).await?;
    axum::serve(listener, app).await?;

    Ok(())
}

fn build_booking_service(config: &AppConfig) -> AppointmentBookingService {
    if config.is_configured() {
        info!("Using Supabase at {}", config.supabase_url);
        return AppointmentBookingService::new(config);
    }

    warn!("Supabase is not configured, appointments are kept in memory and lost on restart");
    let clients = InMemoryClientDirectory::from_seeds(&config.scheduling.seed_clients);
    if config.scheduling.seed_clients.is_empty() {
        warn!("SCHEDULING_SEED_CLIENTS not set, every booking will fail with client_not_found");
    } else {
        info!("Seeded {} clients into the in-memory directory", config.scheduling.seed_clients.len());
    }

    AppointmentBookingService::with_collaborators(
        Arc::new(InMemoryAppointmentStore::new()),
        Arc::new(clients),
        Arc::new(ConfiguredProviderDirectory::new(config.scheduling.providers.clone())),
        Arc::new(SystemClock),
        TimeWindowValidator::new(config.scheduling.business_utc_offset_minutes, SchedulingRules::default()),
    )
}
