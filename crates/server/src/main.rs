//! Oddhay push notification server entry point.

use std::net::SocketAddr;
use std::sync::Arc;

use axum::{Router, middleware};
use tokio::signal;
use tower_http::{
    cors::{Any, CorsLayer},
    trace::TraceLayer,
};
use tracing::info;
use tracing_subscriber::{layer::SubscriberExt, util::SubscriberInitExt};

use oddhay_api::{AppState, router as api_router};
use oddhay_common::Config;
use oddhay_core::{
    AudienceResolver, PushNotificationService, PushTransport, VapidConfig, WebPushTransport,
};
use oddhay_db::repositories::{
    NotificationLogRepository, PushSubscriptionRepository, UserRepository,
};

/// Waits for a shutdown signal (SIGINT or SIGTERM).
///
/// On Unix systems, this listens for both SIGINT (Ctrl+C) and SIGTERM.
/// On Windows, this only listens for Ctrl+C.
async fn shutdown_signal() {
    let ctrl_c = async {
        signal::ctrl_c()
            .await
            .expect("failed to install Ctrl+C handler");
    };

    #[cfg(unix)]
    let terminate = async {
        signal::unix::signal(signal::unix::SignalKind::terminate())
            .expect("failed to install signal handler")
            .recv()
            .await;
    };

    #[cfg(not(unix))]
    let terminate = std::future::pending::<()>();

    tokio::select! {
        () = ctrl_c => {
            info!("Received SIGINT, initiating graceful shutdown...");
        },
        () = terminate => {
            info!("Received SIGTERM, initiating graceful shutdown...");
        },
    }
}

#[allow(clippy::expect_used)]
#[tokio::main]
async fn main() -> Result<(), Box<dyn std::error::Error>> {
    dotenvy::dotenv().ok();

    // Initialize tracing
    tracing_subscriber::registry()
        .with(tracing_subscriber::fmt::layer())
        .with(
            tracing_subscriber::EnvFilter::try_from_default_env()
                .unwrap_or_else(|_| "oddhay=debug,tower_http=debug".into()),
        )
        .init();

    info!("Starting oddhay-push server...");

    // Load configuration
    let config = Config::load()?;

    // Connect to database
    let db = oddhay_db::init(&config).await?;
    info!("Connected to database");

    // Run migrations
    info!("Running database migrations...");
    oddhay_db::migrate(&db).await?;
    info!("Migrations completed");

    // Initialize repositories
    let db = Arc::new(db);
    let user_repo = UserRepository::new(Arc::clone(&db));
    let subscription_repo = PushSubscriptionRepository::new(Arc::clone(&db));
    let log_repo = NotificationLogRepository::new(Arc::clone(&db));

    // Initialize Web Push transport (optional, based on config)
    let (transport, vapid_public_key): (Option<Arc<dyn PushTransport>>, Option<String>) =
        match &config.push {
            Some(push_config) => {
                let vapid = VapidConfig::from(push_config);
                let transport = WebPushTransport::new(&vapid)?;
                info!("Web Push transport initialized");
                (Some(Arc::new(transport)), Some(vapid.public_key))
            }
            None => {
                info!("VAPID keys not configured, push delivery disabled");
                (None, None)
            }
        };

    let push_service = PushNotificationService::new(
        subscription_repo,
        log_repo,
        AudienceResolver::new(user_repo.clone()),
        transport,
        vapid_public_key,
    );

    // Create app state
    let state = AppState {
        user_repo,
        push_service,
    };

    // Build router
    let app = Router::new()
        .nest("/api", api_router())
        .layer(middleware::from_fn_with_state(
            state.clone(),
            oddhay_api::middleware::auth_middleware,
        ))
        .layer(TraceLayer::new_for_http())
        .layer(
            CorsLayer::new()
                .allow_origin(Any)
                .allow_methods(Any)
                .allow_headers(Any),
        )
        .with_state(state);

    // Start server with graceful shutdown
    let addr: SocketAddr = format!("{}:{}", config.server.host, config.server.port).parse()?;
    info!("Listening on {}", addr);

    let listener = tokio::net::TcpListener::bind(addr).await?;
    axum::serve(listener, app)
        .with_graceful_shutdown(shutdown_signal())
        .await?;

    info!("Server shutdown complete");
    Ok(())
}
