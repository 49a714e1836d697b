use std::sync::Arc;
use std::time::Duration;
use tokio::signal;
use tracing::info;

use habit_persistence::{Store, connection::connect_and_migrate};
use habit_server::{
    auth::AuthService, config::Config, create_routes, session::SessionManager,
    websocket::ConnectionManager,
};

#[tokio::main]
async fn main() {
    // Initialize tracing
    tracing_subscriber::fmt::init();

    info!("Starting HabitSync server...");

    let config = Config::new();

    // Initialize database connection and run migrations
    let db = match connect_and_migrate().await {
        Ok(db) => db,
        Err(e) => {
            tracing::error!("Failed to connect to database and run migrations: {}", e);
            std::process::exit(1);
        }
    };
    let store = Arc::new(Store::new(db, config.change_bus_capacity));

    let connection_manager = Arc::new(ConnectionManager::new());
    let session_manager = Arc::new(SessionManager::new(
        store.clone(),
        config.activity_feed_limit,
    ));

    // Check for dev mode
    let auth_service =
        if std::env::var("AUTH_DEV_MODE").unwrap_or_else(|_| "false".to_string()) == "true" {
            info!("Starting in development authentication mode - JWT validation disabled");
            Arc::new(AuthService::new_dev_mode())
        } else {
            Arc::new(AuthService::new(
                std::env::var("AUTH_JWKS_URL")
                    .unwrap_or_else(|_| "https://example.com/.well-known/jwks.json".to_string()),
                std::env::var("AUTH_AUDIENCE").unwrap_or_else(|_| "habit-sync".to_string()),
            ))
        };

    let routes = create_routes(
        connection_manager.clone(),
        session_manager.clone(),
        auth_service,
        store,
    );

    // Sweep idle connections and their sessions
    let cleanup_connection_manager = connection_manager.clone();
    let cleanup_session_manager = session_manager.clone();
    tokio::spawn(async move {
        let mut interval = tokio::time::interval(std::time::Duration::from_secs(30));
        loop {
            interval.tick().await;
            let connection_timeout = Duration::from_secs(config.connection_timeout_seconds);

            let removed = cleanup_connection_manager
                .cleanup_inactive_connections(connection_timeout)
                .await;
            for connection_id in removed {
                cleanup_session_manager.end_session(connection_id).await;
            }
        }
    });

    info!("Server starting on {}:{}", config.host, config.port);

    let addr = (
        config.host.parse::<std::net::IpAddr>().unwrap(),
        config.port,
    );

    let (addr, server) = warp::serve(routes).bind_with_graceful_shutdown(addr, async {
        // Wait for SIGINT (Ctrl+C) or SIGTERM
        #[cfg(unix)]
        {
            let mut sigint = signal::unix::signal(signal::unix::SignalKind::interrupt()).unwrap();
            let mut sigterm = signal::unix::signal(signal::unix::SignalKind::terminate()).unwrap();

            tokio::select! {
                _ = sigint.recv() => {
                    info!("Received SIGINT, shutting down gracefully...");
                }
                _ = sigterm.recv() => {
                    info!("Received SIGTERM, shutting down gracefully...");
                }
            }
        }

        #[cfg(not(unix))]
        {
            signal::ctrl_c().await.expect("Failed to listen for ctrl+c");
            info!("Received Ctrl+C, shutting down gracefully...");
        }
    });

    info!(
        "Server started successfully on {}. Press Ctrl+C to stop.",
        addr
    );
    server.await;
    info!("Server shutdown complete.");
}
