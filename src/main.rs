//! Tablebot - restaurant table reservations over LINE
//!
//! A webhook service that walks customers through booking and cancelling
//! tables, one short-lived conversation session per user.

mod api;
mod config;
mod db;
mod line;
mod runtime;
mod session;
mod state_machine;
mod validate;

use api::{create_router, AppState};
use config::AppConfig;
use db::Database;
use line::LineClient;
use runtime::{
    BookingRuntime, DisplayNameResolver, ReservationLedger, Responder, RuntimeOptions,
    SharedRuntime,
};
use session::{SessionStore, SystemClock, TimeoutScheduler};
use std::net::SocketAddr;
use std::sync::Arc;
use tracing_subscriber::{layer::SubscriberExt, util::SubscriberInitExt};

#[tokio::main]
async fn main() -> Result<(), Box<dyn std::error::Error>> {
    // Initialize logging
    tracing_subscriber::registry()
        .with(
            tracing_subscriber::EnvFilter::try_from_default_env()
                .unwrap_or_else(|_| "tablebot=info,booking=info,tower_http=info".into()),
        )
        .with(
            tracing_subscriber::fmt::layer()
                .json()
                .with_current_span(false)
                .with_span_list(false),
        )
        .init();

    let config = AppConfig::from_env()?;

    tracing::info!(path = %config.db_path.display(), "Opening database");
    let db = Database::open(&config.db_path)?;

    let line = Arc::new(LineClient::new(config.channel_access_token.clone())?);

    // Sessions and their two-stage timers
    let (timers, fired) = TimeoutScheduler::new(config.warning_after, config.session_timeout);
    let store = Arc::new(SessionStore::new(Arc::new(SystemClock), timers));

    let runtime: Arc<SharedRuntime> = Arc::new(BookingRuntime::new(
        Arc::clone(&store),
        Arc::clone(&line) as Arc<dyn Responder>,
        Arc::new(db) as Arc<dyn ReservationLedger>,
        line as Arc<dyn DisplayNameResolver>,
        RuntimeOptions {
            validate_cancel_phone: config.validate_cancel_phone,
            admin_user_id: config.admin_user_id.clone(),
        },
    ));

    tokio::spawn(Arc::clone(&runtime).run_timeouts(fired));

    // Backstop for sessions whose timers never fired
    let sweep_interval = config.sweep_interval;
    tokio::spawn(async move {
        let mut ticker = tokio::time::interval(sweep_interval);
        loop {
            ticker.tick().await;
            store.sweep_expired();
        }
    });

    tracing::info!(
        warning_after_secs = config.warning_after.as_secs(),
        timeout_secs = config.session_timeout.as_secs(),
        validate_cancel_phone = config.validate_cancel_phone,
        admin_forwarding = config.admin_user_id.is_some(),
        "Booking runtime initialized"
    );

    let state = AppState::new(runtime, &config.channel_secret, &config.version);
    let app = create_router(state);

    // Start server
    let addr = SocketAddr::from(([0, 0, 0, 0], config.port));
    tracing::info!("Tablebot listening on {}", addr);

    let listener = tokio::net::TcpListener::bind(addr).await?;
    axum::serve(listener, app).await?;

    Ok(())
}
