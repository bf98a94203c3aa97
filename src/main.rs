use std::sync::Arc;

use anyhow::Context;
use axum::{extract::Extension, Router};
use dotenv::dotenv;
use sqlx::postgres::PgPoolOptions;
use tower_http::{
    cors::{Any, CorsLayer},
    services::ServeDir,
    trace::TraceLayer,
};
use tracing::{info, warn};
use tracing_subscriber::EnvFilter;

mod bookings;
mod config;
mod error;
mod model;
mod points;
mod reminder;
mod routes;
mod state;

use bookings::{BookingManager, PgBookingStore};
use config::AppConfig;
use points::{PgPointStore, PointLedger};
use reminder::{EmailSender, LogMailer, PgUserDirectory, ReminderScheduler, SmtpMailer};
use state::AppState;

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    dotenv().ok();

    tracing_subscriber::fmt()
        .with_env_filter(
            EnvFilter::try_from_default_env()
                .unwrap_or_else(|_| EnvFilter::new("info,barbershop_be=debug")),
        )
        .init();

    let config = AppConfig::from_env()?;
    info!(?config, "Configuration loaded");

    // Connect to PostgreSQL
    let pool = PgPoolOptions::new()
        .max_connections(10)
        .connect(&config.database_url)
        .await
        .context("Failed to connect to Postgres")?;

    sqlx::migrate!("./migrations")
        .run(&pool)
        .await
        .context("Failed to run database migrations")?;

    let mailer: Arc<dyn EmailSender> = if config.mail_enabled() {
        Arc::new(SmtpMailer::new(&config)?)
    } else {
        warn!("SENDER_EMAIL or SENDER_EMAIL_KEY missing, reminder emails will only be logged");
        Arc::new(LogMailer)
    };

    let reminder = Arc::new(ReminderScheduler::new(
        Arc::new(PgUserDirectory::new(pool.clone())),
        mailer,
        config.reminder_user_limit,
    ));
    tokio::spawn(reminder.clone().run_daily(config.reminder_hour));

    let state = AppState {
        pool: pool.clone(),
        bookings: BookingManager::new(Arc::new(PgBookingStore::new(pool.clone()))),
        points: PointLedger::new(Arc::new(PgPointStore::new(pool))),
        reminder,
    };

    let app = Router::new()
        // JSON API (bookings, services, users, points, products, reminds)
        .merge(routes::api_router())
        // Uploaded images
        .nest_service("/api/uploads", ServeDir::new(&config.upload_dir))
        .layer(Extension(state))
        .layer(TraceLayer::new_for_http())
        // Add CORS for frontend
        .layer(CorsLayer::new().allow_origin(Any).allow_methods(Any).allow_headers(Any));

    let listener = tokio::net::TcpListener::bind(config.http_addr)
        .await
        .with_context(|| format!("Failed to bind {}", config.http_addr))?;
    info!(addr = %config.http_addr, "Listening");

    axum::serve(listener, app)
        .with_graceful_shutdown(shutdown_signal())
        .await
        .context("Server error")?;

    info!("Server stopped");
    Ok(())
}

async fn shutdown_signal() {
    if let Err(e) = tokio::signal::ctrl_c().await {
        warn!(error = %e, "Failed to listen for shutdown signal");
        std::future::pending::<()>().await;
    }
}
