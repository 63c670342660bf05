// SPDX-License-Identifier: MIT
// Copyright 2026 Roland Dreier <roland@rolandd.dev>

//! OTP Notes API Server

use otp_notes_api::{
    config::Config,
    db::{FirestoreDb, MemoryDb, NoteStore, UserStore},
    services::{GoogleOAuthClient, LogNotifier, Notifier, SendGridNotifier},
    AppState,
};
use std::net::SocketAddr;
use std::sync::Arc;
use std::time::Duration;
use tracing_subscriber::{layer::SubscriberExt, util::SubscriberInitExt};

/// How often idle rate-limit buckets are dropped.
const LIMITER_SWEEP_INTERVAL: Duration = Duration::from_secs(15 * 60);

#[tokio::main]
async fn main() -> Result<(), Box<dyn std::error::Error>> {
    init_logging();

    let config = Config::from_env().expect("Failed to load configuration");
    tracing::info!(
        port = config.port,
        environment = config.environment.as_str(),
        "Starting OTP Notes API"
    );

    let (users, notes): (Arc<dyn UserStore>, Arc<dyn NoteStore>) = match &config.gcp_project_id
    {
        Some(project_id) => {
            let db = FirestoreDb::new(project_id)
                .await
                .expect("Failed to connect to Firestore");
            tracing::info!(project = %project_id, "Using Firestore");
            (Arc::new(db.clone()), Arc::new(db))
        }
        None => {
            tracing::warn!("GCP_PROJECT_ID not set, using in-memory store");
            let db = MemoryDb::new();
            (Arc::new(db.clone()), Arc::new(db))
        }
    };

    let notifier: Arc<dyn Notifier> = match &config.sendgrid_api_key {
        Some(api_key) => Arc::new(
            SendGridNotifier::new(api_key.clone(), config.email_from.clone())
                .expect("Failed to build SendGrid client"),
        ),
        None => {
            tracing::warn!("SENDGRID_API_KEY not set, OTP codes will only be logged");
            Arc::new(LogNotifier)
        }
    };

    let google = Arc::new(GoogleOAuthClient::new(&config).expect("Failed to build Google client"));

    let state = Arc::new(AppState::new(config.clone(), users, notes, notifier, google));

    // Periodically forget keys whose budget has refilled.
    let sweeper_state = state.clone();
    tokio::spawn(async move {
        let mut interval = tokio::time::interval(LIMITER_SWEEP_INTERVAL);
        loop {
            interval.tick().await;
            sweeper_state.rate_limits.retain_recent();
        }
    });

    let app = otp_notes_api::routes::create_router(state);

    let addr = format!("0.0.0.0:{}", config.port);
    let listener = tokio::net::TcpListener::bind(&addr).await?;
    tracing::info!(address = %addr, "Server listening");

    axum::serve(
        listener,
        app.into_make_service_with_connect_info::<SocketAddr>(),
    )
    .with_graceful_shutdown(shutdown_signal())
    .await?;

    tracing::info!("Server stopped");
    Ok(())
}

/// Resolve on Ctrl-C or SIGTERM.
async fn shutdown_signal() {
    let ctrl_c = async {
        if let Err(e) = tokio::signal::ctrl_c().await {
            tracing::error!(error = %e, "Failed to listen for Ctrl-C");
            std::future::pending::<()>().await;
        }
    };

    #[cfg(unix)]
    let terminate = async {
        match tokio::signal::unix::signal(tokio::signal::unix::SignalKind::terminate()) {
            Ok(mut sig) => {
                sig.recv().await;
            }
            Err(e) => {
                tracing::error!(error = %e, "Failed to listen for SIGTERM");
                std::future::pending::<()>().await;
            }
        }
    };

    #[cfg(not(unix))]
    let terminate = std::future::pending::<()>();

    tokio::select! {
        _ = ctrl_c => {},
        _ = terminate => {},
    }

    tracing::info!("Shutting down gracefully");
}

/// Initialize structured JSON logging.
fn init_logging() {
    let format = tracing_subscriber::fmt::layer()
        .json()
        .with_target(false)
        .with_current_span(true)
        .flatten_event(true);

    tracing_subscriber::registry()
        .with(
            tracing_subscriber::EnvFilter::from_default_env()
                .add_directive("otp_notes_api=debug".parse().unwrap())
                .add_directive("info".parse().unwrap()),
        )
        .with(format)
        .init();
}
