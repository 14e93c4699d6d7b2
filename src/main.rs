//! CivicBridge
//!
//! Citizen issue reporting: a REST backend with SQLite persistence, and a
//! terminal client for submitting, tracking and moderating reports.

mod api;
mod auth;
mod cli;
mod client;
mod config;
mod db;
mod errors;
mod models;

use std::sync::Arc;

use axum::{
    middleware,
    routing::{delete, get, post, put},
    Json, Router,
};
use clap::Parser;
use serde_json::{json, Value};
use tower_http::cors::{Any, CorsLayer};
use tower_http::trace::TraceLayer;
use tracing_subscriber::{layer::SubscriberExt, util::SubscriberInitExt, EnvFilter};

use cli::Cli;
use config::Config;
use db::Repository;

/// Application state shared across all handlers.
#[derive(Clone)]
pub struct AppState {
    pub repo: Arc<Repository>,
    pub config: Arc<Config>,
}

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    let cli = Cli::parse();
    let config = Config::from_env();

    // The server logs at the configured level; client commands only surface warnings
    let default_level = if cli.is_server() {
        config.log_level.as_str()
    } else {
        "warn"
    };
    let env_filter =
        EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new(default_level));

    tracing_subscriber::registry()
        .with(env_filter)
        .with(tracing_subscriber::fmt::layer().with_writer(std::io::stderr))
        .init();

    cli::run(cli, config).await
}

/// Open the database and serve the API until the process is stopped.
pub async fn serve(config: Config) -> anyhow::Result<()> {
    tracing::info!("Starting CivicBridge backend");
    tracing::info!("Database path: {:?}", config.db_path);
    let bind_addr = config.socket_addr()?;
    tracing::info!("Bind address: {}", bind_addr);

    if config.api_psk.is_none() {
        tracing::warn!("No API PSK configured (CIVIC_API_PSK). Authentication is disabled!");
    }

    let pool = db::init_database(&config.db_path).await?;
    let state = AppState {
        repo: Arc::new(Repository::new(pool)),
        config: Arc::new(config.clone()),
    };

    let app = create_router(state);

    let listener = tokio::net::TcpListener::bind(bind_addr).await?;
    tracing::info!("Server listening on {}", bind_addr);

    axum::serve(listener, app).await?;

    Ok(())
}

/// Create the application router with all routes.
pub fn create_router(state: AppState) -> Router {
    let cors = CorsLayer::new()
        .allow_origin(Any)
        .allow_methods(Any)
        .allow_headers(Any);

    let psk = state.config.api_psk.clone();

    let api_routes = Router::new()
        // Auth
        .route("/auth/signup", post(api::signup))
        .route("/auth/login", post(api::login))
        .route("/auth/admin-login", post(api::admin_login))
        // Reports
        .route("/reports", get(api::list_reports))
        .route("/reports", post(api::create_report))
        .route("/reports/user/{user_id}", get(api::list_user_reports))
        .route("/reports/{id}/status", put(api::update_report_status))
        .route("/reports/{id}/comment", post(api::add_comment))
        .route("/reports/{id}", delete(api::delete_report))
        // Apply PSK auth middleware
        .layer(middleware::from_fn(move |req, next| {
            auth::psk_auth_layer(psk.clone(), req, next)
        }))
        // Health check (added after the layer, so no auth required)
        .route("/health", get(health_check));

    Router::new()
        .nest("/api", api_routes)
        .layer(cors)
        .layer(TraceLayer::new_for_http())
        .with_state(state)
}

/// GET /api/health
async fn health_check() -> Json<Value> {
    Json(json!({ "status": "ok" }))
}

#[cfg(test)]
mod tests;
