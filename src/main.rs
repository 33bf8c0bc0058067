//! Meeting Moderator Breakout Backend
//!
//! REST backend behind the Teams meeting tab: groups meeting attendees into
//! breakouts, provisions a team with a channel and online meeting per group
//! through Microsoft Graph, and keeps the assignment on the calendar event.

mod api;
mod auth;
mod breakout;
mod config;
mod errors;
mod graph;
mod models;

use std::sync::Arc;

use axum::{
    middleware,
    routing::{delete, get, post},
    Router,
};
use tower::ServiceBuilder;
use tower_http::cors::{Any, CorsLayer};
use tower_http::trace::TraceLayer;
use tracing_subscriber::{layer::SubscriberExt, util::SubscriberInitExt, EnvFilter};

use breakout::{JobRegistry, Notifier, SessionStore};
use config::Config;
use graph::{GraphClient, GraphConnector};

/// Application state shared across all handlers.
#[derive(Clone)]
pub struct AppState {
    pub graph: Arc<dyn GraphConnector>,
    pub sessions: SessionStore,
    pub jobs: JobRegistry,
    pub notifier: Notifier,
    pub config: Arc<Config>,
}

impl AppState {
    pub fn new(graph: Arc<dyn GraphConnector>, config: Config) -> Self {
        Self {
            graph,
            sessions: SessionStore::default(),
            jobs: JobRegistry::default(),
            notifier: Notifier::default(),
            config: Arc::new(config),
        }
    }
}

#[tokio::main]
async fn main() -> Result<(), Box<dyn std::error::Error>> {
    // Load configuration
    let config = Config::from_env();

    // Initialize logging
    let env_filter =
        EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new(&config.log_level));

    tracing_subscriber::registry()
        .with(env_filter)
        .with(tracing_subscriber::fmt::layer())
        .init();

    tracing::info!("Starting Meeting Moderator Breakout Backend");
    tracing::info!("Graph endpoints: {} / {}", config.graph_url, config.graph_beta_url);
    tracing::info!(
        interval = ?config.poll.interval,
        max_attempts = config.poll.max_attempts,
        backoff = ?config.poll.backoff,
        "Team creation poll policy"
    );
    tracing::info!("Bind address: {}", config.bind_addr);

    // Warn if PSK is not configured
    if config.api_psk.is_none() {
        tracing::warn!("No API PSK configured (MODERATOR_API_PSK). Authentication is disabled!");
    }

    let graph = GraphClient::new(&config)?;
    let state = AppState::new(Arc::new(graph), config.clone());

    // Build router
    let app = create_router(state);

    // Start server
    let listener = tokio::net::TcpListener::bind(&config.bind_addr).await?;
    tracing::info!("Server listening on {}", config.bind_addr);

    axum::serve(listener, app).await?;

    Ok(())
}

/// Create the application router with all routes.
pub fn create_router(state: AppState) -> Router {
    // CORS configuration
    let cors = CorsLayer::new()
        .allow_origin(Any)
        .allow_methods(Any)
        .allow_headers(Any);

    // Clone PSK for the auth layer
    let psk = state.config.api_psk.clone();

    // API routes
    let api_routes = Router::new()
        // Calendar
        .route("/me", get(api::get_me))
        .route("/events", get(api::list_events))
        .route("/events/{id}/breakouts", get(api::get_event_breakouts))
        // Sessions
        .route("/sessions", post(api::open_session))
        .route(
            "/sessions/{id}",
            get(api::get_session).delete(api::close_session),
        )
        .route("/sessions/{id}/moderators", post(api::add_moderator))
        .route(
            "/sessions/{id}/moderators/{user_id}",
            delete(api::remove_moderator),
        )
        .route("/sessions/{id}/preview", post(api::preview_groups))
        .route(
            "/sessions/{id}/breakouts",
            post(api::create_breakouts).delete(api::archive_breakouts),
        )
        .route("/sessions/{id}/messages", post(api::broadcast_to_breakouts))
        // Jobs
        .route("/jobs/{id}", get(api::get_job).delete(api::cancel_job))
        // Apply PSK auth middleware
        .layer(middleware::from_fn(move |req, next| {
            auth::psk_auth_layer(psk.clone(), req, next)
        }));

    // Health check (no auth required)
    let health_routes = Router::new().route("/health", get(health_check));

    Router::new()
        .nest("/api", api_routes)
        .merge(health_routes)
        .layer(
            ServiceBuilder::new()
                .layer(TraceLayer::new_for_http())
                .layer(cors),
        )
        .with_state(state)
}

/// Health check endpoint.
async fn health_check() -> &'static str {
    "OK"
}

#[cfg(test)]
mod testing;
