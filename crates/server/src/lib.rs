//! Multi-user task board: accounts, projects and their tasks over a JSON API.

use axum::{middleware as axum_middleware, routing::get, Router};
use tower_http::{
    cors::{Any, CorsLayer},
    trace::TraceLayer,
};

pub mod config;
pub mod db;
pub mod error;
pub mod middleware;
pub mod routes;
pub mod services;

use services::{
    auth::{Authenticator, SessionKeys},
    board::Board,
};

#[derive(Clone)]
pub struct AppState {
    pub config: config::Config,
    pub auth: Authenticator,
    pub board: Board,
}

impl AppState {
    pub fn new(config: config::Config, db: db::Database) -> Self {
        let sessions = SessionKeys::new(&config.session_secret);
        Self {
            auth: Authenticator::new(db.clone(), sessions, config.demo_account.clone()),
            board: Board::new(db),
            config,
        }
    }

    /// Builds the state and seeds the demo account when it is enabled.
    pub async fn initialize(config: config::Config, db: db::Database) -> anyhow::Result<Self> {
        let state = Self::new(config, db);
        state.auth.ensure_demo_account().await?;
        Ok(state)
    }
}

pub fn build_router(state: AppState) -> Router {
    // Build protected routes (require a session)
    let protected_routes = Router::new()
        .route("/auth/session", get(routes::auth::session))
        .nest("/projects", routes::projects::router())
        .nest("/tasks", routes::tasks::router())
        .route_layer(axum_middleware::from_fn_with_state(
            state.clone(),
            middleware::auth::auth_middleware,
        ));

    let api_router = Router::new()
        .nest("/auth", routes::auth::router())
        .merge(protected_routes);

    Router::new()
        .route("/health", get(health_check))
        .nest("/api", api_router)
        .with_state(state)
        .layer(TraceLayer::new_for_http())
        .layer(
            CorsLayer::new()
                .allow_origin(Any)
                .allow_methods(Any)
                .allow_headers(Any),
        )
}

async fn health_check() -> &'static str {
    "OK"
}
