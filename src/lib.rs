pub mod appresult;
pub mod config;
pub mod db;
pub mod directory;
pub mod logging;
pub mod res;
pub mod rooms;
pub mod session;

use std::sync::Arc;

use axum::{extract::FromRef, Router};
use sqlx::SqlitePool;
use tower_http::{cors::CorsLayer, trace::TraceLayer};
use tower_sessions::{cookie::SameSite, Expiry, MemoryStore, SessionManagerLayer, SessionStore};

pub use appresult::{AppError, AppResult, ErrorKind};
pub use config::Config;

#[derive(Clone, FromRef)]
pub struct AppState {
    pub db_pool: SqlitePool,
    pub config: Arc<Config>,
}

pub fn app(state: AppState) -> Router {
    app_with_store(state, MemoryStore::default())
}

/// Same as [`app`], reading sessions from `store`. The login layer writes the
/// signed-in user's id into the store this is given.
pub fn app_with_store<Store>(state: AppState, store: Store) -> Router
where
    Store: SessionStore + Clone,
{
    let session_layer = SessionManagerLayer::new(store)
        .with_secure(state.config.is_production())
        .with_same_site(SameSite::Lax)
        .with_expiry(Expiry::OnInactivity(time::Duration::minutes(
            state.config.session_inactivity_minutes,
        )));

    Router::new()
        .nest("/chat", rooms::router())
        .with_state(state)
        .layer(session_layer)
        .layer(CorsLayer::permissive())
        .layer(TraceLayer::new_for_http())
}
