use std::sync::Arc;

use axum::Router;

use crate::{AuthProvider, SharedDashboard};

mod auth;
mod dashboard;
mod health;

// ---

/// State shared by every route.
#[derive(Clone)]
pub struct AppState {
    pub auth: Arc<AuthProvider>,
    pub dashboard: SharedDashboard,
}

pub fn router(state: AppState) -> Router {
    // ---
    Router::new()
        .merge(auth::router())
        .merge(dashboard::router())
        .merge(health::router())
        .with_state(state)
}
