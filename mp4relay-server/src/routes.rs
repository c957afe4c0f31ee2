use axum::Router;
use axum::routing::get;
use tower_http::trace::TraceLayer;

use crate::handlers;
use crate::state::AppState;

pub fn build_router(state: AppState) -> Router {
    let path = state.config.route_path();
    Router::new()
        .route(&path, get(handlers::fetch_video))
        .layer(TraceLayer::new_for_http())
        .with_state(state)
}
