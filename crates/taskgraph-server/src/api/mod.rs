pub mod chat_history;
pub mod health;
pub mod results;
pub mod status;
pub mod workflow;

use axum::Router;

use taskgraph_core::AppState;

/// Build the complete API router.
pub fn api_router() -> Router<AppState> {
    Router::new()
        .merge(workflow::router())
        .merge(results::router())
        .merge(status::router())
        .merge(chat_history::router())
        .merge(health::router())
}
