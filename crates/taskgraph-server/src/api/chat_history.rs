//! `GET /api/chat-history?project_id=…&session_id=…[&client_id=…]` — a thin
//! read-only proxy to the chat history provider. `client_id` defaults to
//! `project_id` when omitted, matching the platform's existing convention.

use axum::extract::{Query, State};
use axum::routing::get;
use axum::{Json, Router};
use serde::Deserialize;

use taskgraph_core::error::EngineError;
use taskgraph_core::AppState;

pub fn router() -> Router<AppState> {
    Router::new().route("/api/chat-history", get(chat_history))
}

#[derive(Debug, Deserialize)]
struct ChatHistoryQuery {
    project_id: String,
    session_id: String,
    client_id: Option<String>,
}

async fn chat_history(
    State(state): State<AppState>,
    Query(query): Query<ChatHistoryQuery>,
) -> Result<Json<serde_json::Value>, EngineError> {
    let client_id = query.client_id.as_deref().unwrap_or(&query.project_id);

    let messages = state
        .chat_history_provider
        .list_messages(client_id, &query.project_id, &query.session_id)
        .await?;

    Ok(Json(serde_json::json!({ "messages": messages })))
}
