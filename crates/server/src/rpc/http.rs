use axum::{
    body::Bytes,
    extract::State,
    http::StatusCode,
    response::{IntoResponse, Response},
    routing::post,
    Json, Router,
};

use super::transport::handle_raw_request;
use crate::runtime::AppState;

pub fn router() -> Router<AppState> {
    Router::new().route("/mcp", post(mcp_http_route))
}

async fn mcp_http_route(State(state): State<AppState>, body: Bytes) -> Response {
    match handle_raw_request(&body, &state.dispatcher).await {
        Some(response) => Json(response).into_response(),
        None => StatusCode::NO_CONTENT.into_response(),
    }
}
