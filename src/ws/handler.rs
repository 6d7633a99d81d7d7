//! Axum WebSocket upgrade handler.

use axum::extract::State;
use axum::extract::ws::WebSocketUpgrade;
use axum::response::IntoResponse;

use super::connection::run_connection;
use crate::app_state::AppState;

/// `GET /ws` — Upgrade HTTP connection to WebSocket.
///
/// The connection subscribes to cart events before the upgrade and runs
/// inside a provider scope for the application's cart.
pub async fn ws_handler(ws: WebSocketUpgrade, State(state): State<AppState>) -> impl IntoResponse {
    let events = state.event_bus.subscription();
    let provider = state.provider();

    ws.on_upgrade(move |socket| async move {
        provider.scope(run_connection(socket, events)).await;
    })
}
