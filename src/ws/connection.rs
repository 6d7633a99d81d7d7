//! WebSocket connection state machine.
//!
//! Handles the read/write loop for a single WebSocket connection: sends the
//! cart once on connect, executes incoming commands against the provided
//! cart, and forwards every cart event newer than what the client has seen.
//! A client that falls behind the event bus gets a fresh snapshot instead of
//! the events it missed.

use axum::extract::ws::{Message, WebSocket};
use futures_util::{SinkExt, StreamExt};

use super::messages::{WsCommand, WsMessage, WsMessageType};
use crate::api::dto::CartResponse;
use crate::context::use_cart;
use crate::domain::{CartSnapshot, CartSubscription, Delivery, Product, ProductId};
use crate::error::CartError;

/// Runs the read/write loop for a single WebSocket connection.
///
/// Must run inside [`crate::context::CartProvider::scope`]; outside it the
/// client receives a single error message and the connection closes.
pub async fn run_connection(socket: WebSocket, mut events: CartSubscription) {
    let (mut ws_tx, mut ws_rx) = socket.split();

    let greeting = match use_cart() {
        Ok(cart) => {
            let snapshot = cart.snapshot().await;
            events.seen_through(snapshot.revision);
            snapshot_message(String::new(), WsMessageType::Snapshot, snapshot)
        }
        Err(err) => {
            let msg = WsMessage::error(String::new(), err.error_code(), &err.to_string());
            let _ = ws_tx.send(Message::text(encode(&msg))).await;
            return;
        }
    };
    if ws_tx.send(Message::text(encode(&greeting))).await.is_err() {
        return;
    }

    loop {
        tokio::select! {
            // Incoming message from client
            msg = ws_rx.next() => {
                match msg {
                    Some(Ok(Message::Text(text))) => {
                        let response = handle_text_message(&text).await;
                        if ws_tx.send(Message::text(encode(&response))).await.is_err() {
                            break;
                        }
                    }
                    Some(Ok(Message::Close(_))) | None => break,
                    _ => {}
                }
            }
            // Event from EventBus
            delivery = events.next() => {
                let msg = match delivery {
                    Delivery::Event(cart_event) => WsMessage::new(
                        uuid::Uuid::new_v4().to_string(),
                        WsMessageType::Event,
                        serde_json::to_value(&cart_event).unwrap_or_default(),
                    ),
                    Delivery::Lagged(missed) => {
                        tracing::warn!(missed, "ws client lagged behind event bus; resending cart");
                        let Ok(cart) = use_cart() else { break };
                        let snapshot = cart.snapshot().await;
                        events.seen_through(snapshot.revision);
                        snapshot_message(String::new(), WsMessageType::Snapshot, snapshot)
                    }
                    Delivery::Closed => break,
                };
                if ws_tx.send(Message::text(encode(&msg))).await.is_err() {
                    break;
                }
            }
        }
    }

    tracing::debug!("ws connection closed");
}

/// Handles a text message from the client and builds the reply.
async fn handle_text_message(text: &str) -> WsMessage {
    let Ok(msg) = serde_json::from_str::<WsMessage>(text) else {
        return WsMessage::error(String::new(), 400, "malformed JSON");
    };
    let Ok(command) = serde_json::from_value::<WsCommand>(msg.payload) else {
        return WsMessage::error(msg.id, 404, "unknown command");
    };
    match execute(command).await {
        Ok(snapshot) => snapshot_message(msg.id, WsMessageType::Response, snapshot),
        Err(err) => WsMessage::error(msg.id, err.error_code(), &err.to_string()),
    }
}

/// Runs one command against the cart of the current provider scope.
async fn execute(command: WsCommand) -> Result<CartSnapshot, CartError> {
    let cart = use_cart()?;
    match command {
        WsCommand::GetCart => Ok(cart.snapshot().await),
        WsCommand::AddToCart { product } => cart.add_to_cart(Product::try_from(product)?).await,
        WsCommand::Increment { id } => cart.increment(&ProductId::new(id)?).await,
        WsCommand::Decrement { id } => cart.decrement(&ProductId::new(id)?).await,
    }
}

fn snapshot_message(id: String, msg_type: WsMessageType, snapshot: CartSnapshot) -> WsMessage {
    let body = CartResponse::from(snapshot);
    WsMessage::new(id, msg_type, serde_json::to_value(&body).unwrap_or_default())
}

fn encode(msg: &WsMessage) -> String {
    serde_json::to_string(msg).unwrap_or_default()
}
