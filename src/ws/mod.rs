//! WebSocket layer: connection handling and message routing.
//!
//! The WebSocket endpoint at `/ws` lets views bind to the cart: it pushes a
//! snapshot on connect and every cart event afterwards, and accepts cart
//! commands.

pub mod connection;
pub mod handler;
pub mod messages;
