//! Domain layer: cart entries, cart state, and the event system.
//!
//! This module contains the cart model including product identity, cart
//! entries and their wire format, the pure state transitions, and the event
//! bus for broadcasting committed changes.

pub mod cart_event;
pub mod cart_item;
pub mod cart_state;
pub mod event_bus;
pub mod product_id;

pub use cart_event::CartEvent;
pub use cart_item::{CartItem, CartSummary, Product};
pub use cart_state::{CartChange, CartSnapshot, CartState};
pub use event_bus::{CartSubscription, Delivery, EventBus};
pub use product_id::ProductId;
