//! # cart-store
//!
//! Persistent shopping-cart state for mobile front-ends.
//!
//! The crate holds an ordered list of cart entries in memory, writes the
//! full list to a key-value store after every mutation, and restores it on
//! startup. Views bind to the cart through a shared [`service::CartStore`]
//! handle, an ambient [`context::use_cart`] lookup, or the local REST and
//! WebSocket surface.
//!
//! ## Architecture
//!
//! ```text
//! Views (in-process, HTTP, WebSocket)
//!     │
//!     ├── REST Handlers (api/)
//!     ├── WS Handler (ws/) ── CartProvider scope (context)
//!     │
//!     ├── CartStore (service/)
//!     ├── EventBus (domain/)
//!     │
//!     ├── CartState (domain/)
//!     │
//!     └── KeyValueStore: memory | file | PostgreSQL (persistence/)
//! ```

pub mod api;
pub mod app_state;
pub mod config;
pub mod context;
pub mod domain;
pub mod error;
pub mod persistence;
pub mod service;
pub mod ws;
