//! Shared helpers for integration tests: an in-process server on an
//! ephemeral port.

#![allow(dead_code, clippy::panic)]

use std::net::SocketAddr;
use std::sync::Arc;
use std::time::Duration;

use async_trait::async_trait;
use tokio::net::TcpListener;

use cart_store::api::build_app;
use cart_store::api::dto::AddToCartRequest;
use cart_store::app_state::AppState;
use cart_store::domain::EventBus;
use cart_store::error::CartError;
use cart_store::persistence::{KeyValueStore, MemoryStore};
use cart_store::service::{CartStore, PersistMode, RetryPolicy, StoreOptions};

pub const KEY: &str = "@goMarket:Products";

/// Backend that reads nothing and refuses every write.
#[derive(Debug, Default)]
pub struct RefusingStore;

#[async_trait]
impl KeyValueStore for RefusingStore {
    async fn get(&self, _key: &str) -> Result<Option<String>, CartError> {
        Ok(None)
    }

    async fn set(&self, _key: &str, _value: &str) -> Result<(), CartError> {
        Err(CartError::Persistence("device storage full".to_string()))
    }

    fn backend_name(&self) -> &'static str {
        "refusing"
    }
}

/// Memory backend that stores each write at once but acknowledges it
/// only after `ack_delay`.
#[derive(Debug)]
pub struct SlowAckStore {
    pub inner: MemoryStore,
    pub ack_delay: Duration,
}

#[async_trait]
impl KeyValueStore for SlowAckStore {
    async fn get(&self, key: &str) -> Result<Option<String>, CartError> {
        self.inner.get(key).await
    }

    async fn set(&self, key: &str, value: &str) -> Result<(), CartError> {
        self.inner.set(key, value).await?;
        tokio::time::sleep(self.ack_delay).await;
        Ok(())
    }

    fn backend_name(&self) -> &'static str {
        "slow-ack"
    }
}

/// A running server and the cart behind it.
pub struct TestServer {
    pub addr: SocketAddr,
    pub cart: Arc<CartStore>,
}

impl TestServer {
    pub fn url(&self, path: &str) -> String {
        format!("http://{}{path}", self.addr)
    }

    pub fn ws_url(&self) -> String {
        format!("ws://{}/ws", self.addr)
    }
}

pub async fn spawn_server(storage: Arc<dyn KeyValueStore>) -> TestServer {
    spawn_server_with_timeout(storage, Duration::from_secs(5)).await
}

pub async fn spawn_server_with_timeout(
    storage: Arc<dyn KeyValueStore>,
    request_timeout: Duration,
) -> TestServer {
    let options = StoreOptions {
        storage_key: KEY.to_string(),
        persist_mode: PersistMode::Durable,
        retry: RetryPolicy::no_retry(),
    };
    let cart = Arc::new(CartStore::open(storage, EventBus::new(64), options).await);
    let app = build_app(AppState::new(Arc::clone(&cart)), request_timeout);

    let Ok(listener) = TcpListener::bind("127.0.0.1:0").await else {
        panic!("bind failed");
    };
    let Ok(addr) = listener.local_addr() else {
        panic!("no local addr");
    };
    tokio::spawn(async move {
        let _ = axum::serve(listener, app).await;
    });

    TestServer { addr, cart }
}

pub fn product(id: &str, price: f64) -> AddToCartRequest {
    AddToCartRequest {
        id: id.to_string(),
        title: format!("Product {id}"),
        image_url: format!("https://img.example/{id}.png"),
        price,
    }
}
