//! Cart handlers: read, add, increment, decrement.

use axum::extract::rejection::JsonRejection;
use axum::extract::{Path, State};
use axum::response::IntoResponse;
use axum::routing::{get, post};
use axum::{Json, Router};

use crate::api::dto::{AddToCartRequest, CartResponse};
use crate::app_state::AppState;
use crate::domain::{Product, ProductId};
use crate::error::{CartError, ErrorResponse};

/// `GET /cart` — Current cart contents.
#[utoipa::path(
    get,
    path = "/api/v1/cart",
    tag = "Cart",
    summary = "Get the cart",
    description = "Returns every cart entry in insertion order, with totals and the current revision.",
    responses(
        (status = 200, description = "Cart contents", body = CartResponse),
    )
)]
pub async fn get_cart(State(state): State<AppState>) -> impl IntoResponse {
    Json(CartResponse::from(state.cart.snapshot().await))
}

/// `POST /cart/items` — Add one unit of a product.
///
/// # Errors
///
/// Returns [`CartError`] on an unreadable body, an invalid product, or a
/// failed durable write.
#[utoipa::path(
    post,
    path = "/api/v1/cart/items",
    tag = "Cart",
    summary = "Add a product",
    description = "Appends the product with quantity 1, or increments its quantity if it is already in the cart.",
    request_body = AddToCartRequest,
    responses(
        (status = 200, description = "Cart after the change", body = CartResponse),
        (status = 400, description = "Unreadable body or invalid product", body = ErrorResponse),
        (status = 500, description = "Cart could not be persisted", body = ErrorResponse),
    )
)]
pub async fn add_to_cart(
    State(state): State<AppState>,
    body: Result<Json<AddToCartRequest>, JsonRejection>,
) -> Result<impl IntoResponse, CartError> {
    let Json(req) = body?;
    let product = Product::try_from(req)?;
    let snapshot = state.cart.add_to_cart(product).await?;
    Ok(Json(CartResponse::from(snapshot)))
}

/// `POST /cart/items/{id}/increment` — Add one unit to an entry.
///
/// # Errors
///
/// Returns [`CartError`] on a blank id or a failed durable write.
#[utoipa::path(
    post,
    path = "/api/v1/cart/items/{id}/increment",
    tag = "Cart",
    summary = "Increment an entry",
    description = "Adds one unit to the entry. Unknown ids leave the cart unchanged.",
    params(
        ("id" = String, Path, description = "Product id"),
    ),
    responses(
        (status = 200, description = "Cart after the change", body = CartResponse),
        (status = 400, description = "Invalid product id", body = ErrorResponse),
        (status = 500, description = "Cart could not be persisted", body = ErrorResponse),
    )
)]
pub async fn increment(
    State(state): State<AppState>,
    Path(id): Path<String>,
) -> Result<impl IntoResponse, CartError> {
    let id = ProductId::new(id)?;
    let snapshot = state.cart.increment(&id).await?;
    Ok(Json(CartResponse::from(snapshot)))
}

/// `POST /cart/items/{id}/decrement` — Remove one unit from an entry.
///
/// # Errors
///
/// Returns [`CartError`] on a blank id or a failed durable write.
#[utoipa::path(
    post,
    path = "/api/v1/cart/items/{id}/decrement",
    tag = "Cart",
    summary = "Decrement an entry",
    description = "Removes one unit from the entry; the entry leaves the cart when its last unit goes. Unknown ids leave the cart unchanged.",
    params(
        ("id" = String, Path, description = "Product id"),
    ),
    responses(
        (status = 200, description = "Cart after the change", body = CartResponse),
        (status = 400, description = "Invalid product id", body = ErrorResponse),
        (status = 500, description = "Cart could not be persisted", body = ErrorResponse),
    )
)]
pub async fn decrement(
    State(state): State<AppState>,
    Path(id): Path<String>,
) -> Result<impl IntoResponse, CartError> {
    let id = ProductId::new(id)?;
    let snapshot = state.cart.decrement(&id).await?;
    Ok(Json(CartResponse::from(snapshot)))
}

/// Cart routes.
pub fn routes() -> Router<AppState> {
    Router::new()
        .route("/cart", get(get_cart))
        .route("/cart/items", post(add_to_cart))
        .route("/cart/items/{id}/increment", post(increment))
        .route("/cart/items/{id}/decrement", post(decrement))
}
