use axum::{
    extract::{Path, State},
    http::HeaderMap,
    response::IntoResponse,
    routing::{delete, get, post, put},
    Json, Router,
};
use serde::Deserialize;
use uuid::Uuid;
use validator::Validate;

use crate::{
    auth::CustomerContext,
    errors::ServiceError,
    handlers::common::{no_content, success, validate_input},
    services::cart::AddToCartInput,
    AppState,
};

pub fn cart_routes() -> Router<AppState> {
    Router::new()
        .route("/", get(get_cart))
        .route("/", delete(empty_cart))
        .route("/count", get(item_count))
        .route("/items", post(add_item))
        .route("/items/:product_id", put(update_quantity))
        .route("/items/:product_id", delete(remove_item))
}

async fn get_cart(
    State(state): State<AppState>,
    customer: CustomerContext,
) -> Result<impl IntoResponse, ServiceError> {
    let cart = state.services.cart.get_cart(customer.id).await?;
    Ok(success(cart))
}

/// Line count for the cart badge; counts only purchasable lines.
async fn item_count(
    State(state): State<AppState>,
    customer: CustomerContext,
) -> Result<impl IntoResponse, ServiceError> {
    let count = state.services.cart.item_count(customer.id).await?;
    Ok(success(serde_json::json!({ "count": count })))
}

#[derive(Debug, Deserialize, Validate)]
struct AddItemRequest {
    product_id: Uuid,
    #[validate(range(min = 1, max = 99))]
    quantity: i32,
}

async fn add_item(
    State(state): State<AppState>,
    customer: CustomerContext,
    headers: HeaderMap,
    Json(body): Json<AddItemRequest>,
) -> Result<impl IntoResponse, ServiceError> {
    validate_input(&body)?;
    let source_ip = headers
        .get("x-forwarded-for")
        .and_then(|v| v.to_str().ok())
        .and_then(|v| v.split(',').next())
        .map(|v| v.trim().to_string());

    let cart = state
        .services
        .cart
        .add_item(
            customer.id,
            AddToCartInput {
                product_id: body.product_id,
                quantity: body.quantity,
            },
            source_ip,
        )
        .await?;
    Ok(success(cart))
}

#[derive(Debug, Deserialize, Validate)]
struct UpdateQuantityRequest {
    #[validate(range(min = 0, max = 99))]
    quantity: i32,
}

async fn update_quantity(
    State(state): State<AppState>,
    customer: CustomerContext,
    Path(product_id): Path<Uuid>,
    Json(body): Json<UpdateQuantityRequest>,
) -> Result<impl IntoResponse, ServiceError> {
    validate_input(&body)?;
    let update = state
        .services
        .cart
        .update_quantity(customer.id, product_id, body.quantity)
        .await?;
    Ok(success(update))
}

async fn remove_item(
    State(state): State<AppState>,
    customer: CustomerContext,
    Path(product_id): Path<Uuid>,
) -> Result<impl IntoResponse, ServiceError> {
    state
        .services
        .cart
        .remove_item(customer.id, product_id)
        .await?;
    Ok(no_content())
}

async fn empty_cart(
    State(state): State<AppState>,
    customer: CustomerContext,
) -> Result<impl IntoResponse, ServiceError> {
    state.services.cart.empty_cart(customer.id).await?;
    Ok(no_content())
}
