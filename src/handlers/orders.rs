use axum::{
    extract::{Path, Query, State},
    response::IntoResponse,
    routing::{get, put},
    Json, Router,
};
use serde::{Deserialize, Serialize};
use uuid::Uuid;

use crate::{
    auth::CustomerContext,
    entities::order::{self, DeliveryStatus},
    errors::ServiceError,
    handlers::common::success,
    AppState,
};

pub fn order_routes() -> Router<AppState> {
    Router::new()
        .route("/", get(list_orders))
        .route("/:id", get(get_order))
        .route("/:id/delivery-status", put(update_delivery_status))
}

#[derive(Debug, Deserialize)]
struct ListOrdersQuery {
    #[serde(default = "default_page")]
    page: u64,
    #[serde(default = "default_per_page")]
    per_page: u64,
}

fn default_page() -> u64 {
    1
}

fn default_per_page() -> u64 {
    20
}

#[derive(Debug, Serialize)]
struct OrderListResponse {
    orders: Vec<order::Model>,
    total: u64,
    page: u64,
    per_page: u64,
}

async fn list_orders(
    State(state): State<AppState>,
    customer: CustomerContext,
    Query(query): Query<ListOrdersQuery>,
) -> Result<impl IntoResponse, ServiceError> {
    let per_page = query.per_page.clamp(1, 100);
    let (orders, total) = state
        .services
        .orders
        .list_orders_for_customer(customer.id, query.page, per_page)
        .await?;
    Ok(success(OrderListResponse {
        orders,
        total,
        page: query.page,
        per_page,
    }))
}

async fn get_order(
    State(state): State<AppState>,
    customer: CustomerContext,
    Path(order_id): Path<Uuid>,
) -> Result<impl IntoResponse, ServiceError> {
    let detail = state.services.orders.get_order_with_lines(order_id).await?;
    // Orders are only visible to their owner.
    if detail.order.customer_id != customer.id {
        return Err(ServiceError::NotFound(format!(
            "Order {} not found",
            order_id
        )));
    }
    Ok(success(detail))
}

#[derive(Debug, Deserialize)]
struct UpdateDeliveryStatusRequest {
    status: DeliveryStatus,
    tracking_number: Option<String>,
    delivery_notes: Option<String>,
}

async fn update_delivery_status(
    State(state): State<AppState>,
    customer: CustomerContext,
    Path(order_id): Path<Uuid>,
    Json(body): Json<UpdateDeliveryStatusRequest>,
) -> Result<impl IntoResponse, ServiceError> {
    let current = state.services.orders.get_order(order_id).await?;
    if current.customer_id != customer.id {
        return Err(ServiceError::NotFound(format!(
            "Order {} not found",
            order_id
        )));
    }

    let updated = state
        .services
        .orders
        .update_delivery_status(order_id, body.status, body.tracking_number, body.delivery_notes)
        .await?;
    Ok(success(updated))
}
