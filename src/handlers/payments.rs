use axum::{
    extract::State,
    response::IntoResponse,
    routing::post,
    Json, Router,
};
use serde::Deserialize;
use validator::Validate;

use crate::{
    auth::CustomerContext,
    errors::ServiceError,
    handlers::common::{success, validate_input},
    AppState,
};

pub fn payment_routes() -> Router<AppState> {
    Router::new()
        .route("/init", post(initialize_payment))
        .route("/verify", post(verify_payment))
}

#[derive(Debug, Default, Deserialize, Validate)]
struct InitializePaymentRequest {
    /// Overrides the customer's account email for gateway receipts.
    #[validate(email)]
    email: Option<String>,
}

async fn initialize_payment(
    State(state): State<AppState>,
    customer: CustomerContext,
    body: Option<Json<InitializePaymentRequest>>,
) -> Result<impl IntoResponse, ServiceError> {
    let body = body.map(|Json(b)| b).unwrap_or_default();
    validate_input(&body)?;

    let handle = state
        .services
        .checkout
        .initialize_payment(&customer, body.email)
        .await?;
    Ok(success(handle))
}

#[derive(Debug, Deserialize, Validate)]
struct VerifyPaymentRequest {
    #[validate(length(min = 1))]
    reference: String,
}

async fn verify_payment(
    State(state): State<AppState>,
    customer: CustomerContext,
    Json(body): Json<VerifyPaymentRequest>,
) -> Result<impl IntoResponse, ServiceError> {
    validate_input(&body)?;

    let confirmation = state
        .services
        .checkout
        .verify_payment(&customer, &body.reference)
        .await?;
    Ok(success(confirmation))
}
