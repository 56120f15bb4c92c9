use axum::{extract::State, response::IntoResponse, routing::post, Router};

use crate::{
    auth::CustomerContext,
    errors::ServiceError,
    handlers::common::created,
    AppState,
};

pub fn checkout_routes() -> Router<AppState> {
    Router::new().route("/direct", post(direct_checkout))
}

/// Creates an order from the cart without going through the payment gateway.
/// Payment is recorded as offline and settled out of band.
async fn direct_checkout(
    State(state): State<AppState>,
    customer: CustomerContext,
) -> Result<impl IntoResponse, ServiceError> {
    let confirmation = state.services.checkout.direct_checkout(&customer).await?;
    Ok(created(confirmation))
}
