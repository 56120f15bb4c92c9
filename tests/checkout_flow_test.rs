mod common;

use axum::http::{Method, StatusCode};
use rust_decimal::Decimal;
use rust_decimal_macros::dec;
use serde_json::{json, Value};
use uuid::Uuid;

use common::{TestApp, VerifyScript};
use storefront_api::gateway::GatewayPaymentStatus;

fn as_decimal(value: &Value) -> Decimal {
    value
        .as_str()
        .expect("decimal serialized as string")
        .parse()
        .expect("parsable decimal")
}

/// Seeds a cart worth 55.50 (18.50 x 3) and returns the initialized payment
/// reference.
async fn initialized_checkout(app: &TestApp, token: &str) -> String {
    let product = app.seed_product("Linen Shirt", dec!(18.50), true).await;
    let (status, _) = app
        .request(
            Method::POST,
            "/api/v1/cart/items",
            Some(token),
            Some(json!({ "product_id": product, "quantity": 3 })),
        )
        .await;
    assert_eq!(status, StatusCode::OK);

    let (status, handle) = app
        .request(Method::POST, "/api/v1/payments/init", Some(token), None)
        .await;
    assert_eq!(status, StatusCode::OK);
    assert_eq!(as_decimal(&handle["amount"]), dec!(55.50));
    assert!(handle["authorization_url"]
        .as_str()
        .unwrap()
        .starts_with("https://"));
    handle["reference"].as_str().unwrap().to_string()
}

#[tokio::test]
async fn successful_checkout_creates_an_order_and_clears_the_cart() {
    let app = TestApp::spawn().await;
    let customer_id = Uuid::new_v4();
    let token = app.token_for(customer_id, "ama@example.com");

    let reference = initialized_checkout(&app, &token).await;
    app.gateway
        .script_verify(&reference, VerifyScript::Success { amount: dec!(55.50) });

    let (status, confirmation) = app
        .request(
            Method::POST,
            "/api/v1/payments/verify",
            Some(&token),
            Some(json!({ "reference": reference })),
        )
        .await;
    assert_eq!(status, StatusCode::OK);
    assert_eq!(confirmation["already_processed"], false);
    assert_eq!(confirmation["cart_cleared"], true);
    assert_eq!(confirmation["items_count"], 1);
    assert_eq!(confirmation["payment_reference"], reference.as_str());
    assert_eq!(as_decimal(&confirmation["total_amount"]), dec!(55.50));
    assert!(confirmation["invoice_no"]
        .as_str()
        .unwrap()
        .starts_with("INV-"));

    let (_, cart) = app
        .request(Method::GET, "/api/v1/cart", Some(&token), None)
        .await;
    assert!(cart["lines"].as_array().unwrap().is_empty());

    // The order is visible to its owner with lines and payment attached.
    let order_id = confirmation["order_id"].as_str().unwrap();
    let (status, detail) = app
        .request(
            Method::GET,
            &format!("/api/v1/orders/{}", order_id),
            Some(&token),
            None,
        )
        .await;
    assert_eq!(status, StatusCode::OK);
    assert_eq!(detail["order"]["payment_status"], "completed");
    assert_eq!(detail["order"]["delivery_status"], "pending");
    assert_eq!(detail["lines"].as_array().unwrap().len(), 1);
    assert_eq!(detail["payment"]["method"], "online");
}

#[tokio::test]
async fn verifying_twice_returns_the_original_order() {
    let app = TestApp::spawn().await;
    let token = app.token_for(Uuid::new_v4(), "ama@example.com");

    let reference = initialized_checkout(&app, &token).await;
    app.gateway
        .script_verify(&reference, VerifyScript::Success { amount: dec!(55.50) });

    let (_, first) = app
        .request(
            Method::POST,
            "/api/v1/payments/verify",
            Some(&token),
            Some(json!({ "reference": reference })),
        )
        .await;
    let verify_calls_after_first = app
        .gateway
        .verify_calls
        .load(std::sync::atomic::Ordering::SeqCst);

    let (status, second) = app
        .request(
            Method::POST,
            "/api/v1/payments/verify",
            Some(&token),
            Some(json!({ "reference": reference })),
        )
        .await;
    assert_eq!(status, StatusCode::OK);
    assert_eq!(second["order_id"], first["order_id"]);
    assert_eq!(second["already_processed"], true);
    // The repeat answer comes from storage, not the gateway.
    assert_eq!(
        app.gateway
            .verify_calls
            .load(std::sync::atomic::Ordering::SeqCst),
        verify_calls_after_first
    );
}

#[tokio::test]
async fn empty_cart_never_reaches_the_gateway() {
    let app = TestApp::spawn().await;
    let token = app.token_for(Uuid::new_v4(), "ama@example.com");

    let (status, _) = app
        .request(Method::POST, "/api/v1/payments/init", Some(&token), None)
        .await;
    assert_eq!(status, StatusCode::BAD_REQUEST);
    assert_eq!(app.gateway.init_call_count(), 0);
}

#[tokio::test]
async fn failed_gateway_initialization_leaves_nothing_behind() {
    let app = TestApp::spawn().await;
    let token = app.token_for(Uuid::new_v4(), "ama@example.com");
    let product = app.seed_product("Teapot", dec!(12.00), true).await;
    app.request(
        Method::POST,
        "/api/v1/cart/items",
        Some(&token),
        Some(json!({ "product_id": product, "quantity": 1 })),
    )
    .await;

    app.gateway.fail_next_init();
    let (status, _) = app
        .request(Method::POST, "/api/v1/payments/init", Some(&token), None)
        .await;
    assert_eq!(status, StatusCode::BAD_GATEWAY);

    // Cart is untouched and a retry succeeds.
    let (status, handle) = app
        .request(Method::POST, "/api/v1/payments/init", Some(&token), None)
        .await;
    assert_eq!(status, StatusCode::OK);
    assert_eq!(as_decimal(&handle["amount"]), dec!(12.00));
}

#[tokio::test]
async fn amounts_within_one_cent_are_accepted() {
    let app = TestApp::spawn().await;
    let token = app.token_for(Uuid::new_v4(), "ama@example.com");
    let product = app.seed_product("Bookshelf", dec!(100.00), true).await;
    app.request(
        Method::POST,
        "/api/v1/cart/items",
        Some(&token),
        Some(json!({ "product_id": product, "quantity": 1 })),
    )
    .await;
    let (_, handle) = app
        .request(Method::POST, "/api/v1/payments/init", Some(&token), None)
        .await;
    let reference = handle["reference"].as_str().unwrap().to_string();

    app.gateway.script_verify(
        &reference,
        VerifyScript::Success {
            amount: dec!(100.01),
        },
    );
    let (status, confirmation) = app
        .request(
            Method::POST,
            "/api/v1/payments/verify",
            Some(&token),
            Some(json!({ "reference": reference })),
        )
        .await;
    assert_eq!(status, StatusCode::OK);
    assert_eq!(as_decimal(&confirmation["total_amount"]), dec!(100.00));
}

#[tokio::test]
async fn amounts_beyond_the_tolerance_are_rejected() {
    let app = TestApp::spawn().await;
    let token = app.token_for(Uuid::new_v4(), "ama@example.com");
    let product = app.seed_product("Bookshelf", dec!(100.00), true).await;
    app.request(
        Method::POST,
        "/api/v1/cart/items",
        Some(&token),
        Some(json!({ "product_id": product, "quantity": 1 })),
    )
    .await;
    let (_, handle) = app
        .request(Method::POST, "/api/v1/payments/init", Some(&token), None)
        .await;
    let reference = handle["reference"].as_str().unwrap().to_string();

    app.gateway.script_verify(
        &reference,
        VerifyScript::Success {
            amount: dec!(100.02),
        },
    );
    let (status, body) = app
        .request(
            Method::POST,
            "/api/v1/payments/verify",
            Some(&token),
            Some(json!({ "reference": reference })),
        )
        .await;
    assert_eq!(status, StatusCode::PAYMENT_REQUIRED);
    assert!(body["message"].as_str().unwrap().contains("mismatch"));

    // No order was written and the cart survives for another attempt.
    let (_, cart) = app
        .request(Method::GET, "/api/v1/cart", Some(&token), None)
        .await;
    assert_eq!(cart["lines"].as_array().unwrap().len(), 1);
    let (_, orders) = app
        .request(Method::GET, "/api/v1/orders", Some(&token), None)
        .await;
    assert_eq!(orders["total"], 0);
}

#[tokio::test]
async fn unsuccessful_gateway_status_rejects_the_payment() {
    let app = TestApp::spawn().await;
    let token = app.token_for(Uuid::new_v4(), "ama@example.com");
    let reference = initialized_checkout(&app, &token).await;

    app.gateway.script_verify(
        &reference,
        VerifyScript::Status(GatewayPaymentStatus::Abandoned),
    );
    let (status, body) = app
        .request(
            Method::POST,
            "/api/v1/payments/verify",
            Some(&token),
            Some(json!({ "reference": reference })),
        )
        .await;
    assert_eq!(status, StatusCode::PAYMENT_REQUIRED);
    assert!(body["message"].as_str().unwrap().contains("abandoned"));
}

#[tokio::test]
async fn gateway_outage_is_retryable() {
    let app = TestApp::spawn().await;
    let token = app.token_for(Uuid::new_v4(), "ama@example.com");
    let reference = initialized_checkout(&app, &token).await;

    app.gateway.script_verify(&reference, VerifyScript::Unavailable);
    let (status, _) = app
        .request(
            Method::POST,
            "/api/v1/payments/verify",
            Some(&token),
            Some(json!({ "reference": reference })),
        )
        .await;
    assert_eq!(status, StatusCode::BAD_GATEWAY);

    // Nothing was consumed; once the gateway answers, the same reference
    // completes.
    app.gateway
        .script_verify(&reference, VerifyScript::Success { amount: dec!(55.50) });
    let (status, confirmation) = app
        .request(
            Method::POST,
            "/api/v1/payments/verify",
            Some(&token),
            Some(json!({ "reference": reference })),
        )
        .await;
    assert_eq!(status, StatusCode::OK);
    assert_eq!(confirmation["already_processed"], false);
}

#[tokio::test]
async fn blank_and_unknown_references_are_rejected() {
    let app = TestApp::spawn().await;
    let token = app.token_for(Uuid::new_v4(), "ama@example.com");

    let (status, _) = app
        .request(
            Method::POST,
            "/api/v1/payments/verify",
            Some(&token),
            Some(json!({ "reference": "   " })),
        )
        .await;
    assert_eq!(status, StatusCode::BAD_REQUEST);

    let (status, _) = app
        .request(
            Method::POST,
            "/api/v1/payments/verify",
            Some(&token),
            Some(json!({ "reference": "PAY-does-not-exist" })),
        )
        .await;
    assert_eq!(status, StatusCode::NOT_FOUND);
}

#[tokio::test]
async fn references_are_scoped_to_their_owner() {
    let app = TestApp::spawn().await;
    let ama = app.token_for(Uuid::new_v4(), "ama@example.com");
    let kofi = app.token_for(Uuid::new_v4(), "kofi@example.com");

    let reference = initialized_checkout(&app, &ama).await;
    app.gateway
        .script_verify(&reference, VerifyScript::Success { amount: dec!(55.50) });

    let (status, _) = app
        .request(
            Method::POST,
            "/api/v1/payments/verify",
            Some(&kofi),
            Some(json!({ "reference": reference })),
        )
        .await;
    assert_eq!(status, StatusCode::NOT_FOUND);
}

#[tokio::test]
async fn direct_checkout_records_an_offline_pending_order() {
    let app = TestApp::spawn().await;
    let token = app.token_for(Uuid::new_v4(), "ama@example.com");
    let product = app.seed_product("Teapot", dec!(12.00), true).await;
    app.request(
        Method::POST,
        "/api/v1/cart/items",
        Some(&token),
        Some(json!({ "product_id": product, "quantity": 2 })),
    )
    .await;

    let (status, confirmation) = app
        .request(Method::POST, "/api/v1/checkout/direct", Some(&token), None)
        .await;
    assert_eq!(status, StatusCode::CREATED);
    assert_eq!(confirmation["payment_method"], "offline");
    assert_eq!(as_decimal(&confirmation["total_amount"]), dec!(24.00));
    assert!(confirmation["payment_reference"]
        .as_str()
        .unwrap()
        .starts_with("DIRECT-"));
    assert_eq!(app.gateway.init_call_count(), 0);

    let order_id = confirmation["order_id"].as_str().unwrap();
    let (_, detail) = app
        .request(
            Method::GET,
            &format!("/api/v1/orders/{}", order_id),
            Some(&token),
            None,
        )
        .await;
    assert_eq!(detail["order"]["payment_status"], "pending");
    assert_eq!(detail["order"]["order_status"], "Pending");
}

#[tokio::test]
async fn checkout_with_multiple_products_writes_a_line_per_product() {
    let app = TestApp::spawn().await;
    let token = app.token_for(Uuid::new_v4(), "ama@example.com");

    // 20.00 x 2 + 15.50 x 1 = 55.50
    let butter = app.seed_product("Shea Butter", dec!(20.00), true).await;
    let scarf = app.seed_product("Kente Scarf", dec!(15.50), true).await;
    app.request(
        Method::POST,
        "/api/v1/cart/items",
        Some(&token),
        Some(json!({ "product_id": butter, "quantity": 2 })),
    )
    .await;
    app.request(
        Method::POST,
        "/api/v1/cart/items",
        Some(&token),
        Some(json!({ "product_id": scarf, "quantity": 1 })),
    )
    .await;

    let (status, handle) = app
        .request(Method::POST, "/api/v1/payments/init", Some(&token), None)
        .await;
    assert_eq!(status, StatusCode::OK);
    assert_eq!(as_decimal(&handle["amount"]), dec!(55.50));
    let reference = handle["reference"].as_str().unwrap().to_string();

    app.gateway
        .script_verify(&reference, VerifyScript::Success { amount: dec!(55.50) });
    let (status, confirmation) = app
        .request(
            Method::POST,
            "/api/v1/payments/verify",
            Some(&token),
            Some(json!({ "reference": reference })),
        )
        .await;
    assert_eq!(status, StatusCode::OK);
    assert_eq!(confirmation["items_count"], 2);
    assert_eq!(as_decimal(&confirmation["total_amount"]), dec!(55.50));

    let order_id = confirmation["order_id"].as_str().unwrap();
    let (_, detail) = app
        .request(
            Method::GET,
            &format!("/api/v1/orders/{}", order_id),
            Some(&token),
            None,
        )
        .await;
    let lines = detail["lines"].as_array().unwrap();
    assert_eq!(lines.len(), 2);
    let quantities: Vec<i64> = lines
        .iter()
        .map(|l| l["quantity"].as_i64().unwrap())
        .collect();
    assert!(quantities.contains(&2));
    assert!(quantities.contains(&1));
}

#[tokio::test]
async fn order_write_failure_surfaces_as_a_persistence_error() {
    use assert_matches::assert_matches;
    use sea_orm::ConnectionTrait;
    use storefront_api::{auth::CustomerContext, errors::ServiceError};

    let app = TestApp::spawn().await;
    let customer_id = Uuid::new_v4();
    let token = app.token_for(customer_id, "ama@example.com");
    let reference = initialized_checkout(&app, &token).await;
    app.gateway
        .script_verify(&reference, VerifyScript::Success { amount: dec!(55.50) });

    // Break the line insert mid-flow; the whole order write must fail as one.
    app.db
        .execute_unprepared("ALTER TABLE order_lines RENAME TO order_lines_hidden")
        .await
        .unwrap();

    let customer = CustomerContext {
        id: customer_id,
        email: "ama@example.com".to_string(),
    };
    let err = app
        .services
        .checkout
        .verify_payment(&customer, &reference)
        .await
        .unwrap_err();
    assert_matches!(err, ServiceError::OrderPersistence(_));

    // Rolled back: no order, no payment, and the cart survives for a retry.
    let (_, orders) = app
        .request(Method::GET, "/api/v1/orders", Some(&token), None)
        .await;
    assert_eq!(orders["total"], 0);
    assert!(app
        .services
        .orders
        .find_payment_by_reference(&reference)
        .await
        .unwrap()
        .is_none());
    let (_, cart) = app
        .request(Method::GET, "/api/v1/cart", Some(&token), None)
        .await;
    assert_eq!(cart["lines"].as_array().unwrap().len(), 1);
}

#[tokio::test]
async fn repeat_verification_reports_the_current_cart_state() {
    let app = TestApp::spawn().await;
    let token = app.token_for(Uuid::new_v4(), "ama@example.com");
    let reference = initialized_checkout(&app, &token).await;
    app.gateway
        .script_verify(&reference, VerifyScript::Success { amount: dec!(55.50) });

    let (_, first) = app
        .request(
            Method::POST,
            "/api/v1/payments/verify",
            Some(&token),
            Some(json!({ "reference": reference })),
        )
        .await;
    assert_eq!(first["cart_cleared"], true);

    // The customer starts a new cart before re-sending the verify request.
    let mug = app.seed_product("Enamel Mug", dec!(7.25), true).await;
    app.request(
        Method::POST,
        "/api/v1/cart/items",
        Some(&token),
        Some(json!({ "product_id": mug, "quantity": 1 })),
    )
    .await;

    let (status, second) = app
        .request(
            Method::POST,
            "/api/v1/payments/verify",
            Some(&token),
            Some(json!({ "reference": reference })),
        )
        .await;
    assert_eq!(status, StatusCode::OK);
    assert_eq!(second["already_processed"], true);
    assert_eq!(second["cart_cleared"], false);
}

#[tokio::test]
async fn cart_edits_after_initialization_settle_against_the_live_total() {
    let app = TestApp::spawn().await;
    let token = app.token_for(Uuid::new_v4(), "ama@example.com");
    let reference = initialized_checkout(&app, &token).await;

    // Cart grows to 67.50 after the gateway was initialized for 55.50.
    let teapot = app.seed_product("Teapot", dec!(12.00), true).await;
    app.request(
        Method::POST,
        "/api/v1/cart/items",
        Some(&token),
        Some(json!({ "product_id": teapot, "quantity": 1 })),
    )
    .await;

    // The customer only paid the initialized amount, so settlement fails
    // against the live total.
    app.gateway
        .script_verify(&reference, VerifyScript::Success { amount: dec!(55.50) });
    let (status, body) = app
        .request(
            Method::POST,
            "/api/v1/payments/verify",
            Some(&token),
            Some(json!({ "reference": reference })),
        )
        .await;
    assert_eq!(status, StatusCode::PAYMENT_REQUIRED);
    assert!(body["message"].as_str().unwrap().contains("67.50"));
}
