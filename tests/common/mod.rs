use std::collections::HashMap;
use std::sync::atomic::{AtomicBool, AtomicUsize, Ordering};
use std::sync::{Arc, Mutex};

use async_trait::async_trait;
use axum::body::Body;
use axum::http::{header, Method, Request, StatusCode};
use axum::Router;
use chrono::{Duration, Utc};
use http_body_util::BodyExt;
use rust_decimal::Decimal;
use sea_orm::{ActiveModelTrait, ConnectOptions, Database, Set};
use serde_json::Value;
use tempfile::TempDir;
use tokio::sync::mpsc;
use tower::ServiceExt;
use uuid::Uuid;

use storefront_api::{
    app_router,
    auth::issue_token,
    config::AppConfig,
    db::run_migrations,
    entities::product,
    events::EventSender,
    gateway::{
        GatewayError, GatewayPaymentStatus, InitializedTransaction, PaymentGateway,
        VerifiedTransaction,
    },
    handlers::AppServices,
    services::{CartService, CheckoutService, OrderLedgerService},
    AppState,
};

const TEST_JWT_SECRET: &str =
    "integration_test_secret_key_that_is_definitely_at_least_64_characters_long";

/// Scripted outcome for a verify call on the stub gateway.
#[derive(Debug, Clone)]
pub enum VerifyScript {
    /// Gateway reports success for the given settled amount (major units).
    Success { amount: Decimal },
    /// Gateway answers but the payment did not succeed.
    Status(GatewayPaymentStatus),
    /// Gateway cannot be reached.
    Unavailable,
}

/// In-process stand-in for the payment gateway. Initialize calls are counted
/// so tests can assert that guard failures never reach the gateway.
pub struct StubGateway {
    pub init_calls: AtomicUsize,
    pub verify_calls: AtomicUsize,
    fail_init: AtomicBool,
    scripts: Mutex<HashMap<String, VerifyScript>>,
}

impl StubGateway {
    pub fn new() -> Self {
        Self {
            init_calls: AtomicUsize::new(0),
            verify_calls: AtomicUsize::new(0),
            fail_init: AtomicBool::new(false),
            scripts: Mutex::new(HashMap::new()),
        }
    }

    pub fn script_verify(&self, reference: &str, outcome: VerifyScript) {
        self.scripts
            .lock()
            .unwrap()
            .insert(reference.to_string(), outcome);
    }

    pub fn fail_next_init(&self) {
        self.fail_init.store(true, Ordering::SeqCst);
    }

    pub fn init_call_count(&self) -> usize {
        self.init_calls.load(Ordering::SeqCst)
    }
}

#[async_trait]
impl PaymentGateway for StubGateway {
    async fn initialize_transaction(
        &self,
        _amount: Decimal,
        _email: &str,
        reference: &str,
    ) -> Result<InitializedTransaction, GatewayError> {
        self.init_calls.fetch_add(1, Ordering::SeqCst);
        if self.fail_init.swap(false, Ordering::SeqCst) {
            return Err(GatewayError::Transport("connection refused".into()));
        }
        Ok(InitializedTransaction {
            authorization_url: format!("https://gateway.test/redirect/{}", reference),
            access_code: "test_access_code".to_string(),
            reference: reference.to_string(),
        })
    }

    async fn verify_transaction(
        &self,
        reference: &str,
    ) -> Result<VerifiedTransaction, GatewayError> {
        self.verify_calls.fetch_add(1, Ordering::SeqCst);
        let script = self.scripts.lock().unwrap().get(reference).cloned();
        match script {
            Some(VerifyScript::Success { amount }) => Ok(VerifiedTransaction {
                status: GatewayPaymentStatus::Success,
                amount,
                currency: "GHS".to_string(),
                channel: Some("card".to_string()),
                authorization_code: Some("AUTH_test".to_string()),
                paid_at: Some(Utc::now()),
            }),
            Some(VerifyScript::Status(status)) => Ok(VerifiedTransaction {
                status,
                amount: Decimal::ZERO,
                currency: "GHS".to_string(),
                channel: None,
                authorization_code: None,
                paid_at: None,
            }),
            Some(VerifyScript::Unavailable) => {
                Err(GatewayError::Transport("connection timed out".into()))
            }
            None => Err(GatewayError::Declined(
                "Transaction reference not found".to_string(),
            )),
        }
    }
}

/// A fully wired application over a throwaway sqlite database.
pub struct TestApp {
    pub router: Router,
    pub db: Arc<sea_orm::DatabaseConnection>,
    pub gateway: Arc<StubGateway>,
    pub services: AppServices,
    _tmp: TempDir,
}

impl TestApp {
    pub async fn spawn() -> Self {
        let tmp = TempDir::new().unwrap();
        let db_path = tmp.path().join("storefront.sqlite");
        let url = format!("sqlite://{}?mode=rwc", db_path.display());

        let mut options = ConnectOptions::new(url);
        options.max_connections(5).sqlx_logging(false);
        let db = Arc::new(Database::connect(options).await.unwrap());
        run_migrations(&db).await.unwrap();

        let config = Arc::new(AppConfig::new(
            "sqlite::memory:".to_string(),
            TEST_JWT_SECRET.to_string(),
            "127.0.0.1".to_string(),
            0,
            "test".to_string(),
        ));

        let (event_tx, mut event_rx) = mpsc::channel(64);
        // Drain events so senders never block.
        tokio::spawn(async move { while event_rx.recv().await.is_some() {} });
        let event_sender = Arc::new(EventSender::new(event_tx));

        let gateway = Arc::new(StubGateway::new());

        let cart = CartService::new(db.clone(), event_sender.clone());
        let orders = OrderLedgerService::new(db.clone(), event_sender.clone());
        let checkout = CheckoutService::new(
            db.clone(),
            gateway.clone(),
            cart.clone(),
            orders.clone(),
            event_sender.clone(),
            "GHS".to_string(),
        );
        let services = AppServices {
            cart,
            checkout,
            orders,
        };

        let state = AppState {
            db: db.clone(),
            config,
            event_sender,
            services: services.clone(),
        };

        Self {
            router: app_router(state),
            db,
            gateway,
            services,
            _tmp: tmp,
        }
    }

    pub fn token_for(&self, customer_id: Uuid, email: &str) -> String {
        issue_token(TEST_JWT_SECRET, customer_id, email, Duration::hours(1)).unwrap()
    }

    pub async fn seed_product(&self, title: &str, price: Decimal, active: bool) -> Uuid {
        let id = Uuid::new_v4();
        let row = product::ActiveModel {
            id: Set(id),
            title: Set(title.to_string()),
            description: Set(None),
            category: Set("general".to_string()),
            brand: Set("acme".to_string()),
            image_url: Set(None),
            price: Set(price),
            is_active: Set(active),
            created_at: Set(Utc::now()),
            updated_at: Set(Utc::now()),
        };
        row.insert(&*self.db).await.unwrap();
        id
    }

    pub async fn request(
        &self,
        method: Method,
        uri: &str,
        token: Option<&str>,
        body: Option<Value>,
    ) -> (StatusCode, Value) {
        let mut builder = Request::builder().method(method).uri(uri);
        if let Some(token) = token {
            builder = builder.header(header::AUTHORIZATION, format!("Bearer {}", token));
        }
        let request = match body {
            Some(json) => builder
                .header(header::CONTENT_TYPE, "application/json")
                .body(Body::from(json.to_string()))
                .unwrap(),
            None => builder.body(Body::empty()).unwrap(),
        };

        let response = self.router.clone().oneshot(request).await.unwrap();
        let status = response.status();
        let bytes = response.into_body().collect().await.unwrap().to_bytes();
        let value = if bytes.is_empty() {
            Value::Null
        } else {
            serde_json::from_slice(&bytes).unwrap()
        };
        (status, value)
    }
}
