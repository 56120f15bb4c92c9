//! Payment gateway client: a pure protocol adapter around the provider's
//! initialize-transaction and verify-transaction endpoints. Holds no business
//! state and performs no retries; retry policy belongs to the checkout
//! orchestrator.

pub mod http;

use async_trait::async_trait;
use chrono::{DateTime, Utc};
use rust_decimal::Decimal;
use serde::{Deserialize, Serialize};

pub use http::HttpPaymentGateway;

/// Result of a successful initialize call: the handle the client is
/// redirected to, plus the reference that keys the whole attempt.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct InitializedTransaction {
    pub authorization_url: String,
    pub access_code: String,
    pub reference: String,
}

/// Payment state as reported by the gateway's server-to-server verify call,
/// independent of any client-supplied claim.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum GatewayPaymentStatus {
    Success,
    Failed,
    Abandoned,
}

impl GatewayPaymentStatus {
    pub fn as_str(self) -> &'static str {
        match self {
            GatewayPaymentStatus::Success => "success",
            GatewayPaymentStatus::Failed => "failed",
            GatewayPaymentStatus::Abandoned => "abandoned",
        }
    }
}

/// Verified transaction details. `amount` is already converted back to the
/// storefront's major unit.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct VerifiedTransaction {
    pub status: GatewayPaymentStatus,
    pub amount: Decimal,
    pub currency: String,
    pub channel: Option<String>,
    pub authorization_code: Option<String>,
    pub paid_at: Option<DateTime<Utc>>,
}

/// Typed failure from the gateway adapter. Expected failure modes never
/// escape as panics; callers receive one of these.
#[derive(Debug, thiserror::Error)]
pub enum GatewayError {
    #[error("gateway transport error: {0}")]
    Transport(String),
    #[error("gateway returned HTTP {status}: {message}")]
    Http { status: u16, message: String },
    #[error("gateway response malformed: {0}")]
    Malformed(String),
    #[error("gateway declined request: {0}")]
    Declined(String),
    #[error("amount {0} cannot be represented in minor units")]
    UnrepresentableAmount(Decimal),
}

/// Outbound contract consumed by the checkout orchestrator. Object-safe so
/// tests can substitute a scripted implementation.
#[async_trait]
pub trait PaymentGateway: Send + Sync {
    /// Creates a remote transaction for `amount` (major units) and returns
    /// the authorization handle for redirect.
    async fn initialize_transaction(
        &self,
        amount: Decimal,
        email: &str,
        reference: &str,
    ) -> Result<InitializedTransaction, GatewayError>;

    /// Confirms whether the given reference actually succeeded.
    async fn verify_transaction(&self, reference: &str)
        -> Result<VerifiedTransaction, GatewayError>;
}
