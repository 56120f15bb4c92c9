use async_trait::async_trait;
use chrono::{DateTime, Utc};
use rust_decimal::prelude::ToPrimitive;
use rust_decimal::Decimal;
use serde::Deserialize;
use serde_json::json;
use std::time::Duration;
use tracing::{instrument, warn};

use super::{
    GatewayError, GatewayPaymentStatus, InitializedTransaction, PaymentGateway,
    VerifiedTransaction,
};
use crate::config::GatewayConfig;

/// HTTPS adapter for the payment provider. Amounts cross this boundary in the
/// provider's minor-unit convention (major × 100); everywhere else in the
/// crate they stay in major units.
#[derive(Clone)]
pub struct HttpPaymentGateway {
    client: reqwest::Client,
    base_url: String,
    secret_key: String,
    currency: String,
}

impl HttpPaymentGateway {
    pub fn new(cfg: &GatewayConfig) -> Result<Self, GatewayError> {
        let client = reqwest::Client::builder()
            .timeout(Duration::from_secs(cfg.timeout_secs))
            .build()
            .map_err(|e| GatewayError::Transport(e.to_string()))?;

        Ok(Self {
            client,
            base_url: cfg.base_url.trim_end_matches('/').to_string(),
            secret_key: cfg.secret_key.clone(),
            currency: cfg.currency.clone(),
        })
    }

    fn to_minor_units(amount: Decimal) -> Result<i64, GatewayError> {
        (amount * Decimal::from(100))
            .round()
            .to_i64()
            .ok_or(GatewayError::UnrepresentableAmount(amount))
    }

    fn from_minor_units(minor: i64) -> Decimal {
        Decimal::from(minor) / Decimal::from(100)
    }
}

#[async_trait]
impl PaymentGateway for HttpPaymentGateway {
    #[instrument(skip(self), fields(reference = %reference))]
    async fn initialize_transaction(
        &self,
        amount: Decimal,
        email: &str,
        reference: &str,
    ) -> Result<InitializedTransaction, GatewayError> {
        let body = json!({
            "email": email,
            "amount": Self::to_minor_units(amount)?,
            "reference": reference,
            "currency": self.currency,
        });

        let response = self
            .client
            .post(format!("{}/transaction/initialize", self.base_url))
            .bearer_auth(&self.secret_key)
            .json(&body)
            .send()
            .await
            .map_err(|e| GatewayError::Transport(e.to_string()))?;

        let envelope = read_envelope::<InitData>(response).await?;
        let data = envelope
            .data
            .ok_or_else(|| GatewayError::Malformed("initialize response missing data".into()))?;

        Ok(InitializedTransaction {
            authorization_url: data.authorization_url,
            access_code: data.access_code,
            reference: data.reference,
        })
    }

    #[instrument(skip(self), fields(reference = %reference))]
    async fn verify_transaction(
        &self,
        reference: &str,
    ) -> Result<VerifiedTransaction, GatewayError> {
        let response = self
            .client
            .get(format!("{}/transaction/verify/{}", self.base_url, reference))
            .bearer_auth(&self.secret_key)
            .send()
            .await
            .map_err(|e| GatewayError::Transport(e.to_string()))?;

        let envelope = read_envelope::<VerifyData>(response).await?;
        let data = envelope
            .data
            .ok_or_else(|| GatewayError::Malformed("verify response missing data".into()))?;

        let status = match data.status.as_str() {
            "success" => GatewayPaymentStatus::Success,
            "failed" => GatewayPaymentStatus::Failed,
            "abandoned" => GatewayPaymentStatus::Abandoned,
            other => {
                // Unknown statuses are treated as not-success, never as paid
                warn!(status = other, "unrecognized gateway payment status");
                GatewayPaymentStatus::Failed
            }
        };

        Ok(VerifiedTransaction {
            status,
            amount: Self::from_minor_units(data.amount),
            currency: data.currency,
            channel: data.channel,
            authorization_code: data.authorization.and_then(|a| a.authorization_code),
            paid_at: data.paid_at,
        })
    }
}

/// Decodes the provider's `{status, message, data}` envelope, folding
/// transport-level and protocol-level failures into `GatewayError`.
async fn read_envelope<T: serde::de::DeserializeOwned>(
    response: reqwest::Response,
) -> Result<Envelope<T>, GatewayError> {
    let status = response.status();
    let bytes = response
        .bytes()
        .await
        .map_err(|e| GatewayError::Transport(e.to_string()))?;

    if !status.is_success() {
        let message = serde_json::from_slice::<Envelope<serde_json::Value>>(&bytes)
            .map(|env| env.message)
            .unwrap_or_else(|_| String::from_utf8_lossy(&bytes).into_owned());
        return Err(GatewayError::Http {
            status: status.as_u16(),
            message,
        });
    }

    let envelope: Envelope<T> =
        serde_json::from_slice(&bytes).map_err(|e| GatewayError::Malformed(e.to_string()))?;

    if !envelope.status {
        return Err(GatewayError::Declined(envelope.message));
    }
    Ok(envelope)
}

#[derive(Debug, Deserialize)]
struct Envelope<T> {
    status: bool,
    #[serde(default)]
    message: String,
    data: Option<T>,
}

#[derive(Debug, Deserialize)]
struct InitData {
    authorization_url: String,
    access_code: String,
    reference: String,
}

#[derive(Debug, Deserialize)]
struct VerifyData {
    status: String,
    amount: i64,
    currency: String,
    channel: Option<String>,
    authorization: Option<AuthorizationData>,
    paid_at: Option<DateTime<Utc>>,
}

#[derive(Debug, Deserialize)]
struct AuthorizationData {
    authorization_code: Option<String>,
}
