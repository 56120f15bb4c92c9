use axum::{extract::FromRequestParts, http::header, http::request::Parts};
use chrono::{Duration, Utc};
use jsonwebtoken::{decode, encode, DecodingKey, EncodingKey, Header, Validation};
use serde::{Deserialize, Serialize};
use uuid::Uuid;

use crate::errors::ServiceError;
use crate::AppState;

/// The authenticated customer, passed explicitly into every service call
/// instead of being read from ambient session state.
#[derive(Debug, Clone)]
pub struct CustomerContext {
    pub id: Uuid,
    pub email: String,
}

/// Bearer token claims for the customer session.
#[derive(Debug, Serialize, Deserialize)]
pub struct Claims {
    /// Customer id
    pub sub: Uuid,
    pub email: String,
    pub exp: usize,
    pub iat: usize,
}

/// Issues a signed customer token. Used by the session collaborator at login
/// and by the test harness.
pub fn issue_token(
    secret: &str,
    customer_id: Uuid,
    email: &str,
    ttl: Duration,
) -> Result<String, ServiceError> {
    let now = Utc::now();
    let claims = Claims {
        sub: customer_id,
        email: email.to_string(),
        exp: (now + ttl).timestamp() as usize,
        iat: now.timestamp() as usize,
    };
    encode(
        &Header::default(),
        &claims,
        &EncodingKey::from_secret(secret.as_bytes()),
    )
    .map_err(|e| ServiceError::InternalError(format!("token encoding failed: {}", e)))
}

pub fn validate_token(secret: &str, token: &str) -> Result<Claims, ServiceError> {
    decode::<Claims>(
        token,
        &DecodingKey::from_secret(secret.as_bytes()),
        &Validation::default(),
    )
    .map(|data| data.claims)
    .map_err(|e| ServiceError::AuthError(format!("invalid token: {}", e)))
}

#[axum::async_trait]
impl FromRequestParts<AppState> for CustomerContext {
    type Rejection = ServiceError;

    async fn from_request_parts(
        parts: &mut Parts,
        state: &AppState,
    ) -> Result<Self, Self::Rejection> {
        let header_value = parts
            .headers
            .get(header::AUTHORIZATION)
            .and_then(|v| v.to_str().ok())
            .ok_or_else(|| ServiceError::AuthError("missing authorization header".into()))?;

        let token = header_value
            .strip_prefix("Bearer ")
            .ok_or_else(|| ServiceError::AuthError("expected bearer token".into()))?
            .trim();

        let claims = validate_token(&state.config.jwt_secret, token)?;
        Ok(CustomerContext {
            id: claims.sub,
            email: claims.email,
        })
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    const SECRET: &str = "test_secret_for_token_round_trips_with_enough_length_0123456789abcd";

    #[test]
    fn token_round_trip_preserves_identity() {
        let customer_id = Uuid::new_v4();
        let token = issue_token(SECRET, customer_id, "kofi@example.com", Duration::hours(1))
            .expect("token should encode");
        let claims = validate_token(SECRET, &token).expect("token should decode");
        assert_eq!(claims.sub, customer_id);
        assert_eq!(claims.email, "kofi@example.com");
    }

    #[test]
    fn wrong_secret_is_rejected() {
        let token = issue_token(SECRET, Uuid::new_v4(), "a@b.c", Duration::hours(1)).unwrap();
        let err = validate_token("another_secret_also_long_enough_to_be_plausible_9876543210", &token)
            .expect_err("bad secret must fail");
        assert!(matches!(err, ServiceError::AuthError(_)));
    }

    #[test]
    fn expired_token_is_rejected() {
        let token =
            issue_token(SECRET, Uuid::new_v4(), "a@b.c", Duration::seconds(-120)).unwrap();
        let err = validate_token(SECRET, &token).expect_err("expired token must fail");
        assert!(matches!(err, ServiceError::AuthError(_)));
    }
}
