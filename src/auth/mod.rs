//! Authentication and authorization.
//!
//! Token issuance (registration, login, email confirmation) lives in a
//! separate identity service; this module verifies HS256 bearer tokens and
//! exposes the caller as an [`AuthUser`] extractor. Role checks go through
//! the [`UserRole`] enum rather than string comparisons in handlers.

use std::sync::Arc;

use async_trait::async_trait;
use axum::{
    extract::FromRequestParts,
    http::{header, request::Parts},
};
use chrono::Utc;
use jsonwebtoken::{decode, encode, Algorithm, DecodingKey, EncodingKey, Header, Validation};
use serde::{Deserialize, Serialize};
use thiserror::Error;
use uuid::Uuid;

use crate::entities::UserRole;
use crate::errors::ServiceError;

/// Claim structure for JWT tokens
#[derive(Debug, Serialize, Deserialize)]
pub struct Claims {
    pub sub: String,
    pub name: Option<String>,
    pub email: Option<String>,
    pub role: String,
    pub jti: String,
    pub iat: i64,
    pub exp: i64,
    pub iss: String,
    pub aud: String,
}

/// Authenticated caller extracted from the bearer token
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct AuthUser {
    pub user_id: Uuid,
    pub name: Option<String>,
    pub email: Option<String>,
    pub role: UserRole,
}

impl AuthUser {
    pub fn has_role(&self, role: UserRole) -> bool {
        self.role == role || self.role == UserRole::Admin
    }

    /// Gate an operation on a capability; admins pass every gate.
    pub fn require_role(&self, role: UserRole) -> Result<(), ServiceError> {
        if self.has_role(role) {
            Ok(())
        } else {
            Err(ServiceError::Forbidden(format!(
                "Only {} accounts are permitted to perform this operation",
                role.as_str()
            )))
        }
    }
}

#[derive(Debug, Error)]
pub enum AuthError {
    #[error("Missing authorization token")]
    MissingToken,
    #[error("Invalid token: {0}")]
    InvalidToken(String),
    #[error("Token expired")]
    TokenExpired,
}

impl From<AuthError> for ServiceError {
    fn from(err: AuthError) -> Self {
        ServiceError::Unauthorized(err.to_string())
    }
}

/// Authentication configuration
#[derive(Clone, Debug)]
pub struct AuthConfig {
    pub jwt_secret: String,
    pub issuer: String,
    pub audience: String,
    pub token_expiry_secs: usize,
}

impl AuthConfig {
    pub fn new(
        jwt_secret: String,
        issuer: String,
        audience: String,
        token_expiry_secs: usize,
    ) -> Self {
        Self {
            jwt_secret,
            issuer,
            audience,
            token_expiry_secs,
        }
    }
}

/// Verifies bearer tokens and signs them for tests and tooling.
#[derive(Clone)]
pub struct AuthService {
    config: AuthConfig,
}

impl AuthService {
    pub fn new(config: AuthConfig) -> Self {
        Self { config }
    }

    pub fn verify_token(&self, token: &str) -> Result<AuthUser, AuthError> {
        let mut validation = Validation::new(Algorithm::HS256);
        validation.set_issuer(&[&self.config.issuer]);
        validation.set_audience(&[&self.config.audience]);

        let data = decode::<Claims>(
            token,
            &DecodingKey::from_secret(self.config.jwt_secret.as_bytes()),
            &validation,
        )
        .map_err(|e| match e.kind() {
            jsonwebtoken::errors::ErrorKind::ExpiredSignature => AuthError::TokenExpired,
            _ => AuthError::InvalidToken(e.to_string()),
        })?;

        let claims = data.claims;
        let user_id = Uuid::parse_str(&claims.sub)
            .map_err(|_| AuthError::InvalidToken("subject is not a UUID".to_string()))?;
        let role = UserRole::parse(&claims.role)
            .ok_or_else(|| AuthError::InvalidToken(format!("unknown role '{}'", claims.role)))?;

        Ok(AuthUser {
            user_id,
            name: claims.name,
            email: claims.email,
            role,
        })
    }

    pub fn issue_token(
        &self,
        user_id: Uuid,
        email: &str,
        name: &str,
        role: UserRole,
    ) -> Result<String, AuthError> {
        let now = Utc::now().timestamp();
        let claims = Claims {
            sub: user_id.to_string(),
            name: Some(name.to_string()),
            email: Some(email.to_string()),
            role: role.as_str().to_string(),
            jti: Uuid::new_v4().to_string(),
            iat: now,
            exp: now + self.config.token_expiry_secs as i64,
            iss: self.config.issuer.clone(),
            aud: self.config.audience.clone(),
        };

        encode(
            &Header::new(Algorithm::HS256),
            &claims,
            &EncodingKey::from_secret(self.config.jwt_secret.as_bytes()),
        )
        .map_err(|e| AuthError::InvalidToken(e.to_string()))
    }
}

fn bearer_token(parts: &Parts) -> Result<&str, AuthError> {
    let header = parts
        .headers
        .get(header::AUTHORIZATION)
        .and_then(|v| v.to_str().ok())
        .ok_or(AuthError::MissingToken)?;

    header
        .strip_prefix("Bearer ")
        .ok_or_else(|| AuthError::InvalidToken("expected a Bearer token".to_string()))
}

#[async_trait]
impl<S> FromRequestParts<S> for AuthUser
where
    S: Send + Sync,
{
    type Rejection = ServiceError;

    async fn from_request_parts(parts: &mut Parts, _state: &S) -> Result<Self, Self::Rejection> {
        let auth = parts
            .extensions
            .get::<Arc<AuthService>>()
            .cloned()
            .ok_or_else(|| {
                ServiceError::InternalError("auth service not attached to request".to_string())
            })?;

        let token = bearer_token(parts)?;
        Ok(auth.verify_token(token)?)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn service() -> AuthService {
        AuthService::new(AuthConfig::new(
            "test_secret_key_for_testing_purposes_only_32chars".to_string(),
            "retail-auth".to_string(),
            "retail-api".to_string(),
            3600,
        ))
    }

    #[test]
    fn token_round_trip() {
        let svc = service();
        let user_id = Uuid::new_v4();
        let token = svc
            .issue_token(user_id, "buyer@example.com", "Buyer", UserRole::Buyer)
            .unwrap();

        let user = svc.verify_token(&token).unwrap();
        assert_eq!(user.user_id, user_id);
        assert_eq!(user.role, UserRole::Buyer);
        assert_eq!(user.email.as_deref(), Some("buyer@example.com"));
    }

    #[test]
    fn tampered_token_is_rejected() {
        let svc = service();
        let token = svc
            .issue_token(Uuid::new_v4(), "a@example.com", "A", UserRole::Shop)
            .unwrap();

        let other = AuthService::new(AuthConfig::new(
            "a_completely_different_secret_that_is_32_chars!!".to_string(),
            "retail-auth".to_string(),
            "retail-api".to_string(),
            3600,
        ));
        assert!(matches!(
            other.verify_token(&token),
            Err(AuthError::InvalidToken(_))
        ));
    }

    #[test]
    fn role_gate_admits_admins_everywhere() {
        let admin = AuthUser {
            user_id: Uuid::new_v4(),
            name: None,
            email: None,
            role: UserRole::Admin,
        };
        assert!(admin.require_role(UserRole::Shop).is_ok());

        let buyer = AuthUser {
            user_id: Uuid::new_v4(),
            name: None,
            email: None,
            role: UserRole::Buyer,
        };
        assert!(buyer.require_role(UserRole::Shop).is_err());
    }
}
