//! # Authentication and Authorization
//!
//! Bearer tokens are HS256 JWTs minted by the external authentication service.
//! The middleware decodes them into a [`Principal`]; handlers then state which
//! roles they accept and receive the tenant the principal is bound to.

use std::sync::Arc;

use axum::{
    extract::{FromRef, FromRequestParts, Request, State},
    http::{HeaderMap, header::AUTHORIZATION, request::Parts},
    middleware::Next,
    response::Response,
};
use chrono::Utc;
use jsonwebtoken::{Algorithm, DecodingKey, EncodingKey, Header, Validation, decode, encode};
use serde::{Deserialize, Serialize};
use utoipa::ToSchema;
use uuid::Uuid;

use crate::error::{ApiError, ServiceError, unauthorized};
use crate::server::AppState;

/// Role tag carried by every principal.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize, ToSchema)]
#[serde(rename_all = "lowercase")]
pub enum Role {
    /// Restaurant owner, bound to one tenant.
    Owner,
    /// Kitchen or floor staff, bound to one tenant.
    Staff,
    /// Platform administrator, not bound to a tenant.
    Admin,
}

impl Role {
    pub fn as_str(&self) -> &'static str {
        match self {
            Role::Owner => "owner",
            Role::Staff => "staff",
            Role::Admin => "admin",
        }
    }
}

/// JWT claims understood by the service.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Claims {
    pub sub: String,
    pub role: Role,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub tenant_id: Option<Uuid>,
    pub iat: i64,
    pub exp: i64,
}

/// Verified caller identity.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Principal {
    pub subject: String,
    pub role: Role,
    pub tenant_id: Option<Uuid>,
}

impl Principal {
    /// Returns the tenant this principal may act on, provided its role is in `allowed`.
    pub fn tenant_scope(&self, allowed: &[Role]) -> Result<Uuid, ServiceError> {
        if !allowed.contains(&self.role) {
            return Err(ServiceError::Forbidden(format!(
                "role '{}' may not perform this operation",
                self.role.as_str()
            )));
        }

        self.tenant_id.ok_or_else(|| {
            ServiceError::Forbidden("principal is not bound to a tenant".to_string())
        })
    }
}

impl From<Claims> for Principal {
    fn from(claims: Claims) -> Self {
        Self {
            subject: claims.sub,
            role: claims.role,
            tenant_id: claims.tenant_id,
        }
    }
}

/// Signing and verification keys derived from the shared secret.
#[derive(Clone)]
pub struct JwtKeys {
    encoding: EncodingKey,
    decoding: DecodingKey,
}

impl JwtKeys {
    pub fn from_secret(secret: &[u8]) -> Self {
        Self {
            encoding: EncodingKey::from_secret(secret),
            decoding: DecodingKey::from_secret(secret),
        }
    }

    /// Decodes and validates a bearer token.
    pub fn verify(&self, token: &str) -> Result<Principal, ServiceError> {
        let validation = Validation::new(Algorithm::HS256);
        decode::<Claims>(token, &self.decoding, &validation)
            .map(|data| data.claims.into())
            .map_err(|err| {
                tracing::debug!(error = %err, "Rejected bearer token");
                ServiceError::Unauthorized("Invalid bearer token".to_string())
            })
    }

    /// Mints a token for local setups and tests.
    pub fn issue(
        &self,
        subject: &str,
        role: Role,
        tenant_id: Option<Uuid>,
        ttl: chrono::Duration,
    ) -> Result<String, jsonwebtoken::errors::Error> {
        let now = Utc::now();
        let claims = Claims {
            sub: subject.to_string(),
            role,
            tenant_id,
            iat: now.timestamp(),
            exp: (now + ttl).timestamp(),
        };
        encode(&Header::new(Algorithm::HS256), &claims, &self.encoding)
    }
}

impl std::fmt::Debug for JwtKeys {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str("JwtKeys([REDACTED])")
    }
}

impl FromRef<AppState> for Arc<JwtKeys> {
    fn from_ref(app_state: &AppState) -> Self {
        Arc::clone(&app_state.jwt_keys)
    }
}

/// Authentication middleware that validates bearer tokens and attaches the principal.
pub async fn auth_middleware(
    State(keys): State<Arc<JwtKeys>>,
    mut request: Request,
    next: Next,
) -> Result<Response, ApiError> {
    let token = extract_bearer_token(request.headers())?;
    let principal = keys.verify(token)?;

    tracing::debug!(
        subject = %principal.subject,
        role = principal.role.as_str(),
        tenant_id = ?principal.tenant_id,
        "Authenticated request"
    );

    request.extensions_mut().insert(principal);
    Ok(next.run(request).await)
}

fn extract_bearer_token(headers: &HeaderMap) -> Result<&str, ApiError> {
    let header = headers
        .get(AUTHORIZATION)
        .ok_or_else(|| unauthorized(Some("Missing Authorization header")))?
        .to_str()
        .map_err(|_| unauthorized(Some("Invalid Authorization header")))?;

    header
        .strip_prefix("Bearer ")
        .map(str::trim)
        .filter(|token| !token.is_empty())
        .ok_or_else(|| unauthorized(Some("Authorization header must use Bearer scheme")))
}

impl<S> FromRequestParts<S> for Principal
where
    S: Sync,
{
    type Rejection = ApiError;

    async fn from_request_parts(parts: &mut Parts, _state: &S) -> Result<Self, Self::Rejection> {
        parts
            .extensions
            .get::<Principal>()
            .cloned()
            .ok_or_else(|| unauthorized(Some("Authentication required")))
    }
}
