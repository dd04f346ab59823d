pub mod api_key;

use std::sync::Arc;

use axum::{
    async_trait,
    extract::FromRequestParts,
    http::{HeaderMap, request::Parts},
};
use jsonwebtoken::{DecodingKey, Validation, decode};
use serde::{Deserialize, Serialize};
use tracing::debug;
use uuid::Uuid;

use crate::axum_http::error_responses::ApiError;

const SERVICE_ROLE: &str = "service_role";
const ADMIN_ROLE: &str = "admin";

#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct AppMetadata {
    pub role: Option<String>,
}

#[derive(Debug, Serialize, Deserialize)]
pub struct SupabaseClaims {
    pub sub: String,
    pub role: String,
    pub email: Option<String>,
    pub exp: usize,
    #[serde(default)]
    pub app_metadata: Option<AppMetadata>,
}

#[derive(Debug, Clone)]
pub struct AuthUser {
    pub user_id: Uuid,
    pub email: Option<String>,
    pub role: String,
    pub app_role: Option<String>,
}

impl AuthUser {
    pub fn is_admin(&self) -> bool {
        self.role == SERVICE_ROLE || self.app_role.as_deref() == Some(ADMIN_ROLE)
    }
}

/// Session-token settings shared with the extractors through a request extension.
#[derive(Debug, Clone)]
pub struct SessionVerifier {
    jwt_secret: String,
}

impl SessionVerifier {
    pub fn new(jwt_secret: String) -> Self {
        Self { jwt_secret }
    }

    pub fn verify(&self, token: &str) -> Result<AuthUser, ApiError> {
        let claims = validate_session_jwt(token, &self.jwt_secret)?;
        let user_id = Uuid::parse_str(&claims.sub)
            .map_err(|_| ApiError::unauthorized("Invalid user ID in token"))?;

        Ok(AuthUser {
            user_id,
            email: claims.email,
            role: claims.role,
            app_role: claims.app_metadata.and_then(|metadata| metadata.role),
        })
    }
}

pub fn validate_session_jwt(token: &str, secret: &str) -> Result<SupabaseClaims, ApiError> {
    let decoding_key = DecodingKey::from_secret(secret.as_bytes());
    let mut validation = Validation::new(jsonwebtoken::Algorithm::HS256);
    validation.set_audience(&["authenticated", SERVICE_ROLE]);

    let token_data = decode::<SupabaseClaims>(token, &decoding_key, &validation).map_err(|e| {
        debug!(jwt_error = %e, "auth: session token rejected");
        ApiError::unauthorized("Invalid or expired session token")
    })?;

    Ok(token_data.claims)
}

pub fn bearer_token(headers: &HeaderMap) -> Result<&str, ApiError> {
    let auth_header = headers
        .get(axum::http::header::AUTHORIZATION)
        .ok_or_else(|| ApiError::unauthorized("Missing Authorization header"))?;

    let auth_str = auth_header
        .to_str()
        .map_err(|_| ApiError::unauthorized("Invalid Authorization header"))?;

    auth_str
        .strip_prefix("Bearer ")
        .map(str::trim)
        .filter(|token| !token.is_empty())
        .ok_or_else(|| ApiError::unauthorized("Invalid Authorization header format"))
}

#[async_trait]
impl<S> FromRequestParts<S> for AuthUser
where
    S: Send + Sync,
{
    type Rejection = ApiError;

    async fn from_request_parts(parts: &mut Parts, _state: &S) -> Result<Self, Self::Rejection> {
        let verifier = parts
            .extensions
            .get::<Arc<SessionVerifier>>()
            .cloned()
            .ok_or_else(|| ApiError::internal(anyhow::anyhow!("session verifier not installed")))?;

        let token = bearer_token(&parts.headers)?;
        verifier.verify(token)
    }
}

/// Session user holding the `service_role` or `admin` role.
#[derive(Debug, Clone)]
pub struct AdminUser(pub AuthUser);

#[async_trait]
impl<S> FromRequestParts<S> for AdminUser
where
    S: Send + Sync,
{
    type Rejection = ApiError;

    async fn from_request_parts(parts: &mut Parts, state: &S) -> Result<Self, Self::Rejection> {
        let user = AuthUser::from_request_parts(parts, state).await?;
        if !user.is_admin() {
            return Err(ApiError::forbidden("Admin access required"));
        }
        Ok(AdminUser(user))
    }
}

#[cfg(test)]
mod tests;
