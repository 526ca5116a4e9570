// src/utils/jwt.rs

use std::time::{SystemTime, UNIX_EPOCH};

use axum::{
    body::Body,
    extract::State,
    http::{Request, StatusCode, header},
    middleware::Next,
    response::Response,
};
use jsonwebtoken::{DecodingKey, EncodingKey, Header, Validation, decode, encode};
use serde::{Deserialize, Serialize};

use crate::{config::Config, eligibility::Caller, error::AppError};

pub const ADMIN_ROLE: &str = "admin";

/// JWT Claims structure issued by the identity provider.
#[derive(Debug, Deserialize, Serialize, Clone)]
pub struct Claims {
    /// Subject - the verified email address.
    pub sub: String,
    /// Display name, if the provider knows one.
    #[serde(default)]
    pub name: Option<String>,
    /// User's role (e.g., 'user', 'admin').
    pub role: String,
    /// Expiration time as Unix timestamp.
    pub exp: usize,
}

impl Claims {
    pub fn is_admin(&self) -> bool {
        self.role == ADMIN_ROLE
    }
}

impl From<&Claims> for Caller {
    fn from(claims: &Claims) -> Self {
        let email = claims.sub.trim().to_lowercase();
        let name = claims
            .name
            .as_deref()
            .map(str::trim)
            .filter(|n| !n.is_empty())
            .map(str::to_string)
            .unwrap_or_else(|| email.clone());

        Caller {
            email,
            name,
            is_admin: claims.is_admin(),
        }
    }
}

/// Identity of a route that allows anonymous callers.
#[derive(Debug, Clone)]
pub struct MaybeClaims(pub Option<Claims>);

/// Signs a new JWT.
///
/// Arguments:
/// * `email`: verified email, stored as `sub`.
/// * `name`: optional display name.
/// * `role`: user role.
pub fn sign_jwt(
    email: &str,
    name: Option<&str>,
    role: &str,
    secret: &str,
    expiration_seconds: u64,
) -> Result<String, AppError> {
    // Calculate expiration: current time + expiration_seconds
    let expiration = SystemTime::now()
        .duration_since(UNIX_EPOCH)
        .map_err(|e| AppError::InternalServerError(e.to_string()))?
        .as_secs() as usize
        + expiration_seconds as usize;

    let claims = Claims {
        sub: email.to_owned(),
        name: name.map(str::to_owned),
        role: role.to_owned(),
        exp: expiration,
    };

    encode(
        &Header::default(),
        &claims,
        &EncodingKey::from_secret(secret.as_bytes()),
    )
    .map_err(|e| AppError::InternalServerError(e.to_string()))
}

/// Verifies and decodes a JWT string.
///
/// Returns the `Claims` if valid, otherwise returns an `AppError`.
pub fn verify_jwt(token: &str, secret: &str) -> Result<Claims, AppError> {
    let token_data = decode::<Claims>(
        token,
        &DecodingKey::from_secret(secret.as_bytes()),
        &Validation::default(),
    )
    .map_err(|_| AppError::AuthRequired("Invalid token".to_string()))?;

    if token_data.claims.sub.trim().is_empty() {
        return Err(AppError::AuthRequired("Token has no email".to_string()));
    }

    Ok(token_data.claims)
}

fn bearer_token(req: &Request<Body>) -> Option<Option<&str>> {
    req.headers()
        .get(header::AUTHORIZATION)
        .map(|value| value.to_str().ok().and_then(|h| h.strip_prefix("Bearer ")))
}

/// Axum Middleware: Authentication.
///
/// Intercepts requests, validates the 'Authorization: Bearer <token>' header.
/// If valid, injects `Claims` into the request extensions for handlers to use.
/// If missing or invalid, returns 401 Unauthorized.
pub async fn auth_middleware(
    State(config): State<Config>,
    mut req: Request<Body>,
    next: Next,
) -> Result<Response, AppError> {
    let token = match bearer_token(&req) {
        Some(Some(token)) => token,
        _ => return Err(AppError::AuthRequired("Please sign in to continue".to_string())),
    };

    let claims = verify_jwt(token, &config.jwt_secret)?;
    req.extensions_mut().insert(claims);
    Ok(next.run(req).await)
}

/// Axum Middleware: Optional Authentication.
///
/// Anonymous requests pass through with `MaybeClaims(None)`.
/// A header that is present but invalid is still rejected.
pub async fn optional_auth_middleware(
    State(config): State<Config>,
    mut req: Request<Body>,
    next: Next,
) -> Result<Response, AppError> {
    let claims = match bearer_token(&req) {
        None => None,
        Some(Some(token)) => Some(verify_jwt(token, &config.jwt_secret)?),
        Some(None) => return Err(AppError::AuthRequired("Malformed authorization header".to_string())),
    };

    req.extensions_mut().insert(MaybeClaims(claims));
    Ok(next.run(req).await)
}

/// Axum Middleware: Admin Authorization.
///
/// Must be used AFTER `auth_middleware`. Checks if the injected `Claims` has 'admin' role.
/// If not, returns 403 Forbidden.
pub async fn admin_middleware(req: Request<Body>, next: Next) -> Result<Response, StatusCode> {
    let claims = req
        .extensions()
        .get::<Claims>()
        .ok_or(StatusCode::UNAUTHORIZED)?;

    if !claims.is_admin() {
        return Err(StatusCode::FORBIDDEN);
    }

    Ok(next.run(req).await)
}
