//! Authentication middleware
//!
//! Verifies the bearer JWT that identifies the acting supplier, manufacturer
//! or viewer, and role checks for handlers

use axum::{
    extract::Request,
    http::{header::AUTHORIZATION, StatusCode},
    middleware::Next,
    response::{IntoResponse, Response},
    Json,
};
use serde::{Deserialize, Serialize};

use crate::error::{AppError, ErrorDetail, ErrorResponse};

/// What kind of party the caller acts as
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum ActorRole {
    Supplier,
    Manufacturer,
    Viewer,
}

impl ActorRole {
    pub fn as_str(&self) -> &'static str {
        match self {
            ActorRole::Supplier => "supplier",
            ActorRole::Manufacturer => "manufacturer",
            ActorRole::Viewer => "viewer",
        }
    }
}

/// Authenticated actor extracted from the JWT
#[derive(Clone, Debug)]
pub struct AuthActor {
    /// Supplier or manufacturer code
    pub code: String,
    pub role: ActorRole,
}

impl AuthActor {
    /// Suppliers and manufacturers can also read viewer endpoints
    pub fn require(&self, role: ActorRole) -> Result<&str, AppError> {
        if self.role == role || role == ActorRole::Viewer {
            Ok(&self.code)
        } else {
            Err(AppError::Unauthorized(format!(
                "Requires {} role, token carries {}",
                role.as_str(),
                self.role.as_str()
            )))
        }
    }
}

/// JWT claims structure
#[derive(Debug, Serialize, Deserialize)]
pub struct Claims {
    pub sub: String,
    pub role: ActorRole,
    pub exp: i64,
    pub iat: i64,
}

/// Authentication middleware that validates JWT tokens
pub async fn auth_middleware(mut request: Request, next: Next) -> Response {
    let auth_header = request
        .headers()
        .get(AUTHORIZATION)
        .and_then(|h| h.to_str().ok());

    let token = match auth_header.and_then(|h| h.strip_prefix("Bearer ")) {
        Some(token) => token,
        None => return unauthorized_response("Missing or invalid Authorization header"),
    };

    // Middleware runs without state, so the secret comes from the environment
    let jwt_secret = std::env::var("BATCHTRACE__JWT__SECRET")
        .or_else(|_| std::env::var("BATCHTRACE_JWT_SECRET"))
        .unwrap_or_else(|_| "development-secret-key".to_string());

    let claims = match decode_jwt(token, &jwt_secret) {
        Ok(claims) => claims,
        Err(msg) => return unauthorized_response(&msg),
    };

    if shared::validate_party_code(&claims.sub).is_err() {
        return unauthorized_response("Invalid actor code in token");
    }

    request.extensions_mut().insert(AuthActor {
        code: claims.sub,
        role: claims.role,
    });

    next.run(request).await
}

/// Decode and validate JWT token
pub fn decode_jwt(token: &str, secret: &str) -> Result<Claims, String> {
    use jsonwebtoken::{decode, DecodingKey, Validation};

    decode::<Claims>(
        token,
        &DecodingKey::from_secret(secret.as_bytes()),
        &Validation::default(),
    )
    .map(|data| data.claims)
    .map_err(|e| format!("Invalid token: {}", e))
}

fn unauthorized_response(message: &str) -> Response {
    let error = ErrorResponse {
        error: ErrorDetail::new("UNAUTHORIZED", message),
    };

    (StatusCode::UNAUTHORIZED, Json(error)).into_response()
}

/// Extractor for the authenticated actor
#[derive(Clone, Debug)]
pub struct CurrentActor(pub AuthActor);

#[axum::async_trait]
impl<S> axum::extract::FromRequestParts<S> for CurrentActor
where
    S: Send + Sync,
{
    type Rejection = (StatusCode, Json<ErrorResponse>);

    async fn from_request_parts(
        parts: &mut axum::http::request::Parts,
        _state: &S,
    ) -> Result<Self, Self::Rejection> {
        parts
            .extensions
            .get::<AuthActor>()
            .cloned()
            .map(CurrentActor)
            .ok_or_else(|| {
                let error = ErrorResponse {
                    error: ErrorDetail::new("UNAUTHORIZED", "Authentication required"),
                };
                (StatusCode::UNAUTHORIZED, Json(error))
            })
    }
}
