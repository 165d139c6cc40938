use std::time::Duration;

use axum::{
    async_trait,
    extract::{rejection::JsonRejection, FromRequestParts, State},
    http::{header::AUTHORIZATION, request::Parts, StatusCode},
    Json,
};
use chrono::{DateTime, Utc};
use jsonwebtoken::{errors::ErrorKind, Algorithm, DecodingKey, EncodingKey, Header, Validation};
use metrics::counter;
use serde::{Deserialize, Serialize};
use thiserror::Error;
use tracing::{info, warn};
use uuid::Uuid;

use policy_desk_core::{normalize_email, Admin, AdminProfile, Registration};

use crate::error::ApiError;
use crate::router::AppState;

/// Issues and verifies HS256 session tokens whose subject is the admin id.
#[derive(Clone)]
pub struct TokenService {
    encoding_key: EncodingKey,
    decoding_key: DecodingKey,
    validation: Validation,
    ttl_secs: i64,
}

impl TokenService {
    pub fn new(secret: &[u8], ttl: Duration) -> Self {
        let mut validation = Validation::new(Algorithm::HS256);
        validation.validate_exp = false;
        validation.validate_nbf = false;
        validation.set_required_spec_claims(&["sub", "exp"]);
        Self {
            encoding_key: EncodingKey::from_secret(secret),
            decoding_key: DecodingKey::from_secret(secret),
            validation,
            ttl_secs: i64::try_from(ttl.as_secs()).unwrap_or(i64::MAX),
        }
    }

    pub fn issue(&self, admin_id: Uuid, now: DateTime<Utc>) -> Result<String, AuthError> {
        let issued_at = now.timestamp();
        let claims = SessionClaims {
            sub: admin_id.to_string(),
            iat: issued_at,
            exp: issued_at.saturating_add(self.ttl_secs),
        };
        jsonwebtoken::encode(&Header::new(Algorithm::HS256), &claims, &self.encoding_key)
            .map_err(AuthError::Signing)
    }

    /// Returns the admin id carried by a valid token.
    ///
    /// Expiry is checked against `now` rather than the system clock.
    pub fn verify(&self, token: &str, now: DateTime<Utc>) -> Result<Uuid, AuthError> {
        let claims =
            jsonwebtoken::decode::<SessionClaims>(token, &self.decoding_key, &self.validation)
                .map_err(|err| match err.kind() {
                    ErrorKind::ExpiredSignature => AuthError::TokenExpired,
                    _ => AuthError::InvalidToken(err.to_string()),
                })?
                .claims;

        if now.timestamp() >= claims.exp {
            return Err(AuthError::TokenExpired);
        }

        Uuid::parse_str(&claims.sub)
            .map_err(|_| AuthError::InvalidToken("subject is not an admin id".to_string()))
    }
}

#[derive(Debug, Serialize, Deserialize)]
struct SessionClaims {
    sub: String,
    iat: i64,
    exp: i64,
}

#[derive(Debug, Error)]
pub enum AuthError {
    #[error("authorization token missing")]
    Unauthenticated,
    #[error("token has expired")]
    TokenExpired,
    #[error("invalid token: {0}")]
    InvalidToken(String),
    #[error("failed to sign token: {0}")]
    Signing(jsonwebtoken::errors::Error),
}

impl AuthError {
    fn metric_label(&self) -> &'static str {
        match self {
            Self::Unauthenticated => "missing",
            Self::TokenExpired => "expired",
            Self::InvalidToken(_) => "invalid",
            Self::Signing(_) => "signing",
        }
    }
}

/// The admin aggregate resolved from the request's bearer token.
pub struct CurrentAdmin(pub Admin);

#[async_trait]
impl FromRequestParts<AppState> for CurrentAdmin {
    type Rejection = ApiError;

    async fn from_request_parts(parts: &mut Parts, state: &AppState) -> Result<Self, ApiError> {
        let result = resolve_admin(parts, state).await;
        if let Err(ApiError::Auth(err)) = &result {
            warn!(stage = "auth", reason = err.metric_label(), "request rejected");
            counter!("auth_requests_total", "op" => "verify", "result" => err.metric_label())
                .increment(1);
        }
        result.map(Self)
    }
}

async fn resolve_admin(parts: &Parts, state: &AppState) -> Result<Admin, ApiError> {
    let token = parts
        .headers
        .get(AUTHORIZATION)
        .and_then(|value| value.to_str().ok())
        .and_then(|value| value.strip_prefix("Bearer "))
        .map(str::trim)
        .filter(|token| !token.is_empty())
        .ok_or(AuthError::Unauthenticated)?;

    let admin_id = state.tokens().verify(token, state.now())?;
    state
        .storage()
        .admins()
        .find_by_id(admin_id)
        .await?
        .ok_or(ApiError::AdminNotFound)
}

#[derive(Debug, Deserialize)]
pub struct RegisterRequest {
    pub name: String,
    pub email: String,
    pub password: String,
}

#[derive(Debug, Deserialize)]
pub struct LoginRequest {
    pub email: String,
    pub password: String,
}

#[derive(Debug, Serialize)]
pub struct AuthResponse {
    pub message: &'static str,
    pub token: String,
    pub admin: AdminProfile,
}

pub async fn register(
    State(state): State<AppState>,
    body: Result<Json<RegisterRequest>, JsonRejection>,
) -> Result<(StatusCode, Json<AuthResponse>), ApiError> {
    let Json(body) = body?;
    let registration = Registration::new(&body.name, &body.email, &body.password)?;

    let admins = state.storage().admins();
    if admins.find_by_email(&registration.email).await?.is_some() {
        counter!("auth_requests_total", "op" => "register", "result" => "conflict").increment(1);
        return Err(ApiError::DuplicateEmail);
    }

    let now = state.now();
    let admin = tokio::task::spawn_blocking(move || registration.into_admin(now))
        .await
        .map_err(|err| ApiError::Internal(format!("password hashing task failed: {err}")))??;
    admins.insert(&admin).await?;

    let token = state.tokens().issue(admin.id, now)?;
    counter!("auth_requests_total", "op" => "register", "result" => "ok").increment(1);
    info!(stage = "auth", admin_id = %admin.id, tenant_id = %admin.tenant_id, "admin registered");

    Ok((
        StatusCode::CREATED,
        Json(AuthResponse {
            message: "Admin registered successfully",
            token,
            admin: AdminProfile::from(&admin),
        }),
    ))
}

pub async fn login(
    State(state): State<AppState>,
    body: Result<Json<LoginRequest>, JsonRejection>,
) -> Result<Json<AuthResponse>, ApiError> {
    let Json(body) = body?;
    let email = normalize_email(&body.email);

    let Some(admin) = state.storage().admins().find_by_email(&email).await? else {
        counter!("auth_requests_total", "op" => "login", "result" => "invalid").increment(1);
        return Err(ApiError::InvalidCredentials);
    };

    let password = body.password;
    let (admin, matches) = tokio::task::spawn_blocking(move || {
        let matches = admin.compare_password(&password);
        (admin, matches)
    })
    .await
    .map_err(|err| ApiError::Internal(format!("password verification task failed: {err}")))?;

    if !matches? {
        counter!("auth_requests_total", "op" => "login", "result" => "invalid").increment(1);
        return Err(ApiError::InvalidCredentials);
    }

    let token = state.tokens().issue(admin.id, state.now())?;
    counter!("auth_requests_total", "op" => "login", "result" => "ok").increment(1);
    info!(stage = "auth", admin_id = %admin.id, "admin logged in");

    Ok(Json(AuthResponse {
        message: "Login successful",
        token,
        admin: AdminProfile::from(&admin),
    }))
}

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::{Duration as ChronoDuration, TimeZone};

    fn now() -> DateTime<Utc> {
        Utc.with_ymd_and_hms(2025, 6, 1, 12, 0, 0).unwrap()
    }

    fn service() -> TokenService {
        TokenService::new(b"test-secret", Duration::from_secs(3_600))
    }

    #[test]
    fn issued_token_verifies_to_admin_id() {
        let admin_id = Uuid::new_v4();
        let token = service().issue(admin_id, now()).expect("issue");
        assert_eq!(service().verify(&token, now()).expect("verify"), admin_id);
    }

    #[test]
    fn token_expires_after_ttl() {
        let token = service().issue(Uuid::new_v4(), now()).expect("issue");

        let later = now() + ChronoDuration::seconds(3_599);
        assert!(service().verify(&token, later).is_ok());

        let expired = now() + ChronoDuration::seconds(3_600);
        assert!(matches!(
            service().verify(&token, expired),
            Err(AuthError::TokenExpired)
        ));
    }

    #[test]
    fn oversized_ttl_saturates_instead_of_wrapping() {
        let service = TokenService::new(b"test-secret", Duration::from_secs(u64::MAX));
        let admin_id = Uuid::new_v4();
        let token = service.issue(admin_id, now()).expect("issue");

        let far_future = now() + ChronoDuration::days(365 * 100);
        assert_eq!(service.verify(&token, now()).expect("verify"), admin_id);
        assert_eq!(service.verify(&token, far_future).expect("verify"), admin_id);
    }

    #[test]
    fn token_signed_with_other_secret_is_invalid() {
        let other = TokenService::new(b"other-secret", Duration::from_secs(3_600));
        let token = other.issue(Uuid::new_v4(), now()).expect("issue");
        assert!(matches!(
            service().verify(&token, now()),
            Err(AuthError::InvalidToken(_))
        ));
    }

    #[test]
    fn garbage_token_is_invalid() {
        assert!(matches!(
            service().verify("not.a.jwt", now()),
            Err(AuthError::InvalidToken(_))
        ));
    }

    #[test]
    fn non_uuid_subject_is_invalid() {
        let claims = SessionClaims {
            sub: "someone".into(),
            iat: now().timestamp(),
            exp: now().timestamp() + 60,
        };
        let token = jsonwebtoken::encode(
            &Header::new(Algorithm::HS256),
            &claims,
            &EncodingKey::from_secret(b"test-secret"),
        )
        .expect("encode");
        assert!(matches!(
            service().verify(&token, now()),
            Err(AuthError::InvalidToken(_))
        ));
    }
}
