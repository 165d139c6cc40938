use axum::{
    extract::rejection::JsonRejection,
    http::StatusCode,
    response::{IntoResponse, Response},
};
use thiserror::Error;
use tracing::error;

use policy_desk_core::password::PasswordError;
use policy_desk_core::{PolicyError, RegistrationError};
use policy_desk_storage::{AdminStoreError, PolicyStoreError};

use crate::auth::AuthError;
use crate::problem::ProblemResponse;

/// Request-boundary error taxonomy. Every variant maps to one problem response.
#[derive(Debug, Error)]
pub enum ApiError {
    #[error("invalid request: {0}")]
    InvalidInput(String),
    #[error("invalid credentials")]
    InvalidCredentials,
    #[error(transparent)]
    Auth(#[from] AuthError),
    #[error("admin not found")]
    AdminNotFound,
    #[error("policy not found")]
    PolicyNotFound,
    #[error("admin already exists")]
    DuplicateEmail,
    #[error("policy number already exists: {0}")]
    DuplicatePolicyNumber(String),
    #[error("internal error: {0}")]
    Internal(String),
}

impl ApiError {
    pub fn into_problem(self) -> ProblemResponse {
        match self {
            Self::InvalidInput(detail) => {
                ProblemResponse::new(StatusCode::BAD_REQUEST, "invalid_input", detail)
            }
            Self::InvalidCredentials => ProblemResponse::new(
                StatusCode::UNAUTHORIZED,
                "invalid_credentials",
                "Invalid credentials",
            ),
            Self::Auth(AuthError::Unauthenticated) => ProblemResponse::new(
                StatusCode::UNAUTHORIZED,
                "unauthenticated",
                "Authorization token missing",
            ),
            Self::Auth(AuthError::TokenExpired) => ProblemResponse::new(
                StatusCode::UNAUTHORIZED,
                "token_expired",
                "Token has expired, please log in again",
            ),
            Self::Auth(AuthError::InvalidToken(_)) => {
                ProblemResponse::new(StatusCode::UNAUTHORIZED, "invalid_token", "Invalid token")
            }
            Self::Auth(err @ AuthError::Signing(_)) => internal(err.to_string()),
            Self::AdminNotFound => {
                ProblemResponse::new(StatusCode::NOT_FOUND, "admin_not_found", "Admin not found")
            }
            Self::PolicyNotFound => {
                ProblemResponse::new(StatusCode::NOT_FOUND, "policy_not_found", "Policy not found")
            }
            Self::DuplicateEmail => ProblemResponse::new(
                StatusCode::CONFLICT,
                "admin_exists",
                "Admin already exists",
            ),
            Self::DuplicatePolicyNumber(number) => ProblemResponse::new(
                StatusCode::CONFLICT,
                "policy_number_exists",
                format!("Policy number already exists: {number}"),
            ),
            Self::Internal(detail) => internal(detail),
        }
    }
}

fn internal(detail: String) -> ProblemResponse {
    error!(stage = "app", error = %detail, "request failed");
    ProblemResponse::new(
        StatusCode::INTERNAL_SERVER_ERROR,
        "internal",
        "Internal server error",
    )
}

impl IntoResponse for ApiError {
    fn into_response(self) -> Response {
        self.into_problem().into_response()
    }
}

impl From<JsonRejection> for ApiError {
    fn from(rejection: JsonRejection) -> Self {
        Self::InvalidInput(rejection.body_text())
    }
}

impl From<RegistrationError> for ApiError {
    fn from(err: RegistrationError) -> Self {
        Self::InvalidInput(err.to_string())
    }
}

impl From<PasswordError> for ApiError {
    fn from(err: PasswordError) -> Self {
        Self::Internal(err.to_string())
    }
}

impl From<PolicyError> for ApiError {
    fn from(err: PolicyError) -> Self {
        match err {
            PolicyError::DuplicatePolicyNumber(number) => Self::DuplicatePolicyNumber(number),
            PolicyError::NotFound => Self::PolicyNotFound,
            PolicyError::Invalid(detail) => Self::InvalidInput(detail),
        }
    }
}

impl From<AdminStoreError> for ApiError {
    fn from(err: AdminStoreError) -> Self {
        match err {
            AdminStoreError::DuplicateEmail => Self::DuplicateEmail,
            AdminStoreError::NotFound => Self::AdminNotFound,
            other => Self::Internal(other.to_string()),
        }
    }
}

impl From<PolicyStoreError> for ApiError {
    fn from(err: PolicyStoreError) -> Self {
        match err {
            PolicyStoreError::Policy(err) => err.into(),
            PolicyStoreError::Storage(err) => err.into(),
        }
    }
}
