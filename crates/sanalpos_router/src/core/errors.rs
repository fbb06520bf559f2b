//! API-facing error kinds and their HTTP mapping.

use actix_web::{http::StatusCode, HttpResponse};
use common_utils::errors::CustomResult;
use sanalpos_domain_models::StorageError;

pub type RouterResult<T> = CustomResult<T, ApiErrorResponse>;

/// The error kinds the service distinguishes. The HTTP layer maps
/// `Validation`/`Conflict`/`State` to 400, `NotFound` to 404 and the
/// rest to 500, always with a `{status:false, error}` body.
#[derive(Clone, Debug, thiserror::Error)]
pub enum ApiErrorResponse {
    #[error("{message}")]
    Validation { message: String },
    #[error("{entity} not found")]
    NotFound { entity: &'static str },
    #[error("{message}")]
    Conflict { message: String },
    #[error("Encryption or decryption failed")]
    Crypto,
    #[error("{message}")]
    Provider { code: String, message: String },
    #[error("Acquirer connection failed")]
    Network,
    #[error("{message}")]
    State { message: String },
    #[error("Internal server error")]
    Internal,
}

impl ApiErrorResponse {
    pub fn validation(message: impl Into<String>) -> Self {
        Self::Validation {
            message: message.into(),
        }
    }

    pub fn state(message: impl Into<String>) -> Self {
        Self::State {
            message: message.into(),
        }
    }
}

impl actix_web::ResponseError for ApiErrorResponse {
    fn status_code(&self) -> StatusCode {
        match self {
            Self::Validation { .. } | Self::Conflict { .. } | Self::State { .. } => {
                StatusCode::BAD_REQUEST
            }
            Self::NotFound { .. } => StatusCode::NOT_FOUND,
            Self::Crypto
            | Self::Provider { .. }
            | Self::Network
            | Self::Internal => StatusCode::INTERNAL_SERVER_ERROR,
        }
    }

    fn error_response(&self) -> HttpResponse {
        HttpResponse::build(self.status_code()).json(serde_json::json!({
            "status": false,
            "error": self.to_string(),
        }))
    }
}

/// Lift storage errors into API errors at the call site.
pub trait StorageErrorExt<T> {
    /// Missing value becomes a 404 for `entity`; the rest is internal.
    fn to_not_found_response(self, entity: &'static str) -> RouterResult<T>;

    /// Duplicate becomes a 409-ish conflict; the rest is internal.
    fn to_duplicate_response(self, message: &'static str) -> RouterResult<T>;

    /// Any storage failure is internal.
    fn to_internal_response(self) -> RouterResult<T>;
}

impl<T> StorageErrorExt<T> for CustomResult<T, StorageError> {
    fn to_not_found_response(self, entity: &'static str) -> RouterResult<T> {
        self.map_err(|report| match report.current_context() {
            StorageError::ValueNotFound(_) => {
                report.change_context(ApiErrorResponse::NotFound { entity })
            }
            _ => report.change_context(ApiErrorResponse::Internal),
        })
    }

    fn to_duplicate_response(self, message: &'static str) -> RouterResult<T> {
        self.map_err(|report| match report.current_context() {
            StorageError::DuplicateValue { .. } => {
                report.change_context(ApiErrorResponse::Conflict {
                    message: message.to_string(),
                })
            }
            _ => report.change_context(ApiErrorResponse::Internal),
        })
    }

    fn to_internal_response(self) -> RouterResult<T> {
        self.map_err(|report| report.change_context(ApiErrorResponse::Internal))
    }
}
