use axum::{
    Json,
    extract::{FromRequest, Request, rejection::JsonRejection},
    http::StatusCode,
    response::{IntoResponse, Response},
};
use serde::Serialize;
use thiserror::Error;
use utoipa::ToSchema;

use crate::repository::RepositoryError;

/// ApiError
///
/// Every failure a handler can surface, one variant per error kind in the
/// API contract. All variants serialize to `{"kind", "message"}` (plus the
/// offending `field` for validation errors) so clients never see a raw
/// internal failure.
#[derive(Debug, Error)]
pub enum ApiError {
    /// No valid session. Covers missing/expired/revoked tokens and failed
    /// logins; 401 tells the client to authenticate.
    #[error("{0}")]
    Unauthenticated(String),

    /// The session is valid but the role does not permit the operation.
    #[error("role does not permit the {0} operation")]
    Forbidden(&'static str),

    /// The addressed record does not exist.
    #[error("{0} not found")]
    NotFound(&'static str),

    /// A request field failed validation. `field` names the offender.
    #[error("{message}")]
    Validation { field: &'static str, message: String },

    /// The requested page number is outside the result set.
    #[error("{0}")]
    PageNotFound(String),

    /// Anything the client cannot act on. The carried detail goes to the
    /// log, not the response body.
    #[error("internal error")]
    Internal(String),
}

impl ApiError {
    pub fn validation(field: &'static str, message: impl Into<String>) -> Self {
        ApiError::Validation {
            field,
            message: message.into(),
        }
    }

    /// The machine-readable kind carried in the response body.
    pub fn kind(&self) -> &'static str {
        match self {
            ApiError::Unauthenticated(_) => "unauthenticated",
            ApiError::Forbidden(_) => "unauthorized",
            ApiError::NotFound(_) => "not_found",
            ApiError::Validation { .. } => "validation_error",
            ApiError::PageNotFound(_) => "page_not_found",
            ApiError::Internal(_) => "internal",
        }
    }

    fn status(&self) -> StatusCode {
        match self {
            ApiError::Unauthenticated(_) => StatusCode::UNAUTHORIZED,
            ApiError::Forbidden(_) => StatusCode::FORBIDDEN,
            ApiError::NotFound(_) => StatusCode::NOT_FOUND,
            ApiError::Validation { .. } => StatusCode::BAD_REQUEST,
            ApiError::PageNotFound(_) => StatusCode::NOT_FOUND,
            ApiError::Internal(_) => StatusCode::INTERNAL_SERVER_ERROR,
        }
    }
}

/// Wire shape of every error response.
#[derive(Debug, Serialize, ToSchema)]
pub struct ErrorBody {
    /// Machine-readable error kind.
    pub kind: String,
    /// Human-readable description.
    pub message: String,
    /// Offending field for validation errors.
    #[serde(skip_serializing_if = "Option::is_none")]
    pub field: Option<String>,
}

impl IntoResponse for ApiError {
    fn into_response(self) -> Response {
        let message = match &self {
            // Internal failures are logged with detail and masked in the
            // response.
            ApiError::Internal(detail) => {
                tracing::error!(error = %detail, "unhandled internal error");
                "a server error occurred, please try again later".to_string()
            }
            other => other.to_string(),
        };

        let field = match &self {
            ApiError::Validation { field, .. } => Some((*field).to_string()),
            _ => None,
        };

        let body = ErrorBody {
            kind: self.kind().to_string(),
            message,
            field,
        };

        (self.status(), Json(body)).into_response()
    }
}

/// ApiJson
///
/// Request-body extractor that keeps malformed or incomplete JSON inside
/// the error contract: a rejected body (bad syntax, missing field, wrong
/// type) becomes a `validation_error` response instead of the framework's
/// plain-text rejection.
pub struct ApiJson<T>(pub T);

impl<S, T> FromRequest<S> for ApiJson<T>
where
    Json<T>: FromRequest<S, Rejection = JsonRejection>,
    S: Send + Sync,
{
    type Rejection = ApiError;

    async fn from_request(req: Request, state: &S) -> Result<Self, Self::Rejection> {
        match Json::<T>::from_request(req, state).await {
            Ok(Json(value)) => Ok(ApiJson(value)),
            Err(rejection) => Err(ApiError::validation("body", rejection.body_text())),
        }
    }
}

impl From<RepositoryError> for ApiError {
    /// Maps store failures at the API boundary: unique-constraint conflicts
    /// become validation errors naming the duplicated field, everything else
    /// is internal.
    fn from(err: RepositoryError) -> Self {
        match err {
            RepositoryError::Duplicate { field } => ApiError::Validation {
                field,
                message: format!("a person with this {field} already exists"),
            },
            other => ApiError::Internal(other.to_string()),
        }
    }
}
