use axum::{
    extract::rejection::{JsonRejection, PathRejection, QueryRejection},
    http::StatusCode,
    response::{IntoResponse, Response},
    Json,
};
use serde_json::{json, Value};
use thiserror::Error;
use tracing::error;

use crate::auth::AuthError;
use crate::services::IdentityError;

pub type ApiResult<T> = Result<T, ApiError>;

#[derive(Error, Debug)]
pub enum ApiError {
    #[error("{0}")]
    BadRequest(String),
    #[error("validation failed")]
    Validation(#[from] validator::ValidationErrors),
    #[error("{0} not found")]
    NotFound(&'static str),
    #[error("{0}")]
    Forbidden(&'static str),
    #[error("{0}")]
    Conflict(String),
    #[error(transparent)]
    Auth(#[from] AuthError),
    #[error("database error: {0}")]
    Database(#[from] sqlx::Error),
    #[error("institutional directory error: {0}")]
    Identity(#[from] IdentityError),
    #[error("internal error: {0}")]
    Internal(#[from] anyhow::Error),
}

impl ApiError {
    pub fn status(&self) -> StatusCode {
        match self {
            ApiError::BadRequest(_) | ApiError::Validation(_) => StatusCode::BAD_REQUEST,
            ApiError::NotFound(_) => StatusCode::NOT_FOUND,
            ApiError::Forbidden(_) => StatusCode::FORBIDDEN,
            ApiError::Conflict(_) => StatusCode::CONFLICT,
            ApiError::Auth(err) => err.status(),
            ApiError::Database(_) | ApiError::Identity(_) | ApiError::Internal(_) => {
                StatusCode::INTERNAL_SERVER_ERROR
            }
        }
    }

    fn code(&self) -> &'static str {
        match self {
            ApiError::BadRequest(_) => "bad_request",
            ApiError::Validation(_) => "validation_failed",
            ApiError::NotFound(_) => "not_found",
            ApiError::Forbidden(_) => "forbidden",
            ApiError::Conflict(_) => "conflict",
            ApiError::Auth(_) => "unauthorized",
            ApiError::Database(_) | ApiError::Identity(_) | ApiError::Internal(_) => "internal_error",
        }
    }
}

// Malformed bodies, paths and query strings share the JSON error shape.
impl From<JsonRejection> for ApiError {
    fn from(rejection: JsonRejection) -> Self {
        ApiError::BadRequest(rejection.body_text())
    }
}

impl From<PathRejection> for ApiError {
    fn from(rejection: PathRejection) -> Self {
        ApiError::BadRequest(rejection.body_text())
    }
}

impl From<QueryRejection> for ApiError {
    fn from(rejection: QueryRejection) -> Self {
        ApiError::BadRequest(rejection.body_text())
    }
}

impl IntoResponse for ApiError {
    fn into_response(self) -> Response {
        if let ApiError::Auth(err) = self {
            return err.into_response();
        }

        let status = self.status();
        let mut body = json!({
            "error": self.code(),
            "message": self.to_string(),
        });

        match &self {
            ApiError::Validation(errors) => {
                body["details"] = serde_json::to_value(errors).unwrap_or(Value::Null);
            }
            ApiError::Database(_) | ApiError::Identity(_) | ApiError::Internal(_) => {
                error!(error = %self, "request failed");
                body["message"] = json!("Internal server error");
            }
            _ => {}
        }

        (status, Json(body)).into_response()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use validator::Validate;

    #[derive(Validate)]
    struct Named {
        #[validate(length(min = 1))]
        name: String,
    }

    #[test]
    fn statuses_follow_the_error_kind() {
        assert_eq!(ApiError::NotFound("routine").status(), StatusCode::NOT_FOUND);
        assert_eq!(ApiError::Forbidden("not yours").status(), StatusCode::FORBIDDEN);
        assert_eq!(ApiError::Conflict("full".into()).status(), StatusCode::CONFLICT);
        assert_eq!(
            ApiError::Auth(AuthError::InvalidCredentials).status(),
            StatusCode::UNAUTHORIZED
        );
        assert_eq!(
            ApiError::Database(sqlx::Error::RowNotFound).status(),
            StatusCode::INTERNAL_SERVER_ERROR
        );
    }

    #[test]
    fn validation_errors_become_bad_requests() {
        let errors = Named { name: String::new() }.validate().unwrap_err();
        let error = ApiError::from(errors);
        assert_eq!(error.status(), StatusCode::BAD_REQUEST);
        assert_eq!(error.code(), "validation_failed");
    }

    #[test]
    fn not_found_names_the_entity() {
        assert_eq!(ApiError::NotFound("exercise").to_string(), "exercise not found");
    }
}
