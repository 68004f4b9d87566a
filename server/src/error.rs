use actix_web::{http::StatusCode, HttpResponse, ResponseError};
use log::error;
use thiserror::Error;
use todo_shared::{ErrorBody, FieldErrors};

use crate::store::StoreError;

#[derive(Debug, Error)]
pub enum ApiError {
    #[error("{message}")]
    Validation { message: String, fields: FieldErrors },

    #[error("{0}")]
    Duplicate(String),

    #[error("invalid credentials")]
    InvalidCredentials,

    #[error("{0} not found")]
    NotFound(&'static str),

    #[error("authentication credentials were not provided")]
    Unauthenticated,

    #[error("store error: {0}")]
    Store(#[from] StoreError),

    #[error("password hashing failed: {0}")]
    Hashing(String),

    #[error("blocking task failed: {0}")]
    Blocking(#[from] actix_web::error::BlockingError),
}

pub type ApiResult<T> = Result<T, ApiError>;

impl ApiError {
    pub fn validation(message: impl Into<String>) -> Self {
        Self::Validation {
            message: message.into(),
            fields: FieldErrors::new(),
        }
    }

    pub fn invalid_fields(fields: FieldErrors) -> Self {
        Self::Validation {
            message: "invalid input".to_string(),
            fields,
        }
    }

    fn body(&self) -> ErrorBody {
        match self {
            Self::Validation { message, fields } => ErrorBody {
                error: message.clone(),
                fields: fields.clone(),
            },
            Self::Store(_) | Self::Hashing(_) | Self::Blocking(_) => {
                ErrorBody::new("internal server error")
            }
            other => ErrorBody::new(other.to_string()),
        }
    }
}

impl ResponseError for ApiError {
    fn status_code(&self) -> StatusCode {
        match self {
            Self::Validation { .. } | Self::Duplicate(_) | Self::InvalidCredentials => {
                StatusCode::BAD_REQUEST
            }
            Self::NotFound(_) => StatusCode::NOT_FOUND,
            Self::Unauthenticated => StatusCode::UNAUTHORIZED,
            Self::Store(_) | Self::Hashing(_) | Self::Blocking(_) => {
                StatusCode::INTERNAL_SERVER_ERROR
            }
        }
    }

    fn error_response(&self) -> HttpResponse {
        let status = self.status_code();
        if status.is_server_error() {
            error!("{self}");
        }
        HttpResponse::build(status).json(self.body())
    }
}
