//! Error type shared by every domain operation.
//!
//! Handlers return these through `?`; `ResponseError` turns them into an
//! inline error banner with the matching status code.

use crate::storage::StorageError;
use actix_web::http::{header::ContentType, StatusCode};
use actix_web::{HttpResponse, ResponseError};
use askama::Template;
use sea_orm::DbErr;

/// Message shown to users in place of backend failures.
pub const GENERIC_FAILURE: &str = "Something went wrong. Please try again.";

#[derive(Debug)]
pub enum ActionError {
    /// No signed-in user.
    Unauthenticated,
    /// Signed in, but the role or ownership check failed.
    Unauthorized(String),
    /// Input or state precondition failed.
    Validation(String),
    NotFound(&'static str),
    Conflict(String),
    /// Sign-in with an unknown email or a wrong password.
    InvalidCredentials,
    Backend(DbErr),
    Storage(StorageError),
}

pub type ActionResult<T> = Result<T, ActionError>;

impl ActionError {
    pub fn unauthorized(msg: impl Into<String>) -> Self {
        Self::Unauthorized(msg.into())
    }

    pub fn validation(msg: impl Into<String>) -> Self {
        Self::Validation(msg.into())
    }

    pub fn conflict(msg: impl Into<String>) -> Self {
        Self::Conflict(msg.into())
    }

    /// Text safe to show to the user.
    pub fn message(&self) -> String {
        match self {
            Self::Unauthenticated => "You must be signed in to do that.".to_string(),
            Self::Unauthorized(msg) => msg.to_string(),
            Self::Validation(msg) => msg.to_string(),
            Self::NotFound(what) => format!("{} not found.", what),
            Self::Conflict(msg) => msg.to_string(),
            Self::InvalidCredentials => "Invalid email or password.".to_string(),
            Self::Backend(_) | Self::Storage(_) => GENERIC_FAILURE.to_string(),
        }
    }
}

impl std::fmt::Display for ActionError {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            Self::Backend(e) => write!(f, "Database error: {}", e),
            Self::Storage(e) => write!(f, "Storage error: {}", e),
            _ => f.write_str(&self.message()),
        }
    }
}

impl std::error::Error for ActionError {}

impl From<DbErr> for ActionError {
    fn from(e: DbErr) -> Self {
        Self::Backend(e)
    }
}

impl From<StorageError> for ActionError {
    fn from(e: StorageError) -> Self {
        Self::Storage(e)
    }
}

impl From<validator::ValidationErrors> for ActionError {
    fn from(errors: validator::ValidationErrors) -> Self {
        let fields: Vec<&str> = errors.field_errors().keys().copied().collect();
        log::debug!("Form validation failed: {}", errors);
        Self::Validation(format!(
            "Please check the following fields: {}.",
            fields.join(", ")
        ))
    }
}

#[derive(Template)]
#[template(path = "error.html")]
struct ErrorTemplate<'a> {
    status: u16,
    message: &'a str,
}

impl ResponseError for ActionError {
    fn status_code(&self) -> StatusCode {
        match self {
            Self::Unauthenticated => StatusCode::UNAUTHORIZED,
            Self::Unauthorized(_) => StatusCode::FORBIDDEN,
            Self::Validation(_) => StatusCode::BAD_REQUEST,
            Self::NotFound(_) => StatusCode::NOT_FOUND,
            Self::Conflict(_) => StatusCode::CONFLICT,
            Self::InvalidCredentials => StatusCode::UNAUTHORIZED,
            Self::Backend(_) | Self::Storage(_) => StatusCode::INTERNAL_SERVER_ERROR,
        }
    }

    fn error_response(&self) -> HttpResponse {
        if matches!(self, Self::Backend(_) | Self::Storage(_)) {
            log::error!("{}", self);
        }

        let message = self.message();
        let body = ErrorTemplate {
            status: self.status_code().as_u16(),
            message: &message,
        }
        .render()
        .unwrap_or(message);

        HttpResponse::build(self.status_code())
            .insert_header(ContentType::html())
            .body(body)
    }
}
