use std::fmt;

use axum::{
    http::StatusCode,
    response::{IntoResponse, Response},
    Json,
};
use serde_json::json;
use tracing::error;

use crate::messages::{AcceptLanguage, MessageCatalog};

/// A catalog key plus the named values substituted into its template.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Message {
    pub key: &'static str,
    pub params: Vec<(&'static str, String)>,
}

impl Message {
    pub fn new(key: &'static str) -> Self {
        Self { key, params: Vec::new() }
    }

    pub fn with(mut self, name: &'static str, value: impl ToString) -> Self {
        self.params.push((name, value.to_string()));
        self
    }
}

impl fmt::Display for Message {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.key)?;
        for (i, (name, value)) in self.params.iter().enumerate() {
            let sep = if i == 0 { " (" } else { ", " };
            write!(f, "{sep}{name}={value}")?;
        }
        if !self.params.is_empty() {
            f.write_str(")")?;
        }
        Ok(())
    }
}

#[derive(Debug, thiserror::Error)]
pub enum AppError {
    #[error("not found: {0}")]
    NotFound(Message),

    #[error("bad request: {0}")]
    BadRequest(Message),

    #[error("conflict: {0}")]
    Conflict(Message),

    #[error("unavailable: {0}")]
    Unavailable(Message),

    #[error("database error: {0}")]
    Database(#[from] sqlx::Error),

    #[error(transparent)]
    Internal(#[from] anyhow::Error),
}

pub type AppResult<T> = Result<T, AppError>;

impl AppError {
    pub fn status(&self) -> StatusCode {
        match self {
            AppError::NotFound(_) => StatusCode::NOT_FOUND,
            AppError::BadRequest(_) => StatusCode::BAD_REQUEST,
            AppError::Conflict(_) => StatusCode::CONFLICT,
            AppError::Unavailable(_) => StatusCode::SERVICE_UNAVAILABLE,
            AppError::Database(_) | AppError::Internal(_) => StatusCode::INTERNAL_SERVER_ERROR,
        }
    }

    /// The client-facing message. Server-side failures are reduced to a
    /// generic key so driver text never leaks into a response.
    pub fn message(&self) -> Message {
        match self {
            AppError::NotFound(m)
            | AppError::BadRequest(m)
            | AppError::Conflict(m)
            | AppError::Unavailable(m) => m.clone(),
            AppError::Database(_) => Message::new("error.database"),
            AppError::Internal(_) => Message::new("error.internal"),
        }
    }

    /// Failures of the service itself, as opposed to an expected 503.
    pub fn is_server_fault(&self) -> bool {
        matches!(self, AppError::Database(_) | AppError::Internal(_))
    }

    /// Renders the error in the caller's language.
    pub fn localize(self, catalog: &MessageCatalog, lang: &AcceptLanguage) -> ApiError {
        let status = self.status();
        if self.is_server_fault() {
            error!(error = %self, "Request failed");
        }
        let message = self.message();
        let language = catalog.resolve(lang.preferences());
        ApiError {
            status,
            code: message.key,
            message: catalog.lookup(&language, message.key, &message.params),
        }
    }
}

/// An `AppError` already rendered for the client.
#[derive(Debug)]
pub struct ApiError {
    pub status: StatusCode,
    pub code: &'static str,
    pub message: String,
}

impl IntoResponse for ApiError {
    fn into_response(self) -> Response {
        (
            self.status,
            Json(json!({
                "error": {
                    "code": self.code,
                    "message": self.message,
                }
            })),
        )
            .into_response()
    }
}

pub type ApiResult<T> = Result<T, ApiError>;

/// `result.localize(&catalog, &lang)?` inside handlers.
pub trait Localize<T> {
    fn localize(self, catalog: &MessageCatalog, lang: &AcceptLanguage) -> ApiResult<T>;
}

impl<T> Localize<T> for AppResult<T> {
    fn localize(self, catalog: &MessageCatalog, lang: &AcceptLanguage) -> ApiResult<T> {
        self.map_err(|e| e.localize(catalog, lang))
    }
}

/// True for a PostgreSQL unique-constraint violation (SQLSTATE 23505).
pub fn is_unique_violation(err: &sqlx::Error) -> bool {
    match err {
        sqlx::Error::Database(db) => db.code().as_deref() == Some("23505"),
        _ => false,
    }
}
