use axum::{
    Json,
    http::StatusCode,
    response::{IntoResponse, Response},
};
use serde::{Deserialize, Serialize};
use std::{collections::BTreeMap, fmt};
use thiserror::Error;

use crate::db::DatabaseError;

/// Error map key for problems not tied to one field
pub const NON_FIELD_ERRORS: &str = "non_field_errors";

/// Per-field validation messages, serialized as `{"field": ["message", ...]}`
///
/// Errors are accumulated across every field of a request before anything is
/// returned, so a client sees all problems with its payload at once.
/// BTreeMap keeps the JSON key order stable.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(transparent)]
pub struct FieldErrors(BTreeMap<String, Vec<String>>);

impl FieldErrors {
    pub fn new() -> Self {
        Self::default()
    }

    /// Single-field error map
    pub fn single(field: impl Into<String>, message: impl Into<String>) -> Self {
        let mut errors = Self::new();
        errors.add(field, message);
        errors
    }

    pub fn add(&mut self, field: impl Into<String>, message: impl Into<String>) {
        self.0.entry(field.into()).or_default().push(message.into());
    }

    /// Merge another map into this one, keeping every message
    pub fn extend(&mut self, other: FieldErrors) {
        for (field, messages) in other.0 {
            self.0.entry(field).or_default().extend(messages);
        }
    }

    pub fn is_empty(&self) -> bool {
        self.0.is_empty()
    }

    pub fn get(&self, field: &str) -> Option<&Vec<String>> {
        self.0.get(field)
    }

    /// `Ok(())` when no field failed, otherwise a validation error
    pub fn into_result(self) -> Result<(), ServiceError> {
        if self.is_empty() {
            Ok(())
        } else {
            Err(ServiceError::Validation(self))
        }
    }
}

impl From<validator::ValidationErrors> for FieldErrors {
    fn from(errors: validator::ValidationErrors) -> Self {
        let mut collected = FieldErrors::new();
        for (field, field_errors) in errors.field_errors() {
            for error in field_errors.iter() {
                let message = error
                    .message
                    .as_ref()
                    .map(|m| m.to_string())
                    .unwrap_or_else(|| error.code.to_string());
                collected.add(field.to_string(), message);
            }
        }
        collected
    }
}

/// Enumeration of the fixed, client-facing messages
///
/// PartialEq allows comparing error variants in tests
#[derive(Debug, PartialEq)]
pub enum ErrorMessage {
    // Confirmation code errors
    EmptyCode,
    ExceededMaxCodeLength(usize),
    InvalidHashFormat,
    HashingError,
    InvalidConfirmationCode,

    // Authentication errors
    InvalidToken,
    UserNoLongerExist,

    // Authorization errors
    PermissionDenied,

    // Input errors
    InvalidUsername,
    ReservedUsername,
    DuplicateEmail,
    DuplicateUsername,
    DuplicateReview,
    MissingSlug(String),
    MalformedJson(String),
    InvalidFieldValue(String),

    NotFound,
    ServerError,
}

impl fmt::Display for ErrorMessage {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let message = match self {
            ErrorMessage::EmptyCode => "Confirmation code cannot be empty".to_string(),
            ErrorMessage::ExceededMaxCodeLength(max_length) => {
                format!("Confirmation code must not be more than {} characters", max_length)
            }
            ErrorMessage::InvalidHashFormat => "Invalid confirmation code hash format".to_string(),
            ErrorMessage::HashingError => "Error while hashing confirmation code".to_string(),
            ErrorMessage::InvalidConfirmationCode => "Invalid confirmation code.".to_string(),
            ErrorMessage::InvalidToken => "Token is invalid or expired".to_string(),
            ErrorMessage::UserNoLongerExist => {
                "User belonging to this token no longer exists".to_string()
            }
            ErrorMessage::PermissionDenied => {
                "You do not have permission to perform this action.".to_string()
            }
            ErrorMessage::InvalidUsername => {
                "Enter a valid username. This value may contain only letters, numbers, and @/./+/-/_ characters."
                    .to_string()
            }
            ErrorMessage::ReservedUsername => {
                "Using 'me' as a username is not allowed.".to_string()
            }
            ErrorMessage::DuplicateEmail => "A user with this email already exists.".to_string(),
            ErrorMessage::DuplicateUsername => {
                "A user with this username already exists.".to_string()
            }
            ErrorMessage::DuplicateReview => {
                "The fields title, author must make a unique set.".to_string()
            }
            ErrorMessage::MissingSlug(slug) => {
                format!("Object with slug={} does not exist.", slug)
            }
            ErrorMessage::MalformedJson(detail) => format!("JSON parse error - {}", detail),
            ErrorMessage::InvalidFieldValue(detail) => format!("Incorrect type ({}).", detail),
            ErrorMessage::NotFound => "Not found.".to_string(),
            ErrorMessage::ServerError => "Server Error. Please try again later".to_string(),
        };
        write!(f, "{}", message)
    }
}

/// Domain error returned by the services and the permission evaluator
///
/// Handlers convert it into an [`HttpError`] with `?`.
#[derive(Debug, Error)]
pub enum ServiceError {
    /// Malformed or duplicate input, reported per field
    #[error("validation failed: {0:?}")]
    Validation(FieldErrors),
    /// A uniqueness rule was violated (pre-check or store constraint)
    #[error("{field}: {message}")]
    Conflict { field: String, message: String },
    #[error("permission denied")]
    PermissionDenied,
    #[error("{0} not found")]
    NotFound(&'static str),
    /// Confirmation code did not validate
    #[error("invalid confirmation code")]
    Authentication,
    #[error(transparent)]
    Database(DatabaseError),
    #[error("mail delivery failed: {0}")]
    Mail(String),
    #[error("token error: {0}")]
    Token(String),
    #[error("hashing error: {0}")]
    Hashing(String),
}

impl From<DatabaseError> for ServiceError {
    fn from(value: DatabaseError) -> Self {
        match value {
            DatabaseError::NotFound { resource, .. } => ServiceError::NotFound(resource),
            DatabaseError::Conflict {
                resource, field, ..
            } => ServiceError::Conflict {
                field: field.to_string(),
                message: format!("{} with this {} already exists.", resource, field),
            },
            e => ServiceError::Database(e),
        }
    }
}

impl From<validator::ValidationErrors> for ServiceError {
    fn from(value: validator::ValidationErrors) -> Self {
        ServiceError::Validation(value.into())
    }
}

/// Body of an error response
///
/// Validation failures are a bare field map (`{"email": ["..."]}`), every
/// other failure is `{"detail": "..."}`.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
#[serde(untagged)]
pub enum ErrorBody {
    Detail { detail: String },
    Fields(FieldErrors),
}

/// Internal HTTP error type used by handlers and middleware
///
/// Status codes are bundled with the body so they cannot drift apart.
#[derive(Debug, Clone)]
pub struct HttpError {
    pub status: StatusCode,
    pub body: ErrorBody,
}

impl HttpError {
    pub fn new(message: impl Into<String>, status: StatusCode) -> Self {
        HttpError {
            status,
            body: ErrorBody::Detail {
                detail: message.into(),
            },
        }
    }

    /// 500. The message is generic; log the cause before building this.
    pub fn server_error() -> Self {
        HttpError::new(
            ErrorMessage::ServerError.to_string(),
            StatusCode::INTERNAL_SERVER_ERROR,
        )
    }

    /// 400 with a field map
    pub fn fields(errors: FieldErrors) -> Self {
        HttpError {
            status: StatusCode::BAD_REQUEST,
            body: ErrorBody::Fields(errors),
        }
    }

    /// 401: the presented token is unusable
    pub fn unauthorized(message: impl Into<String>) -> Self {
        HttpError::new(message, StatusCode::UNAUTHORIZED)
    }

    /// 403 with the fixed message; never says why
    pub fn forbidden() -> Self {
        HttpError::new(
            ErrorMessage::PermissionDenied.to_string(),
            StatusCode::FORBIDDEN,
        )
    }

    pub fn not_found() -> Self {
        HttpError::new(ErrorMessage::NotFound.to_string(), StatusCode::NOT_FOUND)
    }

    pub fn into_http_response(self) -> Response {
        (self.status, Json(self.body)).into_response()
    }
}

impl fmt::Display for HttpError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "HttpError: body: {:?}, status: {}", self.body, self.status)
    }
}

impl std::error::Error for HttpError {}

impl IntoResponse for HttpError {
    fn into_response(self) -> Response {
        self.into_http_response()
    }
}

impl From<ServiceError> for HttpError {
    fn from(value: ServiceError) -> Self {
        match value {
            ServiceError::Validation(errors) => HttpError::fields(errors),
            ServiceError::Conflict { field, message } => {
                HttpError::fields(FieldErrors::single(field, message))
            }
            ServiceError::Authentication => HttpError::fields(FieldErrors::single(
                "confirmation_code",
                ErrorMessage::InvalidConfirmationCode.to_string(),
            )),
            ServiceError::PermissionDenied => HttpError::forbidden(),
            ServiceError::NotFound(_) => HttpError::not_found(),
            e @ (ServiceError::Database(_)
            | ServiceError::Mail(_)
            | ServiceError::Token(_)
            | ServiceError::Hashing(_)) => {
                tracing::error!("Internal error: {}", e);
                HttpError::server_error()
            }
        }
    }
}
