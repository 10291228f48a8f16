use std::convert::Infallible;

use axum::{
    body::Bytes,
    extract::{FromRequest, Request},
};
use serde::de::DeserializeOwned;
use serde_path_to_error::Segment;

use crate::error::{ErrorMessage, FieldErrors, NON_FIELD_ERRORS, ServiceError};

/// JSON request body that never rejects the request.
///
/// A body that does not parse is kept as per-field errors and only surfaces
/// when the service calls [`Payload::into_inner`], which it does after the
/// permission check. An anonymous write with a broken body is still a 403.
#[derive(Debug)]
pub struct Payload<T>(Result<T, FieldErrors>);

impl<T> Payload<T> {
    pub fn into_inner(self) -> Result<T, ServiceError> {
        self.0.map_err(ServiceError::Validation)
    }
}

impl<T> From<T> for Payload<T> {
    fn from(value: T) -> Self {
        Payload(Ok(value))
    }
}

impl<S, T> FromRequest<S> for Payload<T>
where
    S: Send + Sync,
    T: DeserializeOwned,
{
    type Rejection = Infallible;

    async fn from_request(req: Request, state: &S) -> Result<Self, Self::Rejection> {
        let parsed = match Bytes::from_request(req, state).await {
            Ok(bytes) => parse_body(&bytes),
            Err(rejection) => Err(FieldErrors::single(NON_FIELD_ERRORS, rejection.body_text())),
        };
        Ok(Payload(parsed))
    }
}

/// Deserialize a JSON body, naming the offending field on type errors.
///
/// An empty body reads as `{}` so missing fields are reported by validation.
pub fn parse_body<T: DeserializeOwned>(bytes: &[u8]) -> Result<T, FieldErrors> {
    let bytes: &[u8] = if bytes.iter().all(u8::is_ascii_whitespace) {
        b"{}"
    } else {
        bytes
    };

    let mut de = serde_json::Deserializer::from_slice(bytes);
    let value = serde_path_to_error::deserialize(&mut de).map_err(body_errors)?;
    de.end().map_err(|e| {
        FieldErrors::single(
            NON_FIELD_ERRORS,
            ErrorMessage::MalformedJson(without_position(&e)).to_string(),
        )
    })?;

    Ok(value)
}

fn body_errors(error: serde_path_to_error::Error<serde_json::Error>) -> FieldErrors {
    let field = error.path().iter().find_map(|segment| match segment {
        Segment::Map { key } => Some(key.clone()),
        _ => None,
    });
    let inner = error.into_inner();
    let detail = without_position(&inner);

    if inner.is_syntax() || inner.is_eof() {
        return FieldErrors::single(
            NON_FIELD_ERRORS,
            ErrorMessage::MalformedJson(detail).to_string(),
        );
    }

    match field {
        Some(field) => FieldErrors::single(
            field,
            ErrorMessage::InvalidFieldValue(detail).to_string(),
        ),
        None => FieldErrors::single(
            NON_FIELD_ERRORS,
            ErrorMessage::InvalidFieldValue(detail).to_string(),
        ),
    }
}

// serde_json appends " at line L column C"
fn without_position(error: &serde_json::Error) -> String {
    let message = error.to_string();
    match message.rsplit_once(" at line ") {
        Some((head, _)) => head.to_string(),
        None => message,
    }
}
