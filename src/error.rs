//! Error types shared by the API client and the resource wrappers.
//!
//! Every failure a caller can observe falls in one of a few buckets:
//! local validation (never reaches the network), transport (no response),
//! HTTP (the server answered 4xx/5xx), an expired session (the refresh
//! token was rejected) or a response body that could not be decoded.

use reqwest::StatusCode;
use std::collections::BTreeMap;
use std::fmt;
use thiserror::Error;

use crate::session::store::StoreError;

/// Errors returned by [`crate::client::ApiClient`] and the typed APIs.
#[derive(Error, Debug)]
pub enum ApiError {
    #[error("{0}")]
    Validation(ValidationErrors),

    #[error("request failed: {0}")]
    Transport(#[source] reqwest::Error),

    #[error("server returned {status}: {message}")]
    Http {
        status: StatusCode,
        message: String,
        body: Option<serde_json::Value>,
    },

    #[error("session expired: {0}")]
    SessionExpired(#[source] Box<ApiError>),

    #[error("invalid response: {0}")]
    Decode(String),

    #[error("failed to encode request body: {0}")]
    Encode(#[source] serde_json::Error),

    #[error(transparent)]
    Store(#[from] StoreError),
}

impl ApiError {
    /// HTTP status carried by this error, looking through an expired session.
    pub fn status(&self) -> Option<StatusCode> {
        match self {
            ApiError::Http { status, .. } => Some(*status),
            ApiError::SessionExpired(inner) => inner.status(),
            _ => None,
        }
    }

    pub fn is_unauthorized(&self) -> bool {
        matches!(self, ApiError::Http { status, .. } if *status == StatusCode::UNAUTHORIZED)
    }

    /// Single field validation error
    pub fn validation_field(field: &str, message: impl Into<String>) -> Self {
        let mut builder = ValidationErrorBuilder::new();
        builder.add(field, message);
        ApiError::Validation(builder.into_errors())
    }

    /// Build an HTTP error from a non-success response, consuming its body.
    pub(crate) async fn from_response(response: reqwest::Response) -> Self {
        let status = response.status();
        let text = response.text().await.unwrap_or_default();
        let body = serde_json::from_str::<serde_json::Value>(&text).ok();
        let message = body
            .as_ref()
            .and_then(error_message)
            .unwrap_or_else(|| {
                if text.trim().is_empty() {
                    status
                        .canonical_reason()
                        .unwrap_or("request failed")
                        .to_string()
                } else {
                    text.trim().to_string()
                }
            });

        ApiError::Http {
            status,
            message,
            body,
        }
    }
}

/// Pull a human-readable message out of a JSON error body.
///
/// The backend reports errors either as `{"detail": ...}`, `{"error": ...}`,
/// `{"message": ...}` or as a map of field name to a list of messages.
fn error_message(body: &serde_json::Value) -> Option<String> {
    let object = body.as_object()?;
    for key in ["detail", "error", "message"] {
        if let Some(text) = object.get(key).and_then(|v| v.as_str()) {
            return Some(text.to_string());
        }
    }

    let fields: Vec<String> = object
        .iter()
        .filter_map(|(field, value)| {
            let first = match value {
                serde_json::Value::Array(items) => items.first()?.as_str()?.to_string(),
                serde_json::Value::String(s) => s.clone(),
                _ => return None,
            };
            Some(format!("{}: {}", field, first))
        })
        .collect();

    if fields.is_empty() {
        None
    } else {
        Some(fields.join("; "))
    }
}

/// Field-level validation failures collected before a request is sent.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct ValidationErrors {
    errors: BTreeMap<String, Vec<String>>,
}

impl ValidationErrors {
    pub fn fields(&self) -> &BTreeMap<String, Vec<String>> {
        &self.errors
    }

    pub fn get(&self, field: &str) -> Option<&[String]> {
        self.errors.get(field).map(|v| v.as_slice())
    }

    pub fn is_empty(&self) -> bool {
        self.errors.is_empty()
    }
}

impl fmt::Display for ValidationErrors {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        if self.errors.len() == 1 {
            let message = self
                .errors
                .values()
                .next()
                .and_then(|v| v.first())
                .map(String::as_str)
                .unwrap_or("Validation failed");
            write!(f, "{}", message)
        } else {
            write!(f, "Validation failed for {} fields", self.errors.len())
        }
    }
}

/// Builder for collecting multiple validation errors
#[derive(Debug, Default)]
pub struct ValidationErrorBuilder {
    errors: BTreeMap<String, Vec<String>>,
}

impl ValidationErrorBuilder {
    pub fn new() -> Self {
        Self::default()
    }

    /// Add a validation error for a field
    pub fn add(&mut self, field: impl Into<String>, message: impl Into<String>) -> &mut Self {
        self.errors
            .entry(field.into())
            .or_default()
            .push(message.into());
        self
    }

    /// Record the error from a `Result<(), String>` check, if any.
    pub fn check(&mut self, field: &str, result: Result<(), String>) -> &mut Self {
        if let Err(message) = result {
            self.add(field, message);
        }
        self
    }

    pub fn is_empty(&self) -> bool {
        self.errors.is_empty()
    }

    fn into_errors(self) -> ValidationErrors {
        ValidationErrors {
            errors: self.errors,
        }
    }

    /// Return Ok(()) if no errors, or the collected errors as an ApiError
    pub fn finish(self) -> Result<(), ApiError> {
        if self.errors.is_empty() {
            Ok(())
        } else {
            Err(ApiError::Validation(self.into_errors()))
        }
    }
}
