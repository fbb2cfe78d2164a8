//! JSON envelope handed to the HTTP layer.
use super::error::DomainError;
use serde::Serialize;

#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct ApiResponse<T> {
    pub success: bool,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub data: Option<T>,
    /// Machine-readable error kind, e.g. `NOT_FOUND`.
    #[serde(skip_serializing_if = "Option::is_none")]
    pub error: Option<&'static str>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub message: Option<String>,
}

impl<T> ApiResponse<T> {
    pub fn ok(data: T) -> Self {
        Self {
            success: true,
            data: Some(data),
            error: None,
            message: None,
        }
    }

    pub fn failure(err: &DomainError) -> Self {
        Self {
            success: false,
            data: None,
            error: Some(err.kind().as_str()),
            message: Some(err.to_string()),
        }
    }

    /// Envelope plus the HTTP status it should travel with.
    pub fn from_result(result: Result<T, DomainError>) -> (u16, Self) {
        match result {
            Ok(data) => (200, Self::ok(data)),
            Err(err) => (err.kind().status_code(), Self::failure(&err)),
        }
    }
}
