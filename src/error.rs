//! Typed error taxonomy.
//!
//! Entities and criteria fail with [`ValidationError`] or [`IllegalStateError`],
//! repositories with [`RepositoryError`]. Use cases fold everything into
//! [`DomainError`], whose [`ErrorKind`] is the only thing the HTTP layer looks at.

#[derive(thiserror::Error, Debug, Clone, PartialEq, Eq)]
pub enum ValidationError {
    #[error("{field} is required")]
    Required { field: &'static str },
    #[error("{field} must be at least {min} characters long, got {actual}")]
    TooShort {
        field: &'static str,
        min: usize,
        actual: usize,
    },
    #[error("{field} must be strictly in the future")]
    NotInFuture { field: &'static str },
    #[error("{field} is outside the supported date range")]
    OutOfRange { field: &'static str },
    #[error("{actual} cannot precede {planned}")]
    PrecedesPlanned {
        actual: &'static str,
        planned: &'static str,
    },
    #[error("invalid value `{value}` for {field}")]
    InvalidValue { field: &'static str, value: String },
    #[error("unsupported filter field `{0}`")]
    UnsupportedFilterField(String),
    #[error("unsupported sort field `{0}`")]
    UnsupportedSortField(String),
    #[error("invalid identifier: {0}")]
    InvalidIdentifier(String),
}

/// A transition was requested from a status that does not allow it.
#[derive(thiserror::Error, Debug, Clone, PartialEq, Eq)]
#[error("cannot {operation} while {actual}, requires {}", .required.join(" or "))]
pub struct IllegalStateError {
    pub operation: &'static str,
    pub required: Vec<&'static str>,
    pub actual: &'static str,
}

/// Failure of a status-gated method that also re-validates fields.
#[derive(thiserror::Error, Debug, Clone, PartialEq, Eq)]
pub enum TransitionError {
    #[error(transparent)]
    IllegalState(#[from] IllegalStateError),
    #[error(transparent)]
    Validation(#[from] ValidationError),
}

#[derive(thiserror::Error, Debug)]
pub enum RepositoryError {
    #[error("{entity} not found: {id}")]
    NotFound { entity: &'static str, id: String },
    #[error("{entity} with {field} `{value}` already exists")]
    Duplicate {
        entity: &'static str,
        field: &'static str,
        value: String,
    },
    #[error(transparent)]
    Criteria(#[from] ValidationError),
    #[error("store failure: {0}")]
    Store(#[from] sled::Error),
    #[error("failed to encode record {key}: {reason}")]
    Encode { key: String, reason: String },
    #[error("failed to decode record {key}: {reason}")]
    Decode { key: String, reason: String },
}

#[derive(thiserror::Error, Debug)]
pub enum DomainError {
    #[error(transparent)]
    Validation(#[from] ValidationError),
    #[error(transparent)]
    IllegalState(#[from] IllegalStateError),
    #[error("{entity} not found: {id}")]
    NotFound { entity: &'static str, id: String },
    #[error("{0}")]
    Conflict(String),
    #[error("persistence failure: {0}")]
    Persistence(#[source] RepositoryError),
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum ErrorKind {
    Validation,
    IllegalState,
    NotFound,
    Conflict,
    Persistence,
}

impl ErrorKind {
    pub fn status_code(self) -> u16 {
        match self {
            ErrorKind::Validation | ErrorKind::IllegalState => 400,
            ErrorKind::NotFound => 404,
            ErrorKind::Conflict => 409,
            ErrorKind::Persistence => 500,
        }
    }

    pub fn as_str(self) -> &'static str {
        match self {
            ErrorKind::Validation => "VALIDATION_ERROR",
            ErrorKind::IllegalState => "ILLEGAL_STATE",
            ErrorKind::NotFound => "NOT_FOUND",
            ErrorKind::Conflict => "CONFLICT",
            ErrorKind::Persistence => "PERSISTENCE_ERROR",
        }
    }
}

impl DomainError {
    pub fn kind(&self) -> ErrorKind {
        match self {
            DomainError::Validation(_) => ErrorKind::Validation,
            DomainError::IllegalState(_) => ErrorKind::IllegalState,
            DomainError::NotFound { .. } => ErrorKind::NotFound,
            DomainError::Conflict(_) => ErrorKind::Conflict,
            DomainError::Persistence(_) => ErrorKind::Persistence,
        }
    }
}

impl From<TransitionError> for DomainError {
    fn from(value: TransitionError) -> Self {
        match value {
            TransitionError::IllegalState(e) => DomainError::IllegalState(e),
            TransitionError::Validation(e) => DomainError::Validation(e),
        }
    }
}

impl From<RepositoryError> for DomainError {
    fn from(value: RepositoryError) -> Self {
        match value {
            RepositoryError::NotFound { entity, id } => DomainError::NotFound { entity, id },
            RepositoryError::Duplicate { .. } => DomainError::Conflict(value.to_string()),
            RepositoryError::Criteria(e) => DomainError::Validation(e),
            other => DomainError::Persistence(other),
        }
    }
}
