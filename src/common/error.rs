//! Error handling primitives shared across the core.
//!
//! Every variant maps to a stable [`RealtyCode`] so that callers on the other
//! side of the FFI boundary can branch on a number instead of a message.

use thiserror::Error;

/// Stable error codes that cross the FFI boundary.
#[repr(u32)]
#[derive(Copy, Clone, Debug, Eq, PartialEq)]
pub enum RealtyCode {
    /// Success code used as a sentinel.
    Ok = 0,
    /// A record field is missing or carries a value of the wrong kind.
    SchemaViolation = 1,
    /// A categorical value was not observed when the schema was derived.
    UnseenCategory = 2,
    /// Too few rows to train.
    InsufficientData = 3,
    /// Feature vector does not match the artifact's schema.
    IncompatibleArtifact = 4,
    /// Requested artifact does not exist.
    NotFound = 5,
    /// Nothing has ever been registered.
    EmptyRegistry = 6,
    /// Artifact id already taken.
    DuplicateArtifact = 7,
    /// Configuration failed validation.
    InvalidConfig = 8,
    /// Filesystem or (de)serialization failure.
    Io = 9,
    /// Catch-all for bugs.
    Internal = 10,
}

impl RealtyCode {
    pub fn as_str(&self) -> &'static str {
        match self {
            RealtyCode::Ok => "ok",
            RealtyCode::SchemaViolation => "schema_violation",
            RealtyCode::UnseenCategory => "unseen_category",
            RealtyCode::InsufficientData => "insufficient_data",
            RealtyCode::IncompatibleArtifact => "incompatible_artifact",
            RealtyCode::NotFound => "not_found",
            RealtyCode::EmptyRegistry => "empty_registry",
            RealtyCode::DuplicateArtifact => "duplicate_artifact",
            RealtyCode::InvalidConfig => "invalid_config",
            RealtyCode::Io => "io",
            RealtyCode::Internal => "internal",
        }
    }
}

/// Canonical error type for the core.
#[derive(Debug, Error)]
pub enum RealtyError {
    #[error("schema violation on field `{field}`: {reason}")]
    SchemaViolation { field: String, reason: String },

    #[error("unseen category `{value}` for field `{field}`")]
    UnseenCategory { field: String, value: String },

    #[error("insufficient data: need at least {required} rows, got {actual}")]
    InsufficientData { required: usize, actual: usize },

    #[error("incompatible artifact: {reason}")]
    IncompatibleArtifact { reason: String },

    #[error("artifact `{0}` not found")]
    NotFound(String),

    #[error("artifact registry is empty")]
    EmptyRegistry,

    #[error("artifact `{0}` already exists")]
    DuplicateArtifact(String),

    #[error("invalid configuration `{name}`: {reason}")]
    InvalidConfig { name: &'static str, reason: String },

    #[error("io error: {0}")]
    Io(#[from] std::io::Error),

    #[error("serialization error: {0}")]
    Serde(#[from] serde_json::Error),

    #[error("csv error: {0}")]
    Csv(#[from] csv::Error),

    #[error("internal error: {0}")]
    Internal(String),
}

/// Result alias used throughout the crate.
pub type RealtyResult<T> = Result<T, RealtyError>;

impl RealtyError {
    /// Validation helper for record fields.
    pub fn schema(field: impl Into<String>, reason: impl Into<String>) -> Self {
        Self::SchemaViolation {
            field: field.into(),
            reason: reason.into(),
        }
    }

    /// Configuration helper.
    pub fn config(name: &'static str, reason: impl Into<String>) -> Self {
        Self::InvalidConfig {
            name,
            reason: reason.into(),
        }
    }

    pub fn incompatible(reason: impl Into<String>) -> Self {
        Self::IncompatibleArtifact {
            reason: reason.into(),
        }
    }

    pub fn internal(msg: impl Into<String>) -> Self {
        Self::Internal(msg.into())
    }

    /// Machine parsable code for this error.
    pub fn code(&self) -> RealtyCode {
        match self {
            RealtyError::SchemaViolation { .. } => RealtyCode::SchemaViolation,
            RealtyError::UnseenCategory { .. } => RealtyCode::UnseenCategory,
            RealtyError::InsufficientData { .. } => RealtyCode::InsufficientData,
            RealtyError::IncompatibleArtifact { .. } => RealtyCode::IncompatibleArtifact,
            RealtyError::NotFound(_) => RealtyCode::NotFound,
            RealtyError::EmptyRegistry => RealtyCode::EmptyRegistry,
            RealtyError::DuplicateArtifact(_) => RealtyCode::DuplicateArtifact,
            RealtyError::InvalidConfig { .. } => RealtyCode::InvalidConfig,
            RealtyError::Io(_) | RealtyError::Serde(_) | RealtyError::Csv(_) => RealtyCode::Io,
            RealtyError::Internal(_) => RealtyCode::Internal,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn codes_are_stable() {
        assert_eq!(RealtyCode::Ok as u32, 0);
        assert_eq!(RealtyCode::SchemaViolation as u32, 1);
        assert_eq!(RealtyCode::UnseenCategory as u32, 2);
        assert_eq!(RealtyCode::InsufficientData as u32, 3);
        assert_eq!(RealtyCode::IncompatibleArtifact as u32, 4);
        assert_eq!(RealtyCode::NotFound as u32, 5);
        assert_eq!(RealtyCode::EmptyRegistry as u32, 6);
        assert_eq!(RealtyCode::DuplicateArtifact as u32, 7);
        assert_eq!(RealtyCode::InvalidConfig as u32, 8);
        assert_eq!(RealtyCode::Io as u32, 9);
        assert_eq!(RealtyCode::Internal as u32, 10);
    }

    #[test]
    fn errors_map_to_codes() {
        let err = RealtyError::schema("area", "missing");
        assert_eq!(err.code(), RealtyCode::SchemaViolation);
        assert_eq!(err.to_string(), "schema violation on field `area`: missing");

        let err = RealtyError::InsufficientData {
            required: 50,
            actual: 10,
        };
        assert_eq!(err.code(), RealtyCode::InsufficientData);
        assert_eq!(err.code().as_str(), "insufficient_data");

        let io = std::io::Error::new(std::io::ErrorKind::Other, "disk");
        assert_eq!(RealtyError::from(io).code(), RealtyCode::Io);
    }
}
