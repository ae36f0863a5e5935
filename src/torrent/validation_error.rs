use crate::utils::bencode::{BencodeError, TypeMismatch};

/// Why a torrent file was refused. The `Display` text is what users get to see.
#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
pub enum ValidationError {
    #[error("Invalid bencode format: {0}")]
    MalformedEncoding(#[from] BencodeError),

    #[error("Missing '{field}' {kind}")]
    MissingRequiredField { field: &'static str, kind: &'static str },

    #[error("Validation error: '{field}' {source}")]
    TypeMismatch { field: String, source: TypeMismatch },

    #[error("Validation error: {0}")]
    InvalidValue(String),
}

impl ValidationError {
    pub fn missing_info() -> Self {
        ValidationError::MissingRequiredField { field: "info", kind: "section" }
    }

    pub fn missing_announce() -> Self {
        ValidationError::MissingRequiredField { field: "announce", kind: "field" }
    }

    pub fn type_mismatch(field: impl Into<String>, source: TypeMismatch) -> Self {
        ValidationError::TypeMismatch { field: field.into(), source }
    }
}

/// Attaches the field path to accessor failures.
pub trait FieldContext<T> {
    fn field(self, field: &str) -> Result<T, ValidationError>;
}

impl<T> FieldContext<T> for Result<T, TypeMismatch> {
    fn field(self, field: &str) -> Result<T, ValidationError> {
        self.map_err(|source| ValidationError::type_mismatch(field, source))
    }
}
