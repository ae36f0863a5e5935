use serde::{Serialize, Deserialize};

use super::ValidationError;

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct TorrentFileEntry {
    pub path: String,
    pub size: u64,
}

/// Descriptive data pulled out of a validated torrent file.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct TorrentMetadata {
    pub name: String,
    pub piece_length: i64,
    pub announce_urls: Vec<String>,
    pub files: Vec<TorrentFileEntry>,
    pub file_count: usize,
    pub total_size: u64,
    pub is_single_file: bool,
    #[serde(skip_serializing_if = "Option::is_none", default)]
    pub creation_date: Option<i64>,
    #[serde(skip_serializing_if = "Option::is_none", default)]
    pub comment: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none", default)]
    pub created_by: Option<String>,
    /// Lowercase hex SHA-1 of the canonical `info` encoding.
    pub info_hash: String,
    /// Lowercase hex SHA-256 of the whole file as received.
    pub file_hash: String,
}

impl TorrentMetadata {
    pub fn to_json(&self) -> serde_json::Result<String> {
        serde_json::to_string(self)
    }

    pub fn from_json(json: &str) -> serde_json::Result<TorrentMetadata> {
        serde_json::from_str(json)
    }
}

/// Outcome of validating one torrent file: either metadata or the reason it was refused.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum ValidationResult {
    Valid(TorrentMetadata),
    Invalid(ValidationError),
}

impl ValidationResult {
    pub fn is_valid(&self) -> bool {
        matches!(self, ValidationResult::Valid(_))
    }

    pub fn error(&self) -> Option<String> {
        match self {
            ValidationResult::Valid(_) => None,
            ValidationResult::Invalid(e) => Some(e.to_string()),
        }
    }

    pub fn error_kind(&self) -> Option<&ValidationError> {
        match self {
            ValidationResult::Valid(_) => None,
            ValidationResult::Invalid(e) => Some(e),
        }
    }

    pub fn metadata(&self) -> Option<&TorrentMetadata> {
        match self {
            ValidationResult::Valid(metadata) => Some(metadata),
            ValidationResult::Invalid(_) => None,
        }
    }

    pub fn into_result(self) -> Result<TorrentMetadata, ValidationError> {
        match self {
            ValidationResult::Valid(metadata) => Ok(metadata),
            ValidationResult::Invalid(e) => Err(e),
        }
    }
}

impl From<Result<TorrentMetadata, ValidationError>> for ValidationResult {
    fn from(result: Result<TorrentMetadata, ValidationError>) -> Self {
        match result {
            Ok(metadata) => ValidationResult::Valid(metadata),
            Err(e) => ValidationResult::Invalid(e),
        }
    }
}

#[derive(Serialize)]
struct ValidationReport<'a> {
    is_valid: bool,
    #[serde(skip_serializing_if = "Option::is_none")]
    error: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    metadata: Option<&'a TorrentMetadata>,
}

impl Serialize for ValidationResult {
    fn serialize<S: serde::Serializer>(&self, serializer: S) -> Result<S::Ok, S::Error> {
        ValidationReport {
            is_valid: self.is_valid(),
            error: self.error(),
            metadata: self.metadata(),
        }
        .serialize(serializer)
    }
}
