//! Domain-level error taxonomy for SDBench.

/// Errors produced while validating a single case record.
#[derive(Debug, Clone, PartialEq, thiserror::Error)]
pub enum CaseRecordError {
    #[error("missing required field: {field}")]
    MissingField { field: String },

    #[error("field {field} must be {expected}")]
    WrongType { field: String, expected: String },

    #[error("field {field} must not be blank")]
    BlankField { field: String },

    #[error("duplicate case_id: {0}")]
    DuplicateCaseId(String),

    #[error("record is not valid JSON: {0}")]
    Malformed(String),
}

/// SDBench library errors.
///
/// Per-case problems during a run never surface here; they are folded into
/// the encounter outcome. Only ingestion and configuration fail loudly.
#[derive(Debug, thiserror::Error)]
pub enum SdbenchError {
    #[error("invalid case file at line {line}: {reason}")]
    InvalidCaseFile { line: usize, reason: CaseRecordError },

    #[error("invalid config: {0}")]
    InvalidConfig(String),

    #[error("config parse error: {0}")]
    ConfigParse(#[from] toml::de::Error),

    #[error("serialization error: {0}")]
    Serialization(#[from] serde_json::Error),

    #[error("io error: {0}")]
    Io(#[from] std::io::Error),
}

/// Result type for SDBench operations.
pub type Result<T> = std::result::Result<T, SdbenchError>;
