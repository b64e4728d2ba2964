/// Error types for Tab Retitler
use thiserror::Error;

/// Validation failures for a rule entered by the user
#[derive(Error, Debug, Clone, PartialEq, Eq)]
pub enum RuleError {
    #[error("Target text is required.")]
    EmptyTarget,

    #[error("A domain is required to match an exact URL.")]
    PathWithoutDomain,

    #[error("Not a valid URL: {0}")]
    InvalidExactUrl(String),
}

/// Failures that abort a whole import
#[derive(Error, Debug)]
pub enum ImportError {
    #[error("Import file is not valid JSON: {0}")]
    Parse(#[from] serde_json::Error),

    #[error("Import file does not contain a rules array.")]
    MissingRules,

    #[error("Import file contains no valid rules.")]
    NoValidRules,
}

/// Any failure surfaced by a rule-management flow
#[derive(Error, Debug)]
pub enum Error {
    #[error(transparent)]
    Rule(#[from] RuleError),

    #[error(transparent)]
    Import(#[from] ImportError),

    #[error(transparent)]
    Host(#[from] HostError),
}

/// Result type alias for rule-management flows
pub type Result<T> = std::result::Result<T, Error>;

/// A collaborator (storage, tabs, title writer) reported a failure
#[derive(Error, Debug, Clone, PartialEq, Eq)]
#[error("{operation} failed: {message}")]
pub struct HostError {
    pub operation: &'static str,
    pub message: String,
}

impl HostError {
    pub fn new(operation: &'static str, message: impl Into<String>) -> Self {
        HostError {
            operation,
            message: message.into(),
        }
    }
}
