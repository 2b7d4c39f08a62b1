use thiserror::Error;

/// Failures reported by every record store implementation.
///
/// Callers match on the variant instead of inspecting backend error strings.
#[derive(Error, Debug, Clone, PartialEq)]
pub enum StoreError {
    #[error("Item not found: {0}")]
    NotFound(String),

    #[error("Access denied: {0}")]
    AccessDenied(String),

    #[error("Conditional write rejected: {0}")]
    ConditionFailed(String),

    #[error("Serialization error: {0}")]
    Serialization(String),

    #[error("Store error: {0}")]
    Other(String),
}

impl StoreError {
    pub fn is_access_denied(&self) -> bool {
        matches!(self, StoreError::AccessDenied(_))
    }
}

impl From<serde_dynamo::Error> for StoreError {
    fn from(e: serde_dynamo::Error) -> Self {
        StoreError::Serialization(e.to_string())
    }
}
