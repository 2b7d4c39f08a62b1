use nestegg_shared::error::StoreError;
use thiserror::Error;

#[derive(Error, Debug)]
pub enum NotificationError {
    #[error("Unknown invitation decision: {0}")]
    UnknownDecision(String),

    #[error("Failed to look up push tokens: {0}")]
    TokenLookupFailed(#[from] StoreError),

    #[error("Failed to send push notification: {0}")]
    SendFailed(String),
}
