use std::path::PathBuf;

/// Core error type for startup and plumbing failures.
///
/// Per-message failures never use this type; they are carried by the typed
/// `ProvisionError` / `DeliveryError` values so the router can apply its fallbacks.
#[derive(Debug, thiserror::Error)]
pub enum Error {
    #[error("config error: {0}")]
    Config(String),

    #[error("i/o error: {0}")]
    Io(#[from] std::io::Error),

    #[error("json error: {0}")]
    Json(#[from] serde_json::Error),

    #[error("invalid data in {}: {reason}", path.display())]
    InvalidData { path: PathBuf, reason: String },

    #[error("external error: {0}")]
    External(String),
}

pub type Result<T> = std::result::Result<T, Error>;

/// Failure to create or look up a destination container.
#[derive(Clone, Debug, PartialEq, Eq, thiserror::Error)]
pub enum ProvisionError {
    #[error("permission denied: {0}")]
    PermissionDenied(String),

    #[error("containers not supported: {0}")]
    NotSupported(String),

    #[error("provisioning failed: {0}")]
    Other(String),
}

/// Failure to deliver a payload (or to fetch the media it carries).
#[derive(Clone, Debug, PartialEq, Eq, thiserror::Error)]
pub enum DeliveryError {
    #[error("payload too large: {0}")]
    TooLarge(String),

    #[error("permission denied: {0}")]
    PermissionDenied(String),

    #[error("delivery failed: {0}")]
    Other(String),
}

impl DeliveryError {
    /// `TooLarge` is answered with a placeholder, never with a retry.
    pub fn is_retryable_elsewhere(&self) -> bool {
        !matches!(self, DeliveryError::TooLarge(_))
    }
}

/// The mapping file could not be written.
#[derive(Debug, thiserror::Error)]
pub enum PersistenceError {
    #[error("failed to write {}: {source}", path.display())]
    Io {
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },

    #[error("failed to encode mapping: {0}")]
    Encode(#[from] serde_json::Error),
}
