//! Store errors
//!
//! Only storage and encoding problems surface here. Migration failures are
//! handled by the store's fallback policy and reported through
//! [`HydrationOutcome`](crate::HydrationOutcome).

/// Persistence layer error
#[derive(Debug, thiserror::Error)]
pub enum StoreError {
    /// Backend IO failed
    #[error("storage IO failed for '{key}': {source}")]
    Io {
        /// Store key
        key: String,
        /// Underlying error
        #[source]
        source: std::io::Error,
    },

    /// Store key cannot be used by the backend
    #[error("invalid store key '{0}'")]
    InvalidKey(String),

    /// State could not be encoded
    #[error("serialization failed: {0}")]
    Serialization(#[from] serde_json::Error),
}

impl StoreError {
    /// Create IO error for a key
    #[inline]
    #[must_use]
    pub fn io(key: impl Into<String>, source: std::io::Error) -> Self {
        Self::Io {
            key: key.into(),
            source,
        }
    }
}
