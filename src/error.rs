//! Error types for the Second gateway

use thiserror::Error;

/// Result type alias for gateway operations
pub type Result<T> = std::result::Result<T, Error>;

/// Errors that can occur in the Second gateway
#[derive(Debug, Error)]
pub enum Error {
    /// Configuration error
    #[error("configuration error: {0}")]
    Config(String),

    /// One retrieval source could not be queried
    #[error("{name} unavailable: {reason}")]
    SourceUnavailable {
        /// Name of the failing source
        name: &'static str,
        /// Transport or decoding failure description
        reason: String,
    },

    /// Every retrieval source failed for the same query
    #[error("all retrieval sources unavailable")]
    AllSourcesUnavailable,

    /// The model server did not answer in time
    #[error("model timed out; it may be loading or busy")]
    ModelTimeout,

    /// The model server could not be reached
    #[error("cannot reach the language model; is the model server running?")]
    ModelUnreachable,

    /// The model server answered with an error
    #[error("model error: {0}")]
    Model(String),

    /// Writing to long-term memory failed
    #[error("persistence error: {0}")]
    Persistence(String),

    /// A note to remember was empty
    #[error("nothing to remember")]
    EmptyNote,

    /// IO error
    #[error("io error: {0}")]
    Io(#[from] std::io::Error),

    /// TOML parsing error
    #[error("toml error: {0}")]
    Toml(#[from] toml::de::Error),
}

impl Error {
    /// Whether this failure is reported back to the person chatting
    ///
    /// Only model invocation failures surface; retrieval and persistence
    /// failures are absorbed below the assistant.
    #[must_use]
    pub const fn is_user_visible(&self) -> bool {
        matches!(self, Self::ModelTimeout | Self::ModelUnreachable | Self::Model(_))
    }
}
