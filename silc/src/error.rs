//! Unified error types for the SILC bridge.

/// Convenience alias used throughout the crate.
pub type Result<T> = std::result::Result<T, Error>;

/// Error returned by a user handler. Reported, never propagated into the toolkit.
pub type HandlerError = Box<dyn std::error::Error + Send + Sync>;

/// Outcome of a single handler invocation. Responders return a value.
pub type HandlerResult<T = ()> = std::result::Result<T, HandlerError>;

/// Top-level error type for the SILC bridge.
#[derive(Debug, thiserror::Error)]
pub enum Error {
    /// The toolkit refused to allocate or initialise a client.
    #[error("client initialisation failed: {0}")]
    Init(String),

    /// An operation that needs a live connection was called without one.
    #[error("client not connected")]
    NotConnected,

    /// A wrapper whose native entry has been released was used.
    #[error("{0} entry is no longer valid")]
    StaleEntity(&'static str),

    /// An error reported by the underlying toolkit.
    #[error("silc toolkit: {0}")]
    Toolkit(String),

    /// Key pair creation or loading failed.
    #[error("keys: {0}")]
    Keys(String),

    /// Attempt to assign one of the projected, read-only attributes.
    #[error("attribute `{0}` is read-only")]
    ReadOnlyAttribute(String),

    /// An argument passed to the bridge was invalid.
    #[error("{0}")]
    InvalidArgument(String),

    /// Filesystem error while handling key material.
    #[error(transparent)]
    Io(#[from] std::io::Error),
}
