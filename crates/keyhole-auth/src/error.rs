//! Error types for the auth crate.
//!
//! Only the handshake pipeline can fail in a way worth reporting; token
//! store lookups are plain booleans. Protocol failures that must not leak
//! detail (wrong passphrase, unknown token) are never errors at all.

/// Unified error type for the Keyhole handshake.
#[derive(Debug, thiserror::Error)]
pub enum HandshakeError {
    /// The consumer's `/about` profile could not be fetched or had no name.
    #[error("consumer unavailable: {consumer}")]
    ConsumerUnavailable {
        /// The consumer identifier as supplied by the caller.
        consumer: String,
    },

    /// The consumer identifier is not a valid `host[:port]`.
    #[error("invalid consumer id {input:?}: {reason}")]
    InvalidConsumerId {
        /// The rejected input.
        input: String,
        /// What is wrong with it.
        reason: String,
    },

    /// The system CSPRNG failed while minting a token.
    #[error("random generation failed")]
    Random,

    /// Building the consumer redirect URL failed.
    #[error("url parse error: {0}")]
    UrlParse(#[from] url::ParseError),

    /// A blocking credential check task panicked or was cancelled.
    #[error("credential task failed: {0}")]
    TaskJoin(#[from] tokio::task::JoinError),
}

/// Convenience alias used throughout this crate.
pub type Result<T> = std::result::Result<T, HandshakeError>;
