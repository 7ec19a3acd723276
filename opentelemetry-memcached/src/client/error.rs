use std::time::Duration;

use thiserror::Error;

/// Errors surfaced by a cache client implementation.
///
/// The tracing layer never constructs these itself; it records and forwards
/// whatever the decorated client returns.
#[derive(Clone, Debug, Error, PartialEq, Eq)]
#[non_exhaustive]
pub enum MemcacheError {
    /// The operation did not complete within the client's operation timeout.
    #[error("operation timed out after {0:?}")]
    Timeout(Duration),

    /// The operation was cancelled before it completed.
    #[error("operation cancelled")]
    Cancelled,

    /// The client has been shut down and no longer accepts operations.
    #[error("client is shut down")]
    ShutDown,

    /// The server answered the request with an error response.
    #[error("server error: {0}")]
    Server(String),

    /// The connection to the server failed or was lost mid-operation.
    #[error("connection failure: {0}")]
    Connection(String),

    /// A value could not be encoded or decoded by the transcoder in use.
    #[error("transcoding failed: {0}")]
    Transcoding(String),
}
