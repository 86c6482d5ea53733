//! Error types for interface enumeration and port scanning

/// Result type alias for scanning operations
pub type Result<T> = std::result::Result<T, ScanError>;

/// Errors raised while enumerating interfaces or scanning ports.
///
/// Ordinary connection failures (refused, unreachable, timed out) are not
/// errors: they only mean the port is closed.
#[derive(Debug, thiserror::Error)]
pub enum ScanError {
    /// The OS interface table could not be read
    #[error("unable to list network interfaces: {0}")]
    Interfaces(#[source] std::io::Error),

    /// The local host ran out of sockets or file descriptors
    #[error("resource exhausted while connecting to {address}: {source}")]
    ResourceExhausted {
        address: String,
        #[source]
        source: std::io::Error,
    },

    /// A scan task panicked or was aborted
    #[error("scan task failed: {0}")]
    Task(#[from] tokio::task::JoinError),
}
