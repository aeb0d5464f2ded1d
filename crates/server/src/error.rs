use std::net::SocketAddr;

/// Result alias for the worker's HTTP surface.
pub type Result<T> = std::result::Result<T, ServerError>;

#[derive(thiserror::Error, Debug)]
pub enum ServerError {
    /// The listening socket could not be opened.
    #[error("failed to bind {addr}: {source}")]
    Bind {
        addr: SocketAddr,
        #[source]
        source: std::io::Error,
    },
    /// The server loop failed while running.
    #[error("server error: {0}")]
    Serve(#[source] std::io::Error),
    /// An environment variable held a malformed value.
    #[error("invalid value for {var}: {reason}")]
    Config { var: &'static str, reason: String },
}
