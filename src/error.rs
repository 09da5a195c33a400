//! Error types for the quictun protocol.

use thiserror::Error;

/// Result type alias for quictun operations.
pub type Result<T> = std::result::Result<T, Error>;

/// Errors that can occur during quictun operations.
#[derive(Error, Debug)]
pub enum Error {
    /// Invalid configuration (tunnel URL, missing user agent, flags)
    #[error("configuration error: {0}")]
    Config(String),

    /// The server answered the upgrade request with something unexpected
    #[error("server returned an invalid response")]
    InvalidResponse,

    /// The server answered 101 but offered a different upgrade protocol
    #[error("server does not seem to be a quictun server")]
    NotAQuictunServer,

    /// The server rejected the authentication credentials
    #[error("authentication credentials seem to be wrong")]
    WrongCredentials,

    /// The server rejected the sequence number as stale
    #[error("client sequence number invalid")]
    InvalidSequence,

    /// QUIC dial could not be started
    #[error("connect error: {0}")]
    Connect(#[from] quinn::ConnectError),

    /// QUIC session failed or was closed
    #[error("connection error: {0}")]
    Connection(#[from] quinn::ConnectionError),

    /// QUIC stream write failed
    #[error("stream write error: {0}")]
    Write(#[from] quinn::WriteError),

    /// TLS configuration or handshake error
    #[error("TLS error: {0}")]
    Tls(String),

    /// Malformed SOCKS5 or HTTP/2 data on a stream
    #[error("protocol error: {0}")]
    Protocol(String),

    /// Connection timeout
    #[error("connection timeout after {0}ms")]
    Timeout(u64),

    /// Network I/O error
    #[error("network error: {0}")]
    Network(#[from] std::io::Error),
}

impl Error {
    /// Create a new configuration error
    pub fn config(msg: impl Into<String>) -> Self {
        Error::Config(msg.into())
    }

    /// Create a new protocol error
    pub fn protocol(msg: impl Into<String>) -> Self {
        Error::Protocol(msg.into())
    }

    /// Create a new TLS error
    pub fn tls(msg: impl Into<String>) -> Self {
        Error::Tls(msg.into())
    }

    /// Check if this error terminated an upgrade handshake
    pub fn is_upgrade_error(&self) -> bool {
        matches!(
            self,
            Error::InvalidResponse
                | Error::NotAQuictunServer
                | Error::WrongCredentials
                | Error::InvalidSequence
        )
    }

    /// Check if this error is contained to a single stream
    pub fn is_stream_error(&self) -> bool {
        matches!(self, Error::Protocol(_) | Error::Network(_))
    }
}
