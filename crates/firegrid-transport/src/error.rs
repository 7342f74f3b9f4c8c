use std::net::SocketAddr;
use std::path::PathBuf;

/// Errors that can occur in transport operations.
#[derive(Debug, thiserror::Error)]
pub enum TransportError {
    /// Failed to bind the datagram socket.
    #[error("failed to bind to {addr}: {source}")]
    Bind {
        addr: SocketAddr,
        source: std::io::Error,
    },

    /// Failed to open the serial device.
    #[error("failed to open {path}: {source}")]
    Open {
        path: PathBuf,
        source: std::io::Error,
    },

    /// The serial device rejected line configuration.
    #[error("failed to configure {path}: {source}")]
    Configure {
        path: PathBuf,
        source: std::io::Error,
    },

    /// The requested baud rate has no termios equivalent.
    #[error("unsupported baud rate {0}")]
    UnsupportedBaud(u32),

    /// The sink did not become writable before the write deadline.
    #[error("write timed out after {0:?}")]
    WriteTimeout(std::time::Duration),

    /// An I/O error occurred on the socket or device.
    #[error("transport I/O error: {0}")]
    Io(#[from] std::io::Error),
}

impl TransportError {
    /// True when the error only reflects an expired receive timeout.
    pub fn is_timeout(&self) -> bool {
        match self {
            TransportError::Io(err) => matches!(
                err.kind(),
                std::io::ErrorKind::WouldBlock | std::io::ErrorKind::TimedOut
            ),
            _ => false,
        }
    }
}

impl From<TransportError> for std::io::Error {
    fn from(err: TransportError) -> Self {
        match err {
            TransportError::Io(io) => io,
            TransportError::Open { source, .. }
            | TransportError::Configure { source, .. }
            | TransportError::Bind { source, .. } => source,
            TransportError::WriteTimeout(after) => std::io::Error::new(
                std::io::ErrorKind::TimedOut,
                format!("write timed out after {after:?}"),
            ),
            other => std::io::Error::other(other.to_string()),
        }
    }
}

pub type Result<T> = std::result::Result<T, TransportError>;
