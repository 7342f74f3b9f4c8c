use firegrid_board::DecodeError;
use firegrid_frame::FrameError;
use firegrid_transport::TransportError;

/// Errors that can occur while bridging a message.
#[derive(Debug, thiserror::Error)]
pub enum BridgeError {
    /// The board message was malformed; nothing was sent.
    #[error("invalid board: {0}")]
    Decode(#[from] DecodeError),

    /// Writing the frame to the serial sink failed.
    #[error("serial error: {0}")]
    Frame(#[from] FrameError),

    /// Receiving from the datagram source failed.
    #[error("transport error: {0}")]
    Transport(#[from] TransportError),
}

impl BridgeError {
    /// True when only the current message is affected.
    pub fn is_validation(&self) -> bool {
        matches!(self, BridgeError::Decode(_))
    }
}

pub type Result<T> = std::result::Result<T, BridgeError>;
