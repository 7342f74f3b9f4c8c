/// Errors that can occur during frame encoding/decoding.
#[derive(Debug, thiserror::Error)]
pub enum FrameError {
    /// The payload exceeds the configured maximum size.
    #[error("payload too large ({size} bytes, max {max})")]
    PayloadTooLarge { size: usize, max: usize },

    /// A `START` was immediately followed by `STOP`.
    #[error("empty frame (no checksum byte)")]
    EmptyFrame,

    /// An `ESCAPE` byte was the last byte before `STOP`.
    #[error("escape byte at end of frame")]
    DanglingEscape,

    /// The trailing checksum does not match the payload.
    #[error("checksum mismatch (computed 0x{computed:02x}, received 0x{received:02x})")]
    ChecksumMismatch { computed: u8, received: u8 },

    /// The sink stopped accepting bytes part-way through a frame.
    #[error("partial write ({written} of {expected} bytes)")]
    PartialWrite { written: usize, expected: usize },

    /// An I/O error occurred while reading or writing frames.
    #[error("frame I/O error: {0}")]
    Io(#[from] std::io::Error),

    /// The byte stream ended.
    #[error("end of stream")]
    EndOfStream,
}

impl FrameError {
    /// True for failures of the underlying byte stream rather than of frame
    /// contents.
    pub fn is_transport(&self) -> bool {
        matches!(
            self,
            FrameError::Io(_) | FrameError::PartialWrite { .. } | FrameError::EndOfStream
        )
    }
}

pub type Result<T> = std::result::Result<T, FrameError>;
