use std::fmt;

/// Header fields of the board wire format.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Field {
    Version,
    Width,
    Height,
    Board,
}

impl fmt::Display for Field {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let name = match self {
            Field::Version => "version",
            Field::Width => "width",
            Field::Height => "height",
            Field::Board => "board",
        };
        f.write_str(name)
    }
}

/// Reasons a board message is rejected.
#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
pub enum DecodeError {
    /// The message ended before this field.
    #[error("missing {0} field")]
    MissingField(Field),

    /// A header field is not an integer.
    #[error("invalid {field} field {value:?}")]
    InvalidNumber { field: Field, value: String },

    /// Unknown or disabled protocol version.
    #[error("unsupported version {0}")]
    UnsupportedVersion(i64),

    /// Column count other than 10.
    #[error("unsupported width {0}")]
    UnsupportedWidth(i64),

    /// Row count other than 20.
    #[error("unsupported height {0}")]
    UnsupportedHeight(i64),

    /// Fewer board lines than the header promises.
    #[error("not enough lines: received {received}, expected {expected}")]
    NotEnoughLines { received: usize, expected: usize },

    /// A board line has the wrong number of cells.
    #[error("line {line} length wrong: received {received}, expected {expected}")]
    LineLength {
        line: usize,
        received: usize,
        expected: usize,
    },
}

/// Bit packing failures.
#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
pub enum PackError {
    /// The bit count is not a whole number of bytes.
    #[error("bit count {len} is not a multiple of 8")]
    Unaligned { len: usize },
}

pub type Result<T> = std::result::Result<T, DecodeError>;
