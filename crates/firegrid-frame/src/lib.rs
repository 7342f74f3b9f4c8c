//! Serial framing for the solenoid panel bus.
//!
//! Every payload travels as:
//! - a `START` delimiter (`0x7F`)
//! - the payload, with any reserved byte replaced by `ESCAPE, byte ^ ESCAPE`
//! - an XOR checksum over the unescaped payload
//! - a `STOP` delimiter (`0x7E`)
//!
//! The bus is fire-and-forget: there are no acknowledgements, and a receiver
//! resynchronises on the next `START` after any damaged frame.

pub mod codec;
pub mod error;
pub mod reader;
pub mod writer;

pub use codec::{
    checksum, decode_frame, encode_frame, is_reserved, ChecksumMode, Frame, FrameConfig,
    DEFAULT_MAX_PAYLOAD, ESCAPE, FRAME_OVERHEAD, START, STOP,
};
pub use error::{FrameError, Result};
pub use reader::FrameReader;
pub use writer::FrameWriter;
