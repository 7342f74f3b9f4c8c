use std::fmt::Write as _;

use bytes::{Bytes, BytesMut};
use firegrid_board::{encode_board, Board, BoardSource, Decoded, PAYLOAD_LEN};
use firegrid_frame::{encode_frame, ChecksumMode};
use serde::Serialize;

/// Everything produced for one board message, ready to log or send.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct Dispatch {
    pub board: Board,
    pub source: BoardSource,
    /// Packed lane bits before framing.
    #[serde(serialize_with = "serialize_hex")]
    pub payload: [u8; PAYLOAD_LEN],
    /// The bytes put on the wire.
    #[serde(serialize_with = "serialize_hex")]
    pub framed: Bytes,
}

impl Dispatch {
    /// Map, pack and frame a decoded board.
    pub fn build(decoded: Decoded, mode: ChecksumMode) -> Self {
        let payload = encode_board(&decoded.board);
        let mut framed = BytesMut::new();
        encode_frame(&payload, mode, &mut framed);
        Self {
            board: decoded.board,
            source: decoded.source,
            payload,
            framed: framed.freeze(),
        }
    }

    pub fn payload_hex(&self) -> String {
        to_hex(&self.payload)
    }

    pub fn framed_hex(&self) -> String {
        to_hex(&self.framed)
    }
}

/// Lowercase hex without separators, e.g. `7f00...7e`.
pub fn to_hex(bytes: &[u8]) -> String {
    let mut out = String::with_capacity(bytes.len() * 2);
    for b in bytes {
        let _ = write!(out, "{b:02x}");
    }
    out
}

fn serialize_hex<T, S>(bytes: &T, serializer: S) -> Result<S::Ok, S::Error>
where
    T: AsRef<[u8]>,
    S: serde::Serializer,
{
    serializer.serialize_str(&to_hex(bytes.as_ref()))
}
