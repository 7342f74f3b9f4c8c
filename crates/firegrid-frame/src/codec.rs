use bytes::{Buf, BufMut, Bytes, BytesMut};
use tracing::trace;

use crate::error::{FrameError, Result};

/// Frame start delimiter.
pub const START: u8 = 0x7F;

/// Frame stop delimiter.
pub const STOP: u8 = 0x7E;

/// Escape marker; the following byte is XORed with this value.
pub const ESCAPE: u8 = 0x20;

/// Bytes added around the payload: start + checksum + stop.
pub const FRAME_OVERHEAD: usize = 3;

/// Default maximum unescaped payload size accepted by the decoder.
pub const DEFAULT_MAX_PAYLOAD: usize = 256;

/// How the trailing checksum byte is written.
///
/// Deployed panel firmware expects the checksum byte unescaped. That byte can
/// collide with a delimiter: a raw checksum of `STOP` ends the frame one byte
/// early, and a raw `ESCAPE` swallows the real `STOP`. Both surface on the
/// receiving side as a rejected frame. `Escaped` stuffs the checksum like any
/// payload byte and removes the ambiguity, at the cost of compatibility with
/// receivers that do not expand it.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum ChecksumMode {
    /// Checksum written verbatim (panel firmware compatible).
    #[default]
    Raw,
    /// Checksum byte-stuffed like the payload.
    Escaped,
}

/// A decoded frame.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Frame {
    /// The unescaped payload.
    pub payload: Bytes,
    /// XOR of all payload bytes.
    pub checksum: u8,
}

impl Frame {
    /// Create a frame, computing its checksum.
    pub fn new(payload: impl Into<Bytes>) -> Self {
        let payload = payload.into();
        let checksum = checksum(&payload);
        Self { payload, checksum }
    }

    /// The number of bytes this frame occupies on the wire.
    pub fn wire_size(&self, mode: ChecksumMode) -> usize {
        let stuffed = self.payload.iter().filter(|&&b| is_reserved(b)).count();
        let checksum_extra = match mode {
            ChecksumMode::Escaped if is_reserved(self.checksum) => 1,
            _ => 0,
        };
        FRAME_OVERHEAD + self.payload.len() + stuffed + checksum_extra
    }
}

/// Whether `byte` must be escaped inside a frame.
pub fn is_reserved(byte: u8) -> bool {
    matches!(byte, START | STOP | ESCAPE)
}

/// XOR of every byte in `payload`.
pub fn checksum(payload: &[u8]) -> u8 {
    payload.iter().fold(0u8, |acc, &b| acc ^ b)
}

fn put_stuffed(dst: &mut BytesMut, byte: u8) {
    if is_reserved(byte) {
        dst.put_u8(ESCAPE);
        dst.put_u8(byte ^ ESCAPE);
    } else {
        dst.put_u8(byte);
    }
}

/// Encode a payload into the wire format, appending to `dst`.
///
/// Wire format:
/// ```text
/// ┌───────┬──────────────────────────┬──────────┬──────┐
/// │ START │ payload (byte-stuffed)   │ checksum │ STOP │
/// │ 0x7F  │ 0x7F/0x7E/0x20 -> 20 x^20│ XOR      │ 0x7E │
/// └───────┴──────────────────────────┴──────────┴──────┘
/// ```
///
/// The checksum covers the unescaped payload. Returns the number of bytes
/// appended. Encoding cannot fail.
pub fn encode_frame(payload: &[u8], mode: ChecksumMode, dst: &mut BytesMut) -> usize {
    let before = dst.len();
    dst.reserve(FRAME_OVERHEAD + payload.len() * 2 + 1);
    dst.put_u8(START);

    let mut csum = 0u8;
    for &b in payload {
        put_stuffed(dst, b);
        csum ^= b;
    }

    match mode {
        ChecksumMode::Raw => dst.put_u8(csum),
        ChecksumMode::Escaped => put_stuffed(dst, csum),
    }
    dst.put_u8(STOP);

    dst.len() - before
}

/// Decode a frame from a buffer.
///
/// Bytes before the first `START` are discarded as line noise. A second
/// `START` before `STOP` abandons the partial frame and restarts there.
/// Returns `Ok(None)` if the buffer doesn't contain a complete frame yet. A
/// frame that fails validation is consumed before the error is returned, so
/// the next call resumes on fresh input.
///
/// In [`ChecksumMode::Raw`] the checksum is written unstuffed and may itself
/// be a reserved byte. A reserved byte equal to the XOR of the payload so far
/// and directly followed by `STOP` is read as that checksum.
pub fn decode_frame(src: &mut BytesMut, max_payload: usize, mode: ChecksumMode) -> Result<Option<Frame>> {
    'resync: loop {
        match src.iter().position(|&b| b == START) {
            Some(0) => {}
            Some(noise) => {
                trace!(noise, "discarding bytes before frame start");
                src.advance(noise);
            }
            None => {
                if !src.is_empty() {
                    trace!(noise = src.len(), "discarding bytes without frame start");
                    src.clear();
                }
                return Ok(None);
            }
        }

        // Payload plus the checksum byte.
        let mut expanded = BytesMut::with_capacity(max_payload.min(src.len()) + 1);
        let mut running = 0u8;
        let mut escaped = false;

        for i in 1..src.len() {
            let b = src[i];

            if mode == ChecksumMode::Raw && !escaped && is_reserved(b) && running == b {
                match src.get(i + 1) {
                    None => return Ok(None),
                    Some(&STOP) => {
                        src.advance(i + 2);
                        return Ok(Some(Frame {
                            payload: expanded.freeze(),
                            checksum: b,
                        }));
                    }
                    Some(_) => {}
                }
            }

            if b == START {
                trace!(at = i, "frame restarted before stop");
                src.advance(i);
                continue 'resync;
            }

            if b == STOP {
                src.advance(i + 1);
                if escaped {
                    return Err(FrameError::DanglingEscape);
                }
                return finish(expanded);
            }

            let byte = if escaped {
                escaped = false;
                b ^ ESCAPE
            } else if b == ESCAPE {
                escaped = true;
                continue;
            } else {
                b
            };
            expanded.put_u8(byte);
            running ^= byte;

            if expanded.len() > max_payload + 1 {
                src.advance(i + 1);
                return Err(FrameError::PayloadTooLarge {
                    size: expanded.len() - 1,
                    max: max_payload,
                });
            }
        }

        return Ok(None); // Need more data
    }
}

fn finish(mut expanded: BytesMut) -> Result<Option<Frame>> {
    let Some(received) = expanded.last().copied() else {
        return Err(FrameError::EmptyFrame);
    };
    expanded.truncate(expanded.len() - 1);

    let computed = checksum(&expanded);
    if computed != received {
        return Err(FrameError::ChecksumMismatch { computed, received });
    }

    Ok(Some(Frame {
        payload: expanded.freeze(),
        checksum: received,
    }))
}

/// Configuration for the frame codec.
#[derive(Debug, Clone)]
pub struct FrameConfig {
    /// Maximum unescaped payload size in bytes. Default: 256.
    pub max_payload_size: usize,
    /// How the checksum byte is written and read back.
    pub checksum_mode: ChecksumMode,
}

impl Default for FrameConfig {
    fn default() -> Self {
        Self {
            max_payload_size: DEFAULT_MAX_PAYLOAD,
            checksum_mode: ChecksumMode::default(),
        }
    }
}
