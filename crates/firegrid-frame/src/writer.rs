use std::io::{ErrorKind, Write};

use bytes::BytesMut;
use tracing::trace;

use crate::codec::{encode_frame, FrameConfig, FRAME_OVERHEAD};
use crate::error::{FrameError, Result};

const INITIAL_BUFFER_CAPACITY: usize = 128;

/// Writes complete frames to any `Write` sink.
///
/// A frame is either written in full or the call fails: a sink that stops
/// accepting bytes mid-frame yields [`FrameError::PartialWrite`], since a torn
/// frame corrupts the delimiter stream for whatever follows.
pub struct FrameWriter<T> {
    inner: T,
    buf: BytesMut,
    config: FrameConfig,
}

impl<T: Write> FrameWriter<T> {
    /// Create a new frame writer with default configuration.
    pub fn new(inner: T) -> Self {
        Self::with_config(inner, FrameConfig::default())
    }

    /// Create a new frame writer with explicit configuration.
    pub fn with_config(inner: T, config: FrameConfig) -> Self {
        Self {
            inner,
            buf: BytesMut::with_capacity(INITIAL_BUFFER_CAPACITY),
            config,
        }
    }

    /// Frame and send a payload (blocking). Returns the framed length.
    pub fn send(&mut self, payload: &[u8]) -> Result<usize> {
        self.buf.clear();
        if payload.len() > self.config.max_payload_size {
            return Err(FrameError::PayloadTooLarge {
                size: payload.len(),
                max: self.config.max_payload_size,
            });
        }

        let expected = encode_frame(payload, self.config.checksum_mode, &mut self.buf);
        debug_assert!(expected >= FRAME_OVERHEAD + payload.len());

        let mut offset = 0usize;
        while offset < expected {
            match self.inner.write(&self.buf[offset..]) {
                Ok(0) => {
                    return Err(FrameError::PartialWrite {
                        written: offset,
                        expected,
                    })
                }
                Ok(n) => offset += n,
                Err(err) if err.kind() == ErrorKind::Interrupted => continue,
                Err(err) if err.kind() == ErrorKind::WouldBlock => continue,
                Err(err) => return Err(FrameError::Io(err)),
            }
        }
        trace!(len = expected, "frame written");

        self.flush()?;
        Ok(expected)
    }

    /// The bytes of the most recently encoded frame, whether or not the
    /// write succeeded. Empty after a rejected payload.
    pub fn last_frame(&self) -> &[u8] {
        &self.buf
    }

    /// Flush the underlying sink.
    pub fn flush(&mut self) -> Result<()> {
        loop {
            match self.inner.flush() {
                Ok(()) => return Ok(()),
                Err(err) if err.kind() == ErrorKind::Interrupted => continue,
                Err(err) if err.kind() == ErrorKind::WouldBlock => continue,
                Err(err) => return Err(FrameError::Io(err)),
            }
        }
    }

    /// Borrow the underlying sink.
    pub fn get_ref(&self) -> &T {
        &self.inner
    }

    /// Mutably borrow the underlying sink.
    pub fn get_mut(&mut self) -> &mut T {
        &mut self.inner
    }

    /// Consume the writer and return the inner sink.
    pub fn into_inner(self) -> T {
        self.inner
    }

    /// Current frame writer configuration.
    pub fn config(&self) -> &FrameConfig {
        &self.config
    }
}
