use bytes::Bytes;

use crate::error::Result;

/// A blocking source of whole datagrams.
///
/// Each call returns exactly one message; there is no stream reassembly. An
/// expired read timeout surfaces as an error for which
/// [`TransportError::is_timeout`](crate::TransportError::is_timeout) is true.
pub trait DatagramSource {
    /// Block until the next datagram arrives.
    fn receive(&mut self) -> Result<Bytes>;
}

impl<S: DatagramSource + ?Sized> DatagramSource for &mut S {
    fn receive(&mut self) -> Result<Bytes> {
        (**self).receive()
    }
}
