use std::net::{SocketAddr, ToSocketAddrs, UdpSocket};
use std::time::Duration;

use bytes::{Bytes, BytesMut};
use tracing::{debug, info};

use crate::error::{Result, TransportError};
use crate::traits::DatagramSource;

/// Default receive buffer: one board message fits with plenty of headroom.
pub const DEFAULT_MAX_DATAGRAM: usize = 1024;

/// UDP socket that yields whole datagrams.
///
/// Datagrams longer than the configured maximum are truncated by the kernel;
/// the decoder then rejects them for having too few lines.
pub struct DatagramSocket {
    socket: UdpSocket,
    local_addr: SocketAddr,
    max_datagram: usize,
    buf: BytesMut,
}

impl DatagramSocket {
    /// Bind to `addr` with the default receive buffer size.
    pub fn bind(addr: SocketAddr) -> Result<Self> {
        Self::bind_with_capacity(addr, DEFAULT_MAX_DATAGRAM)
    }

    /// Bind to `addr`, accepting datagrams of up to `max_datagram` bytes.
    pub fn bind_with_capacity(addr: SocketAddr, max_datagram: usize) -> Result<Self> {
        let socket = UdpSocket::bind(addr).map_err(|source| TransportError::Bind { addr, source })?;
        let local_addr = socket.local_addr()?;

        info!(%local_addr, "listening for board datagrams");

        Ok(Self {
            socket,
            local_addr,
            max_datagram,
            buf: BytesMut::zeroed(max_datagram),
        })
    }

    /// Bind an ephemeral socket suitable for sending.
    pub fn unbound() -> Result<Self> {
        let addr = SocketAddr::from(([0, 0, 0, 0], 0));
        Self::bind(addr)
    }

    /// The address the socket is bound to.
    pub fn local_addr(&self) -> SocketAddr {
        self.local_addr
    }

    /// Maximum datagram size accepted by [`receive`](DatagramSource::receive).
    pub fn max_datagram(&self) -> usize {
        self.max_datagram
    }

    /// Set the receive timeout. `None` blocks forever.
    pub fn set_read_timeout(&self, timeout: Option<Duration>) -> Result<()> {
        self.socket.set_read_timeout(timeout).map_err(Into::into)
    }

    /// Receive one datagram along with its sender.
    pub fn receive_from(&mut self) -> Result<(Bytes, SocketAddr)> {
        if self.buf.len() < self.max_datagram {
            self.buf.resize(self.max_datagram, 0);
        }
        let (len, peer) = self.socket.recv_from(&mut self.buf[..])?;
        debug!(%peer, len, "received datagram");
        let data = self.buf.split_to(len).freeze();
        Ok((data, peer))
    }

    /// Send one datagram to `target`.
    pub fn send_to(&self, data: &[u8], target: impl ToSocketAddrs) -> Result<usize> {
        let sent = self.socket.send_to(data, target)?;
        if sent != data.len() {
            return Err(TransportError::Io(std::io::Error::new(
                std::io::ErrorKind::WriteZero,
                format!("datagram truncated: sent {sent} of {} bytes", data.len()),
            )));
        }
        Ok(sent)
    }
}

impl DatagramSource for DatagramSocket {
    fn receive(&mut self) -> Result<Bytes> {
        self.receive_from().map(|(data, _peer)| data)
    }
}

impl std::fmt::Debug for DatagramSocket {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("DatagramSocket")
            .field("local_addr", &self.local_addr)
            .field("max_datagram", &self.max_datagram)
            .finish()
    }
}
