//! Transport collaborators for the firegrid bridge.
//!
//! Two thin wrappers with no protocol logic of their own:
//! - [`DatagramSocket`] receives board descriptions over UDP
//! - [`SerialPort`] writes framed bytes to the solenoid controller (Unix only)
//!
//! Everything above this crate talks to them through [`DatagramSource`] and
//! `std::io::Write`, so tests can swap in in-memory fakes.

pub mod error;
pub mod traits;
pub mod udp;

#[cfg(unix)]
pub mod serial;

pub use error::{Result, TransportError};
pub use traits::DatagramSource;
pub use udp::{DatagramSocket, DEFAULT_MAX_DATAGRAM};

#[cfg(unix)]
pub use serial::{SerialConfig, SerialPort, DEFAULT_BAUD};
