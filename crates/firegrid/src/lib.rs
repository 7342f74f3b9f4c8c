//! Drive a grid of solenoid poofers from a networked game board.
//!
//! A game sends its board as a small text datagram; firegrid validates it,
//! routes every cell onto the panel wiring, packs the lanes into 32 bytes and
//! writes them to the panel controller as one byte-stuffed serial frame.
//!
//! # Crate Structure
//!
//! - [`transport`]: UDP receive socket and raw serial sink
//! - [`frame`]: START/STOP/ESCAPE serial framing with an XOR checksum
//! - [`board`]: board decoding, idle interstitials, wiring and bit packing
//! - [`bridge`]: the datagram-to-frame pipeline tying the above together

/// Re-export transport types.
pub mod transport {
    pub use firegrid_transport::*;
}

/// Re-export frame types.
pub mod frame {
    pub use firegrid_frame::*;
}

/// Re-export board types.
pub mod board {
    pub use firegrid_board::*;
}

/// Re-export bridge types.
pub mod bridge {
    pub use firegrid_bridge::*;
}
