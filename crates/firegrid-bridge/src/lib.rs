//! The bridge pipeline: one datagram in, one serial frame out.
//!
//! Each board message is decoded, mapped onto panel lanes, packed, framed and
//! written before the next message is read. The [`Bridge`] owns the only
//! state carried between messages (idle tracking), plus the clock and random
//! source the decoder needs, so all of it can be injected in tests.

pub mod bridge;
pub mod clock;
pub mod dispatch;
pub mod error;

pub use bridge::{Bridge, BridgeConfig, BridgeStats};
pub use clock::{Clock, ManualClock, SystemClock};
pub use dispatch::{to_hex, Dispatch};
pub use error::{BridgeError, Result};
