//! Board model and encoding for the solenoid array.
//!
//! The pipeline implemented here:
//! - [`decoder`] validates the text board description and applies idle
//!   substitution
//! - [`mapper`] routes grid cells onto output lanes through the fixed
//!   [`wiring`] table
//! - [`packer`] packs the 256 lanes into 32 bytes, least-significant bit first
//!
//! Framing the resulting bytes for the serial bus lives in `firegrid-frame`.

pub mod decoder;
pub mod error;
pub mod grid;
pub mod interstitial;
pub mod mapper;
pub mod packer;
pub mod wiring;

pub use decoder::{
    BoardDecoder, BoardSource, Decoded, DecoderConfig, IdleState, DEFAULT_IDLE_THRESHOLD,
};
pub use error::{DecodeError, Field, PackError, Result};
pub use grid::{Board, Grid, ProtocolVersion, COLS, ROWS};
pub use interstitial::InterstitialLibrary;
pub use mapper::{map, map_board, unmap, BitPlane};
pub use packer::{pack, unpack, PAYLOAD_LEN};
pub use wiring::{lane_for_cell, Lane, LANES_PER_PANEL, LANE_COUNT, PANEL_COUNT, WIRING};

/// Map and pack a board into its 32-byte panel payload.
pub fn encode_board(board: &Board) -> [u8; PAYLOAD_LEN] {
    map_board(board).to_bytes()
}
