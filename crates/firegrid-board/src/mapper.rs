use std::fmt;

use crate::grid::{Board, Grid};
use crate::packer::{pack_into, PAYLOAD_LEN};
use crate::wiring::{Lane, LANE_COUNT, WIRING};

/// One bit per output lane, in bus order.
#[derive(Clone, PartialEq, Eq)]
pub struct BitPlane([bool; LANE_COUNT]);

impl BitPlane {
    /// Every lane off.
    pub fn zeroed() -> Self {
        Self([false; LANE_COUNT])
    }

    pub fn get(&self, lane: usize) -> bool {
        self.0.get(lane).copied().unwrap_or(false)
    }

    pub fn set(&mut self, lane: usize, on: bool) {
        if let Some(bit) = self.0.get_mut(lane) {
            *bit = on;
        }
    }

    pub fn as_slice(&self) -> &[bool] {
        &self.0
    }

    /// Indices of lit lanes, ascending.
    pub fn lit_lanes(&self) -> impl Iterator<Item = usize> + '_ {
        self.0
            .iter()
            .enumerate()
            .filter_map(|(lane, &on)| on.then_some(lane))
    }

    /// Pack into the 32-byte bus payload.
    pub fn to_bytes(&self) -> [u8; PAYLOAD_LEN] {
        let mut out = [0u8; PAYLOAD_LEN];
        pack_into(&self.0, &mut out);
        out
    }
}

impl Default for BitPlane {
    fn default() -> Self {
        Self::zeroed()
    }
}

impl fmt::Debug for BitPlane {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_tuple("BitPlane")
            .field(&self.lit_lanes().collect::<Vec<_>>())
            .finish()
    }
}

/// Route grid cells onto output lanes.
///
/// Unconnected and spare lanes stay off. When `victory` is set, every panel's
/// victory lane is lit.
pub fn map(grid: &Grid, victory: bool) -> BitPlane {
    let mut bits = BitPlane::zeroed();
    for (lane, wiring) in WIRING.iter().enumerate() {
        let on = match *wiring {
            Lane::Cell { col, row } => grid.get(col as usize, row as usize),
            Lane::Victory => victory,
            Lane::Unconnected | Lane::Reserved => false,
        };
        bits.0[lane] = on;
    }
    bits
}

/// Map a decoded board, honouring the victory flag only for protocol versions
/// that carry it.
pub fn map_board(board: &Board) -> BitPlane {
    map(&board.grid, board.victory && board.version.carries_victory())
}

/// Recover the grid and victory flag from lane bits.
///
/// Bits beyond the wiring table are ignored; missing bits read as off. The
/// victory flag is reported if any panel fires its poofer.
pub fn unmap(bits: &[bool]) -> (Grid, bool) {
    let mut grid = Grid::blank();
    let mut victory = false;
    for (lane, &on) in bits.iter().take(LANE_COUNT).enumerate() {
        if !on {
            continue;
        }
        match WIRING[lane] {
            Lane::Cell { col, row } => grid.set(col as usize, row as usize, true),
            Lane::Victory => victory = true,
            Lane::Unconnected | Lane::Reserved => {}
        }
    }
    (grid, victory)
}
