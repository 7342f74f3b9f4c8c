//! Physical wiring of the solenoid panels.
//!
//! The playfield is split into eight 5x5 panels, two per band of five rows:
//!
//! ```text
//!   G H    rows 15-19 (top)
//!   E F    rows 10-14
//!   C D    rows  5-9
//!   A B    rows  0-4  (bottom)
//! ```
//!
//! Each panel drives 32 outputs. The first three columns of the panel occupy
//! lanes 0-14, output 15 has no solenoid attached, the last two columns occupy
//! lanes 16-25, lanes 26-30 are spare and lane 31 fires the victory poofer.
//! Within a column, lower lanes drive lower solenoids.

use std::fmt;

use serde::Serialize;

use crate::grid::{COLS, ROWS};

/// Number of panels on the bus.
pub const PANEL_COUNT: usize = 8;

/// Outputs per panel.
pub const LANES_PER_PANEL: usize = 32;

/// Total outputs on the bus.
pub const LANE_COUNT: usize = PANEL_COUNT * LANES_PER_PANEL;

/// Panel footprint in cells.
pub const PANEL_SIZE: usize = 5;

/// Panel-local output with no solenoid attached.
pub const UNCONNECTED_LANE: usize = 15;

/// Panel-local output driving the victory poofer.
pub const VICTORY_LANE: usize = 31;

/// Columns wired before the unconnected output.
const LEADING_COLUMNS: usize = 3;

/// What a single output lane is wired to.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(tag = "kind", rename_all = "snake_case")]
pub enum Lane {
    /// A playfield solenoid.
    Cell { col: u8, row: u8 },
    /// An output with no solenoid attached.
    Unconnected,
    /// A spare output, always off.
    Reserved,
    /// The panel's victory poofer.
    Victory,
}

impl fmt::Display for Lane {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Lane::Cell { col, row } => write!(f, "cell ({col}, {row})"),
            Lane::Unconnected => f.write_str("unconnected"),
            Lane::Reserved => f.write_str("reserved"),
            Lane::Victory => f.write_str("victory"),
        }
    }
}

/// The full wiring table, indexed by global lane.
pub const WIRING: [Lane; LANE_COUNT] = build_wiring();

/// Inverse of [`WIRING`] for playfield cells, indexed `[col][row]`.
const CELL_LANES: [[u8; ROWS]; COLS] = build_cell_lanes();

const fn build_wiring() -> [Lane; LANE_COUNT] {
    let mut table = [Lane::Reserved; LANE_COUNT];

    let mut panel = 0;
    while panel < PANEL_COUNT {
        let start_col = (panel % 2) * PANEL_SIZE;
        let start_row = (panel / 2) * PANEL_SIZE;
        let base = panel * LANES_PER_PANEL;

        let mut lane = base;
        let mut c = 0;
        while c < PANEL_SIZE {
            if c == LEADING_COLUMNS {
                table[lane] = Lane::Unconnected;
                lane += 1;
            }
            let mut r = 0;
            while r < PANEL_SIZE {
                table[lane] = Lane::Cell {
                    col: (start_col + c) as u8,
                    row: (start_row + r) as u8,
                };
                lane += 1;
                r += 1;
            }
            c += 1;
        }

        table[base + VICTORY_LANE] = Lane::Victory;
        panel += 1;
    }

    table
}

const fn build_cell_lanes() -> [[u8; ROWS]; COLS] {
    let mut lanes = [[0u8; ROWS]; COLS];
    let mut i = 0;
    while i < LANE_COUNT {
        if let Lane::Cell { col, row } = WIRING[i] {
            lanes[col as usize][row as usize] = i as u8;
        }
        i += 1;
    }
    lanes
}

/// The global lane driving cell (`col`, `row`), if the cell exists.
pub fn lane_for_cell(col: usize, row: usize) -> Option<usize> {
    CELL_LANES
        .get(col)
        .and_then(|column| column.get(row))
        .map(|&lane| lane as usize)
}

/// The panel owning a global lane.
pub fn panel_of(lane: usize) -> usize {
    lane / LANES_PER_PANEL
}

/// Panel letter as printed on the hardware (`A`..`H`).
pub fn panel_label(panel: usize) -> char {
    (b'A' + (panel % PANEL_COUNT) as u8) as char
}
