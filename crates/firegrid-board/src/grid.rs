use std::fmt;

use serde::Serialize;

use crate::error::{DecodeError, Result};

/// Playfield width in cells.
pub const COLS: usize = 10;

/// Playfield height in cells.
pub const ROWS: usize = 20;

/// Board message protocol version.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(into = "u8")]
pub enum ProtocolVersion {
    /// Playfield only.
    V0,
    /// One leading victory-flag line, then the playfield.
    V1,
}

impl ProtocolVersion {
    /// Whether messages of this version carry the victory flag.
    pub fn carries_victory(self) -> bool {
        matches!(self, ProtocolVersion::V1)
    }

    pub fn as_u8(self) -> u8 {
        match self {
            ProtocolVersion::V0 => 0,
            ProtocolVersion::V1 => 1,
        }
    }
}

impl From<ProtocolVersion> for u8 {
    fn from(version: ProtocolVersion) -> Self {
        version.as_u8()
    }
}

/// Whether a wire character lights its cell. Only `'0'` is off.
pub fn cell_is_on(byte: u8) -> bool {
    byte != b'0'
}

/// A 10x20 grid of on/off cells, addressed by (column, row).
///
/// Row 0 is the bottom of the playfield. Messages transmit the top line first,
/// so transmitted line `l` lands in row `ROWS - 1 - l`.
#[derive(Clone, PartialEq, Eq, Default)]
pub struct Grid {
    cells: [[bool; ROWS]; COLS],
}

impl Grid {
    /// A grid with every cell off.
    pub fn blank() -> Self {
        Self::default()
    }

    /// Build a grid from lines in transmission order (top line first).
    pub fn from_lines<L: AsRef<[u8]>>(lines: &[L]) -> Result<Self> {
        if lines.len() < ROWS {
            return Err(DecodeError::NotEnoughLines {
                received: lines.len(),
                expected: ROWS,
            });
        }
        for (line, text) in lines.iter().take(ROWS).enumerate() {
            let received = text.as_ref().len();
            if received != COLS {
                return Err(DecodeError::LineLength {
                    line,
                    received,
                    expected: COLS,
                });
            }
        }
        Ok(Self::fill(lines.iter().map(|line| line.as_ref())))
    }

    /// Fill from lines already known to be the right shape. Missing cells
    /// read as off.
    pub(crate) fn fill<'a>(lines: impl Iterator<Item = &'a [u8]>) -> Self {
        let mut grid = Self::blank();
        for (l, line) in lines.take(ROWS).enumerate() {
            let row = ROWS - 1 - l;
            for (col, &byte) in line.iter().take(COLS).enumerate() {
                grid.cells[col][row] = cell_is_on(byte);
            }
        }
        grid
    }

    /// Cell state; out-of-range coordinates read as off.
    pub fn get(&self, col: usize, row: usize) -> bool {
        self.cells
            .get(col)
            .and_then(|column| column.get(row))
            .copied()
            .unwrap_or(false)
    }

    /// Set a cell. Out-of-range coordinates are ignored.
    pub fn set(&mut self, col: usize, row: usize, on: bool) {
        if let Some(cell) = self.cells.get_mut(col).and_then(|column| column.get_mut(row)) {
            *cell = on;
        }
    }

    /// True when no cell is lit.
    pub fn is_blank(&self) -> bool {
        self.cells.iter().flatten().all(|&on| !on)
    }

    /// Number of lit cells.
    pub fn lit_count(&self) -> usize {
        self.cells.iter().flatten().filter(|&&on| on).count()
    }

    /// The grid as wire lines (`'0'`/`'1'`), top line first.
    pub fn to_lines(&self) -> Vec<String> {
        self.render('0', '1')
    }

    /// The grid drawn with `off`/`on` glyphs, top line first.
    pub fn render(&self, off: char, on: char) -> Vec<String> {
        (0..ROWS)
            .rev()
            .map(|row| {
                (0..COLS)
                    .map(|col| if self.cells[col][row] { on } else { off })
                    .collect()
            })
            .collect()
    }
}

impl fmt::Debug for Grid {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_list().entries(self.render('-', '*')).finish()
    }
}

impl Serialize for Grid {
    fn serialize<S: serde::Serializer>(&self, serializer: S) -> std::result::Result<S::Ok, S::Error> {
        self.to_lines().serialize(serializer)
    }
}

/// A decoded board ready for mapping.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct Board {
    pub version: ProtocolVersion,
    pub victory: bool,
    pub grid: Grid,
}

impl Board {
    /// A version 0 board without the victory flag.
    pub fn new(grid: Grid) -> Self {
        Self {
            version: ProtocolVersion::V0,
            victory: false,
            grid,
        }
    }
}
