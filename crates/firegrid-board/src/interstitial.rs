use crate::grid::{Grid, ROWS};

/// Attract-mode patterns shown while nobody is playing, top line first.
const PATTERNS: [[&str; ROWS]; 2] = [
    // Flame
    [
        "0100000010",
        "1100000011",
        "1100000011",
        "1110110111",
        "1111111111",
        "1100110011",
        "1100110011",
        "0111111110",
        "0111001110",
        "0011111100",
        "0010000100",
        "0010000100",
        "0000000000",
        "0000000000",
        "0000000000",
        "0000000000",
        "0000000000",
        "0000000000",
        "0000000000",
        "0000000000",
    ],
    // Insert coin
    [
        "1010000000",
        "1010111000",
        "1110101000",
        "0010111000",
        "1110000101",
        "0000000101",
        "0011100111",
        "0010100000",
        "0011101110",
        "0000001010",
        "1111001010",
        "1000000000",
        "1110000000",
        "1001000011",
        "1000011010",
        "1001010011",
        "1001010010",
        "1001010011",
        "0000000000",
        "1111111111",
    ],
];

/// Ordered set of idle patterns, addressed by 1-based id.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct InterstitialLibrary {
    grids: Vec<Grid>,
}

impl InterstitialLibrary {
    /// The patterns shipped with the installation.
    pub fn builtin() -> Self {
        let grids = PATTERNS
            .iter()
            .map(|pattern| Grid::fill(pattern.iter().map(|line| line.as_bytes())))
            .collect();
        Self { grids }
    }

    /// A library with no patterns; idle substitution never happens.
    pub fn empty() -> Self {
        Self { grids: Vec::new() }
    }

    pub fn len(&self) -> usize {
        self.grids.len()
    }

    pub fn is_empty(&self) -> bool {
        self.grids.is_empty()
    }

    /// Pattern by 1-based id. Id 0 means "none" and always returns `None`.
    pub fn get(&self, id: usize) -> Option<&Grid> {
        id.checked_sub(1).and_then(|index| self.grids.get(index))
    }
}

impl Default for InterstitialLibrary {
    fn default() -> Self {
        Self::builtin()
    }
}
