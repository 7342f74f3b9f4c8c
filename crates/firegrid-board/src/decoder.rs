use std::time::{Duration, Instant};

use rand::rngs::SmallRng;
use rand::{Rng, SeedableRng};
use serde::Serialize;
use tracing::{debug, info};

use crate::error::{DecodeError, Field, Result};
use crate::grid::{cell_is_on, Board, Grid, ProtocolVersion, COLS, ROWS};
use crate::interstitial::InterstitialLibrary;

/// How long the board must stay blank before an interstitial is shown.
pub const DEFAULT_IDLE_THRESHOLD: Duration = Duration::from_secs(3);

/// Decoder capabilities.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct DecoderConfig {
    /// Accept version 1 messages with a leading victory-flag line.
    pub supports_victory_flag: bool,
    /// Replace long-blank boards with an interstitial pattern.
    pub supports_interstitials: bool,
    /// Blank time before interstitials kick in.
    pub idle_threshold: Duration,
}

impl Default for DecoderConfig {
    fn default() -> Self {
        Self {
            supports_victory_flag: true,
            supports_interstitials: true,
            idle_threshold: DEFAULT_IDLE_THRESHOLD,
        }
    }
}

/// Idle tracking carried from one message to the next.
///
/// Owned by whoever drives the decoder; only [`BoardDecoder::decode`] mutates
/// it. Choosing an interstitial is a check-then-latch sequence, so concurrent
/// decoders must not share one of these without serialising access.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct IdleState {
    last_non_blank: Instant,
    active_interstitial: Option<usize>,
}

impl IdleState {
    /// Start tracking as if a live board was seen at `now`.
    pub fn new(now: Instant) -> Self {
        Self {
            last_non_blank: now,
            active_interstitial: None,
        }
    }

    /// When the last non-blank board arrived.
    pub fn last_non_blank(&self) -> Instant {
        self.last_non_blank
    }

    /// The latched interstitial id, if any.
    pub fn active_interstitial(&self) -> Option<usize> {
        self.active_interstitial
    }

    /// How long the board has been blank as of `now`.
    pub fn blank_for(&self, now: Instant) -> Duration {
        now.saturating_duration_since(self.last_non_blank)
    }

    fn mark_live(&mut self, now: Instant) {
        if let Some(id) = self.active_interstitial.take() {
            debug!(id, "live board, releasing interstitial");
        }
        self.last_non_blank = now;
    }
}

/// Where the decoded board came from.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(tag = "kind", rename_all = "snake_case")]
pub enum BoardSource {
    /// The message as received (possibly blank).
    Live,
    /// An idle pattern substituted for a long-blank board.
    Interstitial { id: usize },
}

/// A validated board plus its provenance.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct Decoded {
    pub board: Board,
    pub source: BoardSource,
}

/// Parses and validates board messages.
///
/// Wire format, newline separated:
/// ```text
/// <version>
/// <cols>          always 10
/// <rows>          always 20
/// [victory line]  version 1 only; any lit cell raises the flag
/// <rows lines of cols characters, top line first, '0' = off>
/// ```
///
/// The random source is owned for the decoder's lifetime and seeded once.
pub struct BoardDecoder<R = SmallRng> {
    config: DecoderConfig,
    library: InterstitialLibrary,
    rng: R,
}

impl BoardDecoder<SmallRng> {
    /// A decoder with the built-in interstitials and an entropy-seeded RNG.
    pub fn new(config: DecoderConfig) -> Self {
        Self::with_rng(config, SmallRng::from_entropy())
    }
}

impl Default for BoardDecoder<SmallRng> {
    fn default() -> Self {
        Self::new(DecoderConfig::default())
    }
}

impl<R: Rng> BoardDecoder<R> {
    /// A decoder with the built-in interstitials and an explicit RNG.
    pub fn with_rng(config: DecoderConfig, rng: R) -> Self {
        Self {
            config,
            library: InterstitialLibrary::builtin(),
            rng,
        }
    }

    /// Replace the interstitial library.
    pub fn with_library(mut self, library: InterstitialLibrary) -> Self {
        self.library = library;
        self
    }

    pub fn config(&self) -> &DecoderConfig {
        &self.config
    }

    pub fn library(&self) -> &InterstitialLibrary {
        &self.library
    }

    /// Validate a message and apply idle substitution.
    ///
    /// A board with any lit playfield cell refreshes `idle`; the victory flag
    /// line does not count. A blank board that has been blank
    /// for at least the idle threshold is replaced by the latched interstitial
    /// (picking one if none is latched), as a version 0 board without the
    /// victory flag.
    pub fn decode(&mut self, raw: &[u8], now: Instant, idle: &mut IdleState) -> Result<Decoded> {
        let board = self.parse(raw)?;

        if !board.grid.is_blank() {
            idle.mark_live(now);
            return Ok(Decoded {
                board,
                source: BoardSource::Live,
            });
        }

        let blank_for = idle.blank_for(now);
        if !self.config.supports_interstitials || blank_for < self.config.idle_threshold {
            return Ok(Decoded {
                board,
                source: BoardSource::Live,
            });
        }

        let Some((id, grid)) = self.latch(idle) else {
            return Ok(Decoded {
                board,
                source: BoardSource::Live,
            });
        };
        debug!(id, ?blank_for, "substituting interstitial");

        Ok(Decoded {
            board: Board::new(grid),
            source: BoardSource::Interstitial { id },
        })
    }

    /// The latched interstitial, picking one uniformly if none is latched.
    fn latch(&mut self, idle: &mut IdleState) -> Option<(usize, Grid)> {
        if let Some(grid) = idle.active_interstitial.and_then(|id| self.library.get(id)) {
            return idle.active_interstitial.map(|id| (id, grid.clone()));
        }
        if self.library.is_empty() {
            return None;
        }

        let id = self.rng.gen_range(1..=self.library.len());
        idle.active_interstitial = Some(id);
        info!(id, "board idle, latched interstitial");
        self.library.get(id).map(|grid| (id, grid.clone()))
    }

    /// Validate a message without touching idle state.
    pub fn parse(&self, raw: &[u8]) -> Result<Board> {
        let mut parts = raw.splitn(4, |&b| b == b'\n');

        let version = header_field(parts.next(), Field::Version)?;
        let cols = header_field(parts.next(), Field::Width)?;
        let rows = header_field(parts.next(), Field::Height)?;

        let version = match version {
            0 => ProtocolVersion::V0,
            1 if self.config.supports_victory_flag => ProtocolVersion::V1,
            other => return Err(DecodeError::UnsupportedVersion(other)),
        };
        if cols != COLS as i64 {
            return Err(DecodeError::UnsupportedWidth(cols));
        }
        if rows != ROWS as i64 {
            return Err(DecodeError::UnsupportedHeight(rows));
        }

        let body = parts.next().ok_or(DecodeError::MissingField(Field::Board))?;
        let flag_lines = usize::from(version.carries_victory());
        let expected = ROWS + flag_lines;

        let lines: Vec<&[u8]> = body.splitn(expected + 1, |&b| b == b'\n').collect();
        if lines.len() < expected {
            return Err(DecodeError::NotEnoughLines {
                received: lines.len(),
                expected,
            });
        }
        for (line, text) in lines.iter().take(expected).enumerate() {
            if text.len() != COLS {
                return Err(DecodeError::LineLength {
                    line,
                    received: text.len(),
                    expected: COLS,
                });
            }
        }

        let victory = flag_lines == 1 && lines[0].iter().copied().any(cell_is_on);
        let grid = Grid::fill(lines[flag_lines..expected].iter().copied());

        Ok(Board {
            version,
            victory,
            grid,
        })
    }
}

fn header_field(part: Option<&[u8]>, field: Field) -> Result<i64> {
    let part = part.ok_or(DecodeError::MissingField(field))?;
    let invalid = || DecodeError::InvalidNumber {
        field,
        value: String::from_utf8_lossy(part).into_owned(),
    };
    let text = std::str::from_utf8(part).map_err(|_| invalid())?;
    parse_int(text.trim()).ok_or_else(invalid)
}

/// Parse a signed integer with an optional `0x`, `0o` or `0b` prefix.
fn parse_int(text: &str) -> Option<i64> {
    let (negative, unsigned) = match text.strip_prefix('-') {
        Some(rest) => (true, rest),
        None => (false, text.strip_prefix('+').unwrap_or(text)),
    };
    let (radix, digits) = match unsigned.get(..2) {
        Some("0x") | Some("0X") => (16, &unsigned[2..]),
        Some("0o") | Some("0O") => (8, &unsigned[2..]),
        Some("0b") | Some("0B") => (2, &unsigned[2..]),
        _ => (10, unsigned),
    };
    if digits.is_empty() || !digits.chars().all(|c| c.is_digit(radix)) {
        return None;
    }
    let value = i64::from_str_radix(digits, radix).ok()?;
    Some(if negative { -value } else { value })
}
