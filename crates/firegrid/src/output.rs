use std::io::{IsTerminal, Write};
use std::time::{SystemTime, UNIX_EPOCH};

use clap::ValueEnum;
use comfy_table::{presets::UTF8_FULL, ContentArrangement, Table};
use firegrid_board::wiring::{panel_label, panel_of};
use firegrid_board::{Board, BoardSource, Lane, COLS, ROWS, WIRING};
use firegrid_bridge::{BridgeStats, Dispatch};
use serde::Serialize;

#[derive(Clone, Debug, Copy, ValueEnum)]
pub enum OutputFormat {
    Json,
    Table,
    Pretty,
    Raw,
}

impl OutputFormat {
    pub fn default_for_stdout() -> Self {
        if std::io::stdout().is_terminal() {
            Self::Pretty
        } else {
            Self::Json
        }
    }
}

#[derive(Serialize)]
struct Stamped<'a, T> {
    #[serde(flatten)]
    body: &'a T,
    timestamp: String,
}

/// A frame read back off the serial line.
#[derive(Serialize)]
pub struct Captured {
    pub index: usize,
    pub board: Board,
    pub checksum: u8,
    pub payload: String,
}

#[derive(Serialize)]
struct WiringReport {
    lanes: Vec<WiringRow>,
}

#[derive(Serialize)]
struct WiringRow {
    lane: usize,
    panel: char,
    #[serde(flatten)]
    target: Lane,
}

pub fn print_dispatch(dispatch: &Dispatch, format: OutputFormat) {
    match format {
        OutputFormat::Json => print_json(dispatch),
        OutputFormat::Table => {
            let mut table = Table::new();
            table
                .load_preset(UTF8_FULL)
                .set_content_arrangement(ContentArrangement::Dynamic)
                .set_header(vec!["VERSION", "VICTORY", "SOURCE", "LIT", "PAYLOAD", "FRAMED"])
                .add_row(vec![
                    dispatch.board.version.as_u8().to_string(),
                    dispatch.board.victory.to_string(),
                    source_label(dispatch.source),
                    dispatch.board.grid.lit_count().to_string(),
                    dispatch.payload_hex(),
                    dispatch.framed_hex(),
                ]);
            println!("{table}");
        }
        OutputFormat::Pretty => {
            print_board(&dispatch.board);
            println!(
                "source={} lit={} victory={}",
                source_label(dispatch.source),
                dispatch.board.grid.lit_count(),
                dispatch.board.victory
            );
            println!("payload={}", dispatch.payload_hex());
            println!("framed={}", dispatch.framed_hex());
        }
        OutputFormat::Raw => print_raw(&dispatch.framed),
    }
}

pub fn print_captured(captured: &Captured, format: OutputFormat) {
    match format {
        OutputFormat::Json => print_json(captured),
        OutputFormat::Table => {
            let mut table = Table::new();
            table
                .load_preset(UTF8_FULL)
                .set_content_arrangement(ContentArrangement::Dynamic)
                .set_header(vec!["FRAME", "VICTORY", "LIT", "CHECKSUM", "PAYLOAD"])
                .add_row(vec![
                    captured.index.to_string(),
                    captured.board.victory.to_string(),
                    captured.board.grid.lit_count().to_string(),
                    format!("{:02x}", captured.checksum),
                    captured.payload.clone(),
                ]);
            println!("{table}");
        }
        OutputFormat::Pretty => {
            println!("frame {} checksum={:02x}", captured.index, captured.checksum);
            print_board(&captured.board);
        }
        OutputFormat::Raw => println!("{}", captured.payload),
    }
}

pub fn print_wiring(format: OutputFormat) {
    let rows: Vec<WiringRow> = WIRING
        .iter()
        .enumerate()
        .map(|(lane, target)| WiringRow {
            lane,
            panel: panel_label(panel_of(lane)),
            target: *target,
        })
        .collect();

    match format {
        OutputFormat::Json => print_json(&WiringReport { lanes: rows }),
        OutputFormat::Table => {
            let mut table = Table::new();
            table
                .load_preset(UTF8_FULL)
                .set_content_arrangement(ContentArrangement::Dynamic)
                .set_header(vec!["LANE", "PANEL", "BYTE", "BIT", "TARGET"]);
            for row in &rows {
                table.add_row(vec![
                    row.lane.to_string(),
                    row.panel.to_string(),
                    (row.lane / 8).to_string(),
                    (row.lane % 8).to_string(),
                    row.target.to_string(),
                ]);
            }
            println!("{table}");
        }
        OutputFormat::Pretty => {
            // Lane number at each cell position, top line first.
            for row in 0..ROWS {
                let line: Vec<String> = (0..COLS)
                    .map(|col| match firegrid_board::lane_for_cell(col, row) {
                        Some(lane) => format!("{lane:>4}"),
                        None => "   -".to_string(),
                    })
                    .collect();
                println!("{:02}:{}", row, line.concat());
            }
        }
        OutputFormat::Raw => {
            for row in &rows {
                println!("{}\t{}\t{}", row.lane, row.panel, row.target);
            }
        }
    }
}

pub fn print_stats(stats: &BridgeStats, format: OutputFormat) {
    match format {
        OutputFormat::Json => print_json(stats),
        OutputFormat::Table => {
            let mut table = Table::new();
            table
                .load_preset(UTF8_FULL)
                .set_content_arrangement(ContentArrangement::Dynamic)
                .set_header(vec!["RECEIVED", "SENT", "REJECTED", "INTERSTITIALS", "TRANSPORT ERRORS"])
                .add_row(vec![
                    stats.received.to_string(),
                    stats.sent.to_string(),
                    stats.rejected.to_string(),
                    stats.interstitials.to_string(),
                    stats.transport_errors.to_string(),
                ]);
            println!("{table}");
        }
        OutputFormat::Pretty | OutputFormat::Raw => {
            println!(
                "received={} sent={} rejected={} interstitials={} transport_errors={}",
                stats.received, stats.sent, stats.rejected, stats.interstitials, stats.transport_errors
            );
        }
    }
}

pub fn print_raw(data: &[u8]) {
    let mut out = std::io::stdout();
    let _ = out.write_all(data);
    let _ = out.flush();
}

fn print_board(board: &Board) {
    for line in board.grid.render('.', '#') {
        println!("  {line}");
    }
}

fn print_json<T: Serialize>(body: &T) {
    let out = Stamped {
        body,
        timestamp: now_unix_seconds(),
    };
    println!(
        "{}",
        serde_json::to_string(&out).unwrap_or_else(|_| "{}".to_string())
    );
}

fn source_label(source: BoardSource) -> String {
    match source {
        BoardSource::Live => "live".to_string(),
        BoardSource::Interstitial { id } => format!("interstitial {id}"),
    }
}

fn now_unix_seconds() -> String {
    SystemTime::now()
        .duration_since(UNIX_EPOCH)
        .map(|d| d.as_secs().to_string())
        .unwrap_or_else(|_| "0".to_string())
}
