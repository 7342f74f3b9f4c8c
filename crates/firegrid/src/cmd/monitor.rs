use std::io::{ErrorKind, Read};
use std::path::Path;
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::Arc;
use std::time::Duration;

use firegrid_board::{unmap, unpack, Board, ProtocolVersion, PAYLOAD_LEN};
use firegrid_bridge::to_hex;
use firegrid_frame::{Frame, FrameConfig, FrameError, FrameReader};
use tracing::{debug, warn};

use crate::cmd::serve::{checksum_mode, install_ctrlc_handler};
use crate::cmd::MonitorArgs;
use crate::exit::{frame_error, CliResult, SUCCESS};
use crate::output::{print_captured, Captured, OutputFormat};

const SHUTDOWN_POLL: Duration = Duration::from_millis(250);

pub fn run(args: MonitorArgs, format: OutputFormat) -> CliResult<i32> {
    let source = open_source(&args.path, args.baud)?;
    let config = FrameConfig {
        checksum_mode: checksum_mode(args.escape_checksum),
        ..FrameConfig::default()
    };
    let mut reader = FrameReader::with_config(source, config);

    let running = Arc::new(AtomicBool::new(true));
    install_ctrlc_handler(running.clone())?;

    let mut printed = 0usize;
    while running.load(Ordering::SeqCst) {
        let frame = match reader.read_frame() {
            Ok(frame) => frame,
            Err(FrameError::EndOfStream) => break,
            Err(FrameError::Io(err)) if err.kind() == ErrorKind::TimedOut => continue,
            Err(err) if err.is_transport() => return Err(frame_error("read failed", err)),
            Err(err) => {
                warn!(%err, "dropping corrupt frame");
                continue;
            }
        };

        let Some(captured) = capture(printed, &frame) else {
            warn!(len = frame.payload.len(), "unexpected payload length");
            continue;
        };
        print_captured(&captured, format);
        printed = printed.saturating_add(1);

        if args.count.is_some_and(|count| printed >= count) {
            break;
        }
    }

    debug!(frames = printed, "monitor finished");
    Ok(SUCCESS)
}

/// Rebuild the board a frame would light. Frames carry no version, so a
/// lit victory lane reports as a version 1 board.
fn capture(index: usize, frame: &Frame) -> Option<Captured> {
    if frame.payload.len() != PAYLOAD_LEN {
        return None;
    }
    let (grid, victory) = unmap(&unpack(&frame.payload));
    let version = if victory {
        ProtocolVersion::V1
    } else {
        ProtocolVersion::V0
    };
    Some(Captured {
        index,
        board: Board {
            version,
            victory,
            grid,
        },
        checksum: frame.checksum,
        payload: to_hex(&frame.payload),
    })
}

#[cfg(unix)]
fn open_source(path: &Path, baud: u32) -> CliResult<Box<dyn Read>> {
    use firegrid_transport::{SerialConfig, SerialPort};

    let config = SerialConfig {
        baud,
        write_timeout: None,
        read_timeout: Some(SHUTDOWN_POLL),
    };
    let port = SerialPort::open_read_only(path, config)
        .map_err(|err| crate::exit::transport_error("open failed", err))?;
    Ok(Box::new(port))
}

#[cfg(not(unix))]
fn open_source(path: &Path, _baud: u32) -> CliResult<Box<dyn Read>> {
    let file = std::fs::File::open(path).map_err(|err| crate::exit::io_error("open failed", err))?;
    Ok(Box::new(file))
}
