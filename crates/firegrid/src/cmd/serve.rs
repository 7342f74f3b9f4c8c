use std::io::Write;
use std::net::SocketAddr;
use std::path::Path;
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::Arc;
use std::time::Duration;

use firegrid_board::DecoderConfig;
use firegrid_bridge::{Bridge, BridgeConfig};
use firegrid_frame::{ChecksumMode, FrameConfig};
use firegrid_transport::DatagramSocket;
use tracing::info;

use crate::cmd::{parse_duration, ServeArgs};
use crate::exit::{bridge_error, transport_error, CliError, CliResult, INTERNAL, SUCCESS};
use crate::output::{print_stats, OutputFormat};

/// How often the receive loop wakes to check for shutdown.
const SHUTDOWN_POLL: Duration = Duration::from_millis(250);

pub fn run(args: ServeArgs, format: OutputFormat) -> CliResult<i32> {
    let config = bridge_config(&args)?;
    let write_timeout = parse_duration(&args.write_timeout)?;

    let addr = SocketAddr::new(args.bind, args.port);
    let mut socket = DatagramSocket::bind(addr).map_err(|err| transport_error("bind failed", err))?;
    socket
        .set_read_timeout(Some(SHUTDOWN_POLL))
        .map_err(|err| transport_error("bind failed", err))?;

    let sink = open_sink(&args.serial, args.baud, Some(write_timeout))?;

    let running = Arc::new(AtomicBool::new(true));
    install_ctrlc_handler(running.clone())?;

    info!(
        addr = %socket.local_addr(),
        serial = %args.serial.display(),
        checksum = ?config.frame.checksum_mode,
        "bridge listening"
    );

    let mut bridge = Bridge::new(sink, config);
    let stats = bridge
        .serve(&mut socket, &running)
        .map_err(|err| bridge_error("bridge stopped", err))?;

    print_stats(&stats, format);
    Ok(SUCCESS)
}

pub(crate) fn bridge_config(args: &ServeArgs) -> CliResult<BridgeConfig> {
    let idle_threshold = parse_duration(&args.idle_threshold)?;

    Ok(BridgeConfig {
        decoder: DecoderConfig {
            supports_victory_flag: !args.no_victory,
            supports_interstitials: !args.no_interstitials,
            idle_threshold,
        },
        frame: FrameConfig {
            checksum_mode: checksum_mode(args.escape_checksum),
            ..FrameConfig::default()
        },
        fail_fast: args.fail_fast,
    })
}

pub(crate) fn checksum_mode(escape: bool) -> ChecksumMode {
    if escape {
        ChecksumMode::Escaped
    } else {
        ChecksumMode::Raw
    }
}

#[cfg(unix)]
fn open_sink(path: &Path, baud: u32, write_timeout: Option<Duration>) -> CliResult<Box<dyn Write>> {
    use firegrid_transport::{SerialConfig, SerialPort};

    let config = SerialConfig {
        baud,
        write_timeout,
        read_timeout: None,
    };
    let port = SerialPort::open(path, config).map_err(|err| transport_error("serial open failed", err))?;
    Ok(Box::new(port))
}

#[cfg(not(unix))]
fn open_sink(path: &Path, _baud: u32, _write_timeout: Option<Duration>) -> CliResult<Box<dyn Write>> {
    tracing::warn!(path = %path.display(), "no serial line support, writing raw bytes");
    let file = std::fs::OpenOptions::new()
        .write(true)
        .truncate(true)
        .open(path)
        .map_err(|err| crate::exit::io_error("serial open failed", err))?;
    Ok(Box::new(file))
}

pub(crate) fn install_ctrlc_handler(running: Arc<AtomicBool>) -> CliResult<()> {
    ctrlc::set_handler(move || {
        running.store(false, Ordering::SeqCst);
    })
    .map_err(|err| CliError::new(INTERNAL, format!("signal handler setup failed: {err}")))
}
