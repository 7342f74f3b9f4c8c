use std::fs;
use std::io::Read;
use std::net::IpAddr;
use std::path::PathBuf;
use std::time::Duration;

use clap::{Args, Subcommand};
use firegrid_transport::DEFAULT_BAUD;

use crate::exit::{io_error, CliError, CliResult, USAGE};
use crate::output::OutputFormat;

pub mod encode;
pub mod monitor;
pub mod send;
pub mod serve;
pub mod version;
pub mod wiring;

/// Default UDP port games send boards to.
pub const DEFAULT_PORT: u16 = 1075;

#[derive(Subcommand, Debug)]
pub enum Command {
    /// Receive board datagrams and drive the panels over serial.
    Serve(ServeArgs),
    /// Decode one board and print its payload and frame.
    Encode(EncodeArgs),
    /// Send one board datagram to a running bridge.
    Send(SendArgs),
    /// Decode frames read back from a serial line or capture file.
    Monitor(MonitorArgs),
    /// Print the lane wiring table.
    Wiring(WiringArgs),
    /// Show version information.
    Version(VersionArgs),
}

pub fn run(command: Command, format: OutputFormat) -> CliResult<i32> {
    match command {
        Command::Serve(args) => serve::run(args, format),
        Command::Encode(args) => encode::run(args, format),
        Command::Send(args) => send::run(args),
        Command::Monitor(args) => monitor::run(args, format),
        Command::Wiring(_) => wiring::run(format),
        Command::Version(args) => version::run(args),
    }
}

#[derive(Args, Debug)]
pub struct ServeArgs {
    /// Serial device (or file) receiving frames.
    #[arg(env = "FIREGRID_SERIAL")]
    pub serial: PathBuf,
    /// UDP port to listen on.
    #[arg(long, env = "FIREGRID_PORT", default_value_t = DEFAULT_PORT)]
    pub port: u16,
    /// Address to bind.
    #[arg(long, default_value = "0.0.0.0")]
    pub bind: IpAddr,
    /// Serial line speed.
    #[arg(long, default_value_t = DEFAULT_BAUD)]
    pub baud: u32,
    /// How long the board must stay blank before an interstitial (e.g. 3s, 500ms).
    #[arg(long, default_value = "3s")]
    pub idle_threshold: String,
    /// Give up on a serial write after this long.
    #[arg(long, default_value = "1s")]
    pub write_timeout: String,
    /// Byte-stuff the checksum like payload bytes (firmware must expect it).
    #[arg(long)]
    pub escape_checksum: bool,
    /// Reject version 1 boards instead of honoring the victory flag.
    #[arg(long)]
    pub no_victory: bool,
    /// Pass blank boards through unchanged however long they last.
    #[arg(long)]
    pub no_interstitials: bool,
    /// Exit on the first transport error.
    #[arg(long)]
    pub fail_fast: bool,
}

#[derive(Args, Debug)]
pub struct EncodeArgs {
    #[command(flatten)]
    pub input: BoardInput,
    /// Byte-stuff the checksum like payload bytes.
    #[arg(long)]
    pub escape_checksum: bool,
    /// Reject version 1 boards.
    #[arg(long)]
    pub no_victory: bool,
}

#[derive(Args, Debug)]
pub struct SendArgs {
    /// Bridge address, e.g. 127.0.0.1:1075.
    pub addr: String,
    #[command(flatten)]
    pub input: BoardInput,
    /// Send even if the board does not validate locally.
    #[arg(long)]
    pub unchecked: bool,
}

#[derive(Args, Debug)]
pub struct MonitorArgs {
    /// Serial device or capture file to read.
    pub path: PathBuf,
    /// Serial line speed.
    #[arg(long, default_value_t = DEFAULT_BAUD)]
    pub baud: u32,
    /// Exit after decoding N frames.
    #[arg(long)]
    pub count: Option<usize>,
    /// Expect a byte-stuffed checksum (match the bridge's --escape-checksum).
    #[arg(long)]
    pub escape_checksum: bool,
}

#[derive(Args, Debug, Default)]
pub struct WiringArgs {}

#[derive(Args, Debug)]
pub struct VersionArgs {
    /// Show extended build provenance.
    #[arg(long)]
    pub extended: bool,
}

/// Where a board message comes from. Stdin when neither flag is given.
#[derive(Args, Debug, Default)]
pub struct BoardInput {
    /// Board message text (use \n between lines).
    #[arg(long, conflicts_with = "file")]
    pub data: Option<String>,
    /// Read the board message from a file.
    #[arg(long, conflicts_with = "data")]
    pub file: Option<PathBuf>,
}

impl BoardInput {
    pub fn read(&self) -> CliResult<Vec<u8>> {
        if let Some(data) = &self.data {
            return Ok(data.replace("\\n", "\n").into_bytes());
        }
        if let Some(path) = &self.file {
            return fs::read(path)
                .map_err(|err| io_error(&format!("failed reading {}", path.display()), err));
        }
        let mut buf = Vec::new();
        std::io::stdin()
            .read_to_end(&mut buf)
            .map_err(|err| io_error("failed reading stdin", err))?;
        Ok(buf)
    }
}

pub fn parse_duration(input: &str) -> CliResult<Duration> {
    let input = input.trim();
    if input.is_empty() {
        return Err(CliError::new(USAGE, "duration must not be empty"));
    }

    let (number, unit) = if let Some(num) = input.strip_suffix("ms") {
        (num, "ms")
    } else if let Some(num) = input.strip_suffix('s') {
        (num, "s")
    } else if let Some(num) = input.strip_suffix('m') {
        (num, "m")
    } else {
        (input, "s")
    };

    let value: u64 = number
        .parse()
        .map_err(|_| CliError::new(USAGE, format!("invalid duration value: {input}")))?;

    if value == 0 {
        return Err(CliError::new(USAGE, "duration must be greater than zero"));
    }

    match unit {
        "ms" => Ok(Duration::from_millis(value)),
        "s" => Ok(Duration::from_secs(value)),
        "m" => Ok(Duration::from_secs(value.saturating_mul(60))),
        _ => Err(CliError::new(
            USAGE,
            format!("unsupported duration unit: {unit}"),
        )),
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn parse_duration_units() {
        assert_eq!(parse_duration("2s").unwrap(), Duration::from_secs(2));
        assert_eq!(parse_duration("150ms").unwrap(), Duration::from_millis(150));
        assert_eq!(parse_duration("2m").unwrap(), Duration::from_secs(120));
        assert_eq!(parse_duration(" 3 ").unwrap(), Duration::from_secs(3));
    }

    #[test]
    fn parse_duration_rejects_invalid_values() {
        assert!(parse_duration("0s").is_err());
        assert!(parse_duration("bad").is_err());
        assert!(parse_duration("").is_err());
        assert_eq!(parse_duration("1.5s").unwrap_err().code, USAGE);
    }

    #[test]
    fn inline_data_unescapes_newlines() {
        let input = BoardInput {
            data: Some("0\\n10\\n20".to_string()),
            file: None,
        };
        assert_eq!(input.read().unwrap(), b"0\n10\n20");
    }
}
