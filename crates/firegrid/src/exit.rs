use std::fmt;
use std::io;

use firegrid_board::DecodeError;
use firegrid_bridge::BridgeError;
use firegrid_frame::FrameError;
use firegrid_transport::TransportError;

pub const SUCCESS: i32 = 0;
pub const FAILURE: i32 = 1;
pub const TRANSPORT_ERROR: i32 = 3;
pub const DATA_INVALID: i32 = 60;
pub const USAGE: i32 = 64;
pub const TIMEOUT: i32 = 124;
pub const INTERNAL: i32 = 125;

pub type CliResult<T> = Result<T, CliError>;

#[derive(Debug)]
pub struct CliError {
    pub code: i32,
    pub message: String,
}

impl CliError {
    pub fn new(code: i32, message: impl Into<String>) -> Self {
        Self {
            code,
            message: message.into(),
        }
    }
}

impl fmt::Display for CliError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.message)
    }
}

impl std::error::Error for CliError {}

pub fn io_error(context: &str, err: io::Error) -> CliError {
    let code = match err.kind() {
        io::ErrorKind::TimedOut | io::ErrorKind::WouldBlock => TIMEOUT,
        io::ErrorKind::NotFound
        | io::ErrorKind::PermissionDenied
        | io::ErrorKind::AddrInUse
        | io::ErrorKind::AddrNotAvailable
        | io::ErrorKind::ConnectionRefused
        | io::ErrorKind::BrokenPipe => TRANSPORT_ERROR,
        _ => INTERNAL,
    };
    CliError::new(code, format!("{context}: {err}"))
}

pub fn transport_error(context: &str, err: TransportError) -> CliError {
    match err {
        TransportError::Io(source) => io_error(context, source),
        TransportError::UnsupportedBaud(_) => CliError::new(USAGE, format!("{context}: {err}")),
        TransportError::WriteTimeout(_) => CliError::new(TIMEOUT, format!("{context}: {err}")),
        other => CliError::new(TRANSPORT_ERROR, format!("{context}: {other}")),
    }
}

pub fn frame_error(context: &str, err: FrameError) -> CliError {
    match err {
        FrameError::Io(source) => io_error(context, source),
        FrameError::PartialWrite { .. } => CliError::new(TRANSPORT_ERROR, format!("{context}: {err}")),
        FrameError::EndOfStream => CliError::new(FAILURE, format!("{context}: {err}")),
        other => CliError::new(DATA_INVALID, format!("{context}: {other}")),
    }
}

pub fn decode_error(context: &str, err: DecodeError) -> CliError {
    CliError::new(DATA_INVALID, format!("{context}: {err}"))
}

pub fn bridge_error(context: &str, err: BridgeError) -> CliError {
    match err {
        BridgeError::Decode(err) => decode_error(context, err),
        BridgeError::Frame(err) => frame_error(context, err),
        BridgeError::Transport(err) => transport_error(context, err),
    }
}

#[cfg(test)]
mod tests {
    use std::time::Duration;

    use super::*;

    #[test]
    fn serial_timeouts_map_to_timeout_code() {
        let err = frame_error(
            "send failed",
            FrameError::Io(io::Error::from(TransportError::WriteTimeout(Duration::from_secs(1)))),
        );
        assert_eq!(err.code, TIMEOUT);
        assert_eq!(
            transport_error("open failed", TransportError::WriteTimeout(Duration::from_secs(1))).code,
            TIMEOUT
        );
    }

    #[test]
    fn validation_failures_are_data_invalid() {
        let err = bridge_error("encode failed", BridgeError::Decode(DecodeError::UnsupportedWidth(12)));
        assert_eq!(err.code, DATA_INVALID);
        assert!(err.message.contains("12"));
        assert_eq!(frame_error("read", FrameError::DanglingEscape).code, DATA_INVALID);
    }

    #[test]
    fn bad_baud_is_usage() {
        assert_eq!(transport_error("open", TransportError::UnsupportedBaud(12345)).code, USAGE);
    }

    #[test]
    fn missing_device_is_transport() {
        let err = transport_error(
            "open failed",
            TransportError::Open {
                path: "/dev/ttyNOPE".into(),
                source: io::Error::from(io::ErrorKind::NotFound),
            },
        );
        assert_eq!(err.code, TRANSPORT_ERROR);
    }
}
