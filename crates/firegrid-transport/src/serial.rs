use std::fs::{File, OpenOptions};
use std::io::{Read, Write};
use std::os::fd::{AsRawFd, RawFd};
use std::os::unix::fs::OpenOptionsExt;
use std::path::{Path, PathBuf};
use std::time::Duration;

use tracing::{debug, info, warn};

use crate::error::{Result, TransportError};

/// Line rate of the deployed RS-485 panel bus.
pub const DEFAULT_BAUD: u32 = 115_200;

/// Serial line configuration.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct SerialConfig {
    /// Line rate in bits per second.
    pub baud: u32,
    /// Deadline for a single write to make progress. `None` blocks forever.
    pub write_timeout: Option<Duration>,
    /// Deadline for a single read to make progress. `None` blocks forever.
    pub read_timeout: Option<Duration>,
}

impl Default for SerialConfig {
    fn default() -> Self {
        Self {
            baud: DEFAULT_BAUD,
            write_timeout: Some(Duration::from_secs(1)),
            read_timeout: None,
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
enum Access {
    ReadOnly,
    ReadWrite,
}

/// A serial device opened in raw 8N1 mode.
///
/// The descriptor is non-blocking; every read and write first waits on
/// `poll(2)` so a stalled line surfaces as [`TransportError::WriteTimeout`]
/// instead of hanging the caller. Paths that are not terminals (capture files,
/// FIFOs) are accepted unconfigured.
pub struct SerialPort {
    file: File,
    path: PathBuf,
    config: SerialConfig,
    is_tty: bool,
}

impl SerialPort {
    /// Open `path` for writing frames. A regular file is truncated so a
    /// capture holds only this run's bytes.
    pub fn open(path: impl AsRef<Path>, config: SerialConfig) -> Result<Self> {
        Self::open_with(path.as_ref(), config, Access::ReadWrite)
    }

    /// Open `path` for reading frames. Nothing is ever written or truncated.
    pub fn open_read_only(path: impl AsRef<Path>, config: SerialConfig) -> Result<Self> {
        Self::open_with(path.as_ref(), config, Access::ReadOnly)
    }

    fn open_with(path: &Path, config: SerialConfig, access: Access) -> Result<Self> {
        let path = path.to_path_buf();
        let speed = baud_constant(config.baud).ok_or(TransportError::UnsupportedBaud(config.baud))?;

        let file = OpenOptions::new()
            .read(true)
            .write(access == Access::ReadWrite)
            .custom_flags(libc::O_NOCTTY | libc::O_NONBLOCK)
            .open(&path)
            .map_err(|source| TransportError::Open {
                path: path.clone(),
                source,
            })?;

        let is_tty = configure_raw(file.as_raw_fd(), speed).map_err(|source| {
            TransportError::Configure {
                path: path.clone(),
                source,
            }
        })?;

        if is_tty {
            info!(?path, baud = config.baud, ?access, "opened serial device");
        } else {
            if access == Access::ReadWrite && file.metadata()?.is_file() {
                file.set_len(0)?;
                debug!(?path, "truncated capture file");
            }
            warn!(?path, ?access, "not a terminal, using raw bytes without line configuration");
        }

        Ok(Self {
            file,
            path,
            config,
            is_tty,
        })
    }

    /// Open with [`SerialConfig::default`].
    pub fn open_default(path: impl AsRef<Path>) -> Result<Self> {
        Self::open(path, SerialConfig::default())
    }

    /// The device path.
    pub fn path(&self) -> &Path {
        &self.path
    }

    /// Whether the path is a terminal that received line configuration.
    pub fn is_tty(&self) -> bool {
        self.is_tty
    }

    /// Current configuration.
    pub fn config(&self) -> &SerialConfig {
        &self.config
    }

    /// Wait until the descriptor is ready for `events`. `Ok(false)` means the
    /// deadline passed first.
    fn wait_ready(&self, events: libc::c_short, timeout: Option<Duration>) -> std::io::Result<bool> {
        let mut pollfd = libc::pollfd {
            fd: self.file.as_raw_fd(),
            events,
            revents: 0,
        };
        let timeout_ms = poll_timeout_ms(timeout);

        loop {
            // SAFETY: `pollfd` is a valid, writable pollfd array of length 1 and
            // the descriptor stays open for the lifetime of `self`.
            let rc = unsafe { libc::poll(&mut pollfd, 1, timeout_ms) };
            match rc {
                0 => return Ok(false),
                n if n > 0 => return Ok(true),
                _ => {
                    let err = std::io::Error::last_os_error();
                    if err.kind() != std::io::ErrorKind::Interrupted {
                        return Err(err);
                    }
                }
            }
        }
    }
}

impl Write for SerialPort {
    fn write(&mut self, buf: &[u8]) -> std::io::Result<usize> {
        let timeout = self.config.write_timeout;
        if !self.wait_ready(libc::POLLOUT, timeout)? {
            return Err(TransportError::WriteTimeout(timeout.unwrap_or_default()).into());
        }
        self.file.write(buf)
    }

    fn flush(&mut self) -> std::io::Result<()> {
        self.file.flush()
    }
}

impl Read for SerialPort {
    fn read(&mut self, buf: &mut [u8]) -> std::io::Result<usize> {
        if !self.wait_ready(libc::POLLIN, self.config.read_timeout)? {
            return Err(std::io::Error::new(
                std::io::ErrorKind::TimedOut,
                "serial read timed out",
            ));
        }
        self.file.read(buf)
    }
}

impl std::fmt::Debug for SerialPort {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("SerialPort")
            .field("path", &self.path)
            .field("baud", &self.config.baud)
            .field("is_tty", &self.is_tty)
            .finish()
    }
}

/// Map a numeric rate onto its termios constant.
pub fn baud_constant(baud: u32) -> Option<libc::speed_t> {
    let speed = match baud {
        1200 => libc::B1200,
        2400 => libc::B2400,
        4800 => libc::B4800,
        9600 => libc::B9600,
        19_200 => libc::B19200,
        38_400 => libc::B38400,
        57_600 => libc::B57600,
        115_200 => libc::B115200,
        230_400 => libc::B230400,
        #[cfg(target_os = "linux")]
        460_800 => libc::B460800,
        #[cfg(target_os = "linux")]
        921_600 => libc::B921600,
        _ => return None,
    };
    Some(speed)
}

/// Put `fd` into raw mode at `speed`. Returns `Ok(false)` for non-terminals.
fn configure_raw(fd: RawFd, speed: libc::speed_t) -> std::io::Result<bool> {
    // SAFETY: termios is a plain C struct; all-zero is a valid initial value
    // that tcgetattr overwrites.
    let mut tio: libc::termios = unsafe { std::mem::zeroed() };

    // SAFETY: `fd` is open and `tio` is a valid writable termios.
    if unsafe { libc::tcgetattr(fd, &mut tio) } != 0 {
        let err = std::io::Error::last_os_error();
        return match err.raw_os_error() {
            Some(libc::ENOTTY) | Some(libc::EINVAL) => {
                debug!(fd, "descriptor has no termios");
                Ok(false)
            }
            _ => Err(err),
        };
    }

    // SAFETY: `tio` was filled in by tcgetattr above; these calls only mutate it.
    unsafe {
        libc::cfmakeraw(&mut tio);
        if libc::cfsetispeed(&mut tio, speed) != 0 || libc::cfsetospeed(&mut tio, speed) != 0 {
            return Err(std::io::Error::last_os_error());
        }
    }
    tio.c_cflag |= libc::CLOCAL | libc::CREAD;
    tio.c_cflag &= !(libc::CSTOPB | libc::PARENB);

    // SAFETY: `fd` is open and `tio` is a fully initialised termios.
    if unsafe { libc::tcsetattr(fd, libc::TCSANOW, &tio) } != 0 {
        return Err(std::io::Error::last_os_error());
    }

    Ok(true)
}

fn poll_timeout_ms(timeout: Option<Duration>) -> libc::c_int {
    match timeout {
        None => -1,
        Some(t) if t.is_zero() => 0,
        Some(t) => t.as_millis().clamp(1, libc::c_int::MAX as u128) as libc::c_int,
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn temp_path(tag: &str) -> PathBuf {
        std::env::temp_dir().join(format!(
            "firegrid-serial-{tag}-{}-{}",
            std::process::id(),
            std::time::SystemTime::now()
                .duration_since(std::time::UNIX_EPOCH)
                .unwrap()
                .as_nanos()
        ))
    }

    #[test]
    fn regular_file_is_accepted_as_raw_sink() {
        let path = temp_path("file");
        std::fs::write(&path, b"stale bytes from an earlier run").unwrap();

        let mut port = SerialPort::open_default(&path).unwrap();
        assert!(!port.is_tty());
        port.write_all(&[0x7f, 0x00, 0x7e]).unwrap();
        port.flush().unwrap();
        drop(port);

        assert_eq!(std::fs::read(&path).unwrap(), vec![0x7f, 0x00, 0x7e]);
        let _ = std::fs::remove_file(&path);
    }

    #[test]
    fn read_only_open_leaves_capture_intact() {
        let path = temp_path("capture");
        std::fs::write(&path, [0x7f, 0x01, 0x01, 0x7e]).unwrap();
        let mut perms = std::fs::metadata(&path).unwrap().permissions();
        perms.set_readonly(true);
        std::fs::set_permissions(&path, perms).unwrap();

        let mut port = SerialPort::open_read_only(&path, SerialConfig::default()).unwrap();
        let mut captured = Vec::new();
        port.read_to_end(&mut captured).unwrap();
        assert_eq!(captured, vec![0x7f, 0x01, 0x01, 0x7e]);
        assert!(port.write(&[0x00]).is_err());
        drop(port);

        assert_eq!(std::fs::read(&path).unwrap().len(), 4);
        let _ = std::fs::remove_file(&path);
    }

    #[test]
    fn full_fifo_surfaces_write_timeout() {
        let path = temp_path("fifo");
        let c_path = std::ffi::CString::new(path.as_os_str().as_encoded_bytes()).unwrap();
        // SAFETY: `c_path` is a valid NUL-terminated path.
        assert_eq!(unsafe { libc::mkfifo(c_path.as_ptr(), 0o600) }, 0);

        // Read-write open keeps the FIFO from reporting a missing reader; nothing drains it.
        let config = SerialConfig {
            write_timeout: Some(Duration::from_millis(50)),
            ..SerialConfig::default()
        };
        let mut port = SerialPort::open(&path, config).unwrap();
        assert!(!port.is_tty());

        let chunk = [0u8; 64];
        let err = loop {
            match port.write(&chunk) {
                Ok(_) => {}
                Err(err) if err.kind() == std::io::ErrorKind::WouldBlock => {}
                Err(err) => break err,
            }
        };
        assert_eq!(err.kind(), std::io::ErrorKind::TimedOut);
        assert!(err.to_string().contains("timed out"), "unexpected error: {err}");

        drop(port);
        let _ = std::fs::remove_file(&path);
    }

    #[test]
    fn missing_device_reports_open_error() {
        let path = temp_path("missing").join("tty");
        let err = SerialPort::open_default(&path).unwrap_err();
        assert!(matches!(err, TransportError::Open { .. }));
    }

    #[test]
    fn unsupported_baud_is_rejected_before_open() {
        let config = SerialConfig {
            baud: 12_345,
            ..SerialConfig::default()
        };
        let err = SerialPort::open("/nonexistent/tty", config).unwrap_err();
        assert!(matches!(err, TransportError::UnsupportedBaud(12_345)));
    }

    #[test]
    fn standard_rates_map_to_constants() {
        assert_eq!(baud_constant(115_200), Some(libc::B115200));
        assert_eq!(baud_constant(9600), Some(libc::B9600));
        assert_eq!(baud_constant(0), None);
    }

    #[test]
    fn poll_timeout_conversion() {
        assert_eq!(poll_timeout_ms(None), -1);
        assert_eq!(poll_timeout_ms(Some(Duration::ZERO)), 0);
        assert_eq!(poll_timeout_ms(Some(Duration::from_micros(10))), 1);
        assert_eq!(poll_timeout_ms(Some(Duration::from_millis(250))), 250);
    }
}
