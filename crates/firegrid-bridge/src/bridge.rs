use std::io::Write;
use std::sync::atomic::{AtomicBool, Ordering};
use std::time::Duration;

use bytes::Bytes;
use firegrid_board::{encode_board, BoardDecoder, BoardSource, DecoderConfig, IdleState};
use firegrid_frame::{FrameConfig, FrameWriter};
use firegrid_transport::DatagramSource;
use rand::rngs::SmallRng;
use rand::{Rng, SeedableRng};
use serde::Serialize;
use tracing::{debug, error, info, warn};

use crate::clock::{Clock, SystemClock};
use crate::dispatch::{to_hex, Dispatch};
use crate::error::{BridgeError, Result};

/// Pause after a failed receive so a dead socket does not spin the loop.
const RECEIVE_BACKOFF: Duration = Duration::from_millis(100);

/// Bridge behavior configuration.
#[derive(Debug, Clone, Default)]
pub struct BridgeConfig {
    /// Decoder capabilities and idle threshold.
    pub decoder: DecoderConfig,
    /// Serial framing options.
    pub frame: FrameConfig,
    /// Stop serving on the first transport failure instead of logging and
    /// carrying on.
    pub fail_fast: bool,
}

/// Counters reported when serving stops.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize)]
pub struct BridgeStats {
    /// Datagrams received.
    pub received: u64,
    /// Frames written to the serial sink.
    pub sent: u64,
    /// Messages rejected by validation.
    pub rejected: u64,
    /// Interstitial frames among those sent.
    pub interstitials: u64,
    /// Receive or write failures.
    pub transport_errors: u64,
}

/// Single-owner pipeline from board messages to serial frames.
pub struct Bridge<W, C = SystemClock, R = SmallRng> {
    decoder: BoardDecoder<R>,
    idle: IdleState,
    clock: C,
    writer: FrameWriter<W>,
    fail_fast: bool,
    stats: BridgeStats,
}

impl<W: Write> Bridge<W> {
    /// A bridge on the system clock with an entropy-seeded RNG.
    pub fn new(sink: W, config: BridgeConfig) -> Self {
        Self::with_parts(sink, config, SystemClock, SmallRng::from_entropy())
    }
}

impl<W: Write, C: Clock, R: Rng> Bridge<W, C, R> {
    /// A bridge with an explicit clock and random source.
    ///
    /// Idle tracking starts at the clock's current time, so a bridge that
    /// only ever sees blank boards shows its first interstitial one idle
    /// threshold after construction.
    pub fn with_parts(sink: W, config: BridgeConfig, clock: C, rng: R) -> Self {
        let idle = IdleState::new(clock.now());
        Self {
            decoder: BoardDecoder::with_rng(config.decoder, rng),
            idle,
            clock,
            writer: FrameWriter::with_config(sink, config.frame),
            fail_fast: config.fail_fast,
            stats: BridgeStats::default(),
        }
    }

    /// Decode one message and write its frame.
    ///
    /// Malformed messages return [`BridgeError::Decode`] without touching
    /// the sink.
    pub fn handle_datagram(&mut self, raw: &[u8]) -> Result<Dispatch> {
        self.stats.received += 1;
        debug!(len = raw.len(), "board message received");

        let now = self.clock.now();
        let decoded = match self.decoder.decode(raw, now, &mut self.idle) {
            Ok(decoded) => decoded,
            Err(err) => {
                self.stats.rejected += 1;
                return Err(err.into());
            }
        };

        for (line, row) in decoded.board.grid.render('-', '*').iter().enumerate() {
            debug!("{line:02}: {row}");
        }
        if decoded.board.victory {
            info!("victory flag raised");
        }

        let payload = encode_board(&decoded.board);
        info!(payload = %to_hex(&payload), "serial payload");

        self.writer.send(&payload).inspect_err(|_| {
            self.stats.transport_errors += 1;
        })?;
        let dispatch = Dispatch {
            board: decoded.board,
            source: decoded.source,
            payload,
            framed: Bytes::copy_from_slice(self.writer.last_frame()),
        };
        info!(framed = %dispatch.framed_hex(), "framed send");

        self.stats.sent += 1;
        if matches!(dispatch.source, BoardSource::Interstitial { .. }) {
            self.stats.interstitials += 1;
        }
        Ok(dispatch)
    }

    /// Serve messages from `source` until `running` is cleared.
    ///
    /// Validation failures drop the message. Transport failures are logged
    /// and skipped unless the bridge was configured to fail fast, in which
    /// case the first one is returned.
    pub fn serve<S: DatagramSource>(&mut self, source: &mut S, running: &AtomicBool) -> Result<BridgeStats> {
        debug!(
            interstitials = self.decoder.library().len(),
            threshold = ?self.decoder.config().idle_threshold,
            "serving"
        );
        while running.load(Ordering::SeqCst) {
            let raw = match source.receive() {
                Ok(raw) => raw,
                Err(err) if err.is_timeout() => continue,
                Err(err) => {
                    self.stats.transport_errors += 1;
                    if self.fail_fast {
                        return Err(BridgeError::Transport(err));
                    }
                    error!(%err, "receive failed");
                    std::thread::sleep(RECEIVE_BACKOFF);
                    continue;
                }
            };

            match self.handle_datagram(&raw) {
                Ok(_) => {}
                Err(err) if err.is_validation() => warn!(%err, "board rejected"),
                Err(err) => {
                    if self.fail_fast {
                        return Err(err);
                    }
                    error!(%err, "serial send failed");
                }
            }
        }

        info!(
            received = self.stats.received,
            sent = self.stats.sent,
            rejected = self.stats.rejected,
            "bridge stopped"
        );
        Ok(self.stats)
    }

    /// Idle tracking state.
    pub fn idle(&self) -> &IdleState {
        &self.idle
    }

    /// Counters so far.
    pub fn stats(&self) -> BridgeStats {
        self.stats
    }

    /// Consume the bridge and return the serial sink.
    pub fn into_sink(self) -> W {
        self.writer.into_inner()
    }
}

#[cfg(test)]
mod tests {
    use std::collections::VecDeque;
    use std::io::ErrorKind;

    use firegrid_board::{DecodeError, ROWS};
    use firegrid_frame::{ChecksumMode, FrameError, ESCAPE, START, STOP};
    use firegrid_transport::TransportError;
    use rand::rngs::StdRng;

    use super::*;
    use crate::clock::ManualClock;

    const BLANK_LINE: &str = "0000000000";

    fn board(lines: &[&str]) -> Vec<u8> {
        format!("0\n10\n20\n{}", lines.join("\n")).into_bytes()
    }

    fn blank() -> Vec<u8> {
        board(&[BLANK_LINE; ROWS])
    }

    fn bridge_on<W: Write>(sink: W, config: BridgeConfig) -> (Bridge<W, ManualClock, StdRng>, ManualClock) {
        let clock = ManualClock::default();
        let bridge = Bridge::with_parts(sink, config, clock.clone(), StdRng::seed_from_u64(3));
        (bridge, clock)
    }

    #[test]
    fn blank_board_frames_all_zero_payload() {
        let (mut bridge, _clock) = bridge_on(Vec::new(), BridgeConfig::default());
        bridge.handle_datagram(&blank()).unwrap();

        let mut expected = vec![START];
        expected.extend_from_slice(&[0u8; 32]);
        expected.extend_from_slice(&[0x00, STOP]);
        assert_eq!(bridge.into_sink(), expected);
    }

    #[test]
    fn bottom_left_cell_frame() {
        let mut lines = [BLANK_LINE; ROWS];
        lines[19] = "1000000000";
        let (mut bridge, _clock) = bridge_on(Vec::new(), BridgeConfig::default());

        let dispatch = bridge.handle_datagram(&board(&lines)).unwrap();
        assert_eq!(dispatch.payload[0], 0x01);
        assert!(dispatch.payload[1..].iter().all(|&b| b == 0));

        let wire = bridge.into_sink();
        assert_eq!(&wire[..2], &[0x7F, 0x01]);
        assert!(wire[2..33].iter().all(|&b| b == 0));
        assert_eq!(&wire[33..], &[0x01, 0x7E]);
    }

    #[test]
    fn payload_byte_matching_start_is_escaped() {
        // Lanes 0-6 of panel A: column 0 rows 0-4, column 1 rows 0-1.
        let mut lines = [BLANK_LINE; ROWS];
        lines[15] = "1000000000";
        lines[16] = "1000000000";
        lines[17] = "1000000000";
        lines[18] = "1100000000";
        lines[19] = "1100000000";
        let (mut bridge, _clock) = bridge_on(Vec::new(), BridgeConfig::default());

        let dispatch = bridge.handle_datagram(&board(&lines)).unwrap();
        assert_eq!(dispatch.payload[0], 0x7F);

        let wire = bridge.into_sink();
        assert_eq!(dispatch.framed.as_ref(), wire.as_slice());
        assert_eq!(&wire[..3], &[START, ESCAPE, 0x5F]);
        assert_eq!(wire.len(), 36);
        // Raw checksum: XOR over the unescaped payload, written verbatim.
        assert_eq!(&wire[34..], &[0x7F, STOP]);
    }

    #[test]
    fn escaped_checksum_mode_stuffs_checksum() {
        let mut lines = [BLANK_LINE; ROWS];
        lines[15] = "1000000000";
        lines[16] = "1000000000";
        lines[17] = "1000000000";
        lines[18] = "1100000000";
        lines[19] = "1100000000";
        let config = BridgeConfig {
            frame: FrameConfig {
                checksum_mode: ChecksumMode::Escaped,
                ..FrameConfig::default()
            },
            ..BridgeConfig::default()
        };
        let (mut bridge, _clock) = bridge_on(Vec::new(), config);

        bridge.handle_datagram(&board(&lines)).unwrap();
        let wire = bridge.into_sink();
        assert_eq!(&wire[wire.len() - 3..], &[ESCAPE, 0x5F, STOP]);
    }

    #[test]
    fn malformed_message_writes_nothing() {
        let (mut bridge, _clock) = bridge_on(Vec::new(), BridgeConfig::default());

        let err = bridge.handle_datagram(b"0\n12\n20\n").unwrap_err();
        assert!(matches!(err, BridgeError::Decode(DecodeError::UnsupportedWidth(12))));
        assert_eq!(bridge.stats().rejected, 1);
        assert!(bridge.into_sink().is_empty());
    }

    #[test]
    fn interstitial_after_idle_threshold() {
        let (mut bridge, clock) = bridge_on(Vec::new(), BridgeConfig::default());

        let mut sources = Vec::new();
        for _ in 0..20 {
            sources.push(bridge.handle_datagram(&blank()).unwrap().source);
            clock.advance(Duration::from_millis(500));
        }

        assert!(sources[..6].iter().all(|s| *s == BoardSource::Live));
        assert!(matches!(sources[6], BoardSource::Interstitial { .. }));
        assert!(sources[6..].iter().all(|s| *s == sources[6]));
        let BoardSource::Interstitial { id } = sources[6] else {
            unreachable!()
        };
        assert_eq!(bridge.idle().active_interstitial(), Some(id));
        assert_eq!(bridge.stats().interstitials, 14);
        assert_eq!(bridge.stats().sent, 20);
    }

    #[test]
    fn short_sink_is_a_transport_error() {
        let (mut bridge, _clock) = bridge_on(Limited(Vec::new(), 10), BridgeConfig::default());

        let err = bridge.handle_datagram(&blank()).unwrap_err();
        assert!(matches!(
            err,
            BridgeError::Frame(FrameError::PartialWrite {
                written: 10,
                expected: 35
            })
        ));
        assert!(!err.is_validation());
        assert_eq!(bridge.stats().transport_errors, 1);
    }

    #[test]
    fn logged_frame_is_the_frame_written() {
        let mut lines = [BLANK_LINE; ROWS];
        lines[19] = "1000000000";
        let config = BridgeConfig {
            frame: FrameConfig {
                checksum_mode: ChecksumMode::Escaped,
                ..FrameConfig::default()
            },
            ..BridgeConfig::default()
        };
        let (mut bridge, _clock) = bridge_on(Vec::new(), config);

        let first = bridge.handle_datagram(&board(&lines)).unwrap();
        let second = bridge.handle_datagram(&blank()).unwrap();

        let wire = bridge.into_sink();
        assert_eq!(first.framed.len() + second.framed.len(), wire.len());
        assert_eq!(first.framed.as_ref(), &wire[..first.framed.len()]);
        assert_eq!(second.framed.as_ref(), &wire[first.framed.len()..]);
    }

    #[cfg(unix)]
    #[test]
    fn stalled_serial_line_surfaces_write_timeout() {
        use firegrid_transport::{SerialConfig, SerialPort};

        let path = std::env::temp_dir().join(format!(
            "firegrid-bridge-fifo-{}-{}",
            std::process::id(),
            std::time::SystemTime::now()
                .duration_since(std::time::UNIX_EPOCH)
                .unwrap()
                .as_nanos()
        ));
        let c_path = std::ffi::CString::new(path.as_os_str().as_encoded_bytes()).unwrap();
        // SAFETY: `c_path` is a valid NUL-terminated path.
        assert_eq!(unsafe { libc::mkfifo(c_path.as_ptr(), 0o600) }, 0);

        // Nothing drains the FIFO, so the pipe buffer fills and writes stall.
        let config = SerialConfig {
            write_timeout: Some(Duration::from_millis(50)),
            ..SerialConfig::default()
        };
        let port = SerialPort::open(&path, config).unwrap();
        let (mut bridge, _clock) = bridge_on(port, BridgeConfig::default());

        let mut lines = [BLANK_LINE; ROWS];
        lines[19] = "1000000000";
        let message = board(&lines);
        let err = loop {
            if let Err(err) = bridge.handle_datagram(&message) {
                break err;
            }
        };

        assert!(
            matches!(err, BridgeError::Frame(FrameError::Io(ref io)) if io.kind() == ErrorKind::TimedOut),
            "unexpected error: {err}"
        );
        assert!(!err.is_validation());
        assert_eq!(bridge.stats().transport_errors, 1);

        drop(bridge);
        let _ = std::fs::remove_file(&path);
    }

    #[test]
    fn serve_skips_bad_messages_and_stops_when_told() {
        let running = AtomicBool::new(true);
        let mut source = ScriptedSource::new(
            &running,
            vec![
                Ok(Bytes::from(blank())),
                Ok(Bytes::from_static(b"garbage")),
                Err(TransportError::Io(std::io::Error::from(ErrorKind::ConnectionReset))),
                Ok(Bytes::from(blank())),
            ],
        );
        let (mut bridge, _clock) = bridge_on(Vec::new(), BridgeConfig::default());

        let stats = bridge.serve(&mut source, &running).unwrap();
        assert_eq!(
            stats,
            BridgeStats {
                received: 3,
                sent: 2,
                rejected: 1,
                interstitials: 0,
                transport_errors: 1,
            }
        );
        assert_eq!(bridge.into_sink().len(), 70);
    }

    #[test]
    fn serve_fail_fast_returns_first_transport_error() {
        let running = AtomicBool::new(true);
        let mut source = ScriptedSource::new(&running, vec![Ok(Bytes::from(blank()))]);
        let config = BridgeConfig {
            fail_fast: true,
            ..BridgeConfig::default()
        };
        let (mut bridge, _clock) = bridge_on(Broken, config);

        let err = bridge.serve(&mut source, &running).unwrap_err();
        assert!(matches!(err, BridgeError::Frame(FrameError::Io(_))));
    }

    #[test]
    fn serve_keeps_going_after_write_failure() {
        let running = AtomicBool::new(true);
        let mut source = ScriptedSource::new(
            &running,
            vec![Ok(Bytes::from(blank())), Ok(Bytes::from(blank()))],
        );
        let (mut bridge, _clock) = bridge_on(Broken, BridgeConfig::default());

        let stats = bridge.serve(&mut source, &running).unwrap();
        assert_eq!(stats.received, 2);
        assert_eq!(stats.sent, 0);
        assert_eq!(stats.transport_errors, 2);
    }

    /// Replays scripted results, then clears `running` and times out.
    struct ScriptedSource<'a> {
        running: &'a AtomicBool,
        script: VecDeque<firegrid_transport::Result<Bytes>>,
    }

    impl<'a> ScriptedSource<'a> {
        fn new(running: &'a AtomicBool, script: Vec<firegrid_transport::Result<Bytes>>) -> Self {
            Self {
                running,
                script: script.into(),
            }
        }
    }

    impl DatagramSource for ScriptedSource<'_> {
        fn receive(&mut self) -> firegrid_transport::Result<Bytes> {
            match self.script.pop_front() {
                Some(item) => item,
                None => {
                    self.running.store(false, Ordering::SeqCst);
                    Err(TransportError::Io(std::io::Error::from(ErrorKind::WouldBlock)))
                }
            }
        }
    }

    struct Limited(Vec<u8>, usize);

    impl Write for Limited {
        fn write(&mut self, buf: &[u8]) -> std::io::Result<usize> {
            let n = (self.1 - self.0.len()).min(buf.len());
            self.0.extend_from_slice(&buf[..n]);
            Ok(n)
        }

        fn flush(&mut self) -> std::io::Result<()> {
            Ok(())
        }
    }

    struct Broken;

    impl Write for Broken {
        fn write(&mut self, _buf: &[u8]) -> std::io::Result<usize> {
            Err(std::io::Error::from(ErrorKind::BrokenPipe))
        }

        fn flush(&mut self) -> std::io::Result<()> {
            Ok(())
        }
    }
}
