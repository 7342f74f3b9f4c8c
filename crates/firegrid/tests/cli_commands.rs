#![cfg(all(unix, feature = "cli"))]

use std::io::Write;
use std::net::UdpSocket;
use std::path::PathBuf;
use std::process::{Command, Stdio};
use std::thread;
use std::time::{Duration, Instant};

use bytes::BytesMut;
use firegrid::frame::{encode_frame, ChecksumMode};

fn unique_temp_dir(tag: &str) -> PathBuf {
    let dir = PathBuf::from(format!(
        "/tmp/firegrid-cli-{tag}-{}-{}",
        std::process::id(),
        std::time::SystemTime::now()
            .duration_since(std::time::UNIX_EPOCH)
            .expect("time should be after epoch")
            .as_nanos()
    ));
    std::fs::create_dir_all(&dir).expect("temp dir should be creatable");
    dir
}

fn board_with_last_line(last: &str) -> String {
    let mut lines = vec!["0000000000"; 19];
    lines.push(last);
    format!("0\n10\n20\n{}", lines.join("\n"))
}

fn free_udp_port() -> u16 {
    UdpSocket::bind("127.0.0.1:0")
        .and_then(|socket| socket.local_addr())
        .expect("ephemeral port should be available")
        .port()
}

fn run_encode(stdin: &str, extra: &[&str]) -> std::process::Output {
    let mut child = Command::new(env!("CARGO_BIN_EXE_firegrid"))
        .args(["--log-level", "error", "--format", "json", "encode"])
        .args(extra)
        .stdin(Stdio::piped())
        .stdout(Stdio::piped())
        .stderr(Stdio::piped())
        .spawn()
        .expect("encode should start");
    child
        .stdin
        .take()
        .expect("stdin should be piped")
        .write_all(stdin.as_bytes())
        .expect("stdin should accept the board");
    child.wait_with_output().expect("encode should finish")
}

#[test]
fn encode_reads_stdin_and_prints_json() {
    let output = run_encode(&board_with_last_line("1000000000"), &[]);
    assert_eq!(output.status.code(), Some(0));

    let json: serde_json::Value =
        serde_json::from_slice(&output.stdout).expect("encode output should be JSON");
    assert_eq!(
        json["payload"].as_str(),
        Some(format!("01{}", "00".repeat(31)).as_str())
    );
    assert_eq!(
        json["framed"].as_str(),
        Some(format!("7f01{}017e", "00".repeat(31)).as_str())
    );
    assert_eq!(json["source"]["kind"].as_str(), Some("live"));
    assert_eq!(json["board"]["grid"][19].as_str(), Some("1000000000"));
}

#[test]
fn encode_escapes_reserved_payload_bytes() {
    let mut lines = vec!["0000000000"; 15];
    lines.extend(["1000000000", "1000000000", "1000000000", "1100000000", "1100000000"]);
    let board = format!("0\n10\n20\n{}", lines.join("\n"));

    let output = run_encode(&board, &["--escape-checksum"]);
    assert_eq!(output.status.code(), Some(0));

    let json: serde_json::Value = serde_json::from_slice(&output.stdout).unwrap();
    let framed = json["framed"].as_str().unwrap();
    assert!(framed.starts_with("7f205f"));
    assert!(framed.ends_with("205f7e"));
}

#[test]
fn encode_invalid_board_exits_60() {
    let output = run_encode("0\n12\n20\n", &[]);
    assert_eq!(output.status.code(), Some(60));
    let stderr = String::from_utf8_lossy(&output.stderr);
    assert!(stderr.contains("width"), "stderr was: {stderr}");
}

#[test]
fn wiring_lists_every_lane() {
    let output = Command::new(env!("CARGO_BIN_EXE_firegrid"))
        .args(["--format", "json", "wiring"])
        .output()
        .expect("wiring should run");
    assert_eq!(output.status.code(), Some(0));

    let json: serde_json::Value = serde_json::from_slice(&output.stdout).unwrap();
    let lanes = json["lanes"].as_array().expect("lanes array");
    assert_eq!(lanes.len(), 256);
    assert_eq!(lanes[15]["kind"].as_str(), Some("unconnected"));
    assert_eq!(lanes[31]["kind"].as_str(), Some("victory"));
    assert_eq!(lanes[255]["panel"].as_str(), Some("H"));
}

#[test]
fn version_reports_package_version() {
    let output = Command::new(env!("CARGO_BIN_EXE_firegrid"))
        .args(["version", "--extended"])
        .output()
        .expect("version should run");
    assert_eq!(output.status.code(), Some(0));

    let stdout = String::from_utf8_lossy(&output.stdout);
    let version = stdout
        .lines()
        .find_map(|line| line.strip_prefix("version: "))
        .map(str::trim);
    assert_eq!(version, Some(env!("CARGO_PKG_VERSION")));
}

#[test]
fn serve_writes_frames_for_received_boards() {
    let dir = unique_temp_dir("serve");
    let sink = dir.join("serial.bin");
    std::fs::write(&sink, b"stale capture from a previous run").expect("sink file should be creatable");
    let port = free_udp_port();

    let mut child = Command::new(env!("CARGO_BIN_EXE_firegrid"))
        .args(["--log-level", "error", "serve"])
        .arg(&sink)
        .args(["--bind", "127.0.0.1", "--port", &port.to_string()])
        .stdout(Stdio::null())
        .stderr(Stdio::null())
        .spawn()
        .expect("serve should start");

    let client = UdpSocket::bind("127.0.0.1:0").unwrap();
    let board = board_with_last_line("1000000000");
    let deadline = Instant::now() + Duration::from_secs(5);
    let mut written = Vec::new();
    while Instant::now() < deadline {
        client
            .send_to(board.as_bytes(), ("127.0.0.1", port))
            .expect("datagram should send");
        thread::sleep(Duration::from_millis(50));
        written = std::fs::read(&sink).unwrap_or_default();
        if written.len() >= 35 && written[0] == 0x7F {
            break;
        }
    }

    let _ = child.kill();
    let _ = child.wait();

    let mut expected = vec![0x7F, 0x01];
    expected.extend_from_slice(&[0u8; 31]);
    expected.extend_from_slice(&[0x01, 0x7E]);
    assert_eq!(expected.len(), 35);
    assert!(written.len() >= 35, "bridge wrote {} bytes", written.len());
    assert_eq!(&written[..35], expected.as_slice());
    assert_eq!(written.len() % 35, 0);

    let _ = std::fs::remove_dir_all(dir);
}

#[test]
fn monitor_decodes_capture_file() {
    let dir = unique_temp_dir("monitor");
    let capture = dir.join("capture.bin");

    let mut payload = [0u8; 32];
    payload[0] = 0x01;
    let mut wire = BytesMut::new();
    wire.extend_from_slice(&[0x00, 0x13]);
    encode_frame(&payload, ChecksumMode::Raw, &mut wire);
    encode_frame(&[0u8; 32], ChecksumMode::Raw, &mut wire);
    std::fs::write(&capture, &wire).expect("capture should be writable");

    let output = Command::new(env!("CARGO_BIN_EXE_firegrid"))
        .args(["--log-level", "error", "--format", "json", "monitor"])
        .arg(&capture)
        .args(["--count", "1"])
        .output()
        .expect("monitor should run");
    assert_eq!(output.status.code(), Some(0));

    let stdout = String::from_utf8_lossy(&output.stdout);
    let lines: Vec<&str> = stdout.lines().collect();
    assert_eq!(lines.len(), 1);

    let json: serde_json::Value = serde_json::from_str(lines[0]).unwrap();
    assert_eq!(json["index"].as_u64(), Some(0));
    assert_eq!(json["checksum"].as_u64(), Some(1));
    assert_eq!(json["board"]["grid"][19].as_str(), Some("1000000000"));

    let _ = std::fs::remove_dir_all(dir);
}

#[test]
fn monitor_reads_raw_checksums_that_match_delimiters() {
    let dir = unique_temp_dir("monitor-raw");
    let capture = dir.join("capture.bin");

    let mut start_sum = [0u8; 32];
    start_sum[0] = 0x70;
    start_sum[1] = 0x0F;
    let mut stop_sum = [0u8; 32];
    stop_sum[0] = 0x3F;
    stop_sum[1] = 0x41;
    let mut wire = BytesMut::new();
    encode_frame(&start_sum, ChecksumMode::Raw, &mut wire);
    encode_frame(&stop_sum, ChecksumMode::Raw, &mut wire);
    std::fs::write(&capture, &wire).expect("capture should be writable");
    let mut perms = std::fs::metadata(&capture).unwrap().permissions();
    perms.set_readonly(true);
    std::fs::set_permissions(&capture, perms).unwrap();

    let output = Command::new(env!("CARGO_BIN_EXE_firegrid"))
        .args(["--log-level", "error", "--format", "json", "monitor"])
        .arg(&capture)
        .output()
        .expect("monitor should run");
    assert_eq!(output.status.code(), Some(0));

    let stdout = String::from_utf8_lossy(&output.stdout);
    let checksums: Vec<u64> = stdout
        .lines()
        .map(|line| serde_json::from_str::<serde_json::Value>(line).unwrap()["checksum"].as_u64().unwrap())
        .collect();
    assert_eq!(checksums, vec![0x7F, 0x7E]);
    assert_eq!(std::fs::read(&capture).unwrap(), wire.to_vec());

    let _ = std::fs::remove_dir_all(dir);
}

#[test]
fn monitor_escape_checksum_flag_reads_stuffed_checksums() {
    let dir = unique_temp_dir("monitor-escaped");
    let capture = dir.join("capture.bin");

    let mut payload = [0u8; 32];
    payload[0] = 0x3F;
    payload[1] = 0x41;
    let mut wire = BytesMut::new();
    encode_frame(&payload, ChecksumMode::Escaped, &mut wire);
    std::fs::write(&capture, &wire).expect("capture should be writable");

    let output = Command::new(env!("CARGO_BIN_EXE_firegrid"))
        .args(["--log-level", "error", "--format", "json", "monitor"])
        .arg(&capture)
        .arg("--escape-checksum")
        .output()
        .expect("monitor should run");
    assert_eq!(output.status.code(), Some(0));

    let stdout = String::from_utf8_lossy(&output.stdout);
    let json: serde_json::Value = serde_json::from_str(stdout.lines().next().unwrap()).unwrap();
    assert_eq!(json["checksum"].as_u64(), Some(0x7E));

    let _ = std::fs::remove_dir_all(dir);
}
