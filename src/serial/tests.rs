use super::framer::{read_frame, unwrap, wrap, FrameKind, VALUE_SENTINEL};
use super::transport::normalize_command;
use super::{select_serial_port, ConnectionState, SerialLink, SerialPortDescriptor, Transport};
use crate::error::{DeviceKind, HarnessError};
use std::collections::VecDeque;
use std::io::{self, ErrorKind, Read, Write};
use std::sync::{Arc, Mutex};

/// Reader that hands out its bytes and then times out, like a quiet port.
struct QuietAfter {
    bytes: VecDeque<u8>,
}

impl QuietAfter {
    fn new(bytes: &[u8]) -> Self {
        Self {
            bytes: bytes.iter().copied().collect(),
        }
    }
}

impl Read for QuietAfter {
    fn read(&mut self, buf: &mut [u8]) -> io::Result<usize> {
        match self.bytes.pop_front() {
            Some(byte) if !buf.is_empty() => {
                buf[0] = byte;
                Ok(1)
            }
            Some(byte) => {
                self.bytes.push_front(byte);
                Ok(0)
            }
            None => Err(io::Error::new(ErrorKind::TimedOut, "read timed out")),
        }
    }
}

#[derive(Default)]
struct DeviceState {
    app: String,
    outbound: VecDeque<u8>,
    written: Vec<u8>,
    pending_line: Vec<u8>,
    clears: usize,
}

impl DeviceState {
    fn reply(&mut self, text: &str) {
        self.outbound.extend(text.as_bytes());
        self.outbound.extend(b"\r\n");
    }

    fn handle(&mut self, line: &str) {
        let line = line.trim_end_matches(['\r', '\n']);
        if line == "version" {
            self.reply(&wrap("1.2.0"));
        } else if line == "get-app" {
            let app = self.app.clone();
            self.reply(&wrap(&app));
        } else if let Some(app) = line.strip_prefix("set-app ") {
            self.app = app.to_string();
        } else if let Some(text) = line.strip_prefix("echo ") {
            self.reply(text);
        } else if line == "half-value" {
            self.outbound.extend(b"::val::1.2");
        } else {
            self.reply("ERR unknown command");
        }
    }
}

/// In-memory stand-in for the synthesizer's USB serial port.
#[derive(Clone, Default)]
struct ScriptedDevice {
    state: Arc<Mutex<DeviceState>>,
}

impl ScriptedDevice {
    fn new(app: &str) -> Self {
        let device = Self::default();
        device.state.lock().unwrap().app = app.to_string();
        device
    }

    fn preload(&self, bytes: &[u8]) {
        self.state.lock().unwrap().outbound.extend(bytes);
    }

    fn written(&self) -> String {
        String::from_utf8(self.state.lock().unwrap().written.clone()).unwrap()
    }

    fn clears(&self) -> usize {
        self.state.lock().unwrap().clears
    }

    fn link(&self) -> Box<dyn SerialLink> {
        Box::new(self.clone())
    }
}

impl Read for ScriptedDevice {
    fn read(&mut self, buf: &mut [u8]) -> io::Result<usize> {
        let mut state = self.state.lock().unwrap();
        let mut n = 0;
        while n < buf.len() {
            match state.outbound.pop_front() {
                Some(byte) => {
                    buf[n] = byte;
                    n += 1;
                }
                None => break,
            }
        }
        if n == 0 {
            return Err(io::Error::new(ErrorKind::TimedOut, "read timed out"));
        }
        Ok(n)
    }
}

impl Write for ScriptedDevice {
    fn write(&mut self, buf: &[u8]) -> io::Result<usize> {
        let mut state = self.state.lock().unwrap();
        state.written.extend_from_slice(buf);
        for byte in buf {
            state.pending_line.push(*byte);
            if *byte == b'\n' {
                let line = String::from_utf8_lossy(&state.pending_line).to_string();
                state.pending_line.clear();
                state.handle(&line);
            }
        }
        Ok(buf.len())
    }

    fn flush(&mut self) -> io::Result<()> {
        Ok(())
    }
}

impl SerialLink for ScriptedDevice {
    fn clear_input(&mut self) -> io::Result<()> {
        let mut state = self.state.lock().unwrap();
        state.outbound.clear();
        state.clears += 1;
        Ok(())
    }
}

fn ports(descriptions: &[(&str, &str)]) -> Vec<SerialPortDescriptor> {
    descriptions
        .iter()
        .map(|(name, description)| SerialPortDescriptor::new(*name, *description))
        .collect()
}

fn connected(device: &ScriptedDevice) -> Transport {
    let mut transport = Transport::new();
    let link = device.link();
    transport
        .connect_to(
            &ports(&[("/dev/ttyACM0", "16bit USB Serial")]),
            "16bit",
            move |_| Ok(link),
        )
        .expect("connect to scripted device");
    transport
}

#[test]
fn wrap_matches_device_format() {
    assert_eq!(wrap("1.2.0"), "::val::1.2.0::val::");
    assert_eq!(VALUE_SENTINEL.len(), 7);
}

#[test]
fn unwrap_extracts_payload_only_from_tagged_text() {
    assert_eq!(unwrap("::val::fxrack::val::"), Some("fxrack"));
    assert_eq!(unwrap("::val::::val::"), Some(""));
    assert_eq!(unwrap("fxrack"), None);
    assert_eq!(unwrap("::val::1.2"), None);
}

#[test]
fn plain_lines_stop_at_first_terminator() {
    let cases: [(&[u8], &str); 4] = [
        (b"ok\n", "ok"),
        (b"ok\r\n", "ok"),
        (b"first\r\nsecond\n", "first"),
        (b"\n", ""),
    ];
    for (bytes, expected) in cases {
        let frame = read_frame(&mut QuietAfter::new(bytes)).unwrap();
        assert_eq!(frame.text, expected, "input {bytes:?}");
        assert_eq!(frame.kind, FrameKind::Line);
        assert!(!frame.text.ends_with(['\r', '\n']));
    }
}

#[test]
fn line_framing_leaves_following_bytes_unread() {
    let mut reader = QuietAfter::new(b"first\nsecond\n");
    assert_eq!(read_frame(&mut reader).unwrap().text, "first");
    assert_eq!(read_frame(&mut reader).unwrap().text, "second");
}

#[test]
fn wrapped_values_frame_back_unchanged() {
    for value in ["1.2.0", "", "polysynth", "multi\nline", "a:b", "ünïcode ✓"] {
        let wrapped = wrap(value);
        let frame = read_frame(&mut QuietAfter::new(wrapped.as_bytes())).unwrap();
        assert_eq!(frame.text, wrapped);
        assert_eq!(frame.kind, FrameKind::Tagged);
    }
}

#[test]
fn tagged_value_ignores_trailing_line_ending() {
    let mut reader = QuietAfter::new(b"::val::sampler::val::\r\nnext\n");
    let frame = read_frame(&mut reader).unwrap();
    assert_eq!(frame.text, "::val::sampler::val::");
    // The terminator after the closing sentinel is still in the stream.
    assert_eq!(read_frame(&mut reader).unwrap().text, "");
    assert_eq!(read_frame(&mut reader).unwrap().text, "next");
}

#[test]
fn tagged_value_with_end_of_stream_reader() {
    let bytes: &[u8] = b"::val::1.2.0::val::";
    let mut reader = bytes;
    let frame = read_frame(&mut reader).unwrap();
    assert_eq!(frame.text, "::val::1.2.0::val::");
}

#[test]
fn quiet_link_returns_partial_line() {
    let frame = read_frame(&mut QuietAfter::new(b"partial\r")).unwrap();
    assert_eq!(frame.text, "partial");
    assert_eq!(frame.kind, FrameKind::Partial { tagged: false });
    assert!(!frame.is_complete());
}

#[test]
fn silent_link_returns_empty_response() {
    let frame = read_frame(&mut QuietAfter::new(b"")).unwrap();
    assert_eq!(frame.text, "");
    assert_eq!(frame.kind, FrameKind::Partial { tagged: false });
}

#[test]
fn unterminated_tagged_value_is_flagged() {
    let frame = read_frame(&mut QuietAfter::new(b"::val::1.2\r\n")).unwrap();
    assert_eq!(frame.text, "::val::1.2");
    assert!(frame.is_truncated_value());
}

#[test]
fn invalid_bytes_are_dropped_while_framing() {
    let frame = read_frame(&mut QuietAfter::new(b"o\xFFk\n")).unwrap();
    assert_eq!(frame.text, "ok");
    assert_eq!(frame.kind, FrameKind::Line);
}

#[test]
fn non_timeout_errors_propagate() {
    struct Broken;
    impl Read for Broken {
        fn read(&mut self, _buf: &mut [u8]) -> io::Result<usize> {
            Err(io::Error::new(ErrorKind::BrokenPipe, "unplugged"))
        }
    }
    let err = read_frame(&mut Broken).unwrap_err();
    assert_eq!(err.kind(), ErrorKind::BrokenPipe);
}

#[test]
fn normalize_command_appends_single_terminator() {
    assert_eq!(normalize_command("version"), "version\n");
    assert_eq!(normalize_command("version\n"), "version\n");
    assert_eq!(normalize_command(""), "\n");
}

#[test]
fn selection_picks_first_matching_description() {
    let list = ports(&[
        ("/dev/ttyS0", "n/a"),
        ("/dev/ttyACM0", "16bit USB Serial"),
        ("/dev/ttyACM1", "16bit USB Serial (second)"),
    ]);
    let picked = select_serial_port(&list, "16bit").unwrap();
    assert_eq!(picked.port_name, "/dev/ttyACM0");
}

#[test]
fn selection_ignores_order_of_non_matching_ports() {
    let a = ports(&[
        ("/dev/ttyS0", "n/a"),
        ("/dev/ttyUSB0", "FT232R USB UART"),
        ("/dev/ttyACM0", "16bit USB Serial"),
    ]);
    let b = ports(&[
        ("/dev/ttyUSB0", "FT232R USB UART"),
        ("/dev/ttyACM0", "16bit USB Serial"),
        ("/dev/ttyS0", "n/a"),
    ]);
    assert_eq!(select_serial_port(&a, "16bit"), select_serial_port(&b, "16bit"));
}

#[test]
fn selection_is_case_sensitive() {
    let list = ports(&[("/dev/ttyACM0", "16BIT USB Serial")]);
    assert!(select_serial_port(&list, "16bit").is_none());
}

#[test]
fn discovers_device_and_reads_version() {
    let device = ScriptedDevice::new("polysynth");
    let mut transport = Transport::new();
    let link = device.link();
    transport
        .connect_to(
            &ports(&[("/dev/ttyACM0", "16bit USB Serial")]),
            "16bit",
            move |_| Ok(link),
        )
        .unwrap();

    assert_eq!(transport.state(), ConnectionState::Connected);
    assert_eq!(transport.port().unwrap().port_name, "/dev/ttyACM0");
    assert_eq!(transport.send_and_receive("version").unwrap(), wrap("1.2.0"));
}

#[test]
fn set_app_then_get_app_reports_each_app() {
    let device = ScriptedDevice::new("polysynth");
    let mut transport = connected(&device);
    for app in ["polysynth", "fxrack", "sampler"] {
        transport.send(&format!("set-app {app}")).unwrap();
        assert_eq!(transport.send_and_receive("get-app").unwrap(), wrap(app));
    }
}

#[test]
fn plain_line_responses_through_transport() {
    let device = ScriptedDevice::new("polysynth");
    let mut transport = connected(&device);
    assert_eq!(transport.send_and_receive("echo ready").unwrap(), "ready");
    assert_eq!(
        transport.send_and_receive("bogus").unwrap(),
        "ERR unknown command"
    );
}

#[test]
fn send_writes_one_terminated_line() {
    let device = ScriptedDevice::new("polysynth");
    let mut transport = connected(&device);
    transport.send("set-app fxrack").unwrap();
    transport.send("set-app sampler\n").unwrap();
    assert_eq!(device.written(), "set-app fxrack\nset-app sampler\n");
}

#[test]
fn send_and_receive_discards_stale_input() {
    let device = ScriptedDevice::new("polysynth");
    let mut transport = connected(&device);
    device.preload(b"stale boot banner\r\n");
    assert_eq!(transport.send_and_receive("version").unwrap(), wrap("1.2.0"));
    assert_eq!(device.clears(), 1);
}

#[test]
fn query_value_unwraps_payload() {
    let device = ScriptedDevice::new("sampler");
    let mut transport = connected(&device);
    assert_eq!(transport.query_value("get-app").unwrap(), "sampler");
}

#[test]
fn query_value_rejects_truncated_value() {
    let device = ScriptedDevice::new("sampler");
    let mut transport = connected(&device);
    match transport.query_value("half-value") {
        Err(HarnessError::IncompleteResponse { partial }) => assert_eq!(partial, "::val::1.2"),
        other => panic!("expected IncompleteResponse, got {other:?}"),
    }
    // The lenient call still hands back what arrived.
    assert_eq!(transport.send_and_receive("half-value").unwrap(), "::val::1.2");
}

#[test]
fn missing_port_fails_without_opening() {
    let mut transport = Transport::new();
    let err = transport
        .connect_to(
            &ports(&[("/dev/ttyS0", "n/a"), ("/dev/ttyUSB0", "FT232R USB UART")]),
            "16bit",
            |_| panic!("opener must not run when nothing matches"),
        )
        .unwrap_err();
    match err {
        HarnessError::DeviceNotFound { kind, filter, .. } => {
            assert_eq!(kind, DeviceKind::SerialPort);
            assert_eq!(filter, "16bit");
        }
        other => panic!("expected DeviceNotFound, got {other:?}"),
    }
    assert!(!transport.is_connected());
    assert_eq!(transport.state(), ConnectionState::Disconnected);
}

#[test]
fn open_failure_marks_connection_failed() {
    let mut transport = Transport::new();
    let err = transport
        .connect_to(
            &ports(&[("/dev/ttyACM0", "16bit USB Serial")]),
            "16bit",
            |_| Err(HarnessError::Io(io::Error::new(ErrorKind::PermissionDenied, "busy"))),
        )
        .unwrap_err();
    match err {
        HarnessError::ConnectionError { device, reason, .. } => {
            assert_eq!(device, "/dev/ttyACM0");
            assert!(reason.contains("busy"));
        }
        other => panic!("expected ConnectionError, got {other:?}"),
    }
    assert_eq!(transport.state(), ConnectionState::Failed);
    assert!(matches!(
        transport.send("version"),
        Err(HarnessError::NotConnected)
    ));
}

#[test]
fn operations_require_open_connection() {
    let mut transport = Transport::new();
    assert!(matches!(transport.send("version"), Err(HarnessError::NotConnected)));
    assert!(matches!(
        transport.send_and_receive("version"),
        Err(HarnessError::NotConnected)
    ));
    assert!(matches!(
        transport.query_value("version"),
        Err(HarnessError::NotConnected)
    ));
}

#[test]
fn close_is_idempotent() {
    let device = ScriptedDevice::new("polysynth");
    let mut transport = connected(&device);
    transport.close();
    transport.close();
    assert!(!transport.is_connected());
    assert_eq!(transport.state(), ConnectionState::Disconnected);
    assert!(matches!(transport.send("version"), Err(HarnessError::NotConnected)));
}

#[test]
fn with_link_starts_connected() {
    let device = ScriptedDevice::new("fxrack");
    let mut transport = Transport::with_link(device.link());
    assert_eq!(transport.state(), ConnectionState::Connected);
    assert_eq!(transport.send_and_receive("get-app").unwrap(), wrap("fxrack"));
}
