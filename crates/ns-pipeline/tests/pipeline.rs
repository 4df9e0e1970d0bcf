//! End-to-end pipeline tests driven by a scripted packet source.

use std::sync::atomic::{AtomicUsize, Ordering};
use std::sync::{Arc, Mutex};
use std::time::{Duration, Instant};

use chrono::Utc;
use ns_capture::{BatchResult, CaptureError, PacketSource, RawFrame};
use ns_dissect::Protocol;
use ns_pipeline::{
    CaptureController, CaptureObserver, CaptureState, CaptureStats, ErrorKind, PacketRecord,
    SamplingMode,
};

/// Scripted source: serves pre-built frames in one batch, then idles (or
/// fails, when constructed with an error).
struct ScriptedSource {
    frames: Vec<RawFrame>,
    served: bool,
    fail_after: Option<CaptureError>,
    closed: bool,
}

impl ScriptedSource {
    fn new(frames: Vec<Vec<u8>>) -> Self {
        ScriptedSource {
            frames: frames
                .into_iter()
                .map(|data| {
                    let wire_length = data.len() as u32;
                    RawFrame::new(Utc::now(), wire_length, data)
                })
                .collect(),
            served: false,
            fail_after: None,
            closed: false,
        }
    }

    fn failing(frames: Vec<Vec<u8>>, error: CaptureError) -> Self {
        let mut source = Self::new(frames);
        source.fail_after = Some(error);
        source
    }
}

impl PacketSource for ScriptedSource {
    fn poll_batch(&mut self, max_frames: usize) -> BatchResult {
        if self.closed {
            return BatchResult::Eof;
        }
        if !self.served {
            self.served = true;
            let take = self.frames.len().min(max_frames);
            return BatchResult::Frames(self.frames.drain(..take).collect());
        }
        if let Some(error) = self.fail_after.take() {
            return BatchResult::Error(error);
        }
        std::thread::sleep(Duration::from_millis(1));
        BatchResult::Frames(Vec::new())
    }

    fn set_filter(&mut self, _expression: &str) -> Result<(), CaptureError> {
        Ok(())
    }

    fn close(&mut self) {
        self.closed = true;
    }
}

/// Observer that records everything it sees.
#[derive(Default)]
struct Recorder {
    packets: Mutex<Vec<PacketRecord>>,
    states: Mutex<Vec<CaptureState>>,
    errors: Mutex<Vec<(ErrorKind, String)>>,
    stats: Mutex<Vec<CaptureStats>>,
    sampling_events: AtomicUsize,
    backpressure_events: AtomicUsize,
}

impl CaptureObserver for Recorder {
    fn on_packets(&self, packets: &[PacketRecord]) {
        self.packets.lock().unwrap().extend_from_slice(packets);
    }

    fn on_status(&self, state: CaptureState) {
        self.states.lock().unwrap().push(state);
    }

    fn on_stats(&self, stats: &CaptureStats) {
        self.stats.lock().unwrap().push(stats.clone());
    }

    fn on_error(&self, kind: ErrorKind, message: &str) {
        self.errors.lock().unwrap().push((kind, message.to_string()));
    }

    fn on_sampling_active(&self) {
        self.sampling_events.fetch_add(1, Ordering::Relaxed);
    }

    fn on_backpressure(&self) {
        self.backpressure_events.fetch_add(1, Ordering::Relaxed);
    }
}

impl Recorder {
    fn wait_for_packets(&self, count: usize) {
        let deadline = Instant::now() + Duration::from_secs(2);
        while Instant::now() < deadline {
            if self.packets.lock().unwrap().len() >= count {
                return;
            }
            std::thread::sleep(Duration::from_millis(5));
        }
    }
}

fn tcp_syn_frame() -> Vec<u8> {
    vec![
        0xff, 0xff, 0xff, 0xff, 0xff, 0xff, 0x00, 0x11, 0x22, 0x33, 0x44, 0x55, 0x08, 0x00, 0x45,
        0x00, 0x00, 0x28, 0x00, 0x01, 0x00, 0x00, 0x40, 0x06, 0xb8, 0x6e, 0x0a, 0x00, 0x00, 0x01,
        0x0a, 0x00, 0x00, 0x02, 0x12, 0x34, 0x00, 0x50, 0x00, 0x00, 0x00, 0x00, 0x00, 0x00, 0x00,
        0x00, 0x50, 0x02, 0xff, 0xff, 0x00, 0x00, 0x00, 0x00,
    ]
}

fn arp_request_frame() -> Vec<u8> {
    let mut frame = vec![
        0xff, 0xff, 0xff, 0xff, 0xff, 0xff, 0x00, 0x11, 0x22, 0x33, 0x44, 0x55, 0x08, 0x06,
    ];
    frame.extend_from_slice(&[0x00, 0x01, 0x08, 0x00, 0x06, 0x04, 0x00, 0x01]);
    frame.extend_from_slice(&[0x00, 0x11, 0x22, 0x33, 0x44, 0x55]);
    frame.extend_from_slice(&[192, 168, 1, 2]);
    frame.extend_from_slice(&[0x00; 6]);
    frame.extend_from_slice(&[192, 168, 1, 1]);
    frame
}

fn udp_frame(src_mac: [u8; 6], src_port: u16, dst_port: u16, payload: &[u8]) -> Vec<u8> {
    let mut frame = vec![0xff, 0xff, 0xff, 0xff, 0xff, 0xff];
    frame.extend_from_slice(&src_mac);
    frame.extend_from_slice(&[0x08, 0x00]);
    let total_len = 20 + 8 + payload.len();
    frame.extend_from_slice(&[0x45, 0x00]);
    frame.extend_from_slice(&(total_len as u16).to_be_bytes());
    frame.extend_from_slice(&[0x00, 0x01, 0x00, 0x00, 0x40, 0x11, 0x00, 0x00]);
    frame.extend_from_slice(&[10, 0, 0, 1, 10, 0, 0, 2]);
    frame.extend_from_slice(&src_port.to_be_bytes());
    frame.extend_from_slice(&dst_port.to_be_bytes());
    frame.extend_from_slice(&((8 + payload.len()) as u16).to_be_bytes());
    frame.extend_from_slice(&[0x00, 0x00]);
    frame.extend_from_slice(payload);
    frame
}

fn dns_query_payload() -> Vec<u8> {
    let mut dns = vec![0x12, 0x34, 0x01, 0x00, 0x00, 0x01, 0, 0, 0, 0, 0, 0];
    for label in ["example", "com"] {
        dns.push(label.len() as u8);
        dns.extend_from_slice(label.as_bytes());
    }
    dns.extend_from_slice(&[0, 0x00, 0x01, 0x00, 0x01]);
    dns
}

fn tcp_frame_with_payload(src_port: u16, dst_port: u16, payload: &[u8]) -> Vec<u8> {
    let mut frame = vec![
        0xff, 0xff, 0xff, 0xff, 0xff, 0xff, 0x00, 0x11, 0x22, 0x33, 0x44, 0x55, 0x08, 0x00,
    ];
    let total_len = 20 + 20 + payload.len();
    frame.extend_from_slice(&[0x45, 0x00]);
    frame.extend_from_slice(&(total_len as u16).to_be_bytes());
    frame.extend_from_slice(&[0x00, 0x01, 0x00, 0x00, 0x40, 0x06, 0x00, 0x00]);
    frame.extend_from_slice(&[10, 0, 0, 1, 10, 0, 0, 2]);
    frame.extend_from_slice(&src_port.to_be_bytes());
    frame.extend_from_slice(&dst_port.to_be_bytes());
    frame.extend_from_slice(&[0, 0, 0, 1, 0, 0, 0, 0]); // seq, ack
    frame.extend_from_slice(&[0x50, 0x18, 0xff, 0xff, 0x00, 0x00, 0x00, 0x00]);
    frame.extend_from_slice(payload);
    frame
}

fn quic_initial_payload() -> Vec<u8> {
    let mut payload = vec![
        0xc0, 0x00, 0x00, 0x00, 0x01, // long header Initial, version 1
        0x08, 0x01, 0x02, 0x03, 0x04, 0x05, 0x06, 0x07, 0x08, // DCID
        0x08, 0x11, 0x12, 0x13, 0x14, 0x15, 0x16, 0x17, 0x18, // SCID
        0x00, // token length
        0x20, // length varint (32)
        0x2a, // packet number
    ];
    payload.extend_from_slice(&[0u8; 31]);
    payload
}

/// Start a session over scripted frames. The controller must stay alive
/// while the test observes; dropping it stops the worker.
fn run_session(
    frames: Vec<Vec<u8>>,
    configure: impl FnOnce(&CaptureController),
) -> (CaptureController, Arc<Recorder>) {
    let controller = CaptureController::new();
    let recorder = Arc::new(Recorder::default());
    controller.add_observer(recorder.clone());
    configure(&controller);
    controller
        .start_with_source(Box::new(ScriptedSource::new(frames)))
        .unwrap();
    (controller, recorder)
}

#[test]
fn test_scenario_tcp_syn() {
    let (_controller, recorder) = run_session(vec![tcp_syn_frame()], |_| {});
    recorder.wait_for_packets(1);

    let packets = recorder.packets.lock().unwrap();
    assert_eq!(packets.len(), 1);
    let p = &packets[0];
    assert_eq!(p.top_protocol, Protocol::Tcp);
    assert_eq!(p.src_addr, "10.0.0.1");
    assert_eq!(p.dst_addr, "10.0.0.2");
    assert_eq!(p.summary_line, "SYN 10.0.0.1:4660 → 10.0.0.2:80 [HTTP]");
    let tags: Vec<Protocol> = p.layers.iter().map(|l| l.protocol).collect();
    assert_eq!(tags, vec![Protocol::Ethernet, Protocol::Ipv4, Protocol::Tcp]);
    assert_eq!(p.captured_length as usize, p.raw.len());
}

#[test]
fn test_scenario_dns_query() {
    let frame = udp_frame([0, 1, 2, 3, 4, 5], 54321, 53, &dns_query_payload());
    let (_controller, recorder) = run_session(vec![frame], |_| {});
    recorder.wait_for_packets(1);

    let packets = recorder.packets.lock().unwrap();
    assert_eq!(packets[0].summary_line, "DNS Query: 1 question(s)");
    let dns = packets[0].layers.last().unwrap();
    assert_eq!(dns.protocol, Protocol::Dns);
    assert_eq!(dns.field("Transaction ID"), Some("0x1234"));
    assert_eq!(dns.field("Query Name"), Some("example.com"));
    assert_eq!(dns.field("Query Type"), Some("1 (A)"));
}

#[test]
fn test_scenario_arp_request() {
    let (_controller, recorder) = run_session(vec![arp_request_frame()], |_| {});
    recorder.wait_for_packets(1);

    let packets = recorder.packets.lock().unwrap();
    assert_eq!(
        packets[0].summary_line,
        "ARP Request: Who has 192.168.1.1? Tell 192.168.1.2"
    );
    assert_eq!(packets[0].top_protocol, Protocol::Arp);
}

#[test]
fn test_scenario_tls_client_hello() {
    // ClientHello with SNI example.org and RC4 cipher 0x0005
    let host = b"example.org";
    let mut sni_body = Vec::new();
    sni_body.extend_from_slice(&((host.len() + 3) as u16).to_be_bytes());
    sni_body.push(0);
    sni_body.extend_from_slice(&(host.len() as u16).to_be_bytes());
    sni_body.extend_from_slice(host);

    let mut extensions = Vec::new();
    extensions.extend_from_slice(&0u16.to_be_bytes());
    extensions.extend_from_slice(&(sni_body.len() as u16).to_be_bytes());
    extensions.extend_from_slice(&sni_body);

    let mut hello = Vec::new();
    hello.extend_from_slice(&0x0303u16.to_be_bytes());
    hello.extend_from_slice(&[0xab; 32]);
    hello.push(0);
    hello.extend_from_slice(&4u16.to_be_bytes()); // two cipher suites
    hello.extend_from_slice(&0xc02fu16.to_be_bytes());
    hello.extend_from_slice(&0x0005u16.to_be_bytes());
    hello.push(1);
    hello.push(0);
    hello.extend_from_slice(&(extensions.len() as u16).to_be_bytes());
    hello.extend_from_slice(&extensions);

    let mut handshake = vec![1u8]; // ClientHello
    let len = hello.len();
    handshake.extend_from_slice(&[(len >> 16) as u8, (len >> 8) as u8, len as u8]);
    handshake.extend_from_slice(&hello);

    let mut record = vec![22u8, 0x03, 0x01];
    record.extend_from_slice(&(handshake.len() as u16).to_be_bytes());
    record.extend_from_slice(&handshake);

    let frame = tcp_frame_with_payload(50000, 443, &record);
    let (_controller, recorder) = run_session(vec![frame], |_| {});
    recorder.wait_for_packets(1);

    let packets = recorder.packets.lock().unwrap();
    let tls = packets[0].layers.last().unwrap();
    assert_eq!(tls.protocol, Protocol::Tls);
    assert_eq!(tls.field("SNI"), Some("example.org"));
    assert!(tls.warnings.contains(&"weak_cipher: 0x0005".to_string()));
}

#[test]
fn test_scenario_quic_initial() {
    let frame = udp_frame([0, 1, 2, 3, 4, 5], 51000, 8443, &quic_initial_payload());
    let (_controller, recorder) = run_session(vec![frame], |_| {});
    recorder.wait_for_packets(1);

    let packets = recorder.packets.lock().unwrap();
    let quic = packets[0].layers.last().unwrap();
    assert_eq!(quic.protocol, Protocol::Quic);
    assert_eq!(quic.field("Packet Type"), Some("Initial"));
    assert_eq!(quic.field("Version"), Some("0x00000001 (QUIC v1 (RFC 9000))"));
    assert_eq!(quic.field("DCID Length"), Some("8"));
    assert_eq!(quic.field("SCID Length"), Some("8"));
}

#[test]
fn test_scenario_sampling_every_nth() {
    let frames: Vec<Vec<u8>> = (0..10).map(|_| tcp_syn_frame()).collect();
    let (_controller, recorder) = run_session(frames, |controller| {
        controller.set_sampling(SamplingMode::EveryNth(3)).unwrap();
    });
    recorder.wait_for_packets(3);
    // Give stats a moment to settle
    std::thread::sleep(Duration::from_millis(50));

    let packets = recorder.packets.lock().unwrap();
    let serials: Vec<u64> = packets.iter().map(|p| p.serial).collect();
    assert_eq!(serials, vec![3, 6, 9]);
    assert_eq!(recorder.sampling_events.load(Ordering::Relaxed), 1);
}

#[test]
fn test_serials_strictly_increase() {
    let frames: Vec<Vec<u8>> = (0..50).map(|_| tcp_syn_frame()).collect();
    let (_controller, recorder) = run_session(frames, |_| {});
    recorder.wait_for_packets(50);

    let packets = recorder.packets.lock().unwrap();
    assert_eq!(packets.len(), 50);
    for pair in packets.windows(2) {
        assert!(pair[0].serial < pair[1].serial);
    }
}

#[test]
fn test_spoof_filter_keeps_only_targets() {
    let target_mac = [0xaa, 0xbb, 0xcc, 0x00, 0x00, 0x01];
    let other_mac = [0x11, 0x22, 0x33, 0x00, 0x00, 0x02];
    let dns = dns_query_payload();
    let frames = vec![
        udp_frame(target_mac, 1111, 53, &dns),
        udp_frame(other_mac, 2222, 53, &dns),
        udp_frame(target_mac, 3333, 53, &dns),
    ];

    let (_controller, recorder) = run_session(frames, |controller| {
        controller
            .set_spoof_mode(true, &["aa:bb:cc:00:00:01".to_string()])
            .unwrap();
    });
    recorder.wait_for_packets(2);
    std::thread::sleep(Duration::from_millis(50));

    let packets = recorder.packets.lock().unwrap();
    assert_eq!(packets.len(), 2);
    // Source MACs on the surviving packets are the target (lowercase form
    // in the layer record).
    for p in packets.iter() {
        assert_eq!(p.layers[0].field("Source MAC"), Some("aa:bb:cc:00:00:01"));
    }
}

#[test]
fn test_bytes_received_matches_emitted_wire_lengths() {
    let frames = vec![tcp_syn_frame(), arp_request_frame(), tcp_syn_frame()];
    let expected: u64 = frames.iter().map(|f| f.len() as u64).sum();

    let controller = CaptureController::new();
    let recorder = Arc::new(Recorder::default());
    controller.add_observer(recorder.clone());
    controller
        .start_with_source(Box::new(ScriptedSource::new(frames)))
        .unwrap();
    recorder.wait_for_packets(3);

    let stats = controller.current_stats();
    assert_eq!(stats.packets_received, 3);
    let sum: u64 = recorder
        .packets
        .lock()
        .unwrap()
        .iter()
        .map(|p| p.wire_length as u64)
        .sum();
    assert_eq!(sum, expected);
    assert_eq!(stats.bytes_received, sum);
    controller.stop().unwrap();
}

#[test]
fn test_empty_frame_dropped_and_counted() {
    let controller = CaptureController::new();
    let recorder = Arc::new(Recorder::default());
    controller.add_observer(recorder.clone());
    controller
        .start_with_source(Box::new(ScriptedSource::new(vec![
            Vec::new(),
            tcp_syn_frame(),
        ])))
        .unwrap();
    recorder.wait_for_packets(1);

    let stats = controller.current_stats();
    assert_eq!(stats.packets_received, 2);
    assert_eq!(stats.packets_dropped, 1);
    assert_eq!(recorder.packets.lock().unwrap().len(), 1);
    controller.stop().unwrap();
}

#[test]
fn test_short_frame_dropped() {
    // 10 bytes: below the Ethernet header, no record may be emitted.
    let controller = CaptureController::new();
    let recorder = Arc::new(Recorder::default());
    controller.add_observer(recorder.clone());
    controller
        .start_with_source(Box::new(ScriptedSource::new(vec![
            vec![0xff; 10],
            tcp_syn_frame(),
        ])))
        .unwrap();
    recorder.wait_for_packets(1);

    let packets = recorder.packets.lock().unwrap();
    assert_eq!(packets.len(), 1);
    assert_eq!(packets[0].top_protocol, Protocol::Tcp);
    assert_eq!(controller.current_stats().packets_dropped, 1);
    controller.stop().unwrap();
}

#[test]
fn test_ftp_redaction_end_to_end() {
    let frame = tcp_frame_with_payload(49152, 21, b"USER alice\r\nPASS hunter2\r\n");
    let (_controller, recorder) = run_session(vec![frame], |_| {});
    recorder.wait_for_packets(1);

    let packets = recorder.packets.lock().unwrap();
    let ftp = packets[0].layers.last().unwrap();
    assert_eq!(ftp.protocol, Protocol::Ftp);
    assert!(!ftp.fields.iter().any(|f| f.value.contains("hunter2")));
    assert!(ftp.fields.iter().any(|f| f.value.contains("<redacted>")));
}

#[test]
fn test_state_machine_transitions() {
    let controller = CaptureController::new();
    let recorder = Arc::new(Recorder::default());
    controller.add_observer(recorder.clone());

    assert_eq!(controller.state(), CaptureState::Stopped);
    assert!(controller.pause().is_err());

    controller
        .start_with_source(Box::new(ScriptedSource::new(vec![])))
        .unwrap();
    assert_eq!(controller.state(), CaptureState::Capturing);
    assert!(controller
        .start_with_source(Box::new(ScriptedSource::new(vec![])))
        .is_err());

    controller.pause().unwrap();
    assert_eq!(controller.state(), CaptureState::Paused);
    assert!(controller.pause().is_err());
    controller.resume().unwrap();
    assert_eq!(controller.state(), CaptureState::Capturing);

    controller.stop().unwrap();
    assert_eq!(controller.state(), CaptureState::Stopped);
    // Idempotent
    controller.stop().unwrap();

    let states = recorder.states.lock().unwrap();
    assert_eq!(
        *states,
        vec![
            CaptureState::Capturing,
            CaptureState::Paused,
            CaptureState::Capturing,
            CaptureState::Stopped,
        ]
    );
}

#[test]
fn test_runtime_error_enters_error_state() {
    let controller = CaptureController::new();
    let recorder = Arc::new(Recorder::default());
    controller.add_observer(recorder.clone());
    controller
        .start_with_source(Box::new(ScriptedSource::failing(
            vec![tcp_syn_frame()],
            CaptureError::Read("device vanished".to_string()),
        )))
        .unwrap();

    let deadline = Instant::now() + Duration::from_secs(2);
    while controller.state() != CaptureState::Error && Instant::now() < deadline {
        std::thread::sleep(Duration::from_millis(5));
    }
    assert_eq!(controller.state(), CaptureState::Error);

    let errors = recorder.errors.lock().unwrap();
    assert!(errors
        .iter()
        .any(|(kind, msg)| *kind == ErrorKind::Runtime && msg.contains("device vanished")));
    drop(errors);

    // A new start is rejected until the error is acknowledged by stop().
    assert!(controller
        .start_with_source(Box::new(ScriptedSource::new(vec![])))
        .is_err());
    controller.stop().unwrap();
    assert_eq!(controller.state(), CaptureState::Stopped);
    controller
        .start_with_source(Box::new(ScriptedSource::new(vec![])))
        .unwrap();
    controller.stop().unwrap();
}

#[test]
fn test_pause_discards_delivery_but_keeps_counting() {
    let controller = CaptureController::new();
    let recorder = Arc::new(Recorder::default());
    controller.add_observer(recorder.clone());

    // Pause before any packets flow, then feed frames.
    controller
        .start_with_source(Box::new(ScriptedSourceDelayed::new(vec![
            tcp_syn_frame(),
            tcp_syn_frame(),
        ])))
        .unwrap();
    controller.pause().unwrap();
    std::thread::sleep(Duration::from_millis(300));

    assert!(recorder.packets.lock().unwrap().is_empty());
    assert_eq!(controller.current_stats().packets_received, 2);
    controller.stop().unwrap();
}

/// Serves its frames only after a short delay, so tests can pause first.
struct ScriptedSourceDelayed {
    inner: ScriptedSource,
    armed_at: Instant,
}

impl ScriptedSourceDelayed {
    fn new(frames: Vec<Vec<u8>>) -> Self {
        ScriptedSourceDelayed {
            inner: ScriptedSource::new(frames),
            armed_at: Instant::now() + Duration::from_millis(100),
        }
    }
}

impl PacketSource for ScriptedSourceDelayed {
    fn poll_batch(&mut self, max_frames: usize) -> BatchResult {
        if Instant::now() < self.armed_at {
            std::thread::sleep(Duration::from_millis(1));
            return BatchResult::Frames(Vec::new());
        }
        self.inner.poll_batch(max_frames)
    }

    fn set_filter(&mut self, expression: &str) -> Result<(), CaptureError> {
        self.inner.set_filter(expression)
    }

    fn close(&mut self) {
        self.inner.close();
    }
}

#[test]
fn test_ring_buffer_bounded() {
    let frames: Vec<Vec<u8>> = (0..20).map(|_| tcp_syn_frame()).collect();
    let controller = CaptureController::new();
    let recorder = Arc::new(Recorder::default());
    controller.add_observer(recorder.clone());
    controller.set_ring_buffer_size(8).unwrap();
    controller
        .start_with_source(Box::new(ScriptedSource::new(frames)))
        .unwrap();
    recorder.wait_for_packets(20);

    assert_eq!(controller.ring_buffer_len(), 8);
    controller.stop().unwrap();
}

#[test]
fn test_configuration_validation() {
    let controller = CaptureController::new();

    assert!(controller.set_interface("eth0").is_ok());
    assert!(controller.set_interface("bad iface!").is_err());

    assert!(controller
        .set_spoof_mode(true, &["not-a-mac".to_string()])
        .is_err());
    assert!(controller
        .set_spoof_mode(true, &["aa:bb:cc:dd:ee:ff".to_string()])
        .is_ok());
    assert_eq!(controller.config().spoof_targets, vec!["AA:BB:CC:DD:EE:FF"]);
    assert!(controller.set_spoof_mode(false, &[]).is_ok());
    assert!(controller.config().spoof_targets.is_empty());

    assert!(controller.set_sampling(SamplingMode::EveryNth(0)).is_err());
    assert!(controller.set_sampling(SamplingMode::TargetRate(0)).is_err());
    assert!(controller.set_sampling(SamplingMode::EveryNth(5)).is_ok());

    // Interface changes are rejected while capturing.
    controller
        .start_with_source(Box::new(ScriptedSource::new(vec![])))
        .unwrap();
    assert!(controller.set_interface("eth1").is_err());
    controller.stop().unwrap();
}

/// Serves one frame per poll so the worker emits many small batches.
struct DrippingSource {
    remaining: usize,
}

impl PacketSource for DrippingSource {
    fn poll_batch(&mut self, _max_frames: usize) -> BatchResult {
        if self.remaining == 0 {
            std::thread::sleep(Duration::from_millis(1));
            return BatchResult::Frames(Vec::new());
        }
        self.remaining -= 1;
        let data = tcp_syn_frame();
        let wire_length = data.len() as u32;
        BatchResult::Frames(vec![RawFrame::new(Utc::now(), wire_length, data)])
    }

    fn set_filter(&mut self, _expression: &str) -> Result<(), CaptureError> {
        Ok(())
    }

    fn close(&mut self) {}
}

/// Observer slow enough to fill the bounded channel behind it.
struct SlowObserver(Arc<Recorder>);

impl CaptureObserver for SlowObserver {
    fn on_packets(&self, packets: &[PacketRecord]) {
        std::thread::sleep(Duration::from_millis(5));
        self.0.on_packets(packets);
    }

    fn on_status(&self, state: CaptureState) {
        self.0.on_status(state);
    }

    fn on_stats(&self, stats: &CaptureStats) {
        self.0.on_stats(stats);
    }

    fn on_error(&self, kind: ErrorKind, message: &str) {
        self.0.on_error(kind, message);
    }

    fn on_backpressure(&self) {
        self.0.on_backpressure();
    }
}

#[test]
fn test_backpressure_signal_under_slow_observer() {
    let controller = CaptureController::new();
    let recorder = Arc::new(Recorder::default());
    controller.add_observer(Arc::new(SlowObserver(recorder.clone())));
    controller
        .start_with_source(Box::new(DrippingSource { remaining: 300 }))
        .unwrap();

    let deadline = Instant::now() + Duration::from_secs(10);
    while recorder.backpressure_events.load(Ordering::Relaxed) == 0 && Instant::now() < deadline {
        std::thread::sleep(Duration::from_millis(10));
    }
    assert!(recorder.backpressure_events.load(Ordering::Relaxed) >= 1);

    controller.stop().unwrap();
    // Ordering survives the throttling.
    let packets = recorder.packets.lock().unwrap();
    for pair in packets.windows(2) {
        assert!(pair[0].serial < pair[1].serial);
    }
}
