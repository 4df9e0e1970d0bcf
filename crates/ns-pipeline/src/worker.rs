//! Pipeline worker: polls the capture source in bounded batches, applies
//! the spoof filter and sampling policy, dissects, and emits record
//! batches through a bounded channel with adaptive backpressure.

use std::collections::VecDeque;
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::mpsc::{Sender, SyncSender, TrySendError};
use std::sync::{Arc, Mutex};
use std::thread;
use std::time::{Duration, Instant};

use ns_capture::{BatchResult, CaptureError, PacketSource};
use ns_dissect::{info, registry};

use crate::config::{CaptureConfig, SamplingMode};
use crate::record::PacketRecord;
use crate::stats::Counters;

/// Frames requested from the source per poll.
pub(crate) const POLL_BATCH_SIZE: usize = 500;

/// Bounded record-batch channel capacity.
pub(crate) const DATA_CHANNEL_CAPACITY: usize = 64;

/// Backpressure delay ceiling.
const BACKPRESSURE_CEILING_MS: u64 = 250;

/// Rate-based sampling keeps packets while the session rate stays under
/// target * hysteresis.
const RATE_HYSTERESIS: f64 = 1.1;

/// Control-plane events from the worker, carried on an unbounded side
/// channel so they are never blocked by packet backpressure.
pub(crate) enum WorkerEvent {
    SamplingActive,
    Backpressure,
    FilterError(CaptureError),
    Fatal(CaptureError),
    Finished,
}

/// State shared between the controller and the worker thread.
pub(crate) struct WorkerShared {
    pub stop: AtomicBool,
    /// Worker-visible configuration; snapshotted once per loop iteration.
    pub config: Mutex<CaptureConfig>,
    pub counters: Arc<Counters>,
    /// Most recent raw frames, newest last. Bounded by the configured
    /// ring buffer size.
    pub ring: Mutex<VecDeque<Arc<[u8]>>>,
}

impl WorkerShared {
    pub fn new(config: CaptureConfig, counters: Arc<Counters>) -> Self {
        WorkerShared {
            stop: AtomicBool::new(false),
            config: Mutex::new(config),
            counters,
            ring: Mutex::new(VecDeque::new()),
        }
    }

    fn config_snapshot(&self) -> Option<CaptureConfig> {
        self.config.lock().ok().map(|c| c.clone())
    }
}

pub(crate) fn run(
    mut source: Box<dyn PacketSource>,
    shared: Arc<WorkerShared>,
    data_tx: SyncSender<Vec<PacketRecord>>,
    event_tx: Sender<WorkerEvent>,
) {
    log::info!("Capture worker started");

    let session_start = Instant::now();
    // Counts packets past the spoof filter; emitted records carry this
    // value as their serial.
    let mut filter_counter = 0u64;
    let mut emitted_count = 0u64;
    let mut sampling_signaled = false;

    let initial = shared.config_snapshot().unwrap_or_default();
    let mut applied_filter = initial.bpf_filter.clone();
    let mut delay_ms = initial.backpressure_delay_ms;

    while !shared.stop.load(Ordering::Relaxed) {
        let Some(config) = shared.config_snapshot() else {
            break;
        };

        // Live filter update, applied between batches.
        if config.bpf_filter != applied_filter {
            if let Err(e) = source.set_filter(&config.bpf_filter) {
                log::warn!("Filter update rejected: {}", e);
                let _ = event_tx.send(WorkerEvent::FilterError(e));
            }
            applied_filter = config.bpf_filter.clone();
        }

        let frames = match source.poll_batch(POLL_BATCH_SIZE) {
            BatchResult::Frames(frames) => frames,
            BatchResult::Eof => {
                log::info!("Capture source reached end of input");
                break;
            }
            BatchResult::Error(e) => {
                log::error!("Capture read failed: {}", e);
                let _ = event_tx.send(WorkerEvent::Fatal(e));
                break;
            }
        };

        let mut batch = Vec::new();

        for frame in frames {
            shared
                .counters
                .packets_received
                .fetch_add(1, Ordering::Relaxed);

            if frame.data.is_empty() {
                shared
                    .counters
                    .packets_dropped
                    .fetch_add(1, Ordering::Relaxed);
                continue;
            }

            if !config.spoof_targets.is_empty() && !spoof_match(&config.spoof_targets, &frame.data)
            {
                continue;
            }
            filter_counter += 1;

            let keep = match config.sampling {
                SamplingMode::None => true,
                SamplingMode::EveryNth(n) => n <= 1 || filter_counter % n == 0,
                SamplingMode::TargetRate(target) => {
                    let elapsed = session_start.elapsed().as_secs_f64().max(0.001);
                    (emitted_count as f64 / elapsed) < target as f64 * RATE_HYSTERESIS
                }
            };
            if !keep {
                if !sampling_signaled {
                    sampling_signaled = true;
                    let _ = event_tx.send(WorkerEvent::SamplingActive);
                }
                continue;
            }

            let timestamp = frame.timestamp;
            let wire_length = frame.wire_length;
            let raw: Arc<[u8]> = frame.data.into();

            if config.ring_buffer_size > 0 {
                if let Ok(mut ring) = shared.ring.lock() {
                    if ring.len() >= config.ring_buffer_size {
                        ring.pop_front();
                    }
                    ring.push_back(raw.clone());
                }
            }

            let outcome = match registry::dissect_frame(&raw) {
                Ok(outcome) => outcome,
                Err(_) => {
                    // Link layer unparseable; never emit a half-formed record.
                    shared
                        .counters
                        .packets_dropped
                        .fetch_add(1, Ordering::Relaxed);
                    log::debug!("Dropped frame with unparseable link layer");
                    continue;
                }
            };

            let summary_line = info::summary_line(
                outcome.top_protocol,
                &outcome.src_addr,
                &outcome.dst_addr,
                wire_length as usize,
                &raw,
            );

            shared
                .counters
                .bytes_received
                .fetch_add(wire_length as u64, Ordering::Relaxed);
            emitted_count += 1;

            batch.push(PacketRecord {
                serial: filter_counter,
                timestamp,
                wire_length,
                captured_length: raw.len() as u32,
                src_addr: outcome.src_addr,
                dst_addr: outcome.dst_addr,
                top_protocol: outcome.top_protocol,
                summary_line,
                layers: outcome.layers,
                raw,
            });
        }

        if !batch.is_empty()
            && !send_with_backpressure(&data_tx, batch, &mut delay_ms, &event_tx, &shared.stop)
        {
            break;
        }
    }

    source.close();
    let _ = event_tx.send(WorkerEvent::Finished);
    log::info!("Capture worker stopped");
}

/// Send a batch, throttling while the channel is full. The delay doubles
/// per full window up to a ceiling and halves back toward zero on success.
fn send_with_backpressure(
    data_tx: &SyncSender<Vec<PacketRecord>>,
    batch: Vec<PacketRecord>,
    delay_ms: &mut u64,
    event_tx: &Sender<WorkerEvent>,
    stop: &AtomicBool,
) -> bool {
    let mut pending = batch;
    let mut signaled = false;

    loop {
        match data_tx.try_send(pending) {
            Ok(()) => {
                *delay_ms /= 2;
                return true;
            }
            Err(TrySendError::Full(batch)) => {
                pending = batch;
                if !signaled {
                    signaled = true;
                    let _ = event_tx.send(WorkerEvent::Backpressure);
                }
                if stop.load(Ordering::Relaxed) {
                    return false;
                }
                thread::sleep(Duration::from_millis(*delay_ms));
                *delay_ms = (*delay_ms * 2).clamp(1, BACKPRESSURE_CEILING_MS);
            }
            Err(TrySendError::Disconnected(_)) => return false,
        }
    }
}

/// Keep a frame only when its source or destination MAC is in the target
/// set. Targets are uppercase colon form.
fn spoof_match(targets: &[String], data: &[u8]) -> bool {
    if data.len() < 14 {
        // Too short to read MACs; let the dissector account for it.
        return true;
    }
    let dst = mac_upper(&data[0..6]);
    let src = mac_upper(&data[6..12]);
    targets.iter().any(|t| *t == src || *t == dst)
}

fn mac_upper(bytes: &[u8]) -> String {
    bytes
        .iter()
        .map(|b| format!("{:02X}", b))
        .collect::<Vec<_>>()
        .join(":")
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_spoof_match_either_direction() {
        let mut frame = vec![0u8; 14];
        frame[0..6].copy_from_slice(&[0xaa, 0xbb, 0xcc, 0x00, 0x00, 0x01]); // dst
        frame[6..12].copy_from_slice(&[0xdd, 0xee, 0xff, 0x00, 0x00, 0x02]); // src

        let targets = vec!["AA:BB:CC:00:00:01".to_string()];
        assert!(spoof_match(&targets, &frame));

        let targets = vec!["DD:EE:FF:00:00:02".to_string()];
        assert!(spoof_match(&targets, &frame));

        let targets = vec!["11:22:33:44:55:66".to_string()];
        assert!(!spoof_match(&targets, &frame));
    }

    #[test]
    fn test_short_frame_passes_spoof_filter() {
        let targets = vec!["AA:BB:CC:00:00:01".to_string()];
        assert!(spoof_match(&targets, &[0u8; 8]));
    }
}
