//! Capture controller: session lifecycle, configuration, statistics
//! aggregation and observer dispatch.
//!
//! The worker thread owns the capture source; the controller signals it
//! through atomic flags and a mutex-guarded config struct only. Packet
//! batches flow through a bounded channel into a dispatch thread that
//! fans them out to observers, preserving serial order.

use std::sync::atomic::Ordering;
use std::sync::mpsc::{self, Receiver, RecvTimeoutError};
use std::sync::{Arc, Mutex};
use std::thread::{self, JoinHandle};
use std::time::{Duration, Instant};

use chrono::Utc;
use ns_capture::{PacketSource, PcapSource};
use serde::Serialize;

use crate::config::{CaptureConfig, SamplingMode};
use crate::error::ControllerError;
use crate::observer::{CaptureObserver, ErrorKind};
use crate::record::PacketRecord;
use crate::stats::{CaptureStats, Counters};
use crate::validate;
use crate::worker::{self, WorkerEvent, WorkerShared, DATA_CHANNEL_CAPACITY};

/// Wait cap for the worker to exit on `stop()`.
const STOP_TIMEOUT: Duration = Duration::from_secs(5);

/// Statistics tick period.
const STATS_TICK: Duration = Duration::from_secs(1);

/// Session state machine.
///
/// `Stopped → Capturing` on start; `Capturing ↔ Paused`; any → `Stopped`
/// on stop; any → `Error` on a fatal worker error, cleared only by an
/// explicit `stop()`.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "snake_case")]
pub enum CaptureState {
    Stopped,
    Capturing,
    Paused,
    Error,
}

impl CaptureState {
    pub fn name(&self) -> &'static str {
        match self {
            CaptureState::Stopped => "Stopped",
            CaptureState::Capturing => "Capturing",
            CaptureState::Paused => "Paused",
            CaptureState::Error => "Error",
        }
    }
}

type Observers = Arc<Mutex<Vec<Arc<dyn CaptureObserver>>>>;

struct ControlState {
    state: CaptureState,
    config: CaptureConfig,
}

struct Session {
    shared: Arc<WorkerShared>,
    worker: JoinHandle<()>,
    dispatch: JoinHandle<()>,
    ticker: JoinHandle<()>,
}

/// Process-side façade over the capture pipeline.
pub struct CaptureController {
    control: Arc<Mutex<ControlState>>,
    observers: Observers,
    counters: Mutex<Arc<Counters>>,
    session: Mutex<Option<Session>>,
}

impl CaptureController {
    pub fn new() -> Self {
        CaptureController {
            control: Arc::new(Mutex::new(ControlState {
                state: CaptureState::Stopped,
                config: CaptureConfig::default(),
            })),
            observers: Arc::new(Mutex::new(Vec::new())),
            counters: Mutex::new(Arc::new(Counters::new(Utc::now()))),
            session: Mutex::new(None),
        }
    }

    pub fn add_observer(&self, observer: Arc<dyn CaptureObserver>) {
        if let Ok(mut observers) = self.observers.lock() {
            observers.push(observer);
        }
    }

    pub fn state(&self) -> CaptureState {
        self.control
            .lock()
            .map(|c| c.state)
            .unwrap_or(CaptureState::Error)
    }

    pub fn config(&self) -> CaptureConfig {
        self.control
            .lock()
            .map(|c| c.config.clone())
            .unwrap_or_default()
    }

    /// Set the capture interface. Only valid while stopped.
    pub fn set_interface(&self, name: &str) -> Result<(), ControllerError> {
        if !validate::is_valid_interface_name(name) {
            return Err(ControllerError::InterfaceInvalid(name.to_string()));
        }
        let mut control = self.lock_control()?;
        if control.state != CaptureState::Stopped {
            return Err(ControllerError::InvalidState(control.state.name()));
        }
        control.config.interface_name = name.to_string();
        Ok(())
    }

    /// Set the BPF filter. Live-updatable: when capturing, the worker
    /// applies it before its next batch; syntax errors then surface as
    /// `Filter` error events.
    pub fn set_filter(&self, expression: &str) -> Result<(), ControllerError> {
        let mut control = self.lock_control()?;
        control.config.bpf_filter = expression.to_string();
        let config = control.config.clone();
        drop(control);
        self.push_config(config);
        Ok(())
    }

    /// Enable or disable the spoof-mode MAC filter. MACs are normalized
    /// to uppercase colon form; any invalid address rejects the call.
    pub fn set_spoof_mode(&self, enabled: bool, macs: &[String]) -> Result<(), ControllerError> {
        let targets = if enabled {
            macs.iter()
                .map(|mac| {
                    validate::normalize_mac(mac)
                        .ok_or_else(|| ControllerError::InvalidMac(mac.clone()))
                })
                .collect::<Result<Vec<_>, _>>()?
        } else {
            Vec::new()
        };

        let mut control = self.lock_control()?;
        control.config.spoof_targets = targets;
        let config = control.config.clone();
        drop(control);
        self.push_config(config);
        Ok(())
    }

    pub fn set_sampling(&self, mode: SamplingMode) -> Result<(), ControllerError> {
        match mode {
            SamplingMode::EveryNth(n) if n < 1 => {
                return Err(ControllerError::InvalidSampling(format!("N = {}", n)));
            }
            SamplingMode::TargetRate(pps) if pps < 1 => {
                return Err(ControllerError::InvalidSampling(format!("pps = {}", pps)));
            }
            _ => {}
        }
        let mut control = self.lock_control()?;
        control.config.sampling = mode;
        let config = control.config.clone();
        drop(control);
        self.push_config(config);
        Ok(())
    }

    pub fn set_ring_buffer_size(&self, size: usize) -> Result<(), ControllerError> {
        let mut control = self.lock_control()?;
        control.config.ring_buffer_size = size;
        let config = control.config.clone();
        drop(control);
        self.push_config(config);
        Ok(())
    }

    /// Open the configured interface and start capturing.
    pub fn start(&self) -> Result<(), ControllerError> {
        let config = {
            let control = self.lock_control()?;
            if control.state != CaptureState::Stopped {
                return Err(ControllerError::InvalidState(control.state.name()));
            }
            if control.config.interface_name.is_empty() {
                return Err(ControllerError::InterfaceInvalid(String::new()));
            }
            control.config.clone()
        };

        let mut source = match PcapSource::open(&config.interface_name) {
            Ok(source) => source,
            Err(e) => {
                // Open failures park the session in Error until acknowledged.
                if let Ok(mut control) = self.control.lock() {
                    control.state = CaptureState::Error;
                }
                self.notify(|obs| obs.on_error(ErrorKind::Open, &e.to_string()));
                self.notify(|obs| obs.on_status(CaptureState::Error));
                return Err(e.into());
            }
        };

        if !config.bpf_filter.is_empty() {
            // A bad filter is a configuration error: report it and stay Stopped.
            source.set_filter(&config.bpf_filter)?;
        }

        self.start_with_source(Box::new(source))
    }

    /// Start capturing from an already-open source. Used by `start()` and
    /// directly by tests driving a scripted source.
    pub fn start_with_source(
        &self,
        source: Box<dyn PacketSource>,
    ) -> Result<(), ControllerError> {
        let mut control = self.lock_control()?;
        if control.state != CaptureState::Stopped {
            return Err(ControllerError::InvalidState(control.state.name()));
        }
        let config = control.config.clone();

        // Fresh statistics every session.
        let counters = Arc::new(Counters::new(Utc::now()));
        if let Ok(mut slot) = self.counters.lock() {
            *slot = counters.clone();
        }

        let shared = Arc::new(WorkerShared::new(config, counters.clone()));
        let (data_tx, data_rx) = mpsc::sync_channel::<Vec<PacketRecord>>(DATA_CHANNEL_CAPACITY);
        let (event_tx, event_rx) = mpsc::channel::<WorkerEvent>();

        let worker = {
            let shared = shared.clone();
            thread::Builder::new()
                .name("ns-worker".to_string())
                .spawn(move || worker::run(source, shared, data_tx, event_tx))
                .map_err(|e| ControllerError::Capture(ns_capture::CaptureError::Driver(
                    format!("failed to spawn worker thread: {}", e),
                )))?
        };

        let dispatch = {
            let control = self.control.clone();
            let observers = self.observers.clone();
            let shared = shared.clone();
            thread::Builder::new()
                .name("ns-dispatch".to_string())
                .spawn(move || dispatch_loop(data_rx, event_rx, control, observers, shared))
                .map_err(|e| ControllerError::Capture(ns_capture::CaptureError::Driver(
                    format!("failed to spawn dispatch thread: {}", e),
                )))?
        };

        let ticker = {
            let control = self.control.clone();
            let observers = self.observers.clone();
            let shared = shared.clone();
            thread::Builder::new()
                .name("ns-stats".to_string())
                .spawn(move || stats_loop(control, observers, shared))
                .map_err(|e| ControllerError::Capture(ns_capture::CaptureError::Driver(
                    format!("failed to spawn stats thread: {}", e),
                )))?
        };

        control.state = CaptureState::Capturing;
        drop(control);

        if let Ok(mut session) = self.session.lock() {
            *session = Some(Session {
                shared,
                worker,
                dispatch,
                ticker,
            });
        }

        self.notify(|obs| obs.on_status(CaptureState::Capturing));
        log::info!("Capture started");
        Ok(())
    }

    /// Stop the capture. Idempotent; also acknowledges the `Error` state.
    pub fn stop(&self) -> Result<(), ControllerError> {
        let session = self.session.lock().ok().and_then(|mut s| s.take());

        let Some(session) = session else {
            // No worker running; just settle the state machine.
            let mut control = self.lock_control()?;
            if control.state != CaptureState::Stopped {
                control.state = CaptureState::Stopped;
                drop(control);
                self.notify(|obs| obs.on_status(CaptureState::Stopped));
            }
            return Ok(());
        };

        session.shared.stop.store(true, Ordering::Relaxed);

        // Wait up to the cap for the worker to exit its poll loop.
        let deadline = Instant::now() + STOP_TIMEOUT;
        let mut worker = Some(session.worker);
        while let Some(handle) = worker.take() {
            if handle.is_finished() {
                let _ = handle.join();
                break;
            }
            if Instant::now() >= deadline {
                log::error!("Capture worker did not stop within 5 s; detaching it");
                break;
            }
            thread::sleep(Duration::from_millis(10));
            worker = Some(handle);
        }

        let _ = session.dispatch.join();
        let _ = session.ticker.join();

        {
            let mut control = self.lock_control()?;
            control.state = CaptureState::Stopped;
        }
        self.notify(|obs| obs.on_status(CaptureState::Stopped));
        log::info!("Capture stopped");
        Ok(())
    }

    /// Pause observer delivery. The worker keeps reading so the kernel
    /// buffer does not overflow; batches arriving while paused are not
    /// delivered.
    pub fn pause(&self) -> Result<(), ControllerError> {
        let mut control = self.lock_control()?;
        if control.state != CaptureState::Capturing {
            return Err(ControllerError::InvalidState(control.state.name()));
        }
        control.state = CaptureState::Paused;
        drop(control);
        self.notify(|obs| obs.on_status(CaptureState::Paused));
        Ok(())
    }

    pub fn resume(&self) -> Result<(), ControllerError> {
        let mut control = self.lock_control()?;
        if control.state != CaptureState::Paused {
            return Err(ControllerError::InvalidState(control.state.name()));
        }
        control.state = CaptureState::Capturing;
        drop(control);
        self.notify(|obs| obs.on_status(CaptureState::Capturing));
        Ok(())
    }

    pub fn current_stats(&self) -> CaptureStats {
        self.counters
            .lock()
            .map(|c| c.snapshot())
            .unwrap_or_else(|_| Counters::new(Utc::now()).snapshot())
    }

    /// Raw frames currently held in the session ring buffer.
    pub fn ring_buffer_len(&self) -> usize {
        self.session
            .lock()
            .ok()
            .and_then(|s| {
                s.as_ref()
                    .and_then(|session| session.shared.ring.lock().ok().map(|r| r.len()))
            })
            .unwrap_or(0)
    }

    fn lock_control(&self) -> Result<std::sync::MutexGuard<'_, ControlState>, ControllerError> {
        self.control.lock().map_err(|_| {
            ControllerError::Capture(ns_capture::CaptureError::Driver(
                "controller state poisoned".to_string(),
            ))
        })
    }

    /// Copy the master config into the running worker's snapshot source.
    fn push_config(&self, config: CaptureConfig) {
        if let Ok(session) = self.session.lock() {
            if let Some(session) = session.as_ref() {
                if let Ok(mut shared) = session.shared.config.lock() {
                    *shared = config;
                }
            }
        }
    }

    fn notify<F: Fn(&Arc<dyn CaptureObserver>)>(&self, f: F) {
        if let Ok(observers) = self.observers.lock() {
            for observer in observers.iter() {
                f(observer);
            }
        }
    }
}

impl Default for CaptureController {
    fn default() -> Self {
        Self::new()
    }
}

impl Drop for CaptureController {
    fn drop(&mut self) {
        let _ = self.stop();
    }
}

/// Forwards record batches and worker events to observers. Exits when the
/// worker hangs up its channels or the stop flag is raised.
fn dispatch_loop(
    data_rx: Receiver<Vec<PacketRecord>>,
    event_rx: Receiver<WorkerEvent>,
    control: Arc<Mutex<ControlState>>,
    observers: Observers,
    shared: Arc<WorkerShared>,
) {
    let notify = |f: &dyn Fn(&Arc<dyn CaptureObserver>)| {
        if let Ok(observers) = observers.lock() {
            for observer in observers.iter() {
                f(observer);
            }
        }
    };

    loop {
        while let Ok(event) = event_rx.try_recv() {
            handle_event(event, &control, &notify, &shared);
        }

        match data_rx.recv_timeout(Duration::from_millis(50)) {
            Ok(batch) => {
                let paused = control
                    .lock()
                    .map(|c| c.state == CaptureState::Paused)
                    .unwrap_or(false);
                if !paused {
                    notify(&|obs| obs.on_packets(&batch));
                }
            }
            Err(RecvTimeoutError::Timeout) => {
                if shared.stop.load(Ordering::Relaxed) {
                    break;
                }
            }
            Err(RecvTimeoutError::Disconnected) => {
                // Worker exited; drain any trailing events and finish.
                while let Ok(event) = event_rx.try_recv() {
                    handle_event(event, &control, &notify, &shared);
                }
                break;
            }
        }
    }
}

fn handle_event(
    event: WorkerEvent,
    control: &Arc<Mutex<ControlState>>,
    notify: &dyn Fn(&dyn Fn(&Arc<dyn CaptureObserver>)),
    shared: &Arc<WorkerShared>,
) {
    match event {
        WorkerEvent::SamplingActive => notify(&|obs| obs.on_sampling_active()),
        WorkerEvent::Backpressure => notify(&|obs| obs.on_backpressure()),
        WorkerEvent::FilterError(e) => {
            let message = e.to_string();
            notify(&|obs| obs.on_error(ErrorKind::Filter, &message));
        }
        WorkerEvent::Fatal(e) => {
            if shared.stop.load(Ordering::Relaxed) {
                return;
            }
            if let Ok(mut control) = control.lock() {
                control.state = CaptureState::Error;
            }
            let message = e.to_string();
            notify(&|obs| obs.on_error(ErrorKind::Runtime, &message));
            notify(&|obs| obs.on_status(CaptureState::Error));
        }
        WorkerEvent::Finished => {
            // Normal path is stop(); an unprompted exit (source EOF)
            // settles the state machine itself.
            if shared.stop.load(Ordering::Relaxed) {
                return;
            }
            if let Ok(mut control) = control.lock() {
                if control.state == CaptureState::Capturing
                    || control.state == CaptureState::Paused
                {
                    control.state = CaptureState::Stopped;
                    drop(control);
                    notify(&|obs| obs.on_status(CaptureState::Stopped));
                }
            }
        }
    }
}

/// 1 Hz statistics aggregation. The controller tick is the authoritative
/// rate source; the worker only bumps raw counters.
fn stats_loop(control: Arc<Mutex<ControlState>>, observers: Observers, shared: Arc<WorkerShared>) {
    let mut last_count = 0u64;
    let mut last_instant = Instant::now();

    loop {
        // Sleep in small slices to stay responsive to stop.
        let tick_deadline = Instant::now() + STATS_TICK;
        while Instant::now() < tick_deadline {
            if shared.stop.load(Ordering::Relaxed) {
                return;
            }
            thread::sleep(Duration::from_millis(25));
        }

        let state = control.lock().map(|c| c.state).unwrap_or(CaptureState::Error);
        if state == CaptureState::Error || state == CaptureState::Stopped {
            // Errored sessions stop ticking until acknowledged.
            continue;
        }

        let now = Instant::now();
        let count = shared
            .counters
            .packets_received
            .load(Ordering::Relaxed);
        let delta_packets = count.saturating_sub(last_count);
        let delta_ms = now.duration_since(last_instant).as_millis().max(1) as f64;
        let rate = delta_packets as f64 / delta_ms * 1000.0;
        shared.counters.set_rate(rate);
        last_count = count;
        last_instant = now;

        let stats = shared.counters.snapshot();
        if let Ok(observers) = observers.lock() {
            for observer in observers.iter() {
                observer.on_stats(&stats);
            }
        }
    }
}
