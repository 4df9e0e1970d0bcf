use serde::Serialize;

/// Packet sampling policy applied before dissection.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "snake_case")]
pub enum SamplingMode {
    /// Keep every packet.
    None,
    /// Keep every Nth packet (N >= 1).
    EveryNth(u64),
    /// Keep packets while the session rate stays near the target (pps >= 1).
    TargetRate(u64),
}

/// Configuration for one capture session.
///
/// Mutated only through the controller; the worker reads an immutable
/// snapshot once per loop iteration.
#[derive(Debug, Clone)]
pub struct CaptureConfig {
    /// Interface to capture on.
    pub interface_name: String,
    /// BPF filter expression; empty means no filter.
    pub bpf_filter: String,
    /// Spoof-mode target MACs, uppercase colon form. Empty disables the
    /// spoof filter.
    pub spoof_targets: Vec<String>,
    pub sampling: SamplingMode,
    /// Raw frames retained for the session; 0 disables the ring buffer.
    pub ring_buffer_size: usize,
    /// Initial backpressure delay; adapts upward under channel pressure.
    pub backpressure_delay_ms: u64,
}

impl Default for CaptureConfig {
    fn default() -> Self {
        CaptureConfig {
            interface_name: String::new(),
            bpf_filter: String::new(),
            spoof_targets: Vec::new(),
            sampling: SamplingMode::None,
            ring_buffer_size: 0,
            backpressure_delay_ms: 0,
        }
    }
}
