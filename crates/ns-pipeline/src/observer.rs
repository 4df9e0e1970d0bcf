use crate::controller::CaptureState;
use crate::record::PacketRecord;
use crate::stats::CaptureStats;

/// Classification of errors surfaced to observers.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ErrorKind {
    /// Failure opening the interface at start.
    Open,
    /// Read failure while capturing; the session moves to `Error`.
    Runtime,
    /// BPF filter rejected by the backend; capture continues.
    Filter,
}

/// Consumer contract for capture output.
///
/// Delivery is fire-and-forget from the controller's dispatch thread;
/// implementations must not block, or the whole pipeline degrades. An
/// observer needing slow processing should queue internally.
pub trait CaptureObserver: Send + Sync {
    /// A batch of dissected packets, in strictly increasing serial order.
    fn on_packets(&self, packets: &[PacketRecord]);

    /// Session state transition.
    fn on_status(&self, state: CaptureState);

    /// 1 Hz statistics tick.
    fn on_stats(&self, stats: &CaptureStats);

    fn on_error(&self, kind: ErrorKind, message: &str);

    /// Edge event: sampling dropped its first packet this session.
    fn on_sampling_active(&self) {}

    /// Edge event: the output channel filled and the worker throttled.
    fn on_backpressure(&self) {}
}
