use std::sync::Arc;

use chrono::{DateTime, Utc};
use ns_dissect::{LayerRecord, Protocol};
use serde::Serialize;

/// One fully dissected packet, the pipeline's output unit.
///
/// `raw` is a shared read-only view of the captured bytes; observers and
/// the ring buffer alias the same allocation, nobody copies or mutates it.
#[derive(Debug, Clone, Serialize)]
pub struct PacketRecord {
    /// Strictly increasing per session; counts packets that passed the
    /// capture filters.
    pub serial: u64,
    pub timestamp: DateTime<Utc>,
    pub wire_length: u32,
    pub captured_length: u32,
    /// Outermost L3 source, or empty when no network layer parsed.
    pub src_addr: String,
    pub dst_addr: String,
    /// Tag of the innermost parsed layer.
    pub top_protocol: Protocol,
    pub summary_line: String,
    /// Layers outer-first (link, network, transport, application).
    pub layers: Vec<LayerRecord>,
    #[serde(skip)]
    pub raw: Arc<[u8]>,
}
