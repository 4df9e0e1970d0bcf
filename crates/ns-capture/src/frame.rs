use chrono::{DateTime, Utc};

/// One raw link-layer frame as delivered by the capture source.
///
/// `data` holds the captured bytes (at most the snap length); `wire_length`
/// is the original on-the-wire size, which may exceed `data.len()` when the
/// frame was truncated by the snap length.
#[derive(Debug, Clone)]
pub struct RawFrame {
    /// Capture timestamp, UTC.
    pub timestamp: DateTime<Utc>,
    /// Original frame length on the wire.
    pub wire_length: u32,
    /// Captured bytes.
    pub data: Vec<u8>,
}

impl RawFrame {
    pub fn new(timestamp: DateTime<Utc>, wire_length: u32, data: Vec<u8>) -> Self {
        RawFrame {
            timestamp,
            wire_length,
            data,
        }
    }

    /// Number of bytes actually captured.
    pub fn captured_length(&self) -> u32 {
        self.data.len() as u32
    }
}
