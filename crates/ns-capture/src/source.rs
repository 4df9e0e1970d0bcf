use crate::error::CaptureError;
use crate::frame::RawFrame;

/// Result of one bounded batch read from a capture source.
#[derive(Debug)]
pub enum BatchResult {
    /// Frames read within the poll window. May be empty if the window
    /// contained none.
    Frames(Vec<RawFrame>),
    /// The source has been closed; no further frames will arrive.
    Eof,
    /// A read error from the underlying capture layer. The source is
    /// unusable after this.
    Error(CaptureError),
}

/// Abstract capture source consumed by the pipeline worker.
///
/// [`crate::PcapSource`] is the live backend; tests drive the pipeline with
/// scripted implementations of this trait.
pub trait PacketSource: Send {
    /// Read up to `max_frames` frames in one call. Must not block longer
    /// than the source's configured read timeout per attempted read.
    fn poll_batch(&mut self, max_frames: usize) -> BatchResult;

    /// Compile and install a BPF-style filter. An empty expression clears
    /// any previously installed filter.
    fn set_filter(&mut self, expression: &str) -> Result<(), CaptureError>;

    /// Close the source. Idempotent; subsequent polls return [`BatchResult::Eof`].
    fn close(&mut self);
}
