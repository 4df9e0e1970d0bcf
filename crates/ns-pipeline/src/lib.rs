//! # ns-pipeline
//!
//! The capture pipeline and its controller.
//!
//! A dedicated worker thread polls the capture source in bounded batches,
//! applies the spoof-mode MAC filter and sampling policy, runs the
//! dissector fan-out, and emits [`PacketRecord`] batches through a bounded
//! channel. The [`CaptureController`] owns lifecycle and configuration,
//! aggregates statistics at 1 Hz, and fans results out to
//! [`CaptureObserver`] implementations.

mod config;
mod controller;
mod error;
mod observer;
mod record;
mod stats;
pub mod validate;
mod worker;

pub use config::{CaptureConfig, SamplingMode};
pub use controller::{CaptureController, CaptureState};
pub use error::ControllerError;
pub use observer::{CaptureObserver, ErrorKind};
pub use record::PacketRecord;
pub use stats::CaptureStats;
