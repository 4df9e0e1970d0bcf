//! # ns-capture
//!
//! Capture source for netsift: opens a network interface in promiscuous
//! non-blocking mode and exposes a bounded, timed batch read primitive.
//!
//! The pipeline consumes this crate through the [`PacketSource`] trait so
//! tests can substitute a scripted source for live hardware.

mod error;
mod frame;
mod interface;
mod live;
mod source;

pub use error::CaptureError;
pub use frame::RawFrame;
pub use interface::{list_interfaces, InterfaceAddress, NetworkInterface};
pub use live::PcapSource;
pub use source::{BatchResult, PacketSource};
