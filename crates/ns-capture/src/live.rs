//! Live packet capture from a network interface.
//!
//! Opens the interface in promiscuous mode with a 1 ms read timeout and
//! best-effort non-blocking reads, so a single `poll_batch` never holds the
//! pipeline worker for longer than the timeout window.

use chrono::{DateTime, Utc};

use crate::error::CaptureError;
use crate::frame::RawFrame;
use crate::source::{BatchResult, PacketSource};

/// Maximum bytes captured per frame.
const SNAP_LENGTH: i32 = 65_536;

/// Interface read timeout in milliseconds.
const READ_TIMEOUT_MS: i32 = 1;

/// Live capture source backed by libpcap.
pub struct PcapSource {
    interface_name: String,
    cap: Option<pcap::Capture<pcap::Active>>,
}

impl PcapSource {
    /// Open the named interface for live capture.
    ///
    /// The interface is opened promiscuous with snap length 65 536 and a
    /// 1 ms read timeout. Non-blocking mode is attempted afterwards; if the
    /// driver refuses it the capture continues in timed blocking mode with
    /// a warning.
    ///
    /// # Errors
    ///
    /// `InterfaceNotFound` when no device matches the name,
    /// `PermissionDenied` with platform guidance when the OS refuses the
    /// capture, `Driver` for any other backend failure.
    pub fn open(interface_name: &str) -> Result<Self, CaptureError> {
        let device = find_device(interface_name)?;

        let cap = open_capture(device.clone(), interface_name)?;

        // Non-blocking is best effort. setnonblock consumes the handle on
        // failure, so reopen with the timed blocking handle instead.
        let cap = match cap.setnonblock() {
            Ok(cap) => cap,
            Err(e) => {
                log::warn!(
                    "Failed to set non-blocking mode on {}: {} (continuing with timed reads)",
                    interface_name,
                    e
                );
                open_capture(device, interface_name)?
            }
        };

        log::info!("Opened {} for live capture", interface_name);

        Ok(PcapSource {
            interface_name: interface_name.to_string(),
            cap: Some(cap),
        })
    }

    pub fn interface_name(&self) -> &str {
        &self.interface_name
    }
}

impl PacketSource for PcapSource {
    fn poll_batch(&mut self, max_frames: usize) -> BatchResult {
        let cap = match self.cap.as_mut() {
            Some(cap) => cap,
            None => return BatchResult::Eof,
        };

        let mut frames = Vec::new();

        for _ in 0..max_frames {
            match cap.next_packet() {
                Ok(packet) => {
                    let timestamp = timestamp_from_header(packet.header);
                    frames.push(RawFrame::new(
                        timestamp,
                        packet.header.len,
                        packet.data.to_vec(),
                    ));
                }
                Err(pcap::Error::TimeoutExpired) => {
                    // No packet within the read window.
                    break;
                }
                Err(pcap::Error::NoMorePackets) => {
                    self.cap = None;
                    return BatchResult::Eof;
                }
                Err(e) => {
                    self.cap = None;
                    return BatchResult::Error(CaptureError::Read(e.to_string()));
                }
            }
        }

        BatchResult::Frames(frames)
    }

    fn set_filter(&mut self, expression: &str) -> Result<(), CaptureError> {
        let cap = match self.cap.as_mut() {
            Some(cap) => cap,
            None => {
                return Err(CaptureError::Driver(
                    "capture source is closed".to_string(),
                ))
            }
        };

        // An empty BPF program matches everything, which clears any prior
        // filter.
        cap.filter(expression, true)
            .map_err(|e| CaptureError::FilterSyntax {
                expression: expression.to_string(),
                message: e.to_string(),
            })?;

        if expression.is_empty() {
            log::debug!("Cleared capture filter on {}", self.interface_name);
        } else {
            log::info!(
                "Applied capture filter '{}' on {}",
                expression,
                self.interface_name
            );
        }
        Ok(())
    }

    fn close(&mut self) {
        if self.cap.take().is_some() {
            log::info!("Closed capture on {}", self.interface_name);
        }
    }
}

fn find_device(interface_name: &str) -> Result<pcap::Device, CaptureError> {
    pcap::Device::list()
        .map_err(|e| CaptureError::InterfaceList(e.to_string()))?
        .into_iter()
        .find(|d| d.name == interface_name)
        .ok_or_else(|| CaptureError::InterfaceNotFound(interface_name.to_string()))
}

fn open_capture(
    device: pcap::Device,
    interface_name: &str,
) -> Result<pcap::Capture<pcap::Active>, CaptureError> {
    pcap::Capture::from_device(device)
        .map_err(|e| enhance_privilege_error(e, interface_name))?
        .promisc(true)
        .snaplen(SNAP_LENGTH)
        .timeout(READ_TIMEOUT_MS)
        .open()
        .map_err(|e| enhance_privilege_error(e, interface_name))
}

fn timestamp_from_header(header: &pcap::PacketHeader) -> DateTime<Utc> {
    // pcap's PacketHeader wraps C's struct timeval, whose fields are `long`:
    // 64-bit on LP64 (Linux/macOS), 32-bit on LLP64 (Windows). The casts
    // keep both building.
    #[allow(clippy::unnecessary_cast)]
    DateTime::from_timestamp(
        header.ts.tv_sec as i64,
        (header.ts.tv_usec as u32) * 1000, // microseconds → nanoseconds
    )
    .unwrap_or_else(Utc::now)
}

/// Classify pcap open errors, attaching platform-specific privilege
/// guidance when the OS refused the capture.
fn enhance_privilege_error(err: pcap::Error, interface: &str) -> CaptureError {
    let msg = err.to_string();

    let is_permission = msg.contains("ermission")
        || msg.contains("Operation not permitted")
        || msg.contains("EPERM")
        || msg.contains("you don't have permission");

    if is_permission {
        let guidance = if cfg!(target_os = "linux") {
            format!(
                "cannot capture on '{}'. Solutions:\n\
                 1. Run with sudo: sudo netsift\n\
                 2. Grant capability: sudo setcap cap_net_raw=eip <path-to-binary>\n\
                 3. Add your user to the 'pcap' or 'wireshark' group",
                interface
            )
        } else if cfg!(target_os = "macos") {
            format!(
                "cannot capture on '{}'. Solutions:\n\
                 1. Run with sudo: sudo netsift\n\
                 2. Fix BPF permissions: sudo chmod 644 /dev/bpf*",
                interface
            )
        } else if cfg!(target_os = "windows") {
            format!(
                "cannot capture on '{}'. Ensure Npcap is installed:\n\
                 1. Download from https://npcap.com\n\
                 2. Install with 'WinPcap Compatible Mode' checked",
                interface
            )
        } else {
            format!("cannot capture on '{}': {}", interface, msg)
        };

        CaptureError::PermissionDenied(guidance)
    } else {
        CaptureError::Driver(format!("failed to open '{}': {}", interface, msg))
    }
}
