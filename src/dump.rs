//! Console observer: prints dissected packets as text or JSON lines.

use std::sync::atomic::{AtomicU64, Ordering};

use ns_pipeline::{CaptureObserver, CaptureState, CaptureStats, ErrorKind, PacketRecord};

pub struct ConsoleDumper {
    json: bool,
    verbose: bool,
    delivered: AtomicU64,
}

impl ConsoleDumper {
    pub fn new(json: bool, verbose: bool) -> Self {
        ConsoleDumper {
            json,
            verbose,
            delivered: AtomicU64::new(0),
        }
    }

    /// Packets printed so far.
    pub fn delivered(&self) -> u64 {
        self.delivered.load(Ordering::Relaxed)
    }

    fn print_packet(&self, packet: &PacketRecord) {
        if self.json {
            match serde_json::to_string(packet) {
                Ok(line) => println!("{}", line),
                Err(e) => log::warn!("Failed to serialize packet {}: {}", packet.serial, e),
            }
            return;
        }

        println!(
            "{:>8}  {}  {:<6} {:>5}B  {}",
            packet.serial,
            packet.timestamp.format("%H:%M:%S%.6f"),
            packet.top_protocol.name(),
            packet.wire_length,
            packet.summary_line,
        );

        if self.verbose {
            for layer in &packet.layers {
                println!(
                    "          [{} @ {}+{}]",
                    layer.protocol.name(),
                    layer.span.offset,
                    layer.span.length
                );
                for field in &layer.fields {
                    println!("            {}: {}", field.label, field.value);
                }
                for warning in &layer.warnings {
                    println!("            ! {}", warning);
                }
            }
        }
    }
}

impl CaptureObserver for ConsoleDumper {
    fn on_packets(&self, packets: &[PacketRecord]) {
        for packet in packets {
            self.print_packet(packet);
        }
        self.delivered
            .fetch_add(packets.len() as u64, Ordering::Relaxed);
    }

    fn on_status(&self, state: CaptureState) {
        eprintln!("-- capture {}", state.name().to_lowercase());
    }

    fn on_stats(&self, stats: &CaptureStats) {
        log::debug!(
            "stats: {} pkts ({} dropped), {} bytes, {:.1} pps",
            stats.packets_received,
            stats.packets_dropped,
            stats.bytes_received,
            stats.current_rate
        );
    }

    fn on_error(&self, kind: ErrorKind, message: &str) {
        eprintln!("-- capture error ({:?}): {}", kind, message);
    }

    fn on_sampling_active(&self) {
        eprintln!("-- sampling active: dropping packets to bound load");
    }

    fn on_backpressure(&self) {
        eprintln!("-- backpressure: consumer is behind, throttling");
    }
}
