use std::sync::Arc;
use std::time::{Duration, Instant};

use anyhow::Context;
use clap::{Parser, Subcommand};

use ns_pipeline::{CaptureController, CaptureState, SamplingMode};

mod dump;

use dump::ConsoleDumper;

/// netsift — live packet capture with per-layer dissection
#[derive(Parser, Debug)]
#[command(name = "netsift", version, about)]
struct Cli {
    #[command(subcommand)]
    command: Command,
}

#[derive(Subcommand, Debug)]
enum Command {
    /// List capture-capable network interfaces
    Interfaces,

    /// Capture live traffic and print dissected packets
    Capture {
        /// Interface to capture on (see `netsift interfaces`)
        #[arg(short, long)]
        interface: String,

        /// BPF filter expression, e.g. "tcp port 443"
        #[arg(short, long)]
        filter: Option<String>,

        /// Keep only frames to/from this MAC (repeatable)
        #[arg(long = "spoof-mac")]
        spoof_macs: Vec<String>,

        /// Keep every Nth packet
        #[arg(long, conflicts_with = "sample_rate")]
        sample_every: Option<u64>,

        /// Keep packets up to a target rate (packets/second)
        #[arg(long)]
        sample_rate: Option<u64>,

        /// Raw frames to retain in the session ring buffer (0 disables)
        #[arg(long, default_value_t = 0)]
        ring_buffer: usize,

        /// Stop after this many packets
        #[arg(short = 'n', long)]
        count: Option<u64>,

        /// Stop after this many seconds
        #[arg(long)]
        duration: Option<u64>,

        /// Emit one JSON object per packet instead of text
        #[arg(long)]
        json: bool,

        /// Print every decoded field of every layer
        #[arg(short, long)]
        verbose: bool,
    },
}

fn main() -> anyhow::Result<()> {
    env_logger::init();

    match Cli::parse().command {
        Command::Interfaces => cmd_interfaces(),
        Command::Capture {
            interface,
            filter,
            spoof_macs,
            sample_every,
            sample_rate,
            ring_buffer,
            count,
            duration,
            json,
            verbose,
        } => cmd_capture(CaptureArgs {
            interface,
            filter,
            spoof_macs,
            sample_every,
            sample_rate,
            ring_buffer,
            count,
            duration,
            json,
            verbose,
        }),
    }
}

fn cmd_interfaces() -> anyhow::Result<()> {
    let interfaces = ns_capture::list_interfaces().context("listing interfaces")?;
    for iface in interfaces {
        let addrs: Vec<&str> = iface.addresses.iter().map(|a| a.addr.as_str()).collect();
        println!(
            "{:<16} {}{}{}",
            iface.name,
            iface.description.as_deref().unwrap_or(""),
            if iface.is_loopback { " [loopback]" } else { "" },
            if addrs.is_empty() {
                String::new()
            } else {
                format!("  ({})", addrs.join(", "))
            },
        );
    }
    Ok(())
}

struct CaptureArgs {
    interface: String,
    filter: Option<String>,
    spoof_macs: Vec<String>,
    sample_every: Option<u64>,
    sample_rate: Option<u64>,
    ring_buffer: usize,
    count: Option<u64>,
    duration: Option<u64>,
    json: bool,
    verbose: bool,
}

fn cmd_capture(args: CaptureArgs) -> anyhow::Result<()> {
    let controller = CaptureController::new();
    let dumper = Arc::new(ConsoleDumper::new(args.json, args.verbose));
    controller.add_observer(dumper.clone());

    controller
        .set_interface(&args.interface)
        .with_context(|| format!("interface '{}'", args.interface))?;

    if let Some(filter) = &args.filter {
        controller.set_filter(filter)?;
    }
    if !args.spoof_macs.is_empty() {
        controller.set_spoof_mode(true, &args.spoof_macs)?;
    }
    if let Some(n) = args.sample_every {
        controller.set_sampling(SamplingMode::EveryNth(n))?;
    } else if let Some(pps) = args.sample_rate {
        controller.set_sampling(SamplingMode::TargetRate(pps))?;
    }
    controller.set_ring_buffer_size(args.ring_buffer)?;

    controller.start().context("starting capture")?;
    log::info!("Capturing on {}", args.interface);

    let started = Instant::now();
    loop {
        std::thread::sleep(Duration::from_millis(100));

        if controller.state() == CaptureState::Error {
            controller.stop()?;
            anyhow::bail!("capture aborted by a runtime error");
        }
        if let Some(limit) = args.count {
            if dumper.delivered() >= limit {
                break;
            }
        }
        if let Some(seconds) = args.duration {
            if started.elapsed() >= Duration::from_secs(seconds) {
                break;
            }
        }
    }

    controller.stop()?;

    let stats = controller.current_stats();
    eprintln!(
        "-- {} packets received, {} dropped, {} bytes, session started {}",
        stats.packets_received,
        stats.packets_dropped,
        stats.bytes_received,
        stats.start_time.format("%Y-%m-%d %H:%M:%S UTC"),
    );
    Ok(())
}
