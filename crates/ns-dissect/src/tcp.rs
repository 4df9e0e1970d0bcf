//! TCP header with option walk and scan/anomaly warnings (RFC 9293).

use crate::reader::{need, ByteReader};
use crate::record::{Descend, DissectError, LayerRecord, Protocol};

pub const FLAG_FIN: u8 = 0x01;
pub const FLAG_SYN: u8 = 0x02;
pub const FLAG_RST: u8 = 0x04;
pub const FLAG_PSH: u8 = 0x08;
pub const FLAG_ACK: u8 = 0x10;
pub const FLAG_URG: u8 = 0x20;
pub const FLAG_ECE: u8 = 0x40;
pub const FLAG_CWR: u8 = 0x80;

const OPT_EOL: u8 = 0;
const OPT_NOP: u8 = 1;
const OPT_MSS: u8 = 2;
const OPT_WINDOW_SCALE: u8 = 3;
const OPT_SACK_PERMITTED: u8 = 4;
const OPT_SACK: u8 = 5;
const OPT_TIMESTAMP: u8 = 8;

/// Flag names in header-bit order, high to low.
pub fn flag_string(flags: u8) -> String {
    let mut names = Vec::new();
    if flags & FLAG_CWR != 0 {
        names.push("CWR");
    }
    if flags & FLAG_ECE != 0 {
        names.push("ECE");
    }
    if flags & FLAG_URG != 0 {
        names.push("URG");
    }
    if flags & FLAG_ACK != 0 {
        names.push("ACK");
    }
    if flags & FLAG_PSH != 0 {
        names.push("PSH");
    }
    if flags & FLAG_RST != 0 {
        names.push("RST");
    }
    if flags & FLAG_SYN != 0 {
        names.push("SYN");
    }
    if flags & FLAG_FIN != 0 {
        names.push("FIN");
    }
    names.join(" ")
}

fn option_name(kind: u8) -> &'static str {
    match kind {
        OPT_EOL => "End of Option List",
        OPT_NOP => "No Operation",
        OPT_MSS => "Maximum Segment Size",
        OPT_WINDOW_SCALE => "Window Scale",
        OPT_SACK_PERMITTED => "SACK Permitted",
        OPT_SACK => "SACK",
        OPT_TIMESTAMP => "Timestamp",
        _ => "Unknown Option",
    }
}

pub fn dissect(bytes: &[u8], offset: usize) -> Result<(LayerRecord, Descend), DissectError> {
    let mut rec = LayerRecord::new(Protocol::Tcp, offset);
    let mut r = ByteReader::new(bytes);

    let src_port = need!(r.u16_be(), rec, r.pos());
    rec.push("Source Port", src_port.to_string());

    let dst_port = need!(r.u16_be(), rec, r.pos());
    rec.push("Destination Port", dst_port.to_string());

    let seq = need!(r.u32_be(), rec, r.pos());
    rec.push("Sequence Number", seq.to_string());

    let ack = need!(r.u32_be(), rec, r.pos());
    rec.push("Acknowledgment Number", ack.to_string());

    let data_offset_byte = need!(r.u8(), rec, r.pos());
    let data_offset = data_offset_byte >> 4;
    let header_len = data_offset as usize * 4;
    rec.push("Header Length", format!("{} bytes", header_len));

    let flags = need!(r.u8(), rec, r.pos());
    rec.push("Flags", format!("0x{:02x} [{}]", flags, flag_string(flags)));

    let window = need!(r.u16_be(), rec, r.pos());
    rec.push("Window Size", window.to_string());

    let checksum = need!(r.u16_be(), rec, r.pos());
    rec.push("Checksum", format!("0x{:04x}", checksum));

    let urgent = need!(r.u16_be(), rec, r.pos());
    rec.push("Urgent Pointer", urgent.to_string());

    if data_offset < 5 {
        rec.span.length = r.pos();
        rec.warn(format!("malformed: header length {} below minimum", header_len));
        return Ok((rec, Descend::Stop));
    }
    // Header extends past the captured bytes: the option list was cut off.
    if header_len > bytes.len() {
        return Err(DissectError::truncated(rec, r.pos()));
    }

    if header_len > 20 {
        let options = need!(r.take(header_len - 20), rec, r.pos());
        walk_options(options, &mut rec);
    }

    // Scan and anomaly signatures
    if flags == 0 {
        rec.warn("null_scan");
    }
    if flags & (FLAG_FIN | FLAG_URG | FLAG_PSH) == (FLAG_FIN | FLAG_URG | FLAG_PSH) {
        rec.warn("xmas_scan");
    }
    if window == 0 {
        rec.warn("zero_window");
    }
    if seq == 0 && flags & FLAG_SYN == 0 {
        rec.warn("zero_seq_without_syn");
    }

    rec.span.length = header_len;
    Ok((
        rec,
        Descend::TcpPorts {
            src: src_port,
            dst: dst_port,
        },
    ))
}

/// Decode the option list. The walk stops at EOL, on a zero/overrunning
/// length octet, or at the end of the option bytes.
fn walk_options(options: &[u8], rec: &mut LayerRecord) {
    let mut i = 0usize;
    while i < options.len() {
        let kind = options[i];

        if kind == OPT_EOL {
            rec.push("Option", option_name(OPT_EOL).to_string());
            break;
        }
        if kind == OPT_NOP {
            rec.push("Option", option_name(OPT_NOP).to_string());
            i += 1;
            continue;
        }

        if i + 1 >= options.len() {
            rec.warn("truncated option list");
            break;
        }
        let length = options[i + 1] as usize;
        if length < 2 || i + length > options.len() {
            rec.warn("truncated option list");
            break;
        }

        let body = &options[i + 2..i + length];
        match kind {
            OPT_MSS if length == 4 => {
                let mss = u16::from_be_bytes([body[0], body[1]]);
                rec.push("Option", format!("MSS = {}", mss));
            }
            OPT_WINDOW_SCALE if length == 3 => {
                let shift = body[0];
                rec.push(
                    "Option",
                    format!("Window Scale = {} (multiplier {})", shift, 1u32 << shift.min(14)),
                );
            }
            OPT_SACK_PERMITTED if length == 2 => {
                rec.push("Option", "SACK Permitted".to_string());
            }
            OPT_SACK => {
                rec.push("Option", format!("SACK ({} bytes)", length - 2));
            }
            OPT_TIMESTAMP if length == 10 => {
                let ts_val = u32::from_be_bytes([body[0], body[1], body[2], body[3]]);
                let ts_ecr = u32::from_be_bytes([body[4], body[5], body[6], body[7]]);
                rec.push("Option", format!("Timestamp TSval={} TSecr={}", ts_val, ts_ecr));
            }
            _ => {
                rec.push(
                    "Option",
                    format!("{} (kind {}, {} bytes)", option_name(kind), kind, length),
                );
            }
        }

        i += length;
    }
}
