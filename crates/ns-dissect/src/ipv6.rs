//! IPv6 fixed header and extension-header chain (RFC 8200).

use crate::reader::{need, ByteReader};
use crate::record::{Descend, DissectError, LayerRecord, Protocol};

/// Maximum extension headers walked before giving up on the chain.
const MAX_EXTENSION_HEADERS: usize = 8;

const HOP_BY_HOP: u8 = 0;
const ROUTING: u8 = 43;
const FRAGMENT: u8 = 44;
const DEST_OPTIONS: u8 = 60;

pub fn format_ipv6(bytes: &[u8]) -> String {
    let segments: Vec<String> = (0..8)
        .map(|i| {
            let high = bytes[i * 2] as u16;
            let low = bytes[i * 2 + 1] as u16;
            format!("{:x}", (high << 8) | low)
        })
        .collect();
    segments.join(":")
}

pub fn next_header_name(next_header: u8) -> &'static str {
    match next_header {
        HOP_BY_HOP => "Hop-by-Hop Options",
        6 => "TCP",
        17 => "UDP",
        ROUTING => "Routing",
        FRAGMENT => "Fragment",
        50 => "ESP",
        51 => "AH",
        58 => "ICMPv6",
        DEST_OPTIONS => "Destination Options",
        59 => "No Next Header",
        132 => "SCTP",
        135 => "Mobility",
        _ => "Unknown",
    }
}

fn is_extension_header(next_header: u8) -> bool {
    matches!(next_header, HOP_BY_HOP | ROUTING | FRAGMENT | DEST_OPTIONS)
}

pub fn dissect(bytes: &[u8], offset: usize) -> Result<(LayerRecord, Descend), DissectError> {
    let mut rec = LayerRecord::new(Protocol::Ipv6, offset);
    let mut r = ByteReader::new(bytes);

    let first_word = need!(r.u32_be(), rec, r.pos());
    let version = (first_word >> 28) as u8;
    let traffic_class = ((first_word >> 20) & 0xff) as u8;
    let flow_label = first_word & 0x000f_ffff;
    rec.push("Version", version.to_string());
    rec.push("DSCP", (traffic_class >> 2).to_string());
    rec.push("ECN", (traffic_class & 0x03).to_string());
    rec.push("Flow Label", format!("0x{:05x}", flow_label));

    let payload_length = need!(r.u16_be(), rec, r.pos());
    rec.push("Payload Length", payload_length.to_string());

    let mut next_header = need!(r.u8(), rec, r.pos());
    rec.push(
        "Next Header",
        format!("{} ({})", next_header, next_header_name(next_header)),
    );

    let hop_limit = need!(r.u8(), rec, r.pos());
    rec.push("Hop Limit", hop_limit.to_string());

    let src = need!(r.take(16), rec, r.pos());
    rec.push("Source", format_ipv6(src));

    let dst = need!(r.take(16), rec, r.pos());
    rec.push("Destination", format_ipv6(dst));

    // Walk the extension-header chain. Each header carries the next type
    // in byte 0 and its own length in byte 1 (8-byte units, excluding the
    // first 8; the Fragment header is fixed at 8).
    let mut walked = 0usize;
    while is_extension_header(next_header) && walked < MAX_EXTENSION_HEADERS {
        let ext_type = next_header;
        let chain_next = need!(r.u8(), rec, r.pos());
        let hdr_ext_len = need!(r.u8(), rec, r.pos());
        let ext_total = if ext_type == FRAGMENT {
            8
        } else {
            (hdr_ext_len as usize + 1) * 8
        };
        need!(r.skip(ext_total - 2), rec, r.pos());

        rec.push(
            "Extension Header",
            format!(
                "{} ({} bytes), next {}",
                next_header_name(ext_type),
                ext_total,
                next_header_name(chain_next)
            ),
        );
        next_header = chain_next;
        walked += 1;
    }

    if is_extension_header(next_header) {
        rec.span.length = r.pos();
        rec.warn(format!(
            "extension header chain exceeds {} headers",
            MAX_EXTENSION_HEADERS
        ));
        return Ok((rec, Descend::Stop));
    }

    rec.span.length = r.pos();
    Ok((rec, Descend::IpProtocol(next_header)))
}
