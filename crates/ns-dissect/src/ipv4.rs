//! IPv4 header (RFC 791).

use crate::reader::{need, ByteReader};
use crate::record::{Descend, DissectError, LayerRecord, Protocol};

pub fn format_ipv4(bytes: &[u8]) -> String {
    format!("{}.{}.{}.{}", bytes[0], bytes[1], bytes[2], bytes[3])
}

pub fn protocol_name(protocol: u8) -> &'static str {
    match protocol {
        1 => "ICMP",
        6 => "TCP",
        17 => "UDP",
        41 => "IPv6",
        47 => "GRE",
        50 => "ESP",
        51 => "AH",
        58 => "ICMPv6",
        132 => "SCTP",
        _ => "Unknown",
    }
}

pub fn dissect(bytes: &[u8], offset: usize) -> Result<(LayerRecord, Descend), DissectError> {
    let mut rec = LayerRecord::new(Protocol::Ipv4, offset);
    let mut r = ByteReader::new(bytes);

    let ver_ihl = need!(r.u8(), rec, r.pos());
    let version = ver_ihl >> 4;
    let ihl = ver_ihl & 0x0f;
    let header_len = ihl as usize * 4;
    rec.push("Version", version.to_string());
    rec.push("Header Length", format!("{} bytes", header_len));

    let tos = need!(r.u8(), rec, r.pos());
    let dscp = tos >> 2;
    let ecn = tos & 0x03;
    rec.push("DSCP", dscp.to_string());
    rec.push("ECN", ecn.to_string());

    let total_length = need!(r.u16_be(), rec, r.pos());
    rec.push("Total Length", total_length.to_string());

    let identification = need!(r.u16_be(), rec, r.pos());
    rec.push("Identification", format!("0x{:04x}", identification));

    let flags_fragment = need!(r.u16_be(), rec, r.pos());
    let flags = (flags_fragment >> 13) & 0x07;
    let fragment_offset = flags_fragment & 0x1fff;
    let mut flag_names = Vec::new();
    if flags & 0x02 != 0 {
        flag_names.push("DF");
    }
    if flags & 0x01 != 0 {
        flag_names.push("MF");
    }
    rec.push(
        "Flags",
        if flag_names.is_empty() {
            "None".to_string()
        } else {
            flag_names.join("+")
        },
    );
    rec.push(
        "Fragment Offset",
        format!("{} ({} bytes)", fragment_offset, fragment_offset as u32 * 8),
    );

    let ttl = need!(r.u8(), rec, r.pos());
    rec.push("TTL", ttl.to_string());

    let protocol = need!(r.u8(), rec, r.pos());
    rec.push(
        "Protocol",
        format!("{} ({})", protocol, protocol_name(protocol)),
    );

    let checksum = need!(r.u16_be(), rec, r.pos());
    rec.push("Header Checksum", format!("0x{:04x}", checksum));

    let src = need!(r.take(4), rec, r.pos());
    rec.push("Source", format_ipv4(src));

    let dst = need!(r.take(4), rec, r.pos());
    rec.push("Destination", format_ipv4(dst));

    // Header-length sanity gates the descent: IHL below 5 or beyond the
    // captured bytes means nothing after the fixed header can be trusted.
    if ihl < 5 {
        rec.span.length = r.pos();
        rec.warn(format!("malformed: header length {} below minimum", header_len));
        return Ok((rec, Descend::Stop));
    }
    if header_len > bytes.len() {
        rec.span.length = r.pos();
        rec.warn(format!(
            "malformed: header length {} exceeds captured bytes {}",
            header_len,
            bytes.len()
        ));
        return Ok((rec, Descend::Stop));
    }

    // Options are dumped raw, with a count of option bytes.
    if header_len > 20 {
        let options = need!(r.take(header_len - 20), rec, r.pos());
        let preview: Vec<String> = options.iter().take(16).map(|b| format!("{:02x}", b)).collect();
        rec.push(
            "Options",
            format!("{} bytes: {}", options.len(), preview.join(" ")),
        );
    }

    rec.span.length = header_len;
    Ok((rec, Descend::IpProtocol(protocol)))
}
