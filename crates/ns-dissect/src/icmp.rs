//! ICMP (RFC 792) and ICMPv6 (RFC 4443) type/code decoding.

use crate::reader::{need, ByteReader};
use crate::record::{Descend, DissectError, LayerRecord, Protocol};

pub fn type_name_v4(icmp_type: u8, code: u8) -> String {
    match icmp_type {
        0 => "Echo Reply".to_string(),
        3 => match code {
            0 => "Destination Network Unreachable".to_string(),
            1 => "Destination Host Unreachable".to_string(),
            2 => "Destination Protocol Unreachable".to_string(),
            3 => "Destination Port Unreachable".to_string(),
            _ => format!("Destination Unreachable (code {})", code),
        },
        5 => "Redirect".to_string(),
        8 => "Echo Request".to_string(),
        11 => "Time Exceeded".to_string(),
        _ => format!("Type {} Code {}", icmp_type, code),
    }
}

pub fn type_name_v6(icmp_type: u8, code: u8) -> String {
    match icmp_type {
        1 => "Destination Unreachable".to_string(),
        2 => "Packet Too Big".to_string(),
        3 => "Time Exceeded".to_string(),
        4 => "Parameter Problem".to_string(),
        128 => "Echo Request".to_string(),
        129 => "Echo Reply".to_string(),
        133 => "Router Solicitation".to_string(),
        134 => "Router Advertisement".to_string(),
        135 => "Neighbor Solicitation".to_string(),
        136 => "Neighbor Advertisement".to_string(),
        _ => format!("Type {} Code {}", icmp_type, code),
    }
}

pub fn dissect(
    bytes: &[u8],
    offset: usize,
    version6: bool,
) -> Result<(LayerRecord, Descend), DissectError> {
    let protocol = if version6 {
        Protocol::IcmpV6
    } else {
        Protocol::Icmp
    };
    let mut rec = LayerRecord::new(protocol, offset);
    let mut r = ByteReader::new(bytes);

    let icmp_type = need!(r.u8(), rec, r.pos());
    let code = need!(r.peek_u8(), rec, r.pos());
    let name = if version6 {
        type_name_v6(icmp_type, code)
    } else {
        type_name_v4(icmp_type, code)
    };
    rec.push("Type", format!("{} ({})", icmp_type, name));

    let code = need!(r.u8(), rec, r.pos());
    rec.push("Code", code.to_string());

    let checksum = need!(r.u16_be(), rec, r.pos());
    rec.push("Checksum", format!("0x{:04x}", checksum));

    // Echo messages carry identifier and sequence in the rest-of-header.
    let is_echo = (!version6 && (icmp_type == 0 || icmp_type == 8))
        || (version6 && (icmp_type == 128 || icmp_type == 129));
    if is_echo {
        let identifier = need!(r.u16_be(), rec, r.pos());
        rec.push("Identifier", identifier.to_string());
        let sequence = need!(r.u16_be(), rec, r.pos());
        rec.push("Sequence", sequence.to_string());
    }

    rec.span.length = bytes.len();
    Ok((rec, Descend::Stop))
}
