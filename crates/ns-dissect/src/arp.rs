//! ARP over Ethernet/IPv4 (RFC 826), 28 bytes.

use crate::ethernet::format_mac;
use crate::ipv4::format_ipv4;
use crate::reader::{need, ByteReader};
use crate::record::{Descend, DissectError, LayerRecord, Protocol};

pub fn opcode_name(opcode: u16) -> &'static str {
    match opcode {
        1 => "Request",
        2 => "Reply",
        _ => "Unknown",
    }
}

pub fn dissect(bytes: &[u8], offset: usize) -> Result<(LayerRecord, Descend), DissectError> {
    let mut rec = LayerRecord::new(Protocol::Arp, offset);
    let mut r = ByteReader::new(bytes);

    let hardware_type = need!(r.u16_be(), rec, r.pos());
    rec.push("Hardware Type", hardware_type.to_string());

    let protocol_type = need!(r.u16_be(), rec, r.pos());
    rec.push("Protocol Type", format!("0x{:04x}", protocol_type));

    let hlen = need!(r.u8(), rec, r.pos());
    rec.push("Hardware Size", hlen.to_string());

    let plen = need!(r.u8(), rec, r.pos());
    rec.push("Protocol Size", plen.to_string());

    let opcode = need!(r.u16_be(), rec, r.pos());
    rec.push(
        "Opcode",
        format!("{} ({})", opcode, opcode_name(opcode)),
    );

    // Address fields assume Ethernet/IPv4 (hlen 6, plen 4), the only pair
    // the dispatch table routes here.
    let sender_mac = need!(r.take(6), rec, r.pos());
    rec.push("Sender MAC", format_mac(sender_mac));

    let sender_ip = need!(r.take(4), rec, r.pos());
    rec.push("Sender IP", format_ipv4(sender_ip));

    let target_mac = need!(r.take(6), rec, r.pos());
    rec.push("Target MAC", format_mac(target_mac));

    let target_ip = need!(r.take(4), rec, r.pos());
    rec.push("Target IP", format_ipv4(target_ip));

    rec.span.length = r.pos();
    Ok((rec, Descend::Stop))
}
