//! Ethernet II frame header (DLT_EN10MB), 14 bytes fixed.

use crate::reader::{need, ByteReader};
use crate::record::{Descend, DissectError, LayerRecord, Protocol};

pub const HEADER_LEN: usize = 14;

/// Format MAC bytes as a colon-separated lowercase hex string.
pub fn format_mac(bytes: &[u8]) -> String {
    bytes
        .iter()
        .map(|b| format!("{:02x}", b))
        .collect::<Vec<_>>()
        .join(":")
}

pub fn dissect(bytes: &[u8], offset: usize) -> Result<(LayerRecord, Descend), DissectError> {
    let mut rec = LayerRecord::new(Protocol::Ethernet, offset);
    let mut r = ByteReader::new(bytes);

    let dst = need!(r.take(6), rec, r.pos());
    rec.push("Destination MAC", format_mac(dst));

    let src = need!(r.take(6), rec, r.pos());
    rec.push("Source MAC", format_mac(src));

    let ethertype = need!(r.u16_be(), rec, r.pos());
    rec.push("EtherType", format!("0x{:04x}", ethertype));

    rec.span.length = HEADER_LEN;
    Ok((rec, Descend::EtherType(ethertype)))
}
