//! UDP header (RFC 768).

use crate::reader::{need, ByteReader};
use crate::record::{Descend, DissectError, LayerRecord, Protocol};

pub const HEADER_LEN: usize = 8;

pub fn dissect(bytes: &[u8], offset: usize) -> Result<(LayerRecord, Descend), DissectError> {
    let mut rec = LayerRecord::new(Protocol::Udp, offset);
    let mut r = ByteReader::new(bytes);

    let src_port = need!(r.u16_be(), rec, r.pos());
    rec.push("Source Port", src_port.to_string());

    let dst_port = need!(r.u16_be(), rec, r.pos());
    rec.push("Destination Port", dst_port.to_string());

    let length = need!(r.u16_be(), rec, r.pos());
    rec.push("Length", length.to_string());

    let checksum = need!(r.u16_be(), rec, r.pos());
    rec.push(
        "Checksum",
        if checksum == 0 {
            "0x0000 (disabled)".to_string()
        } else {
            format!("0x{:04x}", checksum)
        },
    );

    // The length field covers header + payload; re-validate against what
    // was actually captured.
    if (length as usize) < HEADER_LEN {
        rec.span.length = r.pos();
        rec.warn(format!("malformed: length field {} below header size", length));
        return Ok((rec, Descend::Stop));
    }
    if length as usize > bytes.len() {
        rec.warn(format!(
            "length field {} exceeds captured bytes {}",
            length,
            bytes.len()
        ));
    }

    rec.span.length = HEADER_LEN;
    Ok((
        rec,
        Descend::UdpPorts {
            src: src_port,
            dst: dst_port,
        },
    ))
}
