//! NTP header (RFC 5905): LI/VN/Mode split plus stratum, poll, precision.

use crate::reader::{need, ByteReader};
use crate::record::{DissectError, LayerRecord, Protocol};

pub fn mode_name(mode: u8) -> &'static str {
    match mode {
        0 => "Reserved",
        1 => "Symmetric Active",
        2 => "Symmetric Passive",
        3 => "Client",
        4 => "Server",
        5 => "Broadcast",
        6 => "Control",
        7 => "Private",
        _ => "Unknown",
    }
}

pub fn dissect(bytes: &[u8], offset: usize) -> Result<LayerRecord, DissectError> {
    let mut rec = LayerRecord::new(Protocol::Ntp, offset);
    let mut r = ByteReader::new(bytes);

    let li_vn_mode = need!(r.u8(), rec, r.pos());
    let leap = li_vn_mode >> 6;
    let version = (li_vn_mode >> 3) & 0x07;
    let mode = li_vn_mode & 0x07;
    rec.push("Leap Indicator", leap.to_string());
    rec.push("Version", version.to_string());
    rec.push("Mode", format!("{} ({})", mode, mode_name(mode)));

    let stratum = need!(r.u8(), rec, r.pos());
    rec.push("Stratum", stratum.to_string());

    let poll = need!(r.u8(), rec, r.pos());
    rec.push("Poll", (poll as i8).to_string());

    let precision = need!(r.u8(), rec, r.pos());
    rec.push("Precision", (precision as i8).to_string());

    rec.span.length = bytes.len();
    Ok(rec)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_client_request() {
        let mut bytes = vec![0x23, 2, 6, 0xec]; // v4 client, stratum 2
        bytes.extend_from_slice(&[0u8; 44]);
        let rec = dissect(&bytes, 42).unwrap();
        assert_eq!(rec.field("Version"), Some("4"));
        assert_eq!(rec.field("Mode"), Some("3 (Client)"));
        assert_eq!(rec.field("Stratum"), Some("2"));
        assert_eq!(rec.field("Precision"), Some("-20"));
    }

    #[test]
    fn test_truncated() {
        let layer = dissect(&[0x23, 2], 42).unwrap_err().into_layer();
        assert!(layer.is_truncated());
        assert_eq!(layer.field("Stratum"), Some("2"));
    }
}
