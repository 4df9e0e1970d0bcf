//! QUIC header parsing (RFC 9000) with strict content-based detection.
//!
//! Detection accepts a long header only with a recognized version, and a
//! short header only with the fixed bit set and enough bytes past the
//! packet number. The registry additionally never routes ports 53/443 here.

use crate::reader::{need, ByteReader};
use crate::record::{DissectError, LayerRecord, Protocol};

const VERSION_NEGOTIATION: u32 = 0x0000_0000;
const VERSION_1: u32 = 0x0000_0001;
const VERSION_DRAFT_29: u32 = 0xff00_001d;
const VERSION_GOOGLE: u32 = 0x6b33_43cf;
const VERSION_Q050: u32 = 0x5130_3530;
const VERSION_Q046: u32 = 0x5130_3436;

const MAX_CID_LENGTH: usize = 20;

pub fn packet_type_name(packet_type: u8) -> &'static str {
    match packet_type {
        0 => "Initial",
        1 => "0-RTT",
        2 => "Handshake",
        3 => "Retry",
        _ => "Unknown",
    }
}

pub fn version_name(version: u32) -> &'static str {
    match version {
        VERSION_1 => "QUIC v1 (RFC 9000)",
        VERSION_DRAFT_29 => "Draft-29",
        VERSION_NEGOTIATION => "Version Negotiation",
        VERSION_GOOGLE => "Google QUIC",
        VERSION_Q050 => "Q050",
        VERSION_Q046 => "Q046",
        _ => "Unknown/Custom",
    }
}

fn is_known_version(version: u32) -> bool {
    matches!(
        version,
        VERSION_1
            | VERSION_DRAFT_29
            | VERSION_NEGOTIATION
            | VERSION_GOOGLE
            | VERSION_Q050
            | VERSION_Q046
    ) || (version & 0xff00_0000) == 0xff00_0000
}

/// Decode a QUIC variable-length integer. Returns the value and the number
/// of bytes it occupies (1, 2, 4 or 8 per the two-bit length prefix).
pub fn decode_varint(bytes: &[u8]) -> Option<(u64, usize)> {
    let first = *bytes.first()?;
    let len = match first >> 6 {
        0b00 => 1,
        0b01 => 2,
        0b10 => 4,
        _ => 8,
    };
    let body = bytes.get(..len)?;
    let mut value = (first & 0x3f) as u64;
    for &b in &body[1..] {
        value = (value << 8) | b as u64;
    }
    Some((value, len))
}

/// Encode a value in its minimal varint length class. Values above 2^62-1
/// are not representable.
pub fn encode_varint(value: u64) -> Option<Vec<u8>> {
    if value < 1 << 6 {
        Some(vec![value as u8])
    } else if value < 1 << 14 {
        let mut out = (value as u16).to_be_bytes().to_vec();
        out[0] |= 0x40;
        Some(out)
    } else if value < 1 << 30 {
        let mut out = (value as u32).to_be_bytes().to_vec();
        out[0] |= 0x80;
        Some(out)
    } else if value < 1 << 62 {
        let mut out = value.to_be_bytes().to_vec();
        out[0] |= 0xc0;
        Some(out)
    } else {
        None
    }
}

/// Content-based QUIC detection. Callers must already have excluded ports
/// that carry other protocols (53, 443).
pub fn detect(payload: &[u8]) -> bool {
    if payload.len() < 5 {
        return false;
    }
    let first = payload[0];

    if first & 0x80 != 0 {
        if payload.len() < 6 {
            return false;
        }
        let version = u32::from_be_bytes([payload[1], payload[2], payload[3], payload[4]]);
        return is_known_version(version);
    }

    // Short header: fixed bit required, plus enough bytes past the packet
    // number to plausibly hold a ciphertext.
    if first & 0x40 == 0 {
        return false;
    }
    let pn_len = (first & 0x03) as usize + 1;
    payload.len() > pn_len + 4
}

pub fn dissect(bytes: &[u8], offset: usize) -> Result<LayerRecord, DissectError> {
    let mut rec = LayerRecord::new(Protocol::Quic, offset);
    let mut r = ByteReader::new(bytes);

    let first = need!(r.u8(), rec, r.pos());

    if first & 0x80 != 0 {
        return dissect_long_header(bytes, first, r, rec);
    }

    rec.push("Header Form", "Short (1-RTT)");
    rec.push("Spin Bit", ((first >> 5) & 1).to_string());
    rec.push("Key Phase", ((first >> 2) & 1).to_string());
    let pn_len = (first & 0x03) as usize + 1;
    rec.push("Packet Number Length", pn_len.to_string());
    let pn = need!(r.take(pn_len), rec, r.pos());
    rec.push("Packet Number", hex(pn));
    rec.push("Encrypted Payload", format!("{} bytes", r.remaining()));

    rec.span.length = bytes.len();
    Ok(rec)
}

fn dissect_long_header(
    bytes: &[u8],
    first: u8,
    mut r: ByteReader,
    mut rec: LayerRecord,
) -> Result<LayerRecord, DissectError> {
    rec.push("Header Form", "Long");

    let packet_type = (first & 0x30) >> 4;
    rec.push("Packet Type", packet_type_name(packet_type));

    let version = need!(r.u32_be(), rec, r.pos());
    rec.push(
        "Version",
        format!("0x{:08x} ({})", version, version_name(version)),
    );

    if version == VERSION_NEGOTIATION {
        // Remainder is a list of supported versions.
        let mut supported = Vec::new();
        while r.remaining() >= 4 {
            if let Some(v) = r.u32_be() {
                supported.push(format!("0x{:08x}", v));
            }
        }
        rec.push("Supported Versions", supported.join(" "));
        rec.span.length = bytes.len();
        return Ok(rec);
    }

    let dcid_len = need!(r.u8(), rec, r.pos()) as usize;
    if dcid_len > MAX_CID_LENGTH {
        rec.span.length = r.pos();
        rec.warn(format!("malformed: DCID length {} exceeds 20", dcid_len));
        return Ok(rec);
    }
    rec.push("DCID Length", dcid_len.to_string());
    let dcid = need!(r.take(dcid_len), rec, r.pos());
    rec.push(
        "DCID",
        if dcid.is_empty() { "(empty)".to_string() } else { hex(dcid) },
    );

    let scid_len = need!(r.u8(), rec, r.pos()) as usize;
    if scid_len > MAX_CID_LENGTH {
        rec.span.length = r.pos();
        rec.warn(format!("malformed: SCID length {} exceeds 20", scid_len));
        return Ok(rec);
    }
    rec.push("SCID Length", scid_len.to_string());
    let scid = need!(r.take(scid_len), rec, r.pos());
    rec.push(
        "SCID",
        if scid.is_empty() { "(empty)".to_string() } else { hex(scid) },
    );

    match packet_type {
        0 => {
            // Initial: token length (varint) + token
            let (token_len, used) = need!(decode_varint(&bytes[r.pos()..]), rec, r.pos());
            need!(r.skip(used), rec, r.pos());
            rec.push("Token Length", token_len.to_string());
            if token_len > 0 {
                let token = need!(r.take(token_len as usize), rec, r.pos());
                rec.push("Token", hex_preview(token, 16));
            }
        }
        3 => {
            // Retry: the rest is the retry token + integrity tag.
            let token = r.rest();
            rec.push("Retry Token", hex_preview(token, 16));
            rec.span.length = bytes.len();
            return Ok(rec);
        }
        _ => {}
    }

    let (length, used) = need!(decode_varint(&bytes[r.pos()..]), rec, r.pos());
    need!(r.skip(used), rec, r.pos());
    rec.push("Length", length.to_string());

    let pn_len = (first & 0x03) as usize + 1;
    rec.push("Packet Number Length", pn_len.to_string());
    let pn = need!(r.take(pn_len), rec, r.pos());
    rec.push("Packet Number", hex(pn));

    rec.span.length = bytes.len();
    Ok(rec)
}

fn hex(bytes: &[u8]) -> String {
    bytes.iter().map(|b| format!("{:02x}", b)).collect()
}

fn hex_preview(bytes: &[u8], max: usize) -> String {
    if bytes.len() <= max {
        hex(bytes)
    } else {
        format!("{}... ({} bytes)", hex(&bytes[..max]), bytes.len())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn sample_initial() -> Vec<u8> {
        let mut bytes = vec![
            0xc0, // long header, Initial, pn length 1
            0x00, 0x00, 0x00, 0x01, // version 1
            0x08, // DCID length
            0x01, 0x02, 0x03, 0x04, 0x05, 0x06, 0x07, 0x08,
            0x08, // SCID length
            0x11, 0x12, 0x13, 0x14, 0x15, 0x16, 0x17, 0x18,
            0x00, // token length 0
        ];
        bytes.extend_from_slice(&encode_varint(32).unwrap());
        bytes.push(0x2a); // packet number
        bytes.extend_from_slice(&[0u8; 31]);
        bytes
    }

    #[test]
    fn test_initial_packet() {
        let rec = dissect(&sample_initial(), 42).unwrap();
        assert_eq!(rec.field("Packet Type"), Some("Initial"));
        assert_eq!(rec.field("Version"), Some("0x00000001 (QUIC v1 (RFC 9000))"));
        assert_eq!(rec.field("DCID Length"), Some("8"));
        assert_eq!(rec.field("SCID Length"), Some("8"));
        assert_eq!(rec.field("DCID"), Some("0102030405060708"));
        assert_eq!(rec.field("Token Length"), Some("0"));
        assert_eq!(rec.field("Packet Number"), Some("2a"));
    }

    #[test]
    fn test_short_header() {
        let bytes = [0x41, 0x12, 0x34, 0x56, 0x78, 0xde, 0xad, 0xbe, 0xef];
        let rec = dissect(&bytes, 42).unwrap();
        assert_eq!(rec.field("Header Form"), Some("Short (1-RTT)"));
        assert_eq!(rec.field("Key Phase"), Some("0"));
        assert_eq!(rec.field("Packet Number Length"), Some("2"));
    }

    #[test]
    fn test_varint_round_trip_minimal_classes() {
        let cases: &[(u64, usize)] = &[
            (0, 1),
            (63, 1),
            (64, 2),
            (16383, 2),
            (16384, 4),
            (1 << 29, 4),
            (1 << 30, 8),
            ((1 << 62) - 1, 8),
        ];
        for &(value, expected_len) in cases {
            let encoded = encode_varint(value).unwrap();
            assert_eq!(encoded.len(), expected_len, "value {}", value);
            let (decoded, used) = decode_varint(&encoded).unwrap();
            assert_eq!(decoded, value);
            assert_eq!(used, expected_len);
        }
        assert!(encode_varint(1 << 62).is_none());
    }

    #[test]
    fn test_detection_rules() {
        assert!(detect(&sample_initial()));

        // Long header with unknown version
        let mut bogus = sample_initial();
        bogus[1..5].copy_from_slice(&0x12345678u32.to_be_bytes());
        assert!(!detect(&bogus));

        // Draft-range version
        bogus[1..5].copy_from_slice(&0xff00_0020u32.to_be_bytes());
        assert!(detect(&bogus));

        // Short header without fixed bit
        assert!(!detect(&[0x01, 1, 2, 3, 4, 5, 6, 7, 8]));
        // Short header with fixed bit but too little payload
        assert!(!detect(&[0x40, 1, 2, 3, 4]));
        // Short header with fixed bit and enough payload
        assert!(detect(&[0x40, 1, 2, 3, 4, 5, 6]));
    }

    #[test]
    fn test_version_negotiation() {
        let mut bytes = vec![0x80, 0, 0, 0, 0]; // long header, version 0
        bytes.extend_from_slice(&VERSION_1.to_be_bytes());
        bytes.extend_from_slice(&VERSION_DRAFT_29.to_be_bytes());
        let rec = dissect(&bytes, 42).unwrap();
        assert_eq!(
            rec.field("Supported Versions"),
            Some("0x00000001 0xff00001d")
        );
    }

    #[test]
    fn test_oversized_cid_is_malformed() {
        let bytes = [0xc0, 0x00, 0x00, 0x00, 0x01, 0x30]; // DCID length 48
        let rec = dissect(&bytes, 42).unwrap();
        assert!(rec.is_malformed());
    }

    #[test]
    fn test_truncated_token() {
        let mut bytes = sample_initial();
        bytes[22] = 0x10; // claim a 16-byte token, then cut the packet
        bytes.truncate(26);
        let layer = dissect(&bytes, 42).unwrap_err().into_layer();
        assert!(layer.is_truncated());
        assert_eq!(layer.field("Token Length"), Some("16"));
    }
}
