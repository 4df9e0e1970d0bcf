//! Minimal ASN.1 BER primitives for the SNMP dissector: tag names,
//! short/long-form lengths, INTEGER, OCTET STRING and OBJECT IDENTIFIER.

pub const TAG_INTEGER: u8 = 0x02;
pub const TAG_OCTET_STRING: u8 = 0x04;
pub const TAG_NULL: u8 = 0x05;
pub const TAG_OID: u8 = 0x06;
pub const TAG_SEQUENCE: u8 = 0x30;
pub const TAG_COUNTER32: u8 = 0x41;
pub const TAG_GAUGE32: u8 = 0x42;
pub const TAG_TIMETICKS: u8 = 0x43;
pub const TAG_OPAQUE: u8 = 0x44;
pub const TAG_COUNTER64: u8 = 0x46;

pub fn type_name(tag: u8) -> &'static str {
    match tag {
        TAG_INTEGER => "INTEGER",
        TAG_OCTET_STRING => "OCTET STRING",
        TAG_NULL => "NULL",
        TAG_OID => "OBJECT IDENTIFIER",
        TAG_SEQUENCE => "SEQUENCE",
        TAG_COUNTER32 => "Counter32",
        TAG_GAUGE32 => "Gauge32",
        TAG_TIMETICKS => "TimeTicks",
        TAG_OPAQUE => "Opaque",
        TAG_COUNTER64 => "Counter64",
        _ => "Unknown",
    }
}

/// Decode a BER length at the start of `bytes`. Returns (length, bytes
/// consumed by the length field). Long form is capped at 4 octets.
pub fn decode_length(bytes: &[u8]) -> Option<(usize, usize)> {
    let first = *bytes.first()?;
    if first & 0x80 == 0 {
        return Some((first as usize, 1));
    }
    let octets = (first & 0x7f) as usize;
    if octets == 0 || octets > 4 {
        return None;
    }
    let body = bytes.get(1..1 + octets)?;
    let mut length = 0usize;
    for &b in body {
        length = (length << 8) | b as usize;
    }
    Some((length, 1 + octets))
}

/// Encode a length in the minimal short or long form.
pub fn encode_length(length: usize) -> Vec<u8> {
    if length < 0x80 {
        return vec![length as u8];
    }
    let bytes = length.to_be_bytes();
    let skip = bytes.iter().take_while(|&&b| b == 0).count();
    let body = &bytes[skip..];
    let mut out = vec![0x80 | body.len() as u8];
    out.extend_from_slice(body);
    out
}

/// Decode an INTEGER TLV at the start of `bytes`. Returns (value, total
/// bytes consumed).
pub fn decode_integer(bytes: &[u8]) -> Option<(i64, usize)> {
    if *bytes.first()? != TAG_INTEGER {
        return None;
    }
    let (len, len_bytes) = decode_length(&bytes[1..])?;
    if len == 0 || len > 8 {
        return None;
    }
    let body = bytes.get(1 + len_bytes..1 + len_bytes + len)?;
    let mut value: i64 = if body[0] & 0x80 != 0 { -1 } else { 0 };
    for &b in body {
        value = (value << 8) | b as i64;
    }
    Some((value, 1 + len_bytes + len))
}

/// Encode an INTEGER TLV in minimal two's-complement form.
pub fn encode_integer(value: i64) -> Vec<u8> {
    let raw = value.to_be_bytes();
    // Strip redundant leading octets while preserving the sign bit.
    let mut start = 0usize;
    while start < 7 {
        let octet = raw[start];
        let next = raw[start + 1];
        let redundant = (octet == 0x00 && next & 0x80 == 0) || (octet == 0xff && next & 0x80 != 0);
        if !redundant {
            break;
        }
        start += 1;
    }
    let body = &raw[start..];
    let mut out = vec![TAG_INTEGER];
    out.extend_from_slice(&encode_length(body.len()));
    out.extend_from_slice(body);
    out
}

/// Decode an OCTET STRING TLV. Returns (bytes, total consumed).
pub fn decode_octet_string(bytes: &[u8]) -> Option<(Vec<u8>, usize)> {
    if *bytes.first()? != TAG_OCTET_STRING {
        return None;
    }
    let (len, len_bytes) = decode_length(&bytes[1..])?;
    let body = bytes.get(1 + len_bytes..1 + len_bytes + len)?;
    Some((body.to_vec(), 1 + len_bytes + len))
}

pub fn encode_octet_string(value: &[u8]) -> Vec<u8> {
    let mut out = vec![TAG_OCTET_STRING];
    out.extend_from_slice(&encode_length(value.len()));
    out.extend_from_slice(value);
    out
}

/// Decode an OBJECT IDENTIFIER TLV into dotted-decimal form.
pub fn decode_oid(bytes: &[u8]) -> Option<(String, usize)> {
    if *bytes.first()? != TAG_OID {
        return None;
    }
    let (len, len_bytes) = decode_length(&bytes[1..])?;
    if len == 0 {
        return None;
    }
    let body = bytes.get(1 + len_bytes..1 + len_bytes + len)?;

    let mut parts = vec![(body[0] / 40).to_string(), (body[0] % 40).to_string()];
    let mut subid: u64 = 0;
    for &b in &body[1..] {
        subid = (subid << 7) | (b & 0x7f) as u64;
        if b & 0x80 == 0 {
            parts.push(subid.to_string());
            subid = 0;
        }
    }
    Some((parts.join("."), 1 + len_bytes + len))
}

/// Encode a dotted-decimal OID. Needs at least two arcs, with the usual
/// first-arc constraints.
pub fn encode_oid(oid: &str) -> Option<Vec<u8>> {
    let arcs: Vec<u64> = oid.split('.').map(|p| p.parse().ok()).collect::<Option<_>>()?;
    if arcs.len() < 2 || arcs[0] > 2 || arcs[1] > 39 {
        return None;
    }
    let mut body = vec![(arcs[0] * 40 + arcs[1]) as u8];
    for &arc in &arcs[2..] {
        let mut chunk = Vec::new();
        let mut value = arc;
        loop {
            chunk.push((value & 0x7f) as u8);
            value >>= 7;
            if value == 0 {
                break;
            }
        }
        chunk.reverse();
        let last = chunk.len() - 1;
        for (i, b) in chunk.iter_mut().enumerate() {
            if i != last {
                *b |= 0x80;
            }
        }
        body.extend_from_slice(&chunk);
    }
    let mut out = vec![TAG_OID];
    out.extend_from_slice(&encode_length(body.len()));
    out.extend_from_slice(&body);
    Some(out)
}
