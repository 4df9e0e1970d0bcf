//! DNS message decoding (RFC 1035), including compressed-name handling.
//!
//! Name decompression is capped at 10 pointer jumps and 255 decoded bytes,
//! so a crafted pointer cycle terminates instead of looping.

use crate::ipv4::format_ipv4;
use crate::ipv6::format_ipv6;
use crate::record::{DissectError, LayerRecord, Protocol};

const MAX_POINTER_JUMPS: usize = 10;
const MAX_NAME_BYTES: usize = 255;

/// Cap on rendered resource records per section, to bound the field list
/// on hostile count fields.
const MAX_RENDERED_RRS: usize = 32;

pub fn rr_type_name(rr_type: u16) -> &'static str {
    match rr_type {
        1 => "A",
        2 => "NS",
        5 => "CNAME",
        6 => "SOA",
        12 => "PTR",
        15 => "MX",
        16 => "TXT",
        28 => "AAAA",
        33 => "SRV",
        41 => "OPT",
        43 => "DS",
        46 => "RRSIG",
        48 => "DNSKEY",
        _ => "UNKNOWN",
    }
}

pub fn rcode_name(rcode: u16) -> &'static str {
    match rcode {
        0 => "NoError",
        1 => "FormErr",
        2 => "ServFail",
        3 => "NXDOMAIN",
        4 => "NotImp",
        5 => "Refused",
        _ => "Unknown",
    }
}

/// Decode a possibly-compressed domain name starting at `start`.
///
/// Returns the dotted name and the number of bytes the name occupies at
/// `start` (up to and including the first pointer or the root label).
/// Returns `None` on truncation, label overflow, or a pointer cycle.
pub fn decode_name(message: &[u8], start: usize) -> Option<(String, usize)> {
    let mut labels: Vec<String> = Vec::new();
    let mut pos = start;
    let mut jumps = 0usize;
    let mut decoded_bytes = 0usize;
    // Bytes the name occupies at its original position; fixed at the
    // first pointer jump.
    let mut consumed: Option<usize> = None;

    loop {
        let len = *message.get(pos)? as usize;

        if len == 0 {
            let used = consumed.unwrap_or(pos + 1 - start);
            return Some((labels.join("."), used));
        }

        if len & 0xc0 == 0xc0 {
            let low = *message.get(pos + 1)? as usize;
            if consumed.is_none() {
                consumed = Some(pos + 2 - start);
            }
            let target = ((len & 0x3f) << 8) | low;
            if target >= message.len() {
                return None;
            }
            jumps += 1;
            if jumps > MAX_POINTER_JUMPS {
                return None;
            }
            pos = target;
            continue;
        }

        if len > 63 {
            return None;
        }
        let label = message.get(pos + 1..pos + 1 + len)?;
        decoded_bytes += len + 1;
        if decoded_bytes > MAX_NAME_BYTES {
            return None;
        }
        labels.push(
            label
                .iter()
                .map(|&b| if (0x20..=0x7e).contains(&b) { b as char } else { '.' })
                .collect(),
        );
        pos += 1 + len;
    }
}

fn ru16(bytes: &[u8], offset: usize) -> Option<u16> {
    let b = bytes.get(offset..offset + 2)?;
    Some(u16::from_be_bytes([b[0], b[1]]))
}

fn ru32(bytes: &[u8], offset: usize) -> Option<u32> {
    let b = bytes.get(offset..offset + 4)?;
    Some(u32::from_be_bytes([b[0], b[1], b[2], b[3]]))
}

pub fn dissect(bytes: &[u8], offset: usize) -> Result<LayerRecord, DissectError> {
    let mut rec = LayerRecord::new(Protocol::Dns, offset);

    let id = match ru16(bytes, 0) {
        Some(v) => v,
        None => return Err(DissectError::truncated(rec, bytes.len())),
    };
    rec.push("Transaction ID", format!("0x{:04x}", id));

    let flags = match ru16(bytes, 2) {
        Some(v) => v,
        None => return Err(DissectError::truncated(rec, bytes.len())),
    };
    let qr = (flags >> 15) & 0x1;
    let opcode = (flags >> 11) & 0xf;
    let rcode = flags & 0xf;
    rec.push("QR", if qr == 1 { "Response" } else { "Query" });
    rec.push("Opcode", opcode.to_string());
    rec.push("AA", ((flags >> 10) & 0x1).to_string());
    rec.push("TC", ((flags >> 9) & 0x1).to_string());
    rec.push("RD", ((flags >> 8) & 0x1).to_string());
    rec.push("RA", ((flags >> 7) & 0x1).to_string());
    rec.push("RCODE", format!("{} ({})", rcode, rcode_name(rcode)));

    let (qdcount, ancount, nscount, arcount) =
        match (ru16(bytes, 4), ru16(bytes, 6), ru16(bytes, 8), ru16(bytes, 10)) {
            (Some(qd), Some(an), Some(ns), Some(ar)) => (qd, an, ns, ar),
            _ => return Err(DissectError::truncated(rec, bytes.len())),
        };
    rec.push("Questions", qdcount.to_string());
    rec.push("Answers", ancount.to_string());
    rec.push("Authority RRs", nscount.to_string());
    rec.push("Additional RRs", arcount.to_string());

    if (flags >> 9) & 0x1 == 1 {
        rec.warn("message truncated (TC bit set)");
    }

    let mut pos = 12usize;

    for _ in 0..qdcount {
        let (qname, used) = match decode_name(bytes, pos) {
            Some(v) => v,
            None => return Err(DissectError::truncated(rec, bytes.len().min(pos))),
        };
        pos += used;
        let (qtype, qclass) = match (ru16(bytes, pos), ru16(bytes, pos + 2)) {
            (Some(t), Some(c)) => (t, c),
            _ => return Err(DissectError::truncated(rec, bytes.len())),
        };
        pos += 4;
        rec.push("Query Name", qname);
        rec.push("Query Type", format!("{} ({})", qtype, rr_type_name(qtype)));
        rec.push("Query Class", qclass.to_string());
    }

    for (section, count) in [
        ("Answer", ancount),
        ("Authority", nscount),
        ("Additional", arcount),
    ] {
        for i in 0..count {
            if i as usize >= MAX_RENDERED_RRS {
                rec.warn(format!("{} section rendered partially", section));
                break;
            }
            match parse_rr(bytes, pos) {
                Some((text, next)) => {
                    rec.push(section, text);
                    pos = next;
                }
                None => return Err(DissectError::truncated(rec, bytes.len().min(pos))),
            }
        }
    }

    rec.span.length = bytes.len();
    Ok(rec)
}

/// Parse one resource record, returning its rendered text and the offset
/// just past its RDATA.
fn parse_rr(bytes: &[u8], pos: usize) -> Option<(String, usize)> {
    let (name, used) = decode_name(bytes, pos)?;
    let mut off = pos + used;

    let rr_type = ru16(bytes, off)?;
    let _class = ru16(bytes, off + 2)?;
    let ttl = ru32(bytes, off + 4)?;
    let rdlength = ru16(bytes, off + 8)? as usize;
    off += 10;

    let rdata = bytes.get(off..off + rdlength)?;
    let shown_name = if name.is_empty() { "<root>".to_string() } else { name };

    let detail = match rr_type {
        1 if rdlength == 4 => format_ipv4(rdata),
        28 if rdlength == 16 => format_ipv6(rdata),
        2 | 5 | 12 => decode_name(bytes, off).map(|(n, _)| n).unwrap_or_default(),
        15 => {
            let pref = ru16(bytes, off)?;
            let exchange = decode_name(bytes, off + 2).map(|(n, _)| n).unwrap_or_default();
            format!("{} {}", pref, exchange)
        }
        16 => {
            // TXT: one or more length-prefixed strings
            let mut parts = Vec::new();
            let mut r_off = 0usize;
            while r_off < rdata.len() {
                let slen = rdata[r_off] as usize;
                r_off += 1;
                let Some(s) = rdata.get(r_off..r_off + slen) else { break };
                parts.push(
                    s.iter()
                        .map(|&b| if (0x20..=0x7e).contains(&b) { b as char } else { '.' })
                        .collect::<String>(),
                );
                r_off += slen;
            }
            parts.join(" ")
        }
        6 => {
            let (mname, m_used) = decode_name(bytes, off)?;
            let (rname, r_used) = decode_name(bytes, off + m_used)?;
            let serial = ru32(bytes, off + m_used + r_used)?;
            format!("{} {} serial {}", mname, rname, serial)
        }
        33 => {
            let priority = ru16(bytes, off)?;
            let weight = ru16(bytes, off + 2)?;
            let port = ru16(bytes, off + 4)?;
            let target = decode_name(bytes, off + 6).map(|(n, _)| n).unwrap_or_default();
            format!("prio {} weight {} port {} {}", priority, weight, port, target)
        }
        41 => format!("EDNS0 ({} option bytes)", rdlength),
        _ => format!("{} rdata bytes", rdlength),
    };

    Some((
        format!(
            "{}: {} {} (ttl {})",
            shown_name,
            rr_type_name(rr_type),
            detail,
            ttl
        ),
        off + rdlength,
    ))
}
