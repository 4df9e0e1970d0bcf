//! SNMP message parsing (RFC 1157 / RFC 3416) over the BER primitives.
//!
//! v1/v2c messages yield version, community, PDU type, request id, error
//! status/index and the varbind count; v3 payloads are opaque past the
//! version integer.

use crate::ber;
use crate::record::{DissectError, LayerRecord, Protocol};

pub fn pdu_type_name(tag: u8) -> &'static str {
    match tag {
        0xa0 => "GetRequest",
        0xa1 => "GetNextRequest",
        0xa2 => "GetResponse",
        0xa3 => "SetRequest",
        0xa4 => "Trap (v1)",
        0xa5 => "GetBulkRequest",
        0xa6 => "InformRequest",
        0xa7 => "Trap (v2)",
        0xa8 => "Report",
        _ => "Unknown PDU",
    }
}

pub fn version_name(version: i64) -> &'static str {
    match version {
        0 => "SNMPv1",
        1 => "SNMPv2c",
        3 => "SNMPv3",
        _ => "Unknown",
    }
}

pub fn error_status_name(error_status: i64) -> &'static str {
    match error_status {
        0 => "No Error",
        1 => "Too Big",
        2 => "No Such Name",
        3 => "Bad Value",
        4 => "Read Only",
        5 => "General Error",
        6 => "No Access",
        7 => "Wrong Type",
        8 => "Wrong Length",
        9 => "Wrong Encoding",
        10 => "Wrong Value",
        11 => "No Creation",
        12 => "Inconsistent Value",
        13 => "Resource Unavailable",
        14 => "Commit Failed",
        15 => "Undo Failed",
        16 => "Authorization Error",
        17 => "Not Writable",
        18 => "Inconsistent Name",
        _ => "Unknown Error",
    }
}

pub fn dissect(bytes: &[u8], offset: usize) -> Result<LayerRecord, DissectError> {
    let mut rec = LayerRecord::new(Protocol::Snmp, offset);

    if bytes.first() != Some(&ber::TAG_SEQUENCE) {
        rec.span.length = bytes.len();
        rec.warn("malformed: not a BER SEQUENCE");
        return Ok(rec);
    }
    let Some((_msg_len, len_bytes)) = ber::decode_length(&bytes[1..]) else {
        return Err(DissectError::truncated(rec, bytes.len().min(2)));
    };
    let mut pos = 1 + len_bytes;

    let Some((version, used)) = ber::decode_integer(&bytes[pos..]) else {
        return Err(DissectError::truncated(rec, pos));
    };
    pos += used;
    rec.push("Version", format!("{} ({})", version, version_name(version)));

    if version == 3 {
        // v3 carries msgGlobalData and security parameters; the PDU is
        // typically encrypted.
        rec.push("Community", "[SNMPv3 - encrypted]");
        rec.push("Payload", format!("{} opaque bytes", bytes.len() - pos));
        rec.span.length = bytes.len();
        return Ok(rec);
    }

    let Some((community, used)) = ber::decode_octet_string(&bytes[pos..]) else {
        return Err(DissectError::truncated(rec, pos));
    };
    pos += used;
    let community = String::from_utf8_lossy(&community).into_owned();
    rec.push("Community", community.clone());
    if community == "public" || community == "private" {
        rec.warn(format!("default_community: {}", community));
    }

    let Some(&pdu_tag) = bytes.get(pos) else {
        return Err(DissectError::truncated(rec, pos));
    };
    if !(0xa0..=0xa8).contains(&pdu_tag) {
        rec.span.length = pos;
        rec.warn(format!("malformed: unexpected PDU tag 0x{:02x}", pdu_tag));
        return Ok(rec);
    }
    rec.push("PDU Type", format!("0x{:02x} ({})", pdu_tag, pdu_type_name(pdu_tag)));
    if pdu_tag == 0xa3 {
        rec.warn("snmp_set_operation");
    }

    let Some((_pdu_len, len_bytes)) = ber::decode_length(&bytes[pos + 1..]) else {
        return Err(DissectError::truncated(rec, pos));
    };
    pos += 1 + len_bytes;

    // The v1 Trap PDU has a different body (enterprise OID, agent address)
    // and carries no request id triple.
    if pdu_tag == 0xa4 {
        if let Some((enterprise, _)) = ber::decode_oid(&bytes[pos..]) {
            rec.push("Enterprise", enterprise);
        }
        rec.span.length = bytes.len();
        return Ok(rec);
    }

    let Some((request_id, used)) = ber::decode_integer(&bytes[pos..]) else {
        return Err(DissectError::truncated(rec, pos));
    };
    pos += used;
    rec.push("Request ID", request_id.to_string());

    let Some((error_status, used)) = ber::decode_integer(&bytes[pos..]) else {
        return Err(DissectError::truncated(rec, pos));
    };
    pos += used;
    rec.push(
        "Error Status",
        format!("{} ({})", error_status, error_status_name(error_status)),
    );

    let Some((error_index, used)) = ber::decode_integer(&bytes[pos..]) else {
        return Err(DissectError::truncated(rec, pos));
    };
    pos += used;
    rec.push("Error Index", error_index.to_string());

    // Varbind list: a SEQUENCE of SEQUENCEs; only the count is recorded.
    if bytes.get(pos) == Some(&ber::TAG_SEQUENCE) {
        if let Some((list_len, len_bytes)) = ber::decode_length(&bytes[pos + 1..]) {
            let list_start = pos + 1 + len_bytes;
            let list_end = (list_start + list_len).min(bytes.len());
            let mut count = 0usize;
            let mut vb_pos = list_start;
            while vb_pos < list_end && bytes.get(vb_pos) == Some(&ber::TAG_SEQUENCE) {
                let Some((vb_len, vb_len_bytes)) = ber::decode_length(&bytes[vb_pos + 1..]) else {
                    break;
                };
                count += 1;
                vb_pos += 1 + vb_len_bytes + vb_len;
            }
            rec.push("Variable Bindings", count.to_string());
        }
    }

    rec.span.length = bytes.len();
    Ok(rec)
}
