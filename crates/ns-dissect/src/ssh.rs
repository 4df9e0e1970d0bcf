//! SSH transport parsing: plaintext version exchange and binary packets
//! (RFC 4253), including KEXINIT algorithm lists and user-auth messages.

use crate::reader::{need, ByteReader};
use crate::record::{DissectError, LayerRecord, Protocol};

const MSG_DISCONNECT: u8 = 1;
const MSG_KEXINIT: u8 = 20;
const MSG_NEWKEYS: u8 = 21;
const MSG_USERAUTH_REQUEST: u8 = 50;
const MSG_USERAUTH_FAILURE: u8 = 51;
const MSG_USERAUTH_SUCCESS: u8 = 52;
const MSG_CHANNEL_DATA: u8 = 94;

const KEXINIT_LIST_NAMES: [&str; 10] = [
    "Key Exchange",
    "Server Host Key",
    "Encryption C->S",
    "Encryption S->C",
    "MAC C->S",
    "MAC S->C",
    "Compression C->S",
    "Compression S->C",
    "Languages C->S",
    "Languages S->C",
];

pub fn message_type_name(msg_type: u8) -> &'static str {
    match msg_type {
        MSG_DISCONNECT => "DISCONNECT",
        2 => "IGNORE",
        3 => "UNIMPLEMENTED",
        4 => "DEBUG",
        5 => "SERVICE_REQUEST",
        6 => "SERVICE_ACCEPT",
        MSG_KEXINIT => "KEXINIT",
        MSG_NEWKEYS => "NEWKEYS",
        30 => "KEXDH_INIT",
        31 => "KEXDH_REPLY",
        MSG_USERAUTH_REQUEST => "USERAUTH_REQUEST",
        MSG_USERAUTH_FAILURE => "USERAUTH_FAILURE",
        MSG_USERAUTH_SUCCESS => "USERAUTH_SUCCESS",
        53 => "USERAUTH_BANNER",
        80 => "GLOBAL_REQUEST",
        90 => "CHANNEL_OPEN",
        91 => "CHANNEL_OPEN_CONFIRMATION",
        92 => "CHANNEL_OPEN_FAILURE",
        93 => "CHANNEL_WINDOW_ADJUST",
        MSG_CHANNEL_DATA => "CHANNEL_DATA",
        95 => "CHANNEL_EXTENDED_DATA",
        96 => "CHANNEL_EOF",
        97 => "CHANNEL_CLOSE",
        98 => "CHANNEL_REQUEST",
        _ => "UNKNOWN",
    }
}

pub fn disconnect_reason_name(reason: u32) -> &'static str {
    match reason {
        1 => "HOST_NOT_ALLOWED_TO_CONNECT",
        2 => "PROTOCOL_ERROR",
        3 => "KEY_EXCHANGE_FAILED",
        5 => "MAC_ERROR",
        6 => "COMPRESSION_ERROR",
        7 => "SERVICE_NOT_AVAILABLE",
        8 => "PROTOCOL_VERSION_NOT_SUPPORTED",
        9 => "HOST_KEY_NOT_VERIFIABLE",
        10 => "CONNECTION_LOST",
        11 => "BY_APPLICATION",
        12 => "TOO_MANY_CONNECTIONS",
        13 => "AUTH_CANCELLED_BY_USER",
        14 => "NO_MORE_AUTH_METHODS_AVAILABLE",
        15 => "ILLEGAL_USER_NAME",
        _ => "UNKNOWN",
    }
}

fn implementation_hint(version_line: &str) -> Option<&'static str> {
    if version_line.contains("OpenSSH") {
        Some("OpenSSH")
    } else if version_line.contains("libssh") {
        Some("libssh")
    } else if version_line.contains("PuTTY") {
        Some("PuTTY")
    } else if version_line.contains("Cisco") {
        Some("Cisco SSH")
    } else {
        None
    }
}

pub fn dissect(bytes: &[u8], offset: usize) -> Result<LayerRecord, DissectError> {
    let mut rec = LayerRecord::new(Protocol::Ssh, offset);

    if bytes.is_empty() {
        return Err(DissectError::truncated(rec, 0));
    }

    if bytes.starts_with(b"SSH-") {
        dissect_version_exchange(bytes, &mut rec);
        rec.span.length = bytes.len();
        return Ok(rec);
    }

    dissect_binary_packet(bytes, rec)
}

fn dissect_version_exchange(bytes: &[u8], rec: &mut LayerRecord) {
    let line_end = bytes
        .iter()
        .position(|&b| b == b'\r' || b == b'\n')
        .unwrap_or(bytes.len());
    let line = String::from_utf8_lossy(&bytes[..line_end]).into_owned();

    rec.push("Message", "Version Exchange");
    rec.push("Version String", line.clone());

    // SSH-<proto>-<software>
    let mut parts = line.splitn(3, '-');
    let _ssh = parts.next();
    if let Some(proto) = parts.next() {
        rec.push("Protocol Version", proto.to_string());
        if proto == "1.5" {
            rec.warn("deprecated_version: SSH-1.5");
        }
    }
    if let Some(software) = parts.next() {
        rec.push("Software", software.to_string());
    }
    if let Some(implementation) = implementation_hint(&line) {
        rec.push("Implementation", implementation);
    }
}

fn dissect_binary_packet(bytes: &[u8], mut rec: LayerRecord) -> Result<LayerRecord, DissectError> {
    let mut r = ByteReader::new(bytes);

    let packet_length = need!(r.u32_be(), rec, r.pos());
    rec.push("Packet Length", packet_length.to_string());

    let padding_length = need!(r.u8(), rec, r.pos());
    rec.push("Padding Length", padding_length.to_string());

    rec.push("Message", "Binary Packet");

    // payload = packet_length - padding_length - 1; anything inconsistent
    // is ciphertext from an established session.
    let payload_len = (packet_length as usize)
        .checked_sub(padding_length as usize + 1)
        .unwrap_or(0);
    if payload_len == 0 || payload_len > r.remaining() {
        rec.push("Status", "Encrypted");
        rec.span.length = bytes.len();
        return Ok(rec);
    }

    let payload = need!(r.take(payload_len), rec, r.pos());
    let mut p = ByteReader::new(payload);
    let Some(msg_type) = p.u8() else {
        rec.span.length = bytes.len();
        return Ok(rec);
    };
    rec.push(
        "Message Type",
        format!("{} ({})", msg_type, message_type_name(msg_type)),
    );

    match msg_type {
        MSG_KEXINIT => dissect_kexinit(&mut p, &mut rec),
        MSG_USERAUTH_REQUEST => dissect_userauth_request(&mut p, &mut rec),
        MSG_USERAUTH_FAILURE => {
            if let Some(methods) = read_string(&mut p, 256) {
                rec.push("Available Methods", methods);
            }
        }
        MSG_USERAUTH_SUCCESS => {
            rec.push("Authentication", "Successful");
        }
        MSG_CHANNEL_DATA => {
            if let (Some(channel), Some(data_len)) = (p.u32_be(), p.u32_be()) {
                rec.push("Channel", channel.to_string());
                rec.push("Data Length", data_len.to_string());
            }
        }
        MSG_DISCONNECT => {
            if let Some(reason) = p.u32_be() {
                rec.push(
                    "Disconnect Reason",
                    format!("{} ({})", reason, disconnect_reason_name(reason)),
                );
            }
        }
        _ => {}
    }

    rec.span.length = bytes.len();
    Ok(rec)
}

/// Read a length-prefixed SSH string, capped at `max` bytes.
fn read_string(r: &mut ByteReader, max: usize) -> Option<String> {
    let len = r.u32_be()? as usize;
    if len > max {
        return None;
    }
    let bytes = r.take(len)?;
    Some(String::from_utf8_lossy(bytes).into_owned())
}

fn dissect_kexinit(p: &mut ByteReader, rec: &mut LayerRecord) {
    // 16 bytes of cookie precede the ten algorithm name-lists.
    if p.skip(16).is_none() {
        rec.warn("truncated");
        return;
    }
    for list_name in KEXINIT_LIST_NAMES {
        match read_string(p, 4096) {
            Some(algorithms) => rec.push(list_name, algorithms),
            None => {
                rec.warn("truncated");
                return;
            }
        }
    }
}

fn dissect_userauth_request(p: &mut ByteReader, rec: &mut LayerRecord) {
    let Some(username) = read_string(p, 64) else {
        rec.warn("truncated");
        return;
    };
    rec.push("Username", username);

    let Some(service) = read_string(p, 32) else {
        rec.warn("truncated");
        return;
    };
    rec.push("Service", service);

    let Some(method) = read_string(p, 32) else {
        rec.warn("truncated");
        return;
    };
    rec.push("Method", method);
}
