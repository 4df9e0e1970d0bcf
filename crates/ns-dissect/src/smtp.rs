//! SMTP control channel (RFC 5321): commands, multi-line replies, and
//! credential redaction.

use crate::record::{DissectError, LayerRecord, Protocol};
use crate::text;

const PRINTABLE_THRESHOLD: usize = 80;

const SERVER_PORTS: [u16; 3] = [25, 465, 587];

pub fn dissect(
    bytes: &[u8],
    offset: usize,
    src_port: u16,
    _dst_port: u16,
) -> Result<LayerRecord, DissectError> {
    let mut rec = LayerRecord::new(Protocol::Smtp, offset);

    if !text::is_printable_ascii(bytes, PRINTABLE_THRESHOLD) {
        rec.span.length = bytes.len();
        rec.warn("malformed: non-text payload on SMTP channel");
        return Ok(rec);
    }

    let server_to_client = SERVER_PORTS.contains(&src_port);
    rec.push(
        "Direction",
        if server_to_client {
            "Server -> Client"
        } else {
            "Client -> Server"
        },
    );

    for line in text::crlf_lines(bytes) {
        if server_to_client {
            dissect_reply(&line, &mut rec);
        } else {
            dissect_command(&line, &mut rec);
        }
    }

    rec.span.length = bytes.len();
    Ok(rec)
}

fn starts_with_ci(line: &str, prefix: &str) -> bool {
    line.len() >= prefix.len() && line[..prefix.len()].eq_ignore_ascii_case(prefix)
}

fn dissect_command(line: &str, rec: &mut LayerRecord) {
    if starts_with_ci(line, "AUTH ") {
        // Keep the mechanism, redact the credential blob.
        let mechanism = line[5..].split_whitespace().next().unwrap_or("");
        rec.push("Command", format!("AUTH {} <redacted>", mechanism));
        rec.warn("plaintext_credentials");
    } else if starts_with_ci(line, "PASS ") || starts_with_ci(line, "LOGIN ") {
        let verb = line.split_whitespace().next().unwrap_or("").to_ascii_uppercase();
        rec.push("Command", format!("{} <redacted>", verb));
        rec.warn("plaintext_credentials");
    } else if starts_with_ci(line, "MAIL FROM:") {
        rec.push("Command", format!("MAIL FROM:{}", line[10..].trim()));
    } else if starts_with_ci(line, "RCPT TO:") {
        rec.push("Command", format!("RCPT TO:{}", line[8..].trim()));
    } else {
        rec.push("Command", line.to_string());
    }
}

fn dissect_reply(line: &str, rec: &mut LayerRecord) {
    let bytes = line.as_bytes();
    let has_code = bytes.len() >= 3 && bytes[..3].iter().all(|b| b.is_ascii_digit());

    if has_code {
        let code: u16 = line[..3].parse().unwrap_or(0);
        let sep = bytes.get(3).copied();
        let text = line.get(4..).unwrap_or("").trim();
        let class = match code {
            200..=299 => "OK",
            400..=499 => "Temporary error",
            500..=599 => "Error",
            _ => "Reply",
        };
        rec.push(
            "Reply",
            format!(
                "{}{} {} [{}]",
                code,
                if sep == Some(b'-') { "-" } else { "" },
                text,
                class
            ),
        );
    } else {
        rec.push("Reply", line.to_string());
    }
}
