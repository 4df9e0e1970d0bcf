//! FTP control channel (RFC 959): command/response lines with credential
//! redaction.

use crate::record::{DissectError, LayerRecord, Protocol};
use crate::text;

/// Commands whose arguments are never recorded.
const SENSITIVE_COMMANDS: &[&str] = &["PASS", "USER", "ACCT", "AUTH", "ADAT", "PROT", "PBSZ", "CCC"];

/// Printable-ASCII ratio required before attempting a parse.
const PRINTABLE_THRESHOLD: usize = 80;

pub fn is_sensitive_command(command: &str) -> bool {
    SENSITIVE_COMMANDS
        .iter()
        .any(|c| c.eq_ignore_ascii_case(command))
}

fn response_status(code: u16) -> &'static str {
    match code {
        200..=299 => "Success",
        300..=399 => "Intermediate",
        400..=499 => "Temporary failure",
        500..=599 => "Permanent failure",
        _ => "Unknown",
    }
}

pub fn dissect(
    bytes: &[u8],
    offset: usize,
    src_port: u16,
    _dst_port: u16,
) -> Result<LayerRecord, DissectError> {
    let mut rec = LayerRecord::new(Protocol::Ftp, offset);

    if !text::is_printable_ascii(bytes, PRINTABLE_THRESHOLD) {
        rec.span.length = bytes.len();
        rec.warn("malformed: non-text payload on FTP control channel");
        return Ok(rec);
    }

    let server_to_client = src_port == 21;
    rec.push(
        "Direction",
        if server_to_client {
            "Server -> Client"
        } else {
            "Client -> Server"
        },
    );

    for line in text::crlf_lines(bytes) {
        if line.is_empty() {
            continue;
        }
        if server_to_client {
            dissect_response(&line, &mut rec);
        } else {
            dissect_command(&line, &mut rec);
        }
    }

    rec.span.length = bytes.len();
    Ok(rec)
}

fn dissect_command(line: &str, rec: &mut LayerRecord) {
    let mut parts = line.splitn(2, ' ');
    let command = parts.next().unwrap_or("").to_ascii_uppercase();
    let argument = parts.next().unwrap_or("").trim();

    if command.is_empty() {
        return;
    }

    if argument.is_empty() {
        rec.push("Command", command);
    } else if is_sensitive_command(&command) {
        rec.push("Command", format!("{} <redacted>", command));
        rec.warn("plaintext_credentials");
    } else {
        rec.push("Command", format!("{} {}", command, argument));
    }
}

fn dissect_response(line: &str, rec: &mut LayerRecord) {
    let code: Option<u16> = line
        .get(..3)
        .and_then(|c| c.parse().ok())
        .filter(|_| matches!(line.as_bytes().get(3).copied(), None | Some(b' ') | Some(b'-')));

    match code {
        Some(code) => {
            let multiline = line.as_bytes().get(3) == Some(&b'-');
            let message = line.get(4..).unwrap_or("").trim();
            rec.push(
                "Response",
                format!(
                    "{}{} {} [{}]",
                    code,
                    if multiline { "-" } else { "" },
                    message,
                    response_status(code)
                ),
            );
        }
        None => rec.push("Response", line.to_string()),
    }
}
