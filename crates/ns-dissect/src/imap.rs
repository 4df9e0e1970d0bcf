//! IMAP (RFC 3501): tagged commands and untagged responses, with LOGIN
//! credentials redacted.

use crate::record::{DissectError, LayerRecord, Protocol};
use crate::text;

const PRINTABLE_THRESHOLD: usize = 70;

const COMMANDS: &[&str] = &[
    "LOGIN", "LOGOUT", "SELECT", "EXAMINE", "FETCH", "STORE", "SEARCH", "LIST", "NOOP",
    "CAPABILITY", "IDLE", "APPEND", "UID", "STARTTLS",
];

pub fn dissect(
    bytes: &[u8],
    offset: usize,
    src_port: u16,
    _dst_port: u16,
) -> Result<LayerRecord, DissectError> {
    let mut rec = LayerRecord::new(Protocol::Imap, offset);

    if !text::is_printable_ascii(bytes, PRINTABLE_THRESHOLD) {
        rec.span.length = bytes.len();
        rec.warn("malformed: non-text payload on IMAP channel");
        return Ok(rec);
    }

    let server_to_client = src_port == 143;
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
            dissect_response(&line, &mut rec);
        } else {
            dissect_command(&line, &mut rec);
        }
    }

    rec.span.length = bytes.len();
    Ok(rec)
}

fn dissect_command(line: &str, rec: &mut LayerRecord) {
    // Tagged command: TAG VERB [arguments]
    let mut parts = line.splitn(3, ' ');
    let tag = parts.next().unwrap_or("");
    let verb = parts.next().unwrap_or("").to_ascii_uppercase();
    let arguments = parts.next().unwrap_or("");

    if !COMMANDS.contains(&verb.as_str()) {
        rec.push("Line", line.to_string());
        return;
    }

    if verb == "LOGIN" {
        rec.push("Command", format!("{} LOGIN <redacted>", tag));
        rec.warn("plaintext_credentials");
    } else if arguments.is_empty() {
        rec.push("Command", format!("{} {}", tag, verb));
    } else {
        rec.push("Command", format!("{} {} {}", tag, verb, arguments));
    }
}

fn dissect_response(line: &str, rec: &mut LayerRecord) {
    let status = ["OK", "NO", "BAD", "PREAUTH", "BYE"]
        .iter()
        .find(|s| {
            line.split(' ')
                .nth(1)
                .map(|word| word == **s)
                .unwrap_or(false)
                || line.starts_with(&format!("* {}", s))
        })
        .copied();

    match status {
        Some(status) => rec.push("Response", format!("{}: {}", status, line)),
        None => rec.push("Response", line.to_string()),
    }
}
