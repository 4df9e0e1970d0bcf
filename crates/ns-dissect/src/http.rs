//! HTTP/1.x request and status lines plus header-name enumeration.
//!
//! Header values are deliberately not captured; only names are listed, with
//! security-relevant headers flagged.

use crate::record::{DissectError, LayerRecord, Protocol};

const SECURITY_HEADERS: &[&str] = &[
    "strict-transport-security",
    "content-security-policy",
    "x-frame-options",
    "x-content-type-options",
    "x-xss-protection",
    "referrer-policy",
    "permissions-policy",
];

const SENSITIVE_URI_TOKENS: &[&str] = &["password", "token", "key"];

const METHODS: &[&str] = &[
    "GET", "POST", "PUT", "DELETE", "HEAD", "OPTIONS", "PATCH", "CONNECT", "TRACE",
];

pub fn status_code_description(status_code: u16) -> &'static str {
    match status_code {
        200 => "OK",
        201 => "Created",
        204 => "No Content",
        301 => "Moved Permanently",
        302 => "Found",
        304 => "Not Modified",
        400 => "Bad Request",
        401 => "Unauthorized",
        403 => "Forbidden",
        404 => "Not Found",
        500 => "Internal Server Error",
        502 => "Bad Gateway",
        503 => "Service Unavailable",
        _ => "Unknown",
    }
}

fn is_security_header(name: &str) -> bool {
    SECURITY_HEADERS.contains(&name.to_ascii_lowercase().as_str())
}

pub fn dissect(bytes: &[u8], offset: usize) -> Result<LayerRecord, DissectError> {
    let mut rec = LayerRecord::new(Protocol::Http, offset);

    if bytes.is_empty() {
        return Err(DissectError::truncated(rec, 0));
    }

    let text = String::from_utf8_lossy(bytes);
    let mut lines = text.split("\r\n");

    let first = lines.next().unwrap_or("");

    if first.starts_with("HTTP/") {
        // Status line: VERSION CODE REASON
        let mut parts = first.splitn(3, ' ');
        let version = parts.next().unwrap_or("");
        rec.push("Version", version);
        if let Some(code_str) = parts.next() {
            if let Ok(code) = code_str.parse::<u16>() {
                rec.push(
                    "Status Code",
                    format!("{} ({})", code, status_code_description(code)),
                );
            } else {
                rec.warn("malformed: non-numeric status code");
            }
        }
        if let Some(reason) = parts.next() {
            rec.push("Reason", reason);
        }
    } else {
        // Request line: METHOD URI VERSION
        let mut parts = first.splitn(3, ' ');
        let method = parts.next().unwrap_or("");
        if !METHODS.contains(&method) {
            rec.span.length = bytes.len();
            rec.warn("malformed: not an HTTP message");
            return Ok(rec);
        }
        rec.push("Method", method);
        if let Some(uri) = parts.next() {
            rec.push("URI", uri);
            let lowered = uri.to_ascii_lowercase();
            if SENSITIVE_URI_TOKENS.iter().any(|t| lowered.contains(t)) {
                rec.warn("sensitive_uri");
            }
        }
        if let Some(version) = parts.next() {
            rec.push("Version", version);
        }
    }

    // Header names only, until the blank line.
    for line in lines {
        if line.is_empty() {
            break;
        }
        if let Some(colon) = line.find(':') {
            let name = line[..colon].trim();
            if name.is_empty() {
                continue;
            }
            if is_security_header(name) {
                rec.push("Security Header", name);
            } else {
                rec.push("Header", name);
            }
        }
    }

    rec.span.length = bytes.len();
    Ok(rec)
}
