//! TLS record layer and ClientHello/ServerHello handshake parsing, with
//! weak-version and weak-cipher warnings.

use crate::reader::{need, ByteReader};
use crate::record::{DissectError, LayerRecord, Protocol};

const CONTENT_HANDSHAKE: u8 = 22;
const HANDSHAKE_CLIENT_HELLO: u8 = 1;
const HANDSHAKE_SERVER_HELLO: u8 = 2;

const EXT_SERVER_NAME: u16 = 0;

pub fn content_type_name(content_type: u8) -> &'static str {
    match content_type {
        20 => "ChangeCipherSpec",
        21 => "Alert",
        22 => "Handshake",
        23 => "Application Data",
        _ => "Unknown",
    }
}

pub fn version_name(version: u16) -> &'static str {
    match version {
        0x0300 => "SSL 3.0",
        0x0301 => "TLS 1.0",
        0x0302 => "TLS 1.1",
        0x0303 => "TLS 1.2",
        0x0304 => "TLS 1.3",
        _ => "Unknown",
    }
}

pub fn is_weak_version(version: u16) -> bool {
    matches!(version, 0x0300 | 0x0301 | 0x0302)
}

/// NULL, RC4 and 3DES suites from the original analyzer's deprecated set.
pub fn is_weak_cipher(cipher: u16) -> bool {
    matches!(cipher, 0x0000..=0x0005 | 0x000a)
}

pub fn cipher_name(cipher: u16) -> &'static str {
    match cipher {
        0x1301 => "TLS_AES_128_GCM_SHA256",
        0x1302 => "TLS_AES_256_GCM_SHA384",
        0x1303 => "TLS_CHACHA20_POLY1305_SHA256",
        0x009c => "TLS_RSA_WITH_AES_128_GCM_SHA256",
        0x009d => "TLS_RSA_WITH_AES_256_GCM_SHA384",
        0x002f => "TLS_RSA_WITH_AES_128_CBC_SHA",
        0x0035 => "TLS_RSA_WITH_AES_256_CBC_SHA",
        0xc02b => "TLS_ECDHE_ECDSA_WITH_AES_128_GCM_SHA256",
        0xc02c => "TLS_ECDHE_ECDSA_WITH_AES_256_GCM_SHA384",
        0xc02f => "TLS_ECDHE_RSA_WITH_AES_128_GCM_SHA256",
        0xc030 => "TLS_ECDHE_RSA_WITH_AES_256_GCM_SHA384",
        0xc013 => "TLS_ECDHE_RSA_WITH_AES_128_CBC_SHA",
        0xc014 => "TLS_ECDHE_RSA_WITH_AES_256_CBC_SHA",
        0xcca8 => "TLS_ECDHE_RSA_WITH_CHACHA20_POLY1305_SHA256",
        0xcca9 => "TLS_ECDHE_ECDSA_WITH_CHACHA20_POLY1305_SHA256",
        0x0000 => "TLS_NULL_WITH_NULL_NULL",
        0x0001 => "TLS_RSA_WITH_NULL_MD5",
        0x0002 => "TLS_RSA_WITH_NULL_SHA",
        0x0003 => "TLS_RSA_EXPORT_WITH_RC4_40_MD5",
        0x0004 => "TLS_RSA_WITH_RC4_128_MD5",
        0x0005 => "TLS_RSA_WITH_RC4_128_SHA",
        0x000a => "TLS_RSA_WITH_3DES_EDE_CBC_SHA",
        _ => "Unknown",
    }
}

pub fn dissect(bytes: &[u8], offset: usize) -> Result<LayerRecord, DissectError> {
    let mut rec = LayerRecord::new(Protocol::Tls, offset);
    let mut r = ByteReader::new(bytes);

    let content_type = need!(r.u8(), rec, r.pos());
    rec.push(
        "Content Type",
        format!("{} ({})", content_type, content_type_name(content_type)),
    );

    let record_version = need!(r.u16_be(), rec, r.pos());
    rec.push(
        "Record Version",
        format!("0x{:04x} ({})", record_version, version_name(record_version)),
    );

    let record_length = need!(r.u16_be(), rec, r.pos());
    rec.push("Record Length", record_length.to_string());

    if record_version >> 8 != 0x03 {
        rec.span.length = r.pos();
        rec.warn("malformed: not a TLS record");
        return Ok(rec);
    }

    if content_type == CONTENT_HANDSHAKE {
        let handshake = need!(r.take((record_length as usize).min(r.remaining())), rec, r.pos());
        dissect_handshake(handshake, &mut rec);
    }

    rec.span.length = bytes.len();
    Ok(rec)
}

fn dissect_handshake(handshake: &[u8], rec: &mut LayerRecord) {
    let mut r = ByteReader::new(handshake);

    let Some(handshake_type) = r.u8() else {
        rec.warn("truncated");
        return;
    };
    // 3-byte handshake length; not needed beyond the skip.
    if r.skip(3).is_none() {
        rec.warn("truncated");
        return;
    }

    match handshake_type {
        HANDSHAKE_CLIENT_HELLO => {
            rec.push("Handshake Type", "ClientHello");
            dissect_client_hello(&mut r, rec);
        }
        HANDSHAKE_SERVER_HELLO => {
            rec.push("Handshake Type", "ServerHello");
            dissect_server_hello(&mut r, rec);
        }
        other => {
            rec.push("Handshake Type", format!("{}", other));
        }
    }
}

fn dissect_client_hello(r: &mut ByteReader, rec: &mut LayerRecord) {
    macro_rules! some {
        ($expr:expr) => {
            match $expr {
                Some(v) => v,
                None => {
                    rec.warn("truncated");
                    return;
                }
            }
        };
    }

    let legacy_version = some!(r.u16_be());
    rec.push(
        "Client Version",
        format!("0x{:04x} ({})", legacy_version, version_name(legacy_version)),
    );
    if is_weak_version(legacy_version) {
        rec.warn(format!("weak_version: {}", version_name(legacy_version)));
    }

    some!(r.skip(32)); // random

    let session_id_len = some!(r.u8());
    some!(r.skip(session_id_len as usize));

    let cipher_suites_len = some!(r.u16_be()) as usize;
    let suites = some!(r.take(cipher_suites_len));
    let mut names = Vec::new();
    for pair in suites.chunks_exact(2) {
        let cipher = u16::from_be_bytes([pair[0], pair[1]]);
        names.push(format!("0x{:04x}", cipher));
        if is_weak_cipher(cipher) {
            rec.warn(format!("weak_cipher: 0x{:04x}", cipher));
        }
    }
    rec.push("Cipher Suites", names.join(" "));

    let compression_len = some!(r.u8());
    some!(r.skip(compression_len as usize));
    rec.push("Compression Methods", compression_len.to_string());

    // Extensions, scanning for SNI (type 0).
    let extensions_len = some!(r.u16_be()) as usize;
    let extensions = some!(r.take(extensions_len.min(r.remaining())));
    let mut er = ByteReader::new(extensions);
    let mut ext_types = Vec::new();
    while er.remaining() >= 4 {
        let ext_type = match er.u16_be() {
            Some(v) => v,
            None => break,
        };
        let ext_len = match er.u16_be() {
            Some(v) => v as usize,
            None => break,
        };
        let Some(body) = er.take(ext_len) else {
            rec.warn("truncated");
            break;
        };
        ext_types.push(format!("0x{:04x}", ext_type));
        if ext_type == EXT_SERVER_NAME {
            if let Some(sni) = parse_sni(body) {
                rec.push("SNI", sni);
            }
        }
    }
    rec.push("Extensions", ext_types.join(" "));
}

fn dissect_server_hello(r: &mut ByteReader, rec: &mut LayerRecord) {
    macro_rules! some {
        ($expr:expr) => {
            match $expr {
                Some(v) => v,
                None => {
                    rec.warn("truncated");
                    return;
                }
            }
        };
    }

    let version = some!(r.u16_be());
    rec.push(
        "Server Version",
        format!("0x{:04x} ({})", version, version_name(version)),
    );
    if is_weak_version(version) {
        rec.warn(format!("weak_version: {}", version_name(version)));
    }

    some!(r.skip(32)); // random
    let session_id_len = some!(r.u8());
    some!(r.skip(session_id_len as usize));

    let cipher = some!(r.u16_be());
    rec.push(
        "Cipher Suite",
        format!("0x{:04x} ({})", cipher, cipher_name(cipher)),
    );
    if is_weak_cipher(cipher) {
        rec.warn(format!("weak_cipher: 0x{:04x}", cipher));
    }

    let compression = some!(r.u8());
    rec.push("Compression Method", compression.to_string());
}

/// Extract the first host_name entry from a server_name extension body.
fn parse_sni(body: &[u8]) -> Option<String> {
    let mut r = ByteReader::new(body);
    let _list_len = r.u16_be()?;
    while r.remaining() >= 3 {
        let name_type = r.u8()?;
        let name_len = r.u16_be()? as usize;
        let name = r.take(name_len)?;
        if name_type == 0 {
            return Some(String::from_utf8_lossy(name).into_owned());
        }
    }
    None
}

#[cfg(test)]
pub(crate) fn build_client_hello(sni: &str, ciphers: &[u16]) -> Vec<u8> {
    // server_name extension
    let host = sni.as_bytes();
    let mut sni_body = Vec::new();
    sni_body.extend_from_slice(&((host.len() + 3) as u16).to_be_bytes());
    sni_body.push(0); // host_name
    sni_body.extend_from_slice(&(host.len() as u16).to_be_bytes());
    sni_body.extend_from_slice(host);

    let mut extensions = Vec::new();
    extensions.extend_from_slice(&0u16.to_be_bytes()); // type server_name
    extensions.extend_from_slice(&(sni_body.len() as u16).to_be_bytes());
    extensions.extend_from_slice(&sni_body);

    let mut hello = Vec::new();
    hello.extend_from_slice(&0x0303u16.to_be_bytes()); // client version
    hello.extend_from_slice(&[0xab; 32]); // random
    hello.push(0); // session id length
    hello.extend_from_slice(&((ciphers.len() * 2) as u16).to_be_bytes());
    for cipher in ciphers {
        hello.extend_from_slice(&cipher.to_be_bytes());
    }
    hello.push(1); // one compression method
    hello.push(0); // null
    hello.extend_from_slice(&(extensions.len() as u16).to_be_bytes());
    hello.extend_from_slice(&extensions);

    let mut handshake = vec![HANDSHAKE_CLIENT_HELLO];
    let len = hello.len();
    handshake.extend_from_slice(&[(len >> 16) as u8, (len >> 8) as u8, len as u8]);
    handshake.extend_from_slice(&hello);

    let mut record = vec![CONTENT_HANDSHAKE, 0x03, 0x01];
    record.extend_from_slice(&(handshake.len() as u16).to_be_bytes());
    record.extend_from_slice(&handshake);
    record
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_client_hello_sni_and_weak_cipher() {
        let record = build_client_hello("example.org", &[0xc02f, 0x0005]);
        let rec = dissect(&record, 54).unwrap();
        assert_eq!(rec.field("Handshake Type"), Some("ClientHello"));
        assert_eq!(rec.field("SNI"), Some("example.org"));
        assert_eq!(rec.field("Cipher Suites"), Some("0xc02f 0x0005"));
        assert!(rec.warnings.contains(&"weak_cipher: 0x0005".to_string()));
    }

    #[test]
    fn test_server_hello_weak_version() {
        let mut hello = Vec::new();
        hello.extend_from_slice(&0x0301u16.to_be_bytes()); // TLS 1.0
        hello.extend_from_slice(&[0xcd; 32]);
        hello.push(0);
        hello.extend_from_slice(&0x0005u16.to_be_bytes()); // RC4 chosen
        hello.push(0);

        let mut handshake = vec![HANDSHAKE_SERVER_HELLO];
        let len = hello.len();
        handshake.extend_from_slice(&[(len >> 16) as u8, (len >> 8) as u8, len as u8]);
        handshake.extend_from_slice(&hello);

        let mut record = vec![CONTENT_HANDSHAKE, 0x03, 0x01];
        record.extend_from_slice(&(handshake.len() as u16).to_be_bytes());
        record.extend_from_slice(&handshake);

        let rec = dissect(&record, 54).unwrap();
        assert_eq!(
            rec.field("Cipher Suite"),
            Some("0x0005 (TLS_RSA_WITH_RC4_128_SHA)")
        );
        assert!(rec.warnings.contains(&"weak_version: TLS 1.0".to_string()));
        assert!(rec.warnings.contains(&"weak_cipher: 0x0005".to_string()));
    }

    #[test]
    fn test_application_data_record() {
        let record = [23, 0x03, 0x03, 0x00, 0x10];
        let rec = dissect(&record, 54).unwrap();
        assert_eq!(rec.field("Content Type"), Some("23 (Application Data)"));
        assert!(rec.field("Handshake Type").is_none());
    }

    #[test]
    fn test_non_tls_record_is_malformed() {
        let rec = dissect(&[22, 0x47, 0x45, 0x00, 0x10], 54).unwrap();
        assert!(rec.is_malformed());
    }

    #[test]
    fn test_truncated_record_header() {
        let layer = dissect(&[22, 0x03], 54).unwrap_err().into_layer();
        assert!(layer.is_truncated());
    }
}
