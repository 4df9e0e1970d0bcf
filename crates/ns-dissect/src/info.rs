//! One-line packet summaries for list views.
//!
//! Works from the raw frame bytes plus the already-identified top protocol,
//! so it stays cheap enough to run on every packet.

use crate::record::{Protocol, ENCRYPTED_PROTOCOL_NAMES};
use crate::tcp;

const ETHERTYPE_IPV4: u16 = 0x0800;
const ETHERTYPE_IPV6: u16 = 0x86dd;

/// Generate the summary line for a packet.
pub fn summary_line(
    top_protocol: Protocol,
    src_addr: &str,
    dst_addr: &str,
    wire_length: usize,
    raw: &[u8],
) -> String {
    let mut info = match top_protocol {
        Protocol::Tcp => tcp_info(raw, src_addr, dst_addr),
        Protocol::Http => {
            let http = http_info(raw);
            if http.is_empty() {
                "HTTP Traffic".to_string()
            } else {
                http
            }
        }
        Protocol::Tls => {
            let tls = tls_info(raw);
            if tls.is_empty() {
                "HTTPS/TLS Traffic".to_string()
            } else {
                tls
            }
        }
        Protocol::Dns => dns_info(raw),
        Protocol::Ssh => {
            let ssh = ssh_info(raw);
            if ssh.is_empty() {
                "SSH Encrypted Traffic".to_string()
            } else {
                ssh
            }
        }
        Protocol::Dhcp => dhcp_info(raw),
        Protocol::Arp => arp_info(raw),
        Protocol::Icmp | Protocol::IcmpV6 => icmp_info(raw),
        Protocol::Ftp => {
            let ftp = ftp_info(raw);
            if ftp.is_empty() {
                "FTP Unencrypted".to_string()
            } else {
                ftp
            }
        }
        Protocol::Smtp => {
            let smtp = smtp_info(raw);
            if smtp.is_empty() {
                "SMTP Mail Transfer".to_string()
            } else {
                smtp
            }
        }
        Protocol::Udp => format!("UDP {} → {}", src_addr, dst_addr),
        _ => String::new(),
    };

    if info.is_empty() {
        let name = top_protocol.name();
        if top_protocol.is_encrypted() || ENCRYPTED_PROTOCOL_NAMES.contains(&name) {
            info = format!("{} Encrypted", name);
        } else {
            info = format!("{} Plain Text", name);
        }
    }

    if wire_length > 1400 {
        info.push_str(&format!(" [{} bytes]", wire_length));
    } else if wire_length == 0 {
        info.push_str(" [Keep-alive]");
    }

    info
}

fn ethertype(raw: &[u8]) -> Option<u16> {
    let b = raw.get(12..14)?;
    Some(u16::from_be_bytes([b[0], b[1]]))
}

/// Offset of the L4 header, honoring the IPv4 IHL. IPv6 extension headers
/// are ignored here; the summary falls back gracefully when they appear.
fn l4_offset(raw: &[u8]) -> Option<usize> {
    match ethertype(raw)? {
        ETHERTYPE_IPV4 => {
            let ihl = (raw.get(14)? & 0x0f) as usize * 4;
            Some(14 + ihl)
        }
        ETHERTYPE_IPV6 => Some(14 + 40),
        _ => None,
    }
}

fn tcp_info(raw: &[u8], src_addr: &str, dst_addr: &str) -> String {
    let Some(tcp_offset) = l4_offset(raw) else {
        return String::new();
    };
    let Some(header) = raw.get(tcp_offset..tcp_offset + 20) else {
        return String::new();
    };

    let src_port = u16::from_be_bytes([header[0], header[1]]);
    let dst_port = u16::from_be_bytes([header[2], header[3]]);
    let seq = u32::from_be_bytes([header[4], header[5], header[6], header[7]]);
    let flags = header[13];

    let endpoints = format!("{}:{} → {}:{}", src_addr, src_port, dst_addr, dst_port);

    let mut info = if flags & tcp::FLAG_SYN != 0 {
        if flags & tcp::FLAG_ACK != 0 {
            format!("SYN+ACK {}", endpoints)
        } else {
            format!("SYN {}", endpoints)
        }
    } else if flags & tcp::FLAG_FIN != 0 {
        format!("FIN {}", endpoints)
    } else if flags & tcp::FLAG_RST != 0 {
        format!("RST {} [Connection Reset]", endpoints)
    } else if flags & tcp::FLAG_PSH != 0 {
        format!("PSH+ACK {} [Data]", endpoints)
    } else if flags & tcp::FLAG_ACK != 0 {
        format!("ACK {}", endpoints)
    } else {
        String::new()
    };

    if flags & tcp::FLAG_PSH != 0 {
        info.push_str(&format!(" Seq={}", seq));
    }

    // Well-known port hints
    for (port, hint) in [
        (80, " [HTTP]"),
        (443, " [HTTPS]"),
        (22, " [SSH]"),
        (21, " [FTP]"),
        (25, " [SMTP]"),
    ] {
        if src_port == port || dst_port == port {
            info.push_str(hint);
            break;
        }
    }

    info
}

fn http_info(raw: &[u8]) -> String {
    let text = String::from_utf8_lossy(raw);

    for method in ["GET", "POST"] {
        if let Some(pos) = text.find(&format!("{} ", method)) {
            let rest = &text[pos + method.len() + 1..];
            if let Some(uri) = rest.split_whitespace().next() {
                return format!("HTTP {} {}", method, uri);
            }
            return format!("HTTP {} Request", method);
        }
    }

    if text.contains("HTTP/1.1 ") || text.contains("HTTP/1.0 ") {
        if let Some(pos) = text.find("HTTP/1.") {
            let line_end = text[pos..]
                .find(['\r', '\n'])
                .map(|e| pos + e)
                .unwrap_or(text.len());
            let mut words = text[pos..line_end].split_whitespace();
            let _version = words.next();
            if let Some(status) = words.next().filter(|s| s.chars().all(|c| c.is_ascii_digit())) {
                let reason: Vec<&str> = words.collect();
                return format!("HTTP {} {}", status, reason.join(" "));
            }
        }
        return "HTTP Response".to_string();
    }

    String::new()
}

fn tls_info(raw: &[u8]) -> String {
    if raw.len() < 60 {
        return String::new();
    }

    // Scan for a TLS record header past the lowest possible payload start.
    for i in 40..raw.len().saturating_sub(5) {
        let record_type = raw[i];
        let major = raw[i + 1];
        let minor = raw[i + 2];
        if major != 0x03 {
            continue;
        }
        match record_type {
            0x16 => {
                return match minor {
                    0x01 => "TLS 1.0 Handshake".to_string(),
                    0x02 => "TLS 1.1 Handshake".to_string(),
                    0x03 => "TLS 1.2 Handshake".to_string(),
                    0x04 => "TLS 1.3 Handshake".to_string(),
                    _ => "TLS Handshake".to_string(),
                };
            }
            0x17 => return "TLS Application Data (Encrypted)".to_string(),
            0x15 => return "TLS Alert".to_string(),
            _ => {}
        }
    }

    String::new()
}

fn dns_info(raw: &[u8]) -> String {
    let Some(dns_offset) = l4_offset(raw).map(|o| o + 8) else {
        return String::new();
    };
    let Some(header) = raw.get(dns_offset..dns_offset + 12) else {
        return String::new();
    };

    let flags = u16::from_be_bytes([header[2], header[3]]);
    let is_response = flags & 0x8000 != 0;
    let opcode = (flags >> 11) & 0x0f;
    let rcode = flags & 0x0f;
    let qdcount = u16::from_be_bytes([header[4], header[5]]);
    let ancount = u16::from_be_bytes([header[6], header[7]]);

    if is_response {
        match rcode {
            0 => format!("DNS Response: {} answer(s)", ancount),
            3 => "DNS Response: NXDOMAIN (Name not found)".to_string(),
            _ => format!("DNS Response: Error (RCODE={})", rcode),
        }
    } else if opcode == 0 {
        format!("DNS Query: {} question(s)", qdcount)
    } else {
        format!("DNS Query: Opcode {}", opcode)
    }
}

fn ssh_info(raw: &[u8]) -> String {
    let text = String::from_utf8_lossy(raw);
    if let Some(pos) = text.find("SSH-") {
        let line_end = text[pos..]
            .find(['\r', '\n'])
            .map(|e| pos + e)
            .unwrap_or(text.len());
        let line = &text[pos..line_end];
        // SSH-<proto>-<software>
        let mut parts = line.splitn(3, '-');
        let _ssh = parts.next();
        if let (Some(proto), Some(software)) = (parts.next(), parts.next()) {
            return format!("SSH Version: {} ({})", proto, software);
        }
        return "SSH Protocol Exchange".to_string();
    }
    String::new()
}

fn dhcp_info(raw: &[u8]) -> String {
    let Some(dhcp_offset) = l4_offset(raw).map(|o| o + 8) else {
        return String::new();
    };
    let Some(&op) = raw.get(dhcp_offset) else {
        return String::new();
    };

    // Option 53 (message type) lives past the 236-byte fixed region and
    // the 4-byte magic cookie.
    let options_start = dhcp_offset + 240;
    if options_start < raw.len() {
        let options = &raw[options_start..];
        let mut i = 0usize;
        while i + 2 < options.len() {
            let code = options[i];
            if code == 0 {
                i += 1;
                continue;
            }
            if code == 255 {
                break;
            }
            let len = options[i + 1] as usize;
            if code == 53 && len == 1 {
                return match options[i + 2] {
                    1 => "DHCP Discover".to_string(),
                    2 => "DHCP Offer".to_string(),
                    3 => "DHCP Request".to_string(),
                    4 => "DHCP Decline".to_string(),
                    5 => "DHCP ACK".to_string(),
                    6 => "DHCP NAK".to_string(),
                    7 => "DHCP Release".to_string(),
                    8 => "DHCP Inform".to_string(),
                    other => format!("DHCP Message Type {}", other),
                };
            }
            i += 2 + len;
        }
    }

    if op == 1 {
        "DHCP Request".to_string()
    } else {
        "DHCP Reply".to_string()
    }
}

fn arp_info(raw: &[u8]) -> String {
    let Some(arp) = raw.get(14..42) else {
        return String::new();
    };

    let opcode = u16::from_be_bytes([arp[6], arp[7]]);
    let sender_ip = format!("{}.{}.{}.{}", arp[14], arp[15], arp[16], arp[17]);
    let target_ip = format!("{}.{}.{}.{}", arp[24], arp[25], arp[26], arp[27]);

    match opcode {
        1 => format!("ARP Request: Who has {}? Tell {}", target_ip, sender_ip),
        2 => {
            let sender_mac = arp[8..14]
                .iter()
                .map(|b| format!("{:02x}", b))
                .collect::<Vec<_>>()
                .join(":");
            format!("ARP Reply: {} is at {}", sender_ip, sender_mac)
        }
        other => format!("ARP Opcode {}", other),
    }
}

fn icmp_info(raw: &[u8]) -> String {
    let Some(icmp_offset) = l4_offset(raw) else {
        return String::new();
    };
    let Some(header) = raw.get(icmp_offset..icmp_offset + 2) else {
        return String::new();
    };
    let icmp_type = header[0];
    let code = header[1];

    if ethertype(raw) == Some(ETHERTYPE_IPV6) {
        return match icmp_type {
            128 => "ICMPv6 Echo Request (Ping)".to_string(),
            129 => "ICMPv6 Echo Reply (Ping Reply)".to_string(),
            135 => "ICMPv6 Neighbor Solicitation".to_string(),
            136 => "ICMPv6 Neighbor Advertisement".to_string(),
            _ => format!("ICMPv6 Type {} Code {}", icmp_type, code),
        };
    }

    match icmp_type {
        0 => "ICMP Echo Reply (Ping Reply)".to_string(),
        3 => match code {
            0 => "ICMP Destination Network Unreachable".to_string(),
            1 => "ICMP Destination Host Unreachable".to_string(),
            2 => "ICMP Destination Protocol Unreachable".to_string(),
            3 => "ICMP Destination Port Unreachable".to_string(),
            _ => format!("ICMP Destination Unreachable (Code {})", code),
        },
        8 => "ICMP Echo Request (Ping)".to_string(),
        11 => "ICMP Time Exceeded".to_string(),
        _ => format!("ICMP Type {} Code {}", icmp_type, code),
    }
}

fn ftp_info(raw: &[u8]) -> String {
    let text = String::from_utf8_lossy(raw);

    if text.contains("USER ") {
        return "FTP USER Command".to_string();
    }
    if text.contains("PASS ") {
        return "FTP PASS Command (Password!)".to_string();
    }
    if text.contains("LIST") {
        return "FTP LIST Command".to_string();
    }
    if text.contains("RETR ") {
        return "FTP File Download".to_string();
    }
    if text.contains("STOR ") {
        return "FTP File Upload".to_string();
    }

    response_line(&text)
        .map(|(code, message)| format!("FTP Response: {} {}", code, message))
        .unwrap_or_default()
}

fn smtp_info(raw: &[u8]) -> String {
    let text = String::from_utf8_lossy(raw);

    if text.contains("HELO ") {
        return "SMTP HELO".to_string();
    }
    if text.contains("EHLO ") {
        return "SMTP EHLO".to_string();
    }
    if text.contains("MAIL FROM:") {
        return "SMTP Mail From".to_string();
    }
    if text.contains("RCPT TO:") {
        return "SMTP Recipient".to_string();
    }
    if text.contains("DATA") {
        return "SMTP Data Transfer".to_string();
    }
    if text.contains("QUIT") {
        return "SMTP Quit".to_string();
    }

    if let Some((code, _)) = response_line(&text) {
        return match code / 100 {
            2 => format!("SMTP OK: {}", code),
            4 => format!("SMTP Temp Error: {}", code),
            5 => format!("SMTP Error: {}", code),
            _ => format!("SMTP Response: {}", code),
        };
    }

    String::new()
}

/// Find a `NNN text` status line at the start of the application payload.
fn response_line(text: &str) -> Option<(u16, String)> {
    for line in text.split(['\r', '\n']) {
        let bytes = line.as_bytes();
        if bytes.len() >= 5
            && bytes[..3].iter().all(|b| b.is_ascii_digit())
            && bytes[3] == b' '
        {
            let code = line[..3].parse().ok()?;
            return Some((code, line[4..].trim().to_string()));
        }
    }
    None
}

#[cfg(test)]
mod tests {
    use super::*;

    fn tcp_syn_frame() -> Vec<u8> {
        vec![
            0xff, 0xff, 0xff, 0xff, 0xff, 0xff, 0x00, 0x11, 0x22, 0x33, 0x44, 0x55, 0x08, 0x00,
            0x45, 0x00, 0x00, 0x28, 0x00, 0x01, 0x00, 0x00, 0x40, 0x06, 0xb8, 0x6e, 0x0a, 0x00,
            0x00, 0x01, 0x0a, 0x00, 0x00, 0x02, 0x12, 0x34, 0x00, 0x50, 0x00, 0x00, 0x00, 0x00,
            0x00, 0x00, 0x00, 0x00, 0x50, 0x02, 0xff, 0xff, 0x00, 0x00, 0x00, 0x00,
        ]
    }

    #[test]
    fn test_tcp_syn_summary() {
        let frame = tcp_syn_frame();
        let line = summary_line(Protocol::Tcp, "10.0.0.1", "10.0.0.2", frame.len(), &frame);
        assert_eq!(line, "SYN 10.0.0.1:4660 → 10.0.0.2:80 [HTTP]");
    }

    #[test]
    fn test_rst_and_psh_summaries() {
        let mut frame = tcp_syn_frame();
        frame[47] = 0x04; // RST
        let line = summary_line(Protocol::Tcp, "10.0.0.1", "10.0.0.2", frame.len(), &frame);
        assert_eq!(line, "RST 10.0.0.1:4660 → 10.0.0.2:80 [Connection Reset] [HTTP]");

        frame[47] = 0x18; // PSH+ACK
        frame[34 + 4..34 + 8].copy_from_slice(&77u32.to_be_bytes());
        let line = summary_line(Protocol::Tcp, "10.0.0.1", "10.0.0.2", frame.len(), &frame);
        assert_eq!(line, "PSH+ACK 10.0.0.1:4660 → 10.0.0.2:80 [Data] Seq=77 [HTTP]");
    }

    #[test]
    fn test_arp_request_summary() {
        let mut frame = vec![
            0xff, 0xff, 0xff, 0xff, 0xff, 0xff, 0x00, 0x11, 0x22, 0x33, 0x44, 0x55, 0x08, 0x06,
        ];
        frame.extend_from_slice(&[0x00, 0x01, 0x08, 0x00, 0x06, 0x04, 0x00, 0x01]);
        frame.extend_from_slice(&[0xaa, 0xbb, 0xcc, 0xdd, 0xee, 0xff]);
        frame.extend_from_slice(&[192, 168, 1, 2]);
        frame.extend_from_slice(&[0x00; 6]);
        frame.extend_from_slice(&[192, 168, 1, 1]);

        let line = summary_line(Protocol::Arp, "", "", frame.len(), &frame);
        assert_eq!(line, "ARP Request: Who has 192.168.1.1? Tell 192.168.1.2");
    }

    #[test]
    fn test_arp_reply_summary() {
        let mut frame = vec![
            0xff, 0xff, 0xff, 0xff, 0xff, 0xff, 0x00, 0x11, 0x22, 0x33, 0x44, 0x55, 0x08, 0x06,
        ];
        frame.extend_from_slice(&[0x00, 0x01, 0x08, 0x00, 0x06, 0x04, 0x00, 0x02]);
        frame.extend_from_slice(&[0xaa, 0xbb, 0xcc, 0xdd, 0xee, 0xff]);
        frame.extend_from_slice(&[192, 168, 1, 1]);
        frame.extend_from_slice(&[0x00; 6]);
        frame.extend_from_slice(&[192, 168, 1, 2]);

        let line = summary_line(Protocol::Arp, "", "", frame.len(), &frame);
        assert_eq!(line, "ARP Reply: 192.168.1.1 is at aa:bb:cc:dd:ee:ff");
    }

    fn dns_query_frame() -> Vec<u8> {
        let mut frame = vec![
            0xff, 0xff, 0xff, 0xff, 0xff, 0xff, 0x00, 0x11, 0x22, 0x33, 0x44, 0x55, 0x08, 0x00,
        ];
        // DNS: id 0x1234, RD, 1 question
        let mut dns = vec![0x12, 0x34, 0x01, 0x00, 0x00, 0x01, 0, 0, 0, 0, 0, 0];
        for label in ["example", "com"] {
            dns.push(label.len() as u8);
            dns.extend_from_slice(label.as_bytes());
        }
        dns.extend_from_slice(&[0, 0x00, 0x01, 0x00, 0x01]);

        let total_len = 20 + 8 + dns.len();
        frame.extend_from_slice(&[0x45, 0x00]);
        frame.extend_from_slice(&(total_len as u16).to_be_bytes());
        frame.extend_from_slice(&[0x00, 0x01, 0x00, 0x00, 0x40, 0x11, 0x00, 0x00]);
        frame.extend_from_slice(&[10, 0, 0, 1, 10, 0, 0, 53]);
        frame.extend_from_slice(&54321u16.to_be_bytes());
        frame.extend_from_slice(&53u16.to_be_bytes());
        frame.extend_from_slice(&((8 + dns.len()) as u16).to_be_bytes());
        frame.extend_from_slice(&[0x00, 0x00]);
        frame.extend_from_slice(&dns);
        frame
    }

    #[test]
    fn test_dns_query_summary() {
        let frame = dns_query_frame();
        let line = summary_line(Protocol::Dns, "10.0.0.1", "10.0.0.53", frame.len(), &frame);
        assert_eq!(line, "DNS Query: 1 question(s)");
    }

    #[test]
    fn test_dns_nxdomain_summary() {
        let mut frame = dns_query_frame();
        frame[44] = 0x81;
        frame[45] = 0x83; // response, rcode 3
        let line = summary_line(Protocol::Dns, "10.0.0.53", "10.0.0.1", frame.len(), &frame);
        assert_eq!(line, "DNS Response: NXDOMAIN (Name not found)");
    }

    #[test]
    fn test_encrypted_fallback_and_size_suffixes() {
        let frame = vec![0u8; 64];
        assert_eq!(
            summary_line(Protocol::Quic, "a", "b", 64, &frame),
            "QUIC Plain Text"
        );
        assert_eq!(
            summary_line(Protocol::Snmp, "a", "b", 1500, &frame),
            "SNMP Plain Text [1500 bytes]"
        );
        assert_eq!(
            summary_line(Protocol::Tls, "a", "b", 0, &[]),
            "TLS Encrypted [Keep-alive]"
        );
    }

    #[test]
    fn test_http_get_summary() {
        let mut frame = tcp_syn_frame();
        frame.extend_from_slice(b"GET /index.html HTTP/1.1\r\n");
        let line = summary_line(Protocol::Http, "10.0.0.1", "10.0.0.2", frame.len(), &frame);
        assert_eq!(line, "HTTP GET /index.html");
    }

    #[test]
    fn test_ssh_version_summary() {
        let mut frame = tcp_syn_frame();
        frame.extend_from_slice(b"SSH-2.0-OpenSSH_8.9\r\n");
        let line = summary_line(Protocol::Ssh, "10.0.0.1", "10.0.0.2", frame.len(), &frame);
        assert_eq!(line, "SSH Version: 2.0 (OpenSSH_8.9)");
    }
}
