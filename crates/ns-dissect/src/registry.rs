//! Layer dispatch: walks a frame Ethernet → L3 → L4 → L7, keyed on
//! EtherType, IP protocol and the transport port pair.

use crate::record::{Descend, DissectError, LayerRecord, Protocol};
use crate::{arp, dhcp, dns, ethernet, ftp, http, icmp, imap, ipv4, ipv6, ntp, quic, smtp, snmp, ssh, tcp, tls, udp};

const ETHERTYPE_IPV4: u16 = 0x0800;
const ETHERTYPE_ARP: u16 = 0x0806;
const ETHERTYPE_IPV6: u16 = 0x86dd;

/// Result of dissecting one frame top-down.
#[derive(Debug)]
pub struct DissectOutcome {
    /// Layers outer-first.
    pub layers: Vec<LayerRecord>,
    /// Outermost L3 source address, or empty if none parsed.
    pub src_addr: String,
    /// Outermost L3 destination address, or empty if none parsed.
    pub dst_addr: String,
    /// Tag of the innermost parsed layer.
    pub top_protocol: Protocol,
}

/// Dissect a full frame. Fails only when the link layer itself cannot be
/// parsed (frame shorter than an Ethernet header); callers drop the frame
/// and count it. Deeper parse failures degrade to a partial final layer.
pub fn dissect_frame(bytes: &[u8]) -> Result<DissectOutcome, DissectError> {
    let (eth, first) = ethernet::dissect(bytes, 0)?;

    let mut layers = vec![eth];
    let mut src_addr = String::new();
    let mut dst_addr = String::new();
    let mut offset = ethernet::HEADER_LEN;
    let mut descend = first;

    loop {
        if offset >= bytes.len() {
            break;
        }
        let rest = &bytes[offset..];

        match descend {
            Descend::Stop => break,

            Descend::EtherType(ethertype) => {
                let result = match ethertype {
                    ETHERTYPE_IPV4 => ipv4::dissect(rest, offset),
                    ETHERTYPE_IPV6 => ipv6::dissect(rest, offset),
                    ETHERTYPE_ARP => arp::dissect(rest, offset),
                    other => {
                        log::debug!("No dissector for EtherType 0x{:04x}", other);
                        break;
                    }
                };
                match result {
                    Ok((layer, next)) => {
                        if matches!(layer.protocol, Protocol::Ipv4 | Protocol::Ipv6) {
                            src_addr = layer.field("Source").unwrap_or_default().to_string();
                            dst_addr = layer.field("Destination").unwrap_or_default().to_string();
                        }
                        offset = layer.span.offset + layer.span.length;
                        layers.push(layer);
                        descend = next;
                    }
                    Err(e) => {
                        layers.push(e.into_layer());
                        break;
                    }
                }
            }

            Descend::IpProtocol(protocol) => {
                let result = match protocol {
                    1 => icmp::dissect(rest, offset, false),
                    6 => tcp::dissect(rest, offset),
                    17 => udp::dissect(rest, offset),
                    58 => icmp::dissect(rest, offset, true),
                    other => {
                        log::debug!("No dissector for IP protocol {}", other);
                        break;
                    }
                };
                match result {
                    Ok((layer, next)) => {
                        offset = layer.span.offset + layer.span.length;
                        layers.push(layer);
                        descend = next;
                    }
                    Err(e) => {
                        layers.push(e.into_layer());
                        break;
                    }
                }
            }

            Descend::TcpPorts { src, dst } => {
                if let Some(result) = dissect_tcp_app(rest, offset, src, dst) {
                    layers.push(result.unwrap_or_else(|e| e.into_layer()));
                }
                break;
            }

            Descend::UdpPorts { src, dst } => {
                if let Some(result) = dissect_udp_app(rest, offset, src, dst) {
                    layers.push(result.unwrap_or_else(|e| e.into_layer()));
                }
                break;
            }
        }
    }

    let top_protocol = layers.last().map(|l| l.protocol).unwrap_or(Protocol::Ethernet);

    Ok(DissectOutcome {
        layers,
        src_addr,
        dst_addr,
        top_protocol,
    })
}

fn port_match(src: u16, dst: u16, port: u16) -> bool {
    src == port || dst == port
}

fn dissect_tcp_app(
    payload: &[u8],
    offset: usize,
    src: u16,
    dst: u16,
) -> Option<Result<LayerRecord, DissectError>> {
    if payload.is_empty() {
        return None;
    }

    if port_match(src, dst, 80) {
        Some(http::dissect(payload, offset))
    } else if port_match(src, dst, 443) {
        Some(tls::dissect(payload, offset))
    } else if port_match(src, dst, 22) {
        Some(ssh::dissect(payload, offset))
    } else if port_match(src, dst, 21) {
        Some(ftp::dissect(payload, offset, src, dst))
    } else if port_match(src, dst, 25) || port_match(src, dst, 465) || port_match(src, dst, 587) {
        Some(smtp::dissect(payload, offset, src, dst))
    } else if port_match(src, dst, 143) {
        Some(imap::dissect(payload, offset, src, dst))
    } else if port_match(src, dst, 53) {
        // DNS over TCP carries a two-byte message length prefix.
        if payload.len() < 2 {
            return None;
        }
        let msg_len = u16::from_be_bytes([payload[0], payload[1]]) as usize;
        let end = (2 + msg_len).min(payload.len());
        Some(dns::dissect(&payload[2..end], offset + 2))
    } else {
        None
    }
}

fn dissect_udp_app(
    payload: &[u8],
    offset: usize,
    src: u16,
    dst: u16,
) -> Option<Result<LayerRecord, DissectError>> {
    if payload.is_empty() {
        return None;
    }

    if port_match(src, dst, 53) || port_match(src, dst, 5353) {
        Some(dns::dissect(payload, offset))
    } else if (src == 67 && dst == 68) || (src == 68 && dst == 67) {
        Some(dhcp::dissect(payload, offset))
    } else if port_match(src, dst, 123) {
        Some(ntp::dissect(payload, offset))
    } else if port_match(src, dst, 161) || port_match(src, dst, 162) {
        Some(snmp::dissect(payload, offset))
    } else if !port_match(src, dst, 443) && quic::detect(payload) {
        // QUIC is content-detected, and only on ports not claimed by DNS
        // (already dispatched above) or TLS.
        Some(quic::dissect(payload, offset))
    } else {
        None
    }
}
