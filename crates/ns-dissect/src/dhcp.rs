//! DHCP (RFC 2131): BOOTP fixed fields plus an options walk for the
//! message type.

use crate::ethernet::format_mac;
use crate::ipv4::format_ipv4;
use crate::reader::{need, ByteReader};
use crate::record::{DissectError, LayerRecord, Protocol};

/// BOOTP fixed region before the options area.
const FIXED_LEN: usize = 236;

/// Magic cookie preceding DHCP options.
const MAGIC_COOKIE: [u8; 4] = [99, 130, 83, 99];

const OPT_PAD: u8 = 0;
const OPT_MESSAGE_TYPE: u8 = 53;
const OPT_END: u8 = 255;

pub fn message_type_name(message_type: u8) -> &'static str {
    match message_type {
        1 => "DISCOVER",
        2 => "OFFER",
        3 => "REQUEST",
        4 => "DECLINE",
        5 => "ACK",
        6 => "NAK",
        7 => "RELEASE",
        8 => "INFORM",
        _ => "UNKNOWN",
    }
}

pub fn dissect(bytes: &[u8], offset: usize) -> Result<LayerRecord, DissectError> {
    let mut rec = LayerRecord::new(Protocol::Dhcp, offset);
    let mut r = ByteReader::new(bytes);

    let op = need!(r.u8(), rec, r.pos());
    rec.push(
        "Op",
        format!("{} ({})", op, if op == 1 { "BOOTREQUEST" } else { "BOOTREPLY" }),
    );

    let htype = need!(r.u8(), rec, r.pos());
    rec.push("Hardware Type", htype.to_string());

    let hlen = need!(r.u8(), rec, r.pos());
    rec.push("Hardware Length", hlen.to_string());

    let hops = need!(r.u8(), rec, r.pos());
    rec.push("Hops", hops.to_string());

    let xid = need!(r.u32_be(), rec, r.pos());
    rec.push("Transaction ID", format!("0x{:08x}", xid));

    let secs = need!(r.u16_be(), rec, r.pos());
    rec.push("Seconds", secs.to_string());

    let flags = need!(r.u16_be(), rec, r.pos());
    rec.push("Flags", format!("0x{:04x}", flags));

    let ciaddr = need!(r.take(4), rec, r.pos());
    rec.push("Client IP", format_ipv4(ciaddr));

    let yiaddr = need!(r.take(4), rec, r.pos());
    rec.push("Your IP", format_ipv4(yiaddr));

    let siaddr = need!(r.take(4), rec, r.pos());
    rec.push("Server IP", format_ipv4(siaddr));

    let giaddr = need!(r.take(4), rec, r.pos());
    rec.push("Gateway IP", format_ipv4(giaddr));

    let chaddr = need!(r.take(16), rec, r.pos());
    if hlen == 6 {
        rec.push("Client MAC", format_mac(&chaddr[..6]));
    }

    // sname (64) and file (128) are rarely informative; skip them.
    need!(r.skip(64 + 128), rec, r.pos());
    debug_assert_eq!(r.pos(), FIXED_LEN);

    let cookie = need!(r.take(4), rec, r.pos());
    if cookie != MAGIC_COOKIE {
        rec.span.length = r.pos();
        rec.warn("malformed: missing DHCP magic cookie");
        return Ok(rec);
    }

    // Options walk: find the message type, stop at END.
    let options = r.rest();
    let mut i = 0usize;
    while i < options.len() {
        let code = options[i];
        if code == OPT_PAD {
            i += 1;
            continue;
        }
        if code == OPT_END {
            break;
        }
        if i + 1 >= options.len() {
            rec.warn("truncated option list");
            break;
        }
        let len = options[i + 1] as usize;
        if i + 2 + len > options.len() {
            rec.warn("truncated option list");
            break;
        }
        if code == OPT_MESSAGE_TYPE && len == 1 {
            let message_type = options[i + 2];
            rec.push(
                "Message Type",
                format!("{} ({})", message_type, message_type_name(message_type)),
            );
        }
        i += 2 + len;
    }

    rec.span.length = bytes.len();
    Ok(rec)
}
