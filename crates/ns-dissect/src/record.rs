use serde::Serialize;

/// Protocol tags for dissected layers.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize)]
#[serde(rename_all = "snake_case")]
pub enum Protocol {
    Ethernet,
    Arp,
    Ipv4,
    Ipv6,
    Tcp,
    Udp,
    Icmp,
    IcmpV6,
    Dns,
    Dhcp,
    Ntp,
    Snmp,
    Quic,
    Http,
    Tls,
    Ssh,
    Ftp,
    Smtp,
    Imap,
}

impl Protocol {
    /// Short display tag.
    pub fn name(&self) -> &'static str {
        match self {
            Protocol::Ethernet => "Ethernet",
            Protocol::Arp => "ARP",
            Protocol::Ipv4 => "IPv4",
            Protocol::Ipv6 => "IPv6",
            Protocol::Tcp => "TCP",
            Protocol::Udp => "UDP",
            Protocol::Icmp => "ICMP",
            Protocol::IcmpV6 => "ICMPv6",
            Protocol::Dns => "DNS",
            Protocol::Dhcp => "DHCP",
            Protocol::Ntp => "NTP",
            Protocol::Snmp => "SNMP",
            Protocol::Quic => "QUIC",
            Protocol::Http => "HTTP",
            Protocol::Tls => "TLS",
            Protocol::Ssh => "SSH",
            Protocol::Ftp => "FTP",
            Protocol::Smtp => "SMTP",
            Protocol::Imap => "IMAP",
        }
    }

    /// Whether traffic under this tag is expected to be encrypted.
    pub fn is_encrypted(&self) -> bool {
        matches!(self, Protocol::Tls | Protocol::Ssh)
    }
}

/// Protocol names treated as encrypted by the summary generator when only
/// a textual tag is available.
pub const ENCRYPTED_PROTOCOL_NAMES: &[&str] = &[
    "HTTPS", "TLS", "SSL", "SSH", "SFTP", "FTPS", "IMAPS", "POP3S", "SMTPS",
];

/// One decoded `(label, value)` pair, in wire order.
#[derive(Debug, Clone, Serialize)]
pub struct Field {
    pub label: String,
    pub value: String,
}

/// Byte range a layer occupies within its frame.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
pub struct ByteSpan {
    pub offset: usize,
    pub length: usize,
}

/// One parsed protocol layer.
#[derive(Debug, Clone, Serialize)]
pub struct LayerRecord {
    pub protocol: Protocol,
    pub fields: Vec<Field>,
    pub span: ByteSpan,
    pub warnings: Vec<String>,
}

impl LayerRecord {
    pub fn new(protocol: Protocol, offset: usize) -> Self {
        LayerRecord {
            protocol,
            fields: Vec::new(),
            span: ByteSpan { offset, length: 0 },
            warnings: Vec::new(),
        }
    }

    /// Append a decoded field, preserving wire order.
    pub fn push(&mut self, label: &str, value: impl Into<String>) {
        self.fields.push(Field {
            label: label.to_string(),
            value: value.into(),
        });
    }

    pub fn warn(&mut self, warning: impl Into<String>) {
        self.warnings.push(warning.into());
    }

    /// Look up a field value by label (first match).
    pub fn field(&self, label: &str) -> Option<&str> {
        self.fields
            .iter()
            .find(|f| f.label == label)
            .map(|f| f.value.as_str())
    }

    pub fn is_truncated(&self) -> bool {
        self.warnings.iter().any(|w| w == "truncated")
    }

    pub fn is_malformed(&self) -> bool {
        self.warnings.iter().any(|w| w.starts_with("malformed"))
    }
}

/// Parse failure for a single layer. Both variants carry the fields decoded
/// before the failure so a partial layer can still be shown.
#[derive(Debug, Clone)]
pub enum DissectError {
    /// The input slice ran out mid-layer.
    Truncated(Box<LayerRecord>),
    /// The layer is structurally invalid.
    Malformed(Box<LayerRecord>),
}

impl DissectError {
    pub fn truncated(mut record: LayerRecord, consumed: usize) -> Self {
        record.span.length = consumed;
        record.warn("truncated");
        DissectError::Truncated(Box::new(record))
    }

    pub fn malformed(mut record: LayerRecord, consumed: usize, reason: &str) -> Self {
        record.span.length = consumed;
        record.warn(format!("malformed: {}", reason));
        DissectError::Malformed(Box::new(record))
    }

    pub fn into_layer(self) -> LayerRecord {
        match self {
            DissectError::Truncated(rec) | DissectError::Malformed(rec) => *rec,
        }
    }
}

/// Dispatch key a dissector hands back so the registry can pick the next
/// layer, if any.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Descend {
    /// Link layer decoded; dispatch on the EtherType.
    EtherType(u16),
    /// Network layer decoded; dispatch on the IP protocol / next header.
    IpProtocol(u8),
    /// TCP decoded; dispatch an application dissector on the port pair.
    TcpPorts { src: u16, dst: u16 },
    /// UDP decoded; dispatch an application dissector on the port pair.
    UdpPorts { src: u16, dst: u16 },
    /// Nothing below this layer.
    Stop,
}
