//! Boundary input validators.
//!
//! The hostname and IP-literal forms gate anything user-typed before it
//! reaches a resolver or external tool; the interface and MAC validators
//! guard the capture configuration setters.

use regex::Regex;

/// Interface names: `[A-Za-z0-9._-]`, 1..=50 characters.
pub fn is_valid_interface_name(name: &str) -> bool {
    let Ok(re) = Regex::new(r"^[A-Za-z0-9._-]{1,50}$") else {
        return false;
    };
    re.is_match(name)
}

/// Normalize a MAC address to uppercase colon form, accepting `:` or `-`
/// separators on input. Returns None when the shape is invalid.
pub fn normalize_mac(mac: &str) -> Option<String> {
    let candidate = mac.trim().to_uppercase().replace('-', ":");
    let Ok(re) = Regex::new(r"^([0-9A-F]{2}:){5}[0-9A-F]{2}$") else {
        return None;
    };
    re.is_match(&candidate).then_some(candidate)
}

/// RFC 1123 hostname shape: dot-separated labels of at most 63 characters,
/// no leading or trailing hyphens.
pub fn is_valid_hostname(hostname: &str) -> bool {
    let Ok(re) = Regex::new(
        r"^[A-Za-z0-9](?:[A-Za-z0-9-]{0,61}[A-Za-z0-9])?(?:\.[A-Za-z0-9](?:[A-Za-z0-9-]{0,61}[A-Za-z0-9])?)*$",
    ) else {
        return false;
    };
    re.is_match(hostname)
}

/// Dotted-decimal IPv4 literal (four 0..=255 octets).
pub fn is_valid_ipv4_literal(addr: &str) -> bool {
    let Ok(re) = Regex::new(r"^(?:[0-9]{1,3}\.){3}[0-9]{1,3}$") else {
        return false;
    };
    re.is_match(addr) && addr.split('.').all(|octet| octet.parse::<u16>().map(|v| v <= 255).unwrap_or(false))
}

/// Full eight-group colon-form IPv6 literal.
pub fn is_valid_ipv6_literal(addr: &str) -> bool {
    let Ok(re) = Regex::new(r"^(?:[0-9a-fA-F]{1,4}:){7}[0-9a-fA-F]{1,4}$") else {
        return false;
    };
    re.is_match(addr)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_interface_names() {
        assert!(is_valid_interface_name("eth0"));
        assert!(is_valid_interface_name("en0.100"));
        assert!(is_valid_interface_name("br-lan_2"));
        assert!(!is_valid_interface_name(""));
        assert!(!is_valid_interface_name("eth0; rm -rf /"));
        assert!(!is_valid_interface_name(&"x".repeat(51)));
    }

    #[test]
    fn test_mac_normalization() {
        assert_eq!(
            normalize_mac("aa:bb:cc:dd:ee:ff"),
            Some("AA:BB:CC:DD:EE:FF".to_string())
        );
        assert_eq!(
            normalize_mac("AA-BB-CC-DD-EE-FF"),
            Some("AA:BB:CC:DD:EE:FF".to_string())
        );
        assert_eq!(normalize_mac("aa:bb:cc:dd:ee"), None);
        assert_eq!(normalize_mac("gg:bb:cc:dd:ee:ff"), None);
        assert_eq!(normalize_mac(""), None);
    }

    #[test]
    fn test_hostnames() {
        assert!(is_valid_hostname("example.com"));
        assert!(is_valid_hostname("a"));
        assert!(is_valid_hostname("sub-1.example.co.uk"));
        assert!(!is_valid_hostname("-leading.example.com"));
        assert!(!is_valid_hostname("trailing-.example.com"));
        assert!(!is_valid_hostname("exa mple.com"));
        assert!(!is_valid_hostname(""));
    }

    #[test]
    fn test_ipv4_literals() {
        assert!(is_valid_ipv4_literal("10.0.0.1"));
        assert!(is_valid_ipv4_literal("255.255.255.255"));
        assert!(!is_valid_ipv4_literal("256.1.1.1"));
        assert!(!is_valid_ipv4_literal("10.0.0"));
        assert!(!is_valid_ipv4_literal("10.0.0.1.5"));
    }

    #[test]
    fn test_ipv6_literals() {
        assert!(is_valid_ipv6_literal("2001:db8:0:0:0:0:0:1"));
        assert!(is_valid_ipv6_literal("fe80:0:0:0:0:0:0:1"));
        assert!(!is_valid_ipv6_literal("::1")); // compressed form not accepted here
        assert!(!is_valid_ipv6_literal("2001:db8"));
    }
}
