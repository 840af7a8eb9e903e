//! Client address resolution and the static blacklist.

use axum::http::HeaderMap;
use std::collections::HashSet;
use std::net::{IpAddr, SocketAddr};

/// Headers consulted for the original client address, in priority order.
const FORWARDING_HEADERS: [&str; 3] = ["x-forwarded-for", "x-real-ip", "cf-connecting-ip"];

/// Fixed set of blocked client identifiers.
///
/// Loaded from configuration at startup; there is no way to change it at runtime.
/// Address entries are stored in canonical form, so `2001:DB8:0:0::1` and
/// `2001:db8::1` name the same client.
#[derive(Debug, Clone, Default)]
pub struct IpBlacklist {
    entries: HashSet<String>,
}

impl IpBlacklist {
    pub fn new<I, S>(entries: I) -> Self
    where
        I: IntoIterator<Item = S>,
        S: AsRef<str>,
    {
        Self {
            entries: entries
                .into_iter()
                .map(|entry| canonical(entry.as_ref()))
                .collect(),
        }
    }

    pub fn is_blacklisted(&self, identifier: &str) -> bool {
        self.entries.contains(&canonical(identifier))
    }

    pub fn len(&self) -> usize {
        self.entries.len()
    }

    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }
}

/// Canonical text of an address literal; anything else is kept verbatim.
fn canonical(identifier: &str) -> String {
    let trimmed = identifier.trim();
    trimmed
        .parse::<IpAddr>()
        .map(|ip| ip.to_string())
        .unwrap_or_else(|_| trimmed.to_string())
}

/// Strict IP literal check. Hostnames, ports and placeholders like `unknown` are rejected.
pub fn is_valid_ip(candidate: &str) -> bool {
    candidate.parse::<IpAddr>().is_ok()
}

/// Resolve the client address for a request.
///
/// Takes the first forwarding header that carries a valid address (only the
/// first hop of `X-Forwarded-For` is considered) and falls back to the TCP
/// peer address.
pub fn client_ip(headers: &HeaderMap, peer: SocketAddr) -> IpAddr {
    for name in FORWARDING_HEADERS {
        let Some(value) = headers.get(name).and_then(|v| v.to_str().ok()) else {
            continue;
        };
        let first_hop = value.split(',').next().unwrap_or_default().trim();
        match first_hop.parse::<IpAddr>() {
            Ok(ip) => return ip,
            Err(_) => {
                tracing::debug!(header = name, value = %first_hop, "Ignoring invalid forwarded address");
            }
        }
    }
    peer.ip()
}

#[cfg(test)]
mod tests {
    use super::*;
    use axum::http::HeaderValue;

    fn peer() -> SocketAddr {
        "192.0.2.10:5555".parse().unwrap()
    }

    #[test]
    fn test_blacklist_membership() {
        let blacklist = IpBlacklist::new(["203.0.113.7", "2001:db8::1"]);
        assert!(blacklist.is_blacklisted("203.0.113.7"));
        assert!(blacklist.is_blacklisted("2001:db8::1"));
        assert!(!blacklist.is_blacklisted("203.0.113.8"));
        assert!(!IpBlacklist::default().is_blacklisted("203.0.113.7"));
    }

    #[test]
    fn test_blacklist_matches_non_canonical_entries() {
        let blacklist = IpBlacklist::new(["2001:DB8:0:0::1", " 198.51.100.9 "]);
        let peer: SocketAddr = "[2001:db8::1]:443".parse().unwrap();
        let client = client_ip(&HeaderMap::new(), peer).to_string();
        assert_eq!(client, "2001:db8::1");
        assert!(blacklist.is_blacklisted(&client));
        assert!(blacklist.is_blacklisted("198.51.100.9"));
        assert!(blacklist.is_blacklisted("2001:0db8::0001"));
    }

    #[test]
    fn test_is_valid_ip_is_strict() {
        assert!(is_valid_ip("127.0.0.1"));
        assert!(is_valid_ip("::1"));
        assert!(is_valid_ip("fe80::1"));
        assert!(is_valid_ip("10.1.2.3"));
        assert!(!is_valid_ip("unknown"));
        assert!(!is_valid_ip("localhost"));
        assert!(!is_valid_ip("256.1.1.1"));
        assert!(!is_valid_ip("1.2.3.4:80"));
        assert!(!is_valid_ip(""));
    }

    #[test]
    fn test_client_ip_prefers_first_forwarded_hop() {
        let mut headers = HeaderMap::new();
        headers.insert("x-forwarded-for", HeaderValue::from_static("198.51.100.1, 10.0.0.1"));
        headers.insert("x-real-ip", HeaderValue::from_static("198.51.100.2"));
        assert_eq!(client_ip(&headers, peer()).to_string(), "198.51.100.1");
    }

    #[test]
    fn test_client_ip_header_priority() {
        let mut headers = HeaderMap::new();
        headers.insert("cf-connecting-ip", HeaderValue::from_static("198.51.100.3"));
        assert_eq!(client_ip(&headers, peer()).to_string(), "198.51.100.3");

        headers.insert("x-real-ip", HeaderValue::from_static("198.51.100.2"));
        assert_eq!(client_ip(&headers, peer()).to_string(), "198.51.100.2");
    }

    #[test]
    fn test_client_ip_skips_garbage_and_falls_back_to_peer() {
        let mut headers = HeaderMap::new();
        headers.insert("x-forwarded-for", HeaderValue::from_static("not-an-ip"));
        assert_eq!(client_ip(&headers, peer()).to_string(), "192.0.2.10");
        assert_eq!(client_ip(&HeaderMap::new(), peer()).to_string(), "192.0.2.10");
    }
}
