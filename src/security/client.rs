//! Client identity resolution.
//!
//! The identity is advisory: it keys the rate limiter and the security event
//! log, nothing more. Forwarding headers are only honored when the gateway is
//! configured to trust them.

use std::fmt;
use std::net::{IpAddr, SocketAddr};

use axum::extract::ConnectInfo;
use axum::http::HeaderMap;

const X_FORWARDED_FOR: &str = "x-forwarded-for";
const X_REAL_IP: &str = "x-real-ip";

/// Best-effort identity of the request origin.
#[derive(Debug, Clone, PartialEq, Eq, Hash)]
pub struct ClientId(String);

impl ClientId {
    pub fn new(id: impl Into<String>) -> Self {
        Self(id.into())
    }

    pub fn unknown() -> Self {
        Self("unknown".to_string())
    }

    pub fn as_str(&self) -> &str {
        &self.0
    }
}

impl fmt::Display for ClientId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.0)
    }
}

impl From<IpAddr> for ClientId {
    fn from(ip: IpAddr) -> Self {
        Self(ip.to_string())
    }
}

fn header_ip(headers: &HeaderMap, name: &str) -> Option<IpAddr> {
    let value = headers.get(name)?.to_str().ok()?;
    value.split(',').next()?.trim().parse().ok()
}

/// Resolve the client identity for a request.
///
/// Order: first `X-Forwarded-For` entry, `X-Real-IP` (both only when
/// `trust_forwarded_for`), socket peer, then `"unknown"`.
pub fn resolve_client(
    headers: &HeaderMap,
    connect_info: Option<&ConnectInfo<SocketAddr>>,
    trust_forwarded_for: bool,
) -> ClientId {
    if trust_forwarded_for {
        if let Some(ip) = header_ip(headers, X_FORWARDED_FOR).or_else(|| header_ip(headers, X_REAL_IP)) {
            return ClientId::from(ip);
        }
    }

    connect_info
        .map(|ConnectInfo(addr)| ClientId::from(addr.ip()))
        .unwrap_or_else(ClientId::unknown)
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::net::Ipv4Addr;

    fn peer() -> ConnectInfo<SocketAddr> {
        ConnectInfo(SocketAddr::new(IpAddr::V4(Ipv4Addr::new(10, 0, 0, 1)), 40000))
    }

    #[test]
    fn falls_back_to_socket_address() {
        let headers = HeaderMap::new();
        assert_eq!(resolve_client(&headers, Some(&peer()), true).as_str(), "10.0.0.1");
    }

    #[test]
    fn uses_first_forwarded_entry_when_trusted() {
        let mut headers = HeaderMap::new();
        headers.insert(X_FORWARDED_FOR, "203.0.113.50, 70.41.3.18".parse().unwrap());
        assert_eq!(resolve_client(&headers, Some(&peer()), true).as_str(), "203.0.113.50");
        assert_eq!(resolve_client(&headers, Some(&peer()), false).as_str(), "10.0.0.1");
    }

    #[test]
    fn real_ip_used_when_forwarded_for_absent_or_garbage() {
        let mut headers = HeaderMap::new();
        headers.insert(X_FORWARDED_FOR, "not-an-ip".parse().unwrap());
        headers.insert(X_REAL_IP, "198.51.100.25".parse().unwrap());
        assert_eq!(resolve_client(&headers, Some(&peer()), true).as_str(), "198.51.100.25");
    }

    #[test]
    fn unknown_without_any_source() {
        assert_eq!(resolve_client(&HeaderMap::new(), None, true), ClientId::unknown());
    }
}
