//! Source IP resolution
//!
//! Proxy-aware lookup of the caller's address. Headers are consulted in
//! trust order before falling back to the transport peer; a header that
//! does not parse as an address falls through to the next candidate.

use std::net::{IpAddr, SocketAddr};

use axum::http::HeaderMap;

const CF_CONNECTING_IP: &str = "cf-connecting-ip";
const X_FORWARDED_FOR: &str = "x-forwarded-for";
const X_REAL_IP: &str = "x-real-ip";

/// Resolve the request's source address.
pub fn source_ip(headers: &HeaderMap, peer: Option<SocketAddr>) -> Option<IpAddr> {
    if let Some(ip) = header_ip(headers, CF_CONNECTING_IP) {
        return Some(ip);
    }

    // X-Forwarded-For is a comma separated chain; the first entry is the
    // originating client.
    if let Some(value) = header_str(headers, X_FORWARDED_FOR) {
        if let Some(first) = value.split(',').next() {
            if let Ok(ip) = first.trim().parse() {
                return Some(ip);
            }
        }
    }

    if let Some(ip) = header_ip(headers, X_REAL_IP) {
        return Some(ip);
    }

    peer.map(|addr| addr.ip())
}

fn header_str<'a>(headers: &'a HeaderMap, name: &str) -> Option<&'a str> {
    headers.get(name).and_then(|value| value.to_str().ok())
}

fn header_ip(headers: &HeaderMap, name: &str) -> Option<IpAddr> {
    header_str(headers, name).and_then(|value| value.trim().parse().ok())
}
