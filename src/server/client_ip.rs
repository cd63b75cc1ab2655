//! Client IP resolution.
//!
//! The first entry of `X-Forwarded-For` wins when it is present and
//! non-empty; otherwise the transport peer address is used. IPv6 loopback
//! and IPv4-mapped IPv6 addresses are reported in their IPv4 form.

use axum::extract::{ConnectInfo, FromRequestParts};
use axum::http::request::Parts;
use axum::http::HeaderMap;
use std::convert::Infallible;
use std::net::SocketAddr;

const FORWARDED_FOR: &str = "x-forwarded-for";
const MAPPED_V4_PREFIX: &str = "::ffff:";

/// Resolved address of the client that sent the request.
#[derive(Clone, Debug, PartialEq, Eq)]
pub struct ClientIp(pub String);

impl<S> FromRequestParts<S> for ClientIp
where
    S: Send + Sync,
{
    type Rejection = Infallible;

    async fn from_request_parts(parts: &mut Parts, _state: &S) -> Result<Self, Self::Rejection> {
        let peer = parts
            .extensions
            .get::<ConnectInfo<SocketAddr>>()
            .map(|ConnectInfo(addr)| *addr);
        Ok(ClientIp(resolve_client_ip(&parts.headers, peer)))
    }
}

/// Resolve the client IP from request headers and the peer address.
///
/// Yields an empty string when neither source is available.
pub fn resolve_client_ip(headers: &HeaderMap, peer: Option<SocketAddr>) -> String {
    let forwarded = headers
        .get(FORWARDED_FOR)
        .and_then(|v| v.to_str().ok())
        .and_then(|v| v.split(',').next())
        .map(str::trim)
        .filter(|ip| !ip.is_empty());

    match forwarded {
        Some(ip) => normalize_ip(ip),
        None => peer
            .map(|addr| normalize_ip(&addr.ip().to_string()))
            .unwrap_or_default(),
    }
}

/// Map `::1` to `127.0.0.1` and strip the `::ffff:` prefix.
pub fn normalize_ip(ip: &str) -> String {
    if ip == "::1" {
        return "127.0.0.1".to_string();
    }
    ip.strip_prefix(MAPPED_V4_PREFIX).unwrap_or(ip).to_string()
}
